// Copyright (c) 2023 xmpp-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use tokio_xmpp::{
    jid::Jid,
    parsers::{
        muc::user::{Affiliation, MucUser, Role, Status},
        presence::{Presence, Type as PresenceType},
    },
};

use crate::muc::room::{Participant, RoomState};
use crate::{Agent, Event, RoomNick};

/// MUC status codes (XEP-0045 §15.9) that mean "you no longer occupy this
/// room, and it wasn't because you asked to leave": ban, kick, and removal
/// due to an affiliation or room-configuration change, including the room
/// being destroyed.
const REMOVAL_STATUS_CODES: &[u16] = &[301, 307, 321, 322, 332];

fn status_code(status: &Status) -> u16 {
    // `Status` is a fieldless enum whose discriminants are the XEP-0045
    // status codes.
    *status as u16
}

fn removal_reason(codes: &[u16]) -> String {
    if codes.contains(&301) {
        "banned".to_string()
    } else if codes.contains(&307) {
        "kicked".to_string()
    } else if codes.contains(&321) || codes.contains(&322) {
        "removed due to an affiliation or configuration change".to_string()
    } else if codes.contains(&332) {
        "the service is shutting down".to_string()
    } else {
        "removed".to_string()
    }
}

/// Best-effort extraction of the defined-condition local name out of a
/// presence stanza's `<error/>` child, for reporting why a join was
/// rejected.
fn error_condition(presence: &Presence) -> String {
    presence
        .payloads
        .iter()
        .find(|p| p.name() == "error")
        .and_then(|error| error.children().next())
        .map(|condition| condition.name().to_string())
        .unwrap_or_else(|| "unknown error".to_string())
}

/// Translate a `Presence` stanza into a list of higher-level `Event`s.
pub async fn handle_presence(agent: &mut Agent, presence: Presence) -> Vec<Event> {
    let mut events = vec![];

    let from = presence.from.clone().unwrap().to_bare();
    let from_nick = presence
        .from
        .clone()
        .unwrap()
        .resource()
        .map(RoomNick::from_resource_ref);

    let Some(muc) = presence
        .payloads
        .iter()
        .filter_map(|p| MucUser::try_from(p.clone()).ok())
        .next()
    else {
        return events;
    };

    let is_self = muc.status.iter().any(|s| *s == Status::SelfPresence);
    let codes: Vec<u16> = muc.status.iter().map(status_code).collect();
    let item = muc.items.first();

    if !is_self {
        // A fellow occupant's presence: keep the room's participant roster
        // in sync, per spec §4.8 ("presence changes update the
        // participant roster").
        let Some(nick) = from_nick else {
            return events;
        };
        let Some(room) = agent.rooms.get_mut(&from) else {
            return events;
        };
        match presence.type_ {
            PresenceType::None => {
                let participant = Participant {
                    nick: nick.clone(),
                    real_jid: item.and_then(|i| i.jid.clone()),
                    affiliation: item.map(|i| i.affiliation).unwrap_or(Affiliation::None),
                    role: item.map(|i| i.role).unwrap_or(Role::None),
                };
                room.participants.insert(nick, participant);
            }
            PresenceType::Unavailable => {
                room.participants.remove(&nick);
            }
            _ => {}
        }
        return events;
    }

    // Self-presence: the stanza concerns our own occupancy of the room.
    match presence.type_ {
        PresenceType::None => {
            // No type means "available" per
            // https://xmpp.org/extensions/xep-0045.html#enter-pres.
            match agent.rooms.get_mut(&from) {
                Some(room) if room.state == RoomState::JoiningOccupantPresences => {
                    room.state = RoomState::JoiningRoomHistory;
                    room.deadline = Some(
                        std::time::Instant::now() + crate::muc::room::ROOM_OPERATION_TIMEOUT,
                    );
                }
                Some(_) => {
                    // Already past the occupant-presences stage (e.g. a
                    // nick-change echo); nothing to transition.
                }
                None => {
                    warn!(
                        "Received self-presence from {} while the room was not marked as joining.",
                        presence.from.unwrap()
                    );
                }
            }
        }
        PresenceType::Unavailable => {
            let removed_for_cause = codes.iter().any(|c| REMOVAL_STATUS_CODES.contains(c));
            if removed_for_cause {
                agent.rooms.remove(&from);
                events.push(Event::RoomRemoved(from.clone(), removal_reason(&codes)));
            } else if let Some(room) = agent.rooms.get(&from) {
                if room.state == RoomState::Leaving {
                    agent.rooms.remove(&from);
                    events.push(Event::RoomLeft(from.clone()));
                } else {
                    warn!(
                        "Received self-presence unavailable from {} while the room was not marked as leaving.",
                        presence.from.unwrap()
                    );
                }
            } else {
                warn!(
                    "Received self-presence unavailable from {} while the room was not tracked.",
                    presence.from.unwrap()
                );
            }
        }
        PresenceType::Error => {
            // A join was rejected (e.g. nickname conflict, password
            // required, room full): resolve the join with a failure
            // instead of panicking.
            if agent.rooms.remove(&from).is_some() {
                events.push(Event::RoomJoinFailed(from.clone(), error_condition(&presence)));
            } else {
                warn!(
                    "Received self-presence error from {} for a room we weren't tracking.",
                    presence.from.unwrap()
                );
            }
        }
        _ => {
            debug!("Ignoring self-presence of type {:?} from {}", presence.type_, from);
        }
    }

    events
}
