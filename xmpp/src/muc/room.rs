// Copyright (c) 2023 xmpp-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::parsers::message::MessageType;
use tokio_xmpp::{
    jid::{BareJid, Jid, ResourcePart, ResourceRef},
    parsers::muc::{
        user::{Affiliation, Role},
        Muc,
    },
    parsers::presence::{Presence, Type as PresenceType},
    parsers::stanza_id::OriginId,
};

use crate::message::send::RawMessageSettings;
use crate::{Agent, RoomNick};

/// Per-operation timeout mandated for every pending join/leave transition.
pub const ROOM_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// `NotJoined` is implicit (absence of an entry in [`Agent`]'s room table);
/// everything else is a live state for a room we have sent at least a join
/// presence for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoomState {
    JoiningOccupantPresences,
    JoiningRoomHistory,
    Joined,
    Leaving,
}

/// A single occupant of a joined room, keyed by nickname in
/// [`Room::participants`].
#[derive(Clone, Debug)]
pub struct Participant {
    pub nick: RoomNick,
    pub real_jid: Option<Jid>,
    pub affiliation: Affiliation,
    pub role: Role,
}

/// Live state for a room we have joined or are joining/leaving.
pub(crate) struct Room {
    pub(crate) state: RoomState,
    pub(crate) nick: ResourcePart,
    pub(crate) participants: HashMap<RoomNick, Participant>,
    pub(crate) subject: Option<String>,
    /// Deadline for the current pending transition (join or leave); `None`
    /// while `Joined` and idle.
    pub(crate) deadline: Option<Instant>,
    /// Origin-ids of `groupchat` messages we sent and are still waiting to
    /// see echoed back by the room, keyed so [`crate::message::receive`]
    /// can resolve the send once the echo with a matching nick arrives.
    pub(crate) pending_origin_ids: HashSet<String>,
}

impl Room {
    fn joining(nick: ResourcePart) -> Self {
        Self {
            state: RoomState::JoiningOccupantPresences,
            nick,
            participants: HashMap::new(),
            subject: None,
            deadline: Some(Instant::now() + ROOM_OPERATION_TIMEOUT),
            pending_origin_ids: HashSet::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct JoinRoomSettings<'a> {
    pub room: BareJid,
    pub nick: Option<ResourcePart>,
    pub password: Option<String>,
    pub status: Option<(&'a str, &'a str)>,
}

impl<'a> JoinRoomSettings<'a> {
    pub fn new(room: BareJid) -> Self {
        Self {
            room,
            nick: None,
            password: None,
            status: None,
        }
    }

    pub fn with_nick(mut self, nick: impl AsRef<ResourceRef>) -> Self {
        self.nick = Some(nick.as_ref().into());
        self
    }

    pub fn with_password(mut self, password: impl AsRef<str>) -> Self {
        self.password = Some(password.as_ref().into());
        self
    }

    pub fn with_status(mut self, lang: &'a str, content: &'a str) -> Self {
        self.status = Some((lang, content));
        self
    }
}

/// Send the join presence for a room and start tracking its state machine
/// (`JoiningOccupantPresences → JoiningRoomHistory → Joined`, per
/// XEP-0045 §7).
///
/// The returned future resolves once the join presence has been sent, not
/// once the room has actually been joined; [`crate::Event::RoomJoined`]
/// (or a join failure, surfaced by [`super::super::presence::receive`]) is
/// the confirmation. A pending join that doesn't resolve within
/// [`ROOM_OPERATION_TIMEOUT`] is abandoned automatically.
///
/// TODO: this method should add bookmark and ensure autojoin is true
pub async fn join_room<'a>(agent: &mut Agent, settings: JoinRoomSettings<'a>) {
    let JoinRoomSettings {
        room,
        nick,
        password,
        status,
    } = settings;

    if let Some(existing) = agent.rooms.get(&room) {
        warn!(
            "Requesting to join room {room} which is already {:?}",
            existing.state
        );
        return;
    }

    let mut muc = Muc::new();
    if let Some(password) = password {
        muc = muc.with_password(password);
    }

    let nick = if let Some(nick) = nick {
        nick
    } else {
        agent.default_nick.read().await.clone()
    };

    let room_jid = room.clone().with_resource(&nick);
    let mut presence = Presence::new(PresenceType::None).with_to(room_jid);
    presence.add_payload(muc);

    let (lang, status) = status.unwrap_or(("", ""));
    presence.set_status(String::from(lang), String::from(status));

    let _ = agent.client.send_stanza(presence.into()).await;

    agent.rooms.insert(room, Room::joining(nick));
}

#[derive(Clone, Debug)]
pub struct LeaveRoomSettings<'a> {
    pub room: BareJid,
    pub status: Option<(&'a str, &'a str)>,
}

impl<'a> LeaveRoomSettings<'a> {
    pub fn new(room: BareJid) -> Self {
        Self { room, status: None }
    }

    pub fn with_status(mut self, lang: &'a str, content: &'a str) -> Self {
        self.status = Some((lang, content));
        self
    }
}

/// Send a "leave room" request to the server (specifically, an "unavailable" presence stanza).
///
/// The returned future will resolve when the request has been sent,
/// not when the room has actually been left.
///
/// If successful, a `RoomLeft` event should be received later as a confirmation. See [XEP-0045](https://xmpp.org/extensions/xep-0045.html#exit).
///
/// TODO: this method should set autojoin false on bookmark
pub async fn leave_room<'a>(agent: &mut Agent, settings: LeaveRoomSettings<'a>) {
    let LeaveRoomSettings { room, status } = settings;

    let Some(r) = agent.rooms.get_mut(&room) else {
        warn!("Requesting to leave room {room} which is not joined...");
        return;
    };

    if r.state == RoomState::Leaving {
        warn!("Requesting to leave again room {room} which is already leaving...");
        return;
    }

    let nick = r.nick.clone();
    r.state = RoomState::Leaving;
    r.deadline = Some(Instant::now() + ROOM_OPERATION_TIMEOUT);

    // XEP-0045 specifies that, to leave a room, the client must send a presence stanza
    // with type="unavailable".
    let mut presence = Presence::new(PresenceType::Unavailable).with_to(
        room.with_resource_str(nick.as_str())
            .expect("Invalid room JID after adding resource part."),
    );

    // XEP-0045: "The occupant MAY include normal <status/> information in the unavailable presence stanzas"
    if let Some((lang, content)) = status {
        presence.set_status(lang, content);
    }

    if let Err(e) = agent.client.send_stanza(presence.into()).await {
        error!("Failed to send leave room presence: {}", e);
    }
}

#[derive(Clone, Debug)]
pub struct RoomMessageSettings<'a> {
    pub room: BareJid,
    pub message: &'a str,
    pub lang: Option<&'a str>,
}

impl<'a> RoomMessageSettings<'a> {
    pub fn new(room: BareJid, message: &'a str) -> Self {
        Self {
            room,
            message,
            lang: None,
        }
    }

    pub fn with_lang(mut self, lang: &'a str) -> Self {
        self.lang = Some(lang);
        self
    }
}

/// Send a groupchat message to a joined room.
///
/// A fresh XEP-0359 origin-id is minted and attached; the room's own echo
/// of the message (matched by origin-id, per spec §4.8's "Send-message"
/// rule) is what ultimately resolves the send on the receive side instead
/// of this message being re-surfaced as an incoming [`crate::Event::RoomMessage`].
pub async fn send_room_message<'a>(agent: &mut Agent, settings: RoomMessageSettings<'a>) {
    let RoomMessageSettings {
        room,
        message,
        lang,
    } = settings;

    let origin_id = format!("{:016x}{:016x}", rand::random::<u64>(), rand::random::<u64>());

    match agent.rooms.get_mut(&room) {
        Some(r) if r.state == RoomState::Joined => {
            r.pending_origin_ids.insert(origin_id.clone());
        }
        _ => warn!("Sending a message to room {room} which is not currently joined"),
    }

    agent
        .send_raw_message(
            RawMessageSettings::new(room.into(), MessageType::Groupchat, message)
                .with_lang_option(lang)
                .with_payload(OriginId { id: origin_id }),
        )
        .await;
}

/// Check every pending join/leave against its deadline, completing any
/// that have timed out. Called by the event loop on every wakeup (see
/// [`crate::event_loop::next_room_deadline`]).
pub(crate) fn expire_timed_out_operations(agent: &mut Agent) -> Vec<crate::Event> {
    let now = Instant::now();
    let expired: Vec<BareJid> = agent
        .rooms
        .iter()
        .filter(|(_, r)| r.deadline.is_some_and(|d| now >= d))
        .map(|(room, _)| room.clone())
        .collect();

    let mut events = Vec::new();
    for room in expired {
        let r = agent.rooms.remove(&room).expect("just matched above");
        match r.state {
            RoomState::Leaving => {
                warn!("Leaving room {room} timed out; treating it as left");
                events.push(crate::Event::RoomLeft(room));
            }
            RoomState::JoiningOccupantPresences | RoomState::JoiningRoomHistory => {
                warn!("Joining room {room} timed out");
                events.push(crate::Event::RoomJoinFailed(room, "timeout".to_string()));
            }
            RoomState::Joined => unreachable!("a Joined room never carries a deadline"),
        }
    }
    events
}

/// Earliest deadline among all pending per-room operations, if any.
pub(crate) fn next_deadline(agent: &Agent) -> Option<Instant> {
    agent.rooms.values().filter_map(|r| r.deadline).min()
}
