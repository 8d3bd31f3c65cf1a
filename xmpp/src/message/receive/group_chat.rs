// Copyright (c) 2023 xmpp-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::{
    delay::StanzaTimeInfo,
    jid::Jid,
    muc::room::RoomState,
    parsers::{message::Message, message_correct::Replace, stanza_id::OriginId},
    Agent, Event, RoomNick,
};

pub async fn handle_message_group_chat(
    agent: &mut Agent,
    events: &mut Vec<Event>,
    from: Jid,
    message: &mut Message,
    time_info: StanzaTimeInfo,
) {
    let room_jid = from.to_bare();
    let langs: Vec<&str> = agent.lang.iter().map(String::as_str).collect();
    let mut found_subject = false;

    if let Some((_lang, subject)) = message.get_best_subject(langs.clone()) {
        // Per spec §4.8, the first non-history groupchat message carrying a
        // subject is what completes the join (XEP-0045 §7.2.15): history
        // replay is always terminated by the live subject.
        if let Some(room) = agent.rooms.get_mut(&room_jid) {
            if room.state == RoomState::JoiningRoomHistory {
                room.state = RoomState::Joined;
                room.deadline = None;
                events.push(Event::RoomJoined(room_jid.clone()));
            }
            room.subject = Some(subject.0.clone());
        }
        events.push(Event::RoomSubject(
            room_jid.clone(),
            from.resource().map(RoomNick::from_resource_ref),
            subject.0.clone(),
            time_info.clone(),
        ));
        found_subject = true;
    }

    // An echo of a message we sent ourselves: resolve the pending send by
    // origin-id instead of re-surfacing it as an incoming message.
    if let Ok(Some(origin_id)) = message.extract_payload::<OriginId>() {
        if let Some(room) = agent.rooms.get_mut(&room_jid) {
            if room.pending_origin_ids.remove(&origin_id.id) {
                return;
            }
        }
    }

    let Some((_lang, body)) = message.get_best_body_cloned(langs) else {
        if !found_subject {
            debug!(
                "Received groupchat message without body/subject:\n{:#?}",
                message
            );
        }
        return;
    };

    let correction = message.extract_payload::<Replace>().unwrap_or_else(|e| {
        warn!("Failed to parse <replace> payload: {e}");
        None
    });

    // Now we have a groupchat message... which can be:
    //
    // - a normal MUC message from a user in a room
    // - a MUC message correction from a user in a room
    // - a service message from a MUC channel (barejid)
    //
    // In theory we can have service message correction but nope nope nope

    if let Some(resource) = from.resource() {
        // User message/correction

        let event = if let Some(correction) = correction {
            Event::RoomMessageCorrection(
                Some(correction.id),
                from.to_bare(),
                RoomNick::from_resource_ref(resource),
                body.clone(),
                time_info,
            )
        } else {
            Event::RoomMessage(
                message.id.clone(),
                from.to_bare(),
                RoomNick::from_resource_ref(resource),
                body.clone(),
                time_info,
            )
        };
        events.push(event);
    } else {
        // Service message
        if correction.is_some() {
            warn!("Found correction in service message:\n{:#?}", message);
        } else {
            let event = Event::ServiceMessage(message.id.clone(), from.to_bare(), body, time_info);
            events.push(event);
        }
    }
}
