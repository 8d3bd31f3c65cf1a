// Copyright (c) 2023 xmpp-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use futures::StreamExt;
use tokio_xmpp::{
    parsers::{disco::DiscoInfoQuery, iq::Iq, roster::Roster},
    Event as TokioXmppEvent, Stanza,
};

use crate::{iq, message, muc, presence, Agent, Event};

/// Wait for new events, or Error::Disconnected when stream is closed and will not reconnect.
///
/// Also races the wakeup against the earliest pending MUC join/leave
/// deadline, so a room stuck mid-transition (e.g. a join the service never
/// answered) is resolved after [`muc::room::ROOM_OPERATION_TIMEOUT`] even
/// with no further stanza traffic.
pub async fn wait_for_events(agent: &mut Agent) -> Vec<Event> {
    let sleep = match muc::room::next_deadline(agent) {
        Some(deadline) => tokio::time::sleep_until(deadline.into()),
        None => tokio::time::sleep(std::time::Duration::from_secs(3600)),
    };
    tokio::pin!(sleep);

    tokio::select! {
        () = &mut sleep, if muc::room::next_deadline(agent).is_some() => {
            muc::room::expire_timed_out_operations(agent)
        }
        event = agent.client.next() => {
            match event {
                Some(event) => handle_client_event(agent, event).await,
                None => {
                    // The underlying StanzaStream gave up reconnecting (or the
                    // caller closed it via Agent::disconnect), and will never
                    // produce another event.
                    vec![Event::Disconnected(tokio_xmpp::Error::Disconnected)]
                }
            }
        }
    }
}

async fn handle_client_event(agent: &mut Agent, event: TokioXmppEvent) -> Vec<Event> {
    let mut events = Vec::new();

    match event {
        TokioXmppEvent::Online { resumed: false, .. } => {
            agent.persist_credentials();
            let presence = presence::send::make_initial_presence(&agent.disco, &agent.node).into();
            let _ = agent.client.send_stanza(presence).await;
            events.push(Event::Online);
            // TODO: only send this when the ContactList feature is enabled.
            let iq = Iq::from_get(
                "roster",
                Roster {
                    ver: None,
                    items: vec![],
                },
            )
            .into();
            let _ = agent.client.send_stanza(iq).await;

            // Query account disco to know what bookmarks spec is used
            let iq = Iq::from_get("disco-account", DiscoInfoQuery { node: None }).into();
            let _ = agent.client.send_stanza(iq).await;
            agent.awaiting_disco_bookmarks_type = true;
        }
        TokioXmppEvent::Online { resumed: true, .. } => {}
        TokioXmppEvent::Disconnected(e) => {
            events.push(Event::Disconnected(e));
        }
        TokioXmppEvent::Stanza(Stanza::Iq(iq)) => {
            let new_events = iq::handle_iq(agent, iq).await;
            events.extend(new_events);
        }
        TokioXmppEvent::Stanza(Stanza::Message(message)) => {
            let new_events = message::receive::handle_message(agent, message).await;
            events.extend(new_events);
        }
        TokioXmppEvent::Stanza(Stanza::Presence(presence)) => {
            let new_events = presence::receive::handle_presence(agent, presence).await;
            events.extend(new_events);
        }
    }

    events
}
