// Copyright (c) 2023 xmpp-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

pub mod result;

use tokio_xmpp::parsers::iq::{Iq, IqType};

use crate::{extension, Agent, Event};

/// Dispatch a received IQ stanza.
///
/// Result/error IQs are matched against the in-flight request they answer
/// by the IQ router (`tokio_xmpp::client::iq::IqResponseTracker`) before
/// this ever runs; results with a payload that were deliberately left
/// unmatched (a handful of fire-and-forget private requests below) still
/// come through here. Inbound get/set IQs are not handled by the router at
/// all — they're routed through the extension dispatcher.
pub async fn handle_iq(agent: &mut Agent, iq: Iq) -> Vec<Event> {
    match &iq.payload {
        IqType::Get(_) => return extension::dispatch_unclaimed_iq(agent, iq, true).await,
        IqType::Set(_) => return extension::dispatch_unclaimed_iq(agent, iq, false).await,
        _ => {}
    }

    match iq.payload {
        IqType::Result(Some(payload)) => {
            let mut events = Vec::new();
            let from = iq
                .from
                .unwrap_or_else(|| agent.client.bound_jid().unwrap().clone());
            result::handle_iq_result(agent, &mut events, from, iq.to, iq.id, payload).await;
            events
        }
        IqType::Result(None) => Vec::new(),
        IqType::Error(e) => {
            debug!("Received iq error from {:?}: {:?}", iq.from, e);
            Vec::new()
        }
        IqType::Get(_) | IqType::Set(_) => unreachable!(),
    }
}
