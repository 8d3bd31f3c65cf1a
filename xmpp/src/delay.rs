// Copyright (c) 2023 xmpp-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use chrono::{DateTime, Utc};

use tokio_xmpp::parsers::{delay::Delay, message::Message};

/// When a stanza was received, and, if it carried a XEP-0203 delay
/// annotation (e.g. MUC history replay, offline message delivery), when it
/// was actually sent.
#[derive(Clone, Debug)]
pub struct StanzaTimeInfo {
    /// When this process received the stanza.
    pub received: DateTime<Utc>,
    /// The timestamp claimed by a `<delay/>` payload, if present.
    pub delay: Option<DateTime<Utc>>,
}

pub(crate) fn message_time_info(message: &Message) -> StanzaTimeInfo {
    let delay = message
        .payloads
        .iter()
        .find_map(|payload| Delay::try_from(payload.clone()).ok())
        .map(|delay| delay.stamp.0.with_timezone(&Utc));

    StanzaTimeInfo {
        received: Utc::now(),
        delay,
    }
}
