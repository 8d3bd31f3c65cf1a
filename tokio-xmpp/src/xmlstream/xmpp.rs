// Copyright (c) 2024 Jonas Schäfer <jonas@zombofant.net>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use xso::{AsXml, FromXml};

use xmpp_parsers::{
    component, sasl, sasl2, sm, starttls, stream_error::ReceivedStreamError,
};

use crate::event::Stanza;

/// Any valid XMPP stream-level element.
#[derive(FromXml, AsXml, Debug)]
#[xml()]
pub enum XmppStreamElement {
    /// IQ, message or presence stanza
    #[xml(transparent)]
    Stanza(Stanza),

    /// RFC 6120 stream-level error
    #[xml(transparent)]
    StreamError(ReceivedStreamError),

    /// Stream management (XEP-0198) nonza
    #[xml(transparent)]
    SM(sm::Nonza),

    /// SASL-related nonza
    #[xml(transparent)]
    Sasl(sasl::Nonza),

    /// SASL2 (XEP-0388) `<authenticate/>`, sent by the client.
    #[xml(transparent)]
    Sasl2Authenticate(sasl2::Authenticate),

    /// SASL2 `<challenge/>`, sent by the server.
    #[xml(transparent)]
    Sasl2Challenge(sasl2::Challenge),

    /// SASL2 `<response/>`, sent by the client.
    #[xml(transparent)]
    Sasl2Response(sasl2::Response),

    /// SASL2 `<success/>`, sent by the server.
    #[xml(transparent)]
    Sasl2Success(sasl2::Success),

    /// SASL2 `<failure/>`, sent by the server.
    #[xml(transparent)]
    Sasl2Failure(sasl2::Failure),

    /// SASL2 `<continue/>`, sent by the server to request an extra
    /// authentication step (e.g. 2FA).
    #[xml(transparent)]
    Sasl2Continue(sasl2::Continue),

    /// SASL2 `<next/>`, sent by the client to select a continuation task.
    #[xml(transparent)]
    Sasl2Next(sasl2::Next),

    /// STARTTLS-related nonza
    #[xml(transparent)]
    Starttls(starttls::Nonza),

    /// Component protocol nonzas
    #[xml(transparent)]
    ComponentHandshake(component::Handshake),
}
