// Copyright (c) 2019 Emmanuel Gil Peyrot <linkmauve@linkmauve.fr>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#![deny(bare_trait_objects)]

pub use tokio_xmpp;
pub use tokio_xmpp::jid;
pub use tokio_xmpp::minidom;
pub use tokio_xmpp::parsers;
#[macro_use]
extern crate log;

pub mod agent;
pub mod builder;
pub mod credentials;
pub mod delay;
pub mod disco;
pub mod event;
pub mod event_loop;
pub mod extension;
pub mod feature;
pub mod iq;
pub mod message;
pub mod muc;
pub mod presence;
pub mod pubsub;

// Module re-exports
pub use agent::Agent;
pub use builder::{ClientBuilder, ClientType};
pub use credentials::CredentialStore;
pub use event::Event;
pub use extension::ExtensionManager;
pub use feature::ClientFeature;

pub type Error = tokio_xmpp::Error;
pub type Id = Option<String>;

/// A MUC occupant nickname, as opposed to a bare account [`jid::ResourcePart`]
/// (the two are easy to confuse since a nickname *is* a resource part on the
/// wire, but [`Event`]s use this distinct type so callers can't accidentally
/// mix up "my own resource" with "someone's nickname in a room").
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct RoomNick(String);

impl RoomNick {
    pub fn new(resource: jid::ResourcePart) -> Self {
        Self(resource.to_string())
    }

    pub fn from_resource_ref(resource: &jid::ResourceRef) -> Self {
        Self(resource.as_str().to_owned())
    }
}

impl AsRef<str> for RoomNick {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for RoomNick {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(all(test, any(feature = "starttls-rust", feature = "starttls-native")))]
mod tests {
    use super::jid::BareJid;
    use super::{ClientBuilder, ClientFeature, ClientType, Event};
    use std::str::FromStr;

    #[tokio::test]
    async fn disconnects_cleanly_without_a_live_server() {
        let jid = BareJid::from_str("foo@bar").unwrap();

        let client_builder = ClientBuilder::new(jid, "meh")
            .set_client(ClientType::Bot, "xmpp-rs")
            .set_website("https://gitlab.com/xmpp-rs/xmpp-rs")
            .set_default_nick("bot")
            .enable_feature(ClientFeature::ContactList);

        #[cfg(feature = "avatars")]
        let client_builder = client_builder.enable_feature(ClientFeature::Avatars);

        let mut agent = client_builder.build();

        let events = agent.wait_for_events().await;
        assert!(matches!(events[0], Event::Disconnected(_)));
    }
}
