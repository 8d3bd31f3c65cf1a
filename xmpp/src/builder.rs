// Copyright (c) 2023 xmpp-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
#[cfg(any(feature = "starttls-rust", feature = "starttls-native"))]
use tokio_xmpp::connect::{DnsConfig, StartTlsServerConnector};
use tokio_xmpp::{
    connect::ServerConnector,
    jid::{BareJid, Jid, ResourcePart},
    parsers::{
        disco::{DiscoInfoResult, Feature, Identity},
        ns,
    },
    stanzastream::ReconnectPolicy,
    xmlstream::Timeouts,
    Client as TokioXmppClient,
};

use crate::{
    credentials::{CredentialStore, Credentials, StaticCredentials},
    extension::ExtensionManager,
    pubsub::BookmarksManager,
    Agent, ClientFeature,
};

#[derive(Debug)]
pub enum ClientType {
    Bot,
    Pc,
}

impl Default for ClientType {
    fn default() -> Self {
        ClientType::Bot
    }
}

impl ToString for ClientType {
    fn to_string(&self) -> String {
        String::from(match self {
            ClientType::Bot => "bot",
            ClientType::Pc => "pc",
        })
    }
}

pub struct ClientBuilder<C: ServerConnector> {
    jid: BareJid,
    credential_store: Arc<dyn CredentialStore>,
    server_connector: C,
    website: String,
    default_nick: String,
    lang: Vec<String>,
    disco: (ClientType, String),
    features: Vec<ClientFeature>,
    resource: Option<String>,
    timeouts: Timeouts,
    reconnect_policy: ReconnectPolicy,
}

#[cfg(any(feature = "starttls-rust", feature = "starttls-native"))]
impl ClientBuilder<StartTlsServerConnector> {
    pub fn new(jid: BareJid, password: &str) -> ClientBuilder<StartTlsServerConnector> {
        Self::new_with_connector(
            jid.clone(),
            password,
            StartTlsServerConnector(DnsConfig::srv_default_client(jid.domain())),
        )
    }
}

impl<C: ServerConnector> ClientBuilder<C> {
    pub fn new_with_connector(
        jid: BareJid,
        password: &str,
        server_connector: C,
    ) -> ClientBuilder<C> {
        ClientBuilder {
            jid,
            credential_store: Arc::new(StaticCredentials(Credentials::default().with_password(password))),
            server_connector,
            website: String::from("https://gitlab.com/xmpp-rs/tokio-xmpp"),
            default_nick: String::from("xmpp-rs"),
            lang: vec![String::from("en")],
            disco: (ClientType::default(), String::from("tokio-xmpp")),
            features: vec![],
            resource: None,
            timeouts: Timeouts::default(),
            reconnect_policy: ReconnectPolicy::default(),
        }
    }

    /// Use `store` to load credentials at connect time (and on every
    /// reconnect) and to persist FAST tokens granted by the server, instead
    /// of the fixed password given to `new`/`new_with_connector`.
    pub fn set_credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credential_store = store;
        self
    }

    /// Configure the backoff policy applied between failed reconnection
    /// attempts. Defaults to starting at 1s and doubling up to 30s.
    pub fn set_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect_policy = policy;
        self
    }

    /// Optionally set a resource associated to this device on the client
    pub fn set_resource(mut self, resource: &str) -> Self {
        self.resource = Some(resource.to_string());
        self
    }

    pub fn set_client(mut self, type_: ClientType, name: &str) -> Self {
        self.disco = (type_, String::from(name));
        self
    }

    pub fn set_website(mut self, url: &str) -> Self {
        self.website = String::from(url);
        self
    }

    pub fn set_default_nick(mut self, nick: &str) -> Self {
        self.default_nick = String::from(nick);
        self
    }

    pub fn set_lang(mut self, lang: Vec<String>) -> Self {
        self.lang = lang;
        self
    }

    /// Configure the timeouts used.
    ///
    /// See [`Timeouts`] for more information on the semantics and the
    /// defaults (which are used unless you call this method).
    pub fn set_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn enable_feature(mut self, feature: ClientFeature) -> Self {
        self.features.push(feature);
        self
    }

    fn make_disco(&self, extensions: &[Arc<dyn ExtensionManager>]) -> DiscoInfoResult {
        let identities = vec![Identity::new(
            "client",
            self.disco.0.to_string(),
            "en",
            self.disco.1.to_string(),
        )];
        let mut features = vec![Feature::new(ns::DISCO_INFO)];
        features.extend(crate::extension::aggregate_discovery_features(extensions));
        DiscoInfoResult {
            node: None,
            identities,
            features,
            extensions: vec![],
        }
    }

    pub fn build(self) -> Agent {
        let jid: Jid = if let Some(resource) = &self.resource {
            self.jid.with_resource_str(resource).unwrap().into()
        } else {
            self.jid.clone().into()
        };

        let credentials = self.credential_store.load();
        let client = TokioXmppClient::new_with_connector_and_policy(
            jid,
            credentials,
            self.server_connector.clone(),
            self.timeouts,
            self.reconnect_policy,
        );
        self.build_impl(client)
    }

    // This function is meant to be used for testing build
    pub(crate) fn build_impl(self, client: TokioXmppClient) -> Agent {
        let bookmarks = BookmarksManager::new();

        let mut extensions: Vec<Arc<dyn ExtensionManager>> = Vec::new();
        if self.features.contains(&ClientFeature::JoinRooms) {
            extensions.push(bookmarks.clone() as Arc<dyn ExtensionManager>);
        }
        #[cfg(feature = "avatars")]
        if self.features.contains(&ClientFeature::Avatars) {
            extensions.push(Arc::new(crate::pubsub::avatar::AvatarManager::new()) as Arc<dyn ExtensionManager>);
        }

        let disco = self.make_disco(&extensions);
        let node = self.website;

        let default_nick = ResourcePart::new(&self.default_nick)
            .unwrap_or_else(|_| ResourcePart::new("xmpp-rs").expect("a fixed literal is valid"));

        Agent {
            client,
            credential_store: self.credential_store,
            default_nick: Arc::new(RwLock::new(default_nick)),
            lang: Arc::new(self.lang),
            disco,
            node,
            awaiting_disco_bookmarks_type: false,
            rooms: HashMap::new(),
            bookmarks,
            extensions,
        }
    }
}
