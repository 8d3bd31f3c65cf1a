// Copyright (c) 2023 xmpp-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{
    credentials::CredentialStore,
    event_loop,
    extension::{self, ExtensionManager},
    jid::{BareJid, Jid, ResourcePart},
    message, muc,
    parsers::disco::{DiscoInfoResult, Feature},
    pubsub::BookmarksManager,
    Error, Event,
};
use tokio_xmpp::Client as TokioXmppClient;

pub struct Agent {
    pub(crate) client: TokioXmppClient,
    /// Loads credentials on (re)connect and persists FAST tokens the
    /// server grants in exchange.
    pub(crate) credential_store: Arc<dyn CredentialStore>,
    pub(crate) default_nick: Arc<RwLock<ResourcePart>>,
    pub(crate) lang: Arc<Vec<String>>,
    pub(crate) disco: DiscoInfoResult,
    pub(crate) node: String,
    pub(crate) awaiting_disco_bookmarks_type: bool,
    /// Rooms we have joined, are joining, or are leaving, keyed by their
    /// bare JID.
    pub(crate) rooms: HashMap<BareJid, muc::room::Room>,
    /// Cache and publish/retract API for our PEP bookmarks (XEP-0402).
    pub(crate) bookmarks: Arc<BookmarksManager>,
    /// Registered extension managers, offered unclaimed stanzas and PubSub
    /// events in order; see [`crate::extension`].
    pub(crate) extensions: Vec<Arc<dyn ExtensionManager>>,
}

impl Agent {
    pub async fn disconnect(self) -> Result<(), Error> {
        self.client.send_end().await
    }

    pub async fn join_room<'a>(&mut self, settings: muc::room::JoinRoomSettings<'a>) {
        muc::room::join_room(self, settings).await
    }

    /// Request to leave a chatroom.
    ///
    /// If successful, an [Event::RoomLeft] event will be produced. This method does not remove the room
    /// from bookmarks nor remove the autojoin flag. See [muc::room::leave_room] for more information.
    pub async fn leave_room<'a>(&mut self, settings: muc::room::LeaveRoomSettings<'a>) {
        muc::room::leave_room(self, settings).await
    }

    pub async fn send_raw_message<'a>(&mut self, settings: message::send::RawMessageSettings<'a>) {
        message::send::send_raw_message(self, settings).await
    }

    pub async fn send_message<'a>(&mut self, settings: message::send::MessageSettings<'a>) {
        message::send::send_message(self, settings).await
    }

    pub async fn send_room_message<'a>(&mut self, settings: muc::room::RoomMessageSettings<'a>) {
        muc::room::send_room_message(self, settings).await
    }

    pub async fn send_room_private_message<'a>(
        &mut self,
        settings: muc::private_message::RoomPrivateMessageSettings<'a>,
    ) {
        muc::private_message::send_room_private_message(self, settings).await
    }

    /// Wait for new events, or Error::Disconnected when connection is closed and will not reconnect.
    pub async fn wait_for_events(&mut self) -> Vec<Event> {
        event_loop::wait_for_events(self).await
    }

    /// Get the bound jid of the client.
    ///
    /// If the client is not connected, this will be None.
    pub fn bound_jid(&self) -> Option<&Jid> {
        self.client.bound_jid()
    }

    /// Access the PEP bookmarks cache and publish/retract API (XEP-0402).
    pub fn bookmarks(&self) -> Arc<BookmarksManager> {
        self.bookmarks.clone()
    }

    /// Hands any FAST token granted on the current connection to the
    /// configured [`CredentialStore`] for safekeeping.
    ///
    /// Called automatically after every successful (re)connect; exposed for
    /// callers that want to persist eagerly (e.g. before a planned restart).
    pub fn persist_credentials(&self) {
        if let Some(token) = self.client.latest_ht_token() {
            self.credential_store.store_ht_token(token);
        }
    }

    /// Register an extension manager with the dispatcher.
    ///
    /// Managers are offered unclaimed get/set IQs, in registration order,
    /// and every PubSub event notification; see [`crate::extension`].
    pub async fn register_extension(&mut self, manager: Arc<dyn ExtensionManager>) {
        manager.on_registered(self).await;
        self.extensions.push(manager);
    }

    /// Unregister a previously-registered extension manager, by pointer
    /// identity.
    pub async fn unregister_extension(&mut self, manager: &Arc<dyn ExtensionManager>) {
        manager.on_unregistered(self).await;
        self.extensions.retain(|m| !Arc::ptr_eq(m, manager));
    }

    /// disco#info features contributed by every registered extension
    /// manager, folded into the client's static feature list by
    /// [`crate::builder::ClientBuilder`].
    pub(crate) fn extension_features(&self) -> Vec<Feature> {
        extension::aggregate_discovery_features(&self.extensions)
    }
}
