// Copyright (c) 2023 xmpp-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/// Optional client capabilities, toggled with
/// [`ClientBuilder::enable_feature`][`crate::builder::ClientBuilder::enable_feature`].
///
/// Each variant advertises a corresponding disco#info feature so that
/// servers and contacts know to use it with us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientFeature {
    /// Request and track the roster (contact list).
    ContactList,
    /// Publish and fetch XEP-0084 avatars via PEP.
    #[cfg(feature = "avatars")]
    Avatars,
    /// Auto-join XEP-0402 bookmarked rooms and react to bookmark pushes.
    JoinRooms,
}
