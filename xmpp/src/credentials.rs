// Copyright (c) 2023 xmpp-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Credential persistence across reconnects and restarts.

pub use tokio_xmpp::sasl::common::{ChannelBinding, Credentials, HtToken, ProviderToken};

/// Loads and persists the credentials used to authenticate, so that a
/// XEP-0484 (FAST) token issued on one connection can replace the password
/// on the next one, including across process restarts.
///
/// Implementations are responsible for their own storage (a file, a
/// keyring, a database row); this trait only describes the load/store
/// contract [`crate::builder::ClientBuilder`] drives it with.
pub trait CredentialStore: Send + Sync {
    /// Returns the credentials to authenticate with right now.
    fn load(&self) -> Credentials;

    /// Called after a successful connection that was granted a fresh FAST
    /// token, so it can replace whatever was returned by the last `load`.
    fn store_ht_token(&self, token: HtToken);
}

/// A [`CredentialStore`] that never persists anything: `load` always
/// returns the credentials it was built with, and granted tokens are
/// dropped. This is the default when no store is configured, matching the
/// previous password-only behaviour.
pub struct StaticCredentials(pub Credentials);

impl CredentialStore for StaticCredentials {
    fn load(&self) -> Credentials {
        self.0.clone()
    }

    fn store_ht_token(&self, _token: HtToken) {}
}
