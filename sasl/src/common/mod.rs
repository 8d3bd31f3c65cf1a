//! Types shared across mechanisms: credentials, channel binding, and the
//! SCRAM hash-provider abstraction.

pub mod scram;

/// Channel-binding data offered by the transport, if any.
///
/// `None` means the transport did not negotiate any channel binding (e.g.
/// plain TCP, or TLS without exposing binding data). HT-* mechanisms with a
/// channel-binding type other than `NONE` require this to be present; SCRAM
/// mechanisms tolerate its absence by sending the `y,,` GS2 header instead
/// of `p=...`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ChannelBinding {
    /// No channel binding available.
    None,
    /// `tls-unique` data, as produced by the TLS layer.
    TlsUnique(Vec<u8>),
    /// `tls-server-end-point` data (the hash of the server's certificate).
    TlsServerEndPoint(Vec<u8>),
    /// `tls-exporter` data (RFC 9266), exported keying material from a
    /// TLS 1.3 connection.
    TlsExporter(Vec<u8>),
}

impl Default for ChannelBinding {
    fn default() -> Self {
        Self::None
    }
}

/// An HT-* (Husk Token, XEP-0484 FAST) token: the secret issued by a server
/// during a previous SASL2 exchange, to be consumed on the next connection
/// attempt instead of a password.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HtToken {
    /// Hash algorithm identifier, e.g. `"SHA-256"`.
    pub mechanism: String,
    /// Opaque secret bytes.
    pub secret: Vec<u8>,
}

/// A bearer-style provider token (Facebook/Google/WindowsLive OAuth-family
/// access tokens), carried alongside or instead of a password.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProviderToken {
    /// The bare access token as issued by the identity provider.
    pub access_token: String,
}

/// Credentials a mechanism may draw on. Not every field is required by
/// every mechanism; mechanisms that need a field they don't find return
/// [`crate::error::MechanismError::MissingCredentials`].
#[derive(Clone, Debug, Default)]
pub struct Credentials {
    /// Authentication identity (the "username" in most mechanisms).
    pub username: String,
    /// Cleartext password, if known. PBKDF2-derived SCRAM material is
    /// computed from this on demand; callers with pre-derived material can
    /// use `Credentials::with_scram_cache` instead to avoid recomputing it
    /// on every reconnect.
    pub password: Option<String>,
    /// A previously issued FAST token, if any.
    pub ht_token: Option<HtToken>,
    /// A provider (OAuth-family) bearer token, if any.
    pub provider_token: Option<ProviderToken>,
    /// Channel-binding data offered by the transport.
    pub channel_binding: ChannelBinding,
}

impl Credentials {
    /// Builder-style setter for `username`.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Builder-style setter for `password`.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Builder-style setter for `ht_token`.
    pub fn with_ht_token(mut self, token: HtToken) -> Self {
        self.ht_token = Some(token);
        self
    }

    /// Builder-style setter for `provider_token`.
    pub fn with_provider_token(mut self, token: ProviderToken) -> Self {
        self.provider_token = Some(token);
        self
    }

    /// Builder-style setter for `channel_binding`.
    pub fn with_channel_binding(mut self, channel_binding: ChannelBinding) -> Self {
        self.channel_binding = channel_binding;
        self
    }
}

impl From<String> for Credentials {
    /// A bare password, for callers that don't need FAST/provider tokens.
    fn from(password: String) -> Self {
        Self::default().with_password(password)
    }
}

impl From<&str> for Credentials {
    fn from(password: &str) -> Self {
        Self::default().with_password(password)
    }
}
