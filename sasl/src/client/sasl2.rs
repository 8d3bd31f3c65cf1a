//! SASL2 (XEP-0388) inline-request builder.
//!
//! SASL2 lets a client piggyback several follow-on requests on the single
//! `<authenticate/>` element instead of performing them as separate
//! round-trips after `<success/>`. This type only carries the *data* for
//! those requests; turning it into wire elements (Bind2, `urn:xmpp:sm:3`,
//! `urn:xmpp:fast:0`) is Client Core's job, since that needs the stanza
//! codec this crate does not depend on.

/// Identifies this client to the server for per-device session management,
/// mirroring `<user-agent/>`'s `id`/`software`/`device` fields.
#[derive(Clone, Debug, Default)]
pub struct UserAgent {
    /// A stable identifier for this client instance (typically a UUID
    /// persisted across restarts).
    pub id: String,
    /// Free-text client software name, e.g. `"my-xmpp-client"`.
    pub software: Option<String>,
    /// Free-text device name, e.g. `"laptop"`.
    pub device: Option<String>,
}

/// Inline requests a client may attach to a SASL2 `<authenticate/>`.
#[derive(Clone, Debug, Default)]
pub struct Sasl2Request {
    /// Client identification, sent with every SASL2 attempt per XEP-0388.
    pub user_agent: Option<UserAgent>,
    /// Request inline resource binding (Bind2, XEP-0386); `None` skips it
    /// (legacy post-bind RFC 6120 §7 binding is used instead).
    pub bind2: Option<Bind2Request>,
    /// Request the server resume a previous stream-managed session instead
    /// of (or alongside) binding a fresh one.
    pub resume: Option<String>,
    /// Request stream management be enabled on this fresh bind.
    pub enable_sm: bool,
    /// Request a FAST token for the next connection attempt.
    pub fast: Option<FastRequest>,
    /// Request the session start in CSI-inactive state (XEP-0352).
    pub csi_inactive: bool,
    /// Request Message Carbons (XEP-0280) be enabled inline.
    pub enable_carbons: bool,
}

/// Bind2 (XEP-0386) inline resource-binding request.
#[derive(Clone, Debug, Default)]
pub struct Bind2Request {
    /// Client-requested resourcepart; `None` lets the server assign one.
    pub resource: Option<String>,
    /// Extra Bind2 extension namespaces the client wants enabled inline
    /// (e.g. carbons, CSI) — represented as bare strings here and mapped to
    /// the corresponding wire elements by Client Core.
    pub extensions: Vec<String>,
}

/// FAST (XEP-0484) token request.
#[derive(Clone, Debug)]
pub struct FastRequest {
    /// Preferred hash algorithm for the issued token, e.g. `"SHA-256"`.
    pub mechanism: String,
}

impl Sasl2Request {
    /// Starts an empty request carrying only `user_agent`.
    pub fn new(user_agent: UserAgent) -> Self {
        Self {
            user_agent: Some(user_agent),
            ..Default::default()
        }
    }

    /// Requests Bind2 inline resource binding.
    pub fn with_bind2(mut self, bind2: Bind2Request) -> Self {
        self.bind2 = Some(bind2);
        self
    }

    /// Requests stream resumption by id.
    pub fn with_resume(mut self, resumption_id: impl Into<String>) -> Self {
        self.resume = Some(resumption_id.into());
        self
    }

    /// Requests stream management be enabled on a fresh bind.
    pub fn with_enable_sm(mut self) -> Self {
        self.enable_sm = true;
        self
    }

    /// Requests a FAST token using `mechanism`.
    pub fn with_fast(mut self, mechanism: impl Into<String>) -> Self {
        self.fast = Some(FastRequest {
            mechanism: mechanism.into(),
        });
        self
    }

    /// Requests the session start CSI-inactive.
    pub fn with_csi_inactive(mut self) -> Self {
        self.csi_inactive = true;
        self
    }

    /// Requests Message Carbons be enabled inline.
    pub fn with_carbons(mut self) -> Self {
        self.enable_carbons = true;
        self
    }
}

/// What a SASL2 `<success/>` may carry back, beyond the bare auth result.
#[derive(Clone, Debug, Default)]
pub struct Sasl2Success {
    /// The JID the server assigned (bound resource included).
    pub authorization_identifier: Option<String>,
    /// A resumption id if stream management was enabled inline.
    pub sm_resumption_id: Option<String>,
    /// Whether an existing session was resumed (vs. freshly bound).
    pub resumed: bool,
    /// A freshly issued FAST token, if one was requested and granted.
    pub fast_token: Option<crate::common::HtToken>,
}
