//! Client-side SASL mechanisms.
//!
//! Every mechanism implements [`Mechanism`], a three-operation interface:
//! an optional initial response sent with `<auth/>`, a `respond` step run
//! once per server challenge, and a mechanism name used to match against the
//! server's advertised list. [`mechanisms::Mechanisms`] is the closed,
//! ordered enumeration of all of them and owns selection.

pub mod anonymous;
pub mod digest_md5;
pub mod ht;
pub mod mechanisms;
pub mod plain;
pub mod provider;
pub mod sasl2;
pub mod scram;

pub use crate::error::MechanismError;

/// The client side of one SASL mechanism's challenge/response exchange.
///
/// A mechanism is built once credentials and (if relevant) channel-binding
/// data are known, and is then driven exactly once through
/// [`Mechanism::initial_response`] followed by zero or more calls to
/// [`Mechanism::respond`], one per server challenge, in the order the server
/// sends them.
pub trait Mechanism {
    /// The IANA SASL mechanism name this value negotiates as, e.g.
    /// `"SCRAM-SHA-256"` or `"PLAIN"`.
    fn mechanism_name(&self) -> &str;

    /// Bytes to send alongside `<auth/>`, if this mechanism sends one.
    ///
    /// Most mechanisms other than SCRAM's GS2 header or PLAIN's
    /// `authzid\0user\0pass` have no meaningful initial response; the
    /// default returns `None`, leaving the first round-trip to
    /// `respond`.
    fn initial_response(&mut self) -> Option<Vec<u8>> {
        None
    }

    /// Computes the response to one server challenge.
    fn respond(&mut self, challenge: &[u8]) -> Result<Vec<u8>, MechanismError>;

    /// Verifies server-provided data accompanying `<success/>`, if this
    /// mechanism has any to check (only SCRAM does, via `v=...`).
    ///
    /// The default accepts unconditionally: most mechanisms have no mutual
    /// authentication step.
    fn success(&mut self, _data: &[u8]) -> Result<(), MechanismError> {
        Ok(())
    }
}
