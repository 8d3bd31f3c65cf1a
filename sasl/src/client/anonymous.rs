//! `ANONYMOUS` (RFC 4505): no credentials at all, just an optional trace
//! string the server may log.

use super::{Mechanism, MechanismError};

/// `ANONYMOUS` mechanism. Always constructible; carries no secret.
#[derive(Default)]
pub struct Anonymous {
    trace: Option<String>,
}

impl Anonymous {
    /// Builds an `ANONYMOUS` mechanism with no trace string.
    pub fn new() -> Self {
        Self { trace: None }
    }

    /// Builds an `ANONYMOUS` mechanism carrying an opaque trace string
    /// (typically an email address or nothing at all per RFC 4505 §2).
    pub fn with_trace(trace: impl Into<String>) -> Self {
        Self {
            trace: Some(trace.into()),
        }
    }
}

impl Mechanism for Anonymous {
    fn mechanism_name(&self) -> &str {
        "ANONYMOUS"
    }

    fn initial_response(&mut self) -> Option<Vec<u8>> {
        Some(self.trace.clone().unwrap_or_default().into_bytes())
    }

    fn respond(&mut self, _challenge: &[u8]) -> Result<Vec<u8>, MechanismError> {
        Err(MechanismError::MalformedChallenge(
            "ANONYMOUS does not expect a challenge".to_owned(),
        ))
    }
}
