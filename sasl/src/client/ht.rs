//! `HT-*` (XEP-0484 FAST token) mechanisms: `HT-<HASH>-<CB>`.
//!
//! The client proves possession of a server-issued secret instead of a
//! password: `HMAC_<HASH>(secret, "Initiator")`, sent as
//! `username \0 hmac`. No challenge round-trip is expected; a server that
//! sends one anyway fails the exchange.

use super::{Mechanism, MechanismError};
use crate::common::scram::ScramProvider;
use crate::common::{ChannelBinding, Credentials};

/// The channel-binding variant embedded in the mechanism name's `<CB>`
/// component.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HtChannelBinding {
    /// `NONE`: no channel-binding material required.
    None,
    /// `ENDP` (`tls-server-end-point`).
    Endp,
    /// `UNIQ` (`tls-unique`).
    Uniq,
    /// `EXPR` (a server-defined export-keying-material binding); treated
    /// the same as `Endp`/`Uniq` for the purpose of "is data available",
    /// since this transport has no EKM support.
    Expr,
}

impl HtChannelBinding {
    fn tag(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Endp => "ENDP",
            Self::Uniq => "UNIQ",
            Self::Expr => "EXPR",
        }
    }

    /// Whether `binding` provides what this variant needs.
    fn is_satisfied_by(self, binding: &ChannelBinding) -> bool {
        match self {
            Self::None => true,
            Self::Endp => matches!(binding, ChannelBinding::TlsServerEndPoint(_)),
            Self::Uniq => matches!(binding, ChannelBinding::TlsUnique(_)),
            Self::Expr => matches!(binding, ChannelBinding::TlsExporter(_)),
        }
    }
}

fn hmac_initiator(hash_name: &str, secret: &[u8]) -> Result<Vec<u8>, MechanismError> {
    match hash_name {
        "SHA-1" => Ok(crate::common::scram::Sha1::hmac(secret, b"Initiator")),
        "SHA-256" => Ok(crate::common::scram::Sha256::hmac(secret, b"Initiator")),
        "SHA-512" => Ok(crate::common::scram::Sha512::hmac(secret, b"Initiator")),
        "SHA3-512" => Ok(crate::common::scram::Sha3_512::hmac(secret, b"Initiator")),
        other => Err(MechanismError::MalformedChallenge(format!(
            "unsupported HT-* hash algorithm: {other}"
        ))),
    }
}

/// `HT-<HASH>-<CB>` client mechanism.
pub struct HtMechanism {
    mechanism_name: String,
    username: String,
    secret: Vec<u8>,
    hash_name: String,
}

impl HtMechanism {
    /// Builds an HT mechanism from a stored token, provided the transport's
    /// channel-binding data satisfies `cb`.
    pub fn from_credentials(
        creds: Credentials,
        cb: HtChannelBinding,
    ) -> Result<Self, MechanismError> {
        let token = creds.ht_token.ok_or(MechanismError::MissingCredentials)?;
        if !cb.is_satisfied_by(&creds.channel_binding) {
            return Err(MechanismError::ChannelBindingUnavailable);
        }
        Ok(Self {
            mechanism_name: format!("HT-{}-{}", token.mechanism, cb.tag()),
            username: creds.username,
            secret: token.secret,
            hash_name: token.mechanism,
        })
    }
}

impl Mechanism for HtMechanism {
    fn mechanism_name(&self) -> &str {
        &self.mechanism_name
    }

    fn initial_response(&mut self) -> Option<Vec<u8>> {
        let hmac = hmac_initiator(&self.hash_name, &self.secret).ok()?;
        let mut buf = Vec::with_capacity(self.username.len() + 1 + hmac.len());
        buf.extend_from_slice(self.username.as_bytes());
        buf.push(0);
        buf.extend_from_slice(&hmac);
        Some(buf)
    }

    fn respond(&mut self, _challenge: &[u8]) -> Result<Vec<u8>, MechanismError> {
        Err(MechanismError::MalformedChallenge(
            "HT-* does not expect a challenge".to_owned(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::HtToken;

    #[test]
    fn none_channel_binding_always_satisfied() {
        let creds = Credentials::default()
            .with_username("user")
            .with_ht_token(HtToken {
                mechanism: "SHA-256".to_owned(),
                secret: vec![1, 2, 3],
            });
        let mut mech = HtMechanism::from_credentials(creds, HtChannelBinding::None).unwrap();
        assert_eq!(mech.mechanism_name(), "HT-SHA-256-NONE");
        assert!(mech.initial_response().is_some());
    }

    #[test]
    fn unsatisfied_channel_binding_is_refused() {
        let creds = Credentials::default()
            .with_username("user")
            .with_ht_token(HtToken {
                mechanism: "SHA-256".to_owned(),
                secret: vec![1, 2, 3],
            });
        let err = HtMechanism::from_credentials(creds, HtChannelBinding::Endp).unwrap_err();
        assert!(matches!(err, MechanismError::ChannelBindingUnavailable));
    }
}
