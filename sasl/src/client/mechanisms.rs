//! The closed set of client mechanisms and the selection policy that picks
//! among them.
//!
//! Mechanism selection is a tagged union with one variant per kind (per
//! spec.md §9 "Polymorphism by variant" — no runtime class hierarchy is
//! needed since the set never grows at runtime). [`Mechanisms::select`]
//! picks the strongest mechanism the server advertises for which the
//! caller holds credentials.

use super::anonymous::Anonymous;
use super::digest_md5::DigestMd5;
use super::ht::{HtChannelBinding, HtMechanism};
use super::plain::Plain;
use super::provider::{ProviderKind, ProviderMechanism};
use super::scram::ScramClient;
use super::{Mechanism, MechanismError};
use crate::common::scram::{Sha1, Sha256, Sha3_512, Sha512};
use crate::common::{ChannelBinding, Credentials};

/// A selected, ready-to-drive client mechanism.
pub enum Mechanisms {
    /// An `HT-*` (XEP-0484 FAST) token mechanism.
    Ht(HtMechanism),
    /// `SCRAM-SHA3-512`.
    ScramSha3_512(ScramClient<Sha3_512>),
    /// `SCRAM-SHA-512`.
    ScramSha512(ScramClient<Sha512>),
    /// `SCRAM-SHA-256`.
    ScramSha256(ScramClient<Sha256>),
    /// `SCRAM-SHA-1`.
    ScramSha1(ScramClient<Sha1>),
    /// `DIGEST-MD5`.
    DigestMd5(DigestMd5),
    /// `PLAIN`.
    Plain(Plain),
    /// `ANONYMOUS`.
    Anonymous(Anonymous),
    /// A provider-specific bearer-token mechanism.
    Provider(ProviderMechanism),
}

impl Mechanism for Mechanisms {
    fn mechanism_name(&self) -> &str {
        match self {
            Self::Ht(m) => m.mechanism_name(),
            Self::ScramSha3_512(m) => m.mechanism_name(),
            Self::ScramSha512(m) => m.mechanism_name(),
            Self::ScramSha256(m) => m.mechanism_name(),
            Self::ScramSha1(m) => m.mechanism_name(),
            Self::DigestMd5(m) => m.mechanism_name(),
            Self::Plain(m) => m.mechanism_name(),
            Self::Anonymous(m) => m.mechanism_name(),
            Self::Provider(m) => m.mechanism_name(),
        }
    }

    fn initial_response(&mut self) -> Option<Vec<u8>> {
        match self {
            Self::Ht(m) => m.initial_response(),
            Self::ScramSha3_512(m) => m.initial_response(),
            Self::ScramSha512(m) => m.initial_response(),
            Self::ScramSha256(m) => m.initial_response(),
            Self::ScramSha1(m) => m.initial_response(),
            Self::DigestMd5(m) => m.initial_response(),
            Self::Plain(m) => m.initial_response(),
            Self::Anonymous(m) => m.initial_response(),
            Self::Provider(m) => m.initial_response(),
        }
    }

    fn respond(&mut self, challenge: &[u8]) -> Result<Vec<u8>, MechanismError> {
        match self {
            Self::Ht(m) => m.respond(challenge),
            Self::ScramSha3_512(m) => m.respond(challenge),
            Self::ScramSha512(m) => m.respond(challenge),
            Self::ScramSha256(m) => m.respond(challenge),
            Self::ScramSha1(m) => m.respond(challenge),
            Self::DigestMd5(m) => m.respond(challenge),
            Self::Plain(m) => m.respond(challenge),
            Self::Anonymous(m) => m.respond(challenge),
            Self::Provider(m) => m.respond(challenge),
        }
    }

    fn success(&mut self, data: &[u8]) -> Result<(), MechanismError> {
        match self {
            Self::Ht(m) => m.success(data),
            Self::ScramSha3_512(m) => m.success(data),
            Self::ScramSha512(m) => m.success(data),
            Self::ScramSha256(m) => m.success(data),
            Self::ScramSha1(m) => m.success(data),
            Self::DigestMd5(m) => m.success(data),
            Self::Plain(m) => m.success(data),
            Self::Anonymous(m) => m.success(data),
            Self::Provider(m) => m.success(data),
        }
    }
}

/// The HT-* channel-binding tag to try, strongest first, given what the
/// transport actually negotiated.
fn best_ht_channel_binding(binding: &ChannelBinding) -> &'static [HtChannelBinding] {
    match binding {
        ChannelBinding::TlsExporter(_) => &[HtChannelBinding::Expr, HtChannelBinding::None],
        ChannelBinding::TlsServerEndPoint(_) => &[HtChannelBinding::Endp, HtChannelBinding::None],
        ChannelBinding::TlsUnique(_) => &[HtChannelBinding::Uniq, HtChannelBinding::None],
        ChannelBinding::None => &[HtChannelBinding::None],
    }
}

/// Picks and constructs the strongest mechanism the server advertises for
/// which `creds` holds the required material.
///
/// `server_mechanisms` is the list the server sent in
/// `<mechanisms/>`/`<authentication/>`. `digest_uri` is only consulted if
/// `DIGEST-MD5` is selected. `secure_channel` must be true for `PLAIN` to
/// even be considered, per spec.md §4.3 ("PLAIN is forbidden unless TLS or
/// equivalent channel security is active").
pub fn select(
    server_mechanisms: &[String],
    creds: &Credentials,
    digest_uri: &str,
    secure_channel: bool,
) -> Result<Mechanisms, MechanismError> {
    let has = |name: &str| server_mechanisms.iter().any(|m| m == name);

    if creds.ht_token.is_some() {
        let hash = creds.ht_token.as_ref().unwrap().mechanism.clone();
        for cb in best_ht_channel_binding(&creds.channel_binding) {
            let name = format!("HT-{hash}-{}", ht_tag(*cb));
            if has(&name) {
                if let Ok(m) = HtMechanism::from_credentials(creds.clone(), *cb) {
                    return Ok(Mechanisms::Ht(m));
                }
            }
        }
    }

    if creds.password.is_some() {
        if has("SCRAM-SHA3-512") {
            return Ok(Mechanisms::ScramSha3_512(ScramClient::from_credentials(
                creds.clone(),
            )?));
        }
        if has("SCRAM-SHA-512") {
            return Ok(Mechanisms::ScramSha512(ScramClient::from_credentials(
                creds.clone(),
            )?));
        }
        if has("SCRAM-SHA-256") {
            return Ok(Mechanisms::ScramSha256(ScramClient::from_credentials(
                creds.clone(),
            )?));
        }
        if has("SCRAM-SHA-1") {
            return Ok(Mechanisms::ScramSha1(ScramClient::from_credentials(
                creds.clone(),
            )?));
        }
        if has("DIGEST-MD5") {
            return Ok(Mechanisms::DigestMd5(DigestMd5::from_credentials(
                creds.clone(),
                digest_uri,
            )?));
        }
        if has("PLAIN") && secure_channel {
            return Ok(Mechanisms::Plain(Plain::from_credentials(creds.clone())?));
        }
    }

    if has("ANONYMOUS") && creds.password.is_none() && creds.ht_token.is_none() {
        return Ok(Mechanisms::Anonymous(Anonymous::new()));
    }

    if creds.provider_token.is_some() {
        for (name, kind) in [
            ("X-GOOGLE-TOKEN", ProviderKind::Google),
            ("X-MESSENGER-OAUTH2", ProviderKind::WindowsLive),
            ("X-FACEBOOK-PLATFORM", ProviderKind::Facebook),
        ] {
            if has(name) {
                return Ok(Mechanisms::Provider(ProviderMechanism::from_credentials(
                    kind,
                    creds.clone(),
                )?));
            }
        }
    }

    Err(MechanismError::MissingCredentials)
}

fn ht_tag(cb: HtChannelBinding) -> &'static str {
    match cb {
        HtChannelBinding::None => "NONE",
        HtChannelBinding::Endp => "ENDP",
        HtChannelBinding::Uniq => "UNIQ",
        HtChannelBinding::Expr => "EXPR",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_scram_sha256_over_plain_when_both_advertised() {
        let creds = Credentials::default()
            .with_username("user")
            .with_password("pencil");
        let mechs = vec!["PLAIN".to_owned(), "SCRAM-SHA-256".to_owned()];
        let selected = select(&mechs, &creds, "xmpp/example.com", true).unwrap();
        assert_eq!(selected.mechanism_name(), "SCRAM-SHA-256");
    }

    #[test]
    fn plain_refused_without_secure_channel() {
        let creds = Credentials::default()
            .with_username("user")
            .with_password("pencil");
        let mechs = vec!["PLAIN".to_owned()];
        let err = select(&mechs, &creds, "xmpp/example.com", false).unwrap_err();
        assert!(matches!(err, MechanismError::MissingCredentials));
    }

    #[test]
    fn ht_token_preferred_over_scram() {
        let creds = Credentials::default()
            .with_username("user")
            .with_password("pencil")
            .with_ht_token(crate::common::HtToken {
                mechanism: "SHA-256".to_owned(),
                secret: vec![1, 2, 3],
            });
        let mechs = vec!["SCRAM-SHA-256".to_owned(), "HT-SHA-256-NONE".to_owned()];
        let selected = select(&mechs, &creds, "xmpp/example.com", true).unwrap();
        assert_eq!(selected.mechanism_name(), "HT-SHA-256-NONE");
    }
}
