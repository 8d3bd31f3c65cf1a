//! `DIGEST-MD5` (RFC 2831), legacy but still advertised by some servers.
//! Three rounds: parse the server's challenge, compute and send a response,
//! then verify the server's `rspauth` on the (often empty) second
//! challenge.

use md5::{Digest, Md5};

use super::{Mechanism, MechanismError};
use crate::common::Credentials;

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn md5(parts: &[&[u8]]) -> [u8; 16] {
    let mut hasher = Md5::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Parses RFC 2831 `key=value` challenge pairs, unquoting quoted-string
/// values (stripping the surrounding `"` and un-escaping `\"`/`\\`).
fn parse_challenge(data: &[u8]) -> Result<Vec<(String, String)>, MechanismError> {
    let text = std::str::from_utf8(data)
        .map_err(|e| MechanismError::MalformedChallenge(format!("challenge not UTF-8: {e}")))?;
    let mut out = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        rest = rest.trim_start_matches([',', ' ']);
        if rest.is_empty() {
            break;
        }
        let Some(eq) = rest.find('=') else {
            return Err(MechanismError::MalformedChallenge(
                "expected key=value pair".to_owned(),
            ));
        };
        let key = rest[..eq].trim().to_owned();
        rest = &rest[eq + 1..];
        let value = if rest.starts_with('"') {
            let mut unescaped = String::new();
            let mut chars = rest[1..].char_indices();
            let mut consumed = 1;
            loop {
                let Some((i, c)) = chars.next() else {
                    return Err(MechanismError::MalformedChallenge(
                        "unterminated quoted string".to_owned(),
                    ));
                };
                if c == '\\' {
                    let Some((_, escaped)) = chars.next() else {
                        return Err(MechanismError::MalformedChallenge(
                            "dangling escape in quoted string".to_owned(),
                        ));
                    };
                    unescaped.push(escaped);
                    continue;
                }
                if c == '"' {
                    consumed = 1 + i + 1;
                    break;
                }
                unescaped.push(c);
            }
            rest = &rest[consumed..];
            unescaped
        } else {
            let end = rest.find(',').unwrap_or(rest.len());
            let value = rest[..end].trim().to_owned();
            rest = &rest[end..];
            value
        };
        out.push((key, value));
    }
    Ok(out)
}

/// Escapes `\` and `"` for inclusion in a quoted-string value on the wire.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '\\' || c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

enum State {
    Initial,
    WaitingRspAuth { expected_rspauth: String },
    Done,
}

/// `DIGEST-MD5` client mechanism.
pub struct DigestMd5 {
    username: String,
    password: String,
    digest_uri: String,
    cnonce: String,
    state: State,
}

impl DigestMd5 {
    /// Builds a `DIGEST-MD5` mechanism. `digest_uri` is typically
    /// `xmpp/<service-domain>` per RFC 3920 §6.4.1 / RFC 6120's successor
    /// guidance.
    pub fn from_credentials(
        creds: Credentials,
        digest_uri: impl Into<String>,
    ) -> Result<Self, MechanismError> {
        let password = creds.password.ok_or(MechanismError::MissingCredentials)?;
        let mut cnonce_raw = [0u8; 16];
        getrandom::getrandom(&mut cnonce_raw)
            .map_err(|e| MechanismError::Random(e.to_string()))?;
        Ok(Self {
            username: creds.username,
            password,
            digest_uri: digest_uri.into(),
            cnonce: hex(&cnonce_raw),
            state: State::Initial,
        })
    }
}

impl Mechanism for DigestMd5 {
    fn mechanism_name(&self) -> &str {
        "DIGEST-MD5"
    }

    fn respond(&mut self, challenge: &[u8]) -> Result<Vec<u8>, MechanismError> {
        match self.state {
            State::Initial => {
                let pairs = parse_challenge(challenge)?;
                let get = |k: &str| {
                    pairs
                        .iter()
                        .find(|(key, _)| key == k)
                        .map(|(_, v)| v.clone())
                };
                let realm = get("realm").unwrap_or_default();
                let nonce = get("nonce").ok_or_else(|| {
                    MechanismError::MalformedChallenge("missing nonce".to_owned())
                })?;
                let qop = get("qop").unwrap_or_else(|| "auth".to_owned());
                let qop = qop.split(',').next().unwrap_or("auth").trim().to_owned();

                let nc = "00000001";
                let a1 = md5(&[
                    md5(&[
                        self.username.as_bytes(),
                        b":",
                        realm.as_bytes(),
                        b":",
                        self.password.as_bytes(),
                    ])
                    .as_slice(),
                    b":",
                    nonce.as_bytes(),
                    b":",
                    self.cnonce.as_bytes(),
                ]);
                let a2 = md5(&[b"AUTHENTICATE:", self.digest_uri.as_bytes()]);
                let response = hex(&md5(&[
                    hex(&a1).as_bytes(),
                    b":",
                    nonce.as_bytes(),
                    b":",
                    nc.as_bytes(),
                    b":",
                    self.cnonce.as_bytes(),
                    b":",
                    qop.as_bytes(),
                    b":",
                    hex(&a2).as_bytes(),
                ]));

                let a2_verify = md5(&[b":", self.digest_uri.as_bytes()]);
                let expected_rspauth = hex(&md5(&[
                    hex(&a1).as_bytes(),
                    b":",
                    nonce.as_bytes(),
                    b":",
                    nc.as_bytes(),
                    b":",
                    self.cnonce.as_bytes(),
                    b":",
                    qop.as_bytes(),
                    b":",
                    hex(&a2_verify).as_bytes(),
                ]));

                let mut out = format!(
                    "username={},nonce={},cnonce={},nc={nc},qop={qop},digest-uri={},response={response},charset=utf-8",
                    quote(&self.username),
                    quote(&nonce),
                    quote(&self.cnonce),
                    quote(&self.digest_uri),
                );
                if !realm.is_empty() {
                    out.push_str(&format!(",realm={}", quote(&realm)));
                }
                self.state = State::WaitingRspAuth { expected_rspauth };
                Ok(out.into_bytes())
            }
            State::WaitingRspAuth { ref expected_rspauth } => {
                let pairs = parse_challenge(challenge)?;
                let rspauth = pairs
                    .iter()
                    .find(|(k, _)| k == "rspauth")
                    .map(|(_, v)| v.clone())
                    .ok_or_else(|| {
                        MechanismError::MalformedChallenge("missing rspauth".to_owned())
                    })?;
                if &rspauth != expected_rspauth {
                    return Err(MechanismError::ServerSignatureMismatch);
                }
                self.state = State::Done;
                // RFC 2831 requires an empty response to the rspauth
                // challenge to complete the exchange.
                Ok(Vec::new())
            }
            State::Done => Err(MechanismError::MalformedChallenge(
                "unexpected extra DIGEST-MD5 challenge".to_owned(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_escapes_backslash_and_quote() {
        assert_eq!(quote(r#"a"b\c"#), r#""a\"b\\c""#);
    }

    #[test]
    fn parse_challenge_unquotes_values() {
        let pairs = parse_challenge(br#"realm="example.com",nonce="abc\"def",qop="auth""#).unwrap();
        assert_eq!(pairs[0], ("realm".to_owned(), "example.com".to_owned()));
        assert_eq!(pairs[1], ("nonce".to_owned(), "abc\"def".to_owned()));
        assert_eq!(pairs[2], ("qop".to_owned(), "auth".to_owned()));
    }

    #[test]
    fn mismatched_rspauth_is_rejected() {
        let creds = Credentials::default()
            .with_username("user")
            .with_password("pencil");
        let mut mech = DigestMd5::from_credentials(creds, "xmpp/example.com").unwrap();
        mech.respond(br#"realm="example.com",nonce="abcdef",qop="auth",charset=utf-8"#)
            .unwrap();
        let err = mech.respond(b"rspauth=deadbeef").unwrap_err();
        assert!(matches!(err, MechanismError::ServerSignatureMismatch));
    }
}
