//! `SCRAM-*` (RFC 5802), generic over the hash algorithm via
//! [`crate::common::scram::ScramProvider`].

use std::collections::HashMap;
use std::marker::PhantomData;

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};

use super::{Mechanism, MechanismError};
use crate::common::scram::{Password as ScramPassword, ScramProvider};
use crate::common::Credentials;

#[cfg(test)]
use std::sync::Mutex;

#[cfg(test)]
static FORCED_CLIENT_NONCE: Mutex<Option<String>> = Mutex::new(None);

/// Confined to test builds (per spec.md §9 "Global state"): forces the
/// client nonce for the next `ScramClient` constructed, so the RFC 5802
/// test vector in this module reproduces deterministically.
#[cfg(test)]
pub fn force_client_nonce_for_test(nonce: impl Into<String>) {
    *FORCED_CLIENT_NONCE.lock().unwrap() = Some(nonce.into());
}

fn client_nonce() -> String {
    #[cfg(test)]
    {
        if let Some(forced) = FORCED_CLIENT_NONCE.lock().unwrap().take() {
            return forced;
        }
    }
    let mut raw = [0u8; 24];
    getrandom::getrandom(&mut raw).expect("system RNG must be available");
    B64.encode(raw)
}

fn parse_kv(s: &str) -> HashMap<&str, &str> {
    s.split(',')
        .filter_map(|pair| pair.split_once('='))
        .collect()
}

fn xor(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().zip(b.iter()).map(|(x, y)| x ^ y).collect()
}

enum State {
    Initial,
    WaitingServerFirst { client_first_bare: String },
    WaitingServerFinal { server_signature: Vec<u8> },
    Done,
}

/// Client-side `SCRAM-<HASH>` state machine, generic over the hash
/// algorithm. `ScramClient<Sha256>` negotiates as `SCRAM-SHA-256`, etc.
pub struct ScramClient<P: ScramProvider> {
    state: State,
    username: String,
    password: ScramPassword,
    _hash: PhantomData<P>,
}

impl<P: ScramProvider> ScramClient<P> {
    /// Builds a SCRAM client from credentials. Fails if no password is set.
    pub fn from_credentials(creds: Credentials) -> Result<Self, MechanismError> {
        let password = creds.password.ok_or(MechanismError::MissingCredentials)?;
        Ok(Self {
            state: State::Initial,
            username: creds.username,
            password: ScramPassword::Plain(password),
            _hash: PhantomData,
        })
    }
}

impl<P: ScramProvider> Mechanism for ScramClient<P> {
    fn mechanism_name(&self) -> &str {
        P::NAME
    }

    fn initial_response(&mut self) -> Option<Vec<u8>> {
        let nonce = client_nonce();
        // SCRAM usernames are escaped per RFC 5802 §5.1 ("=" -> "=3D", ","
        // -> "=2C"); none of this library's credential sources ever embed
        // either character today, but the escape is applied unconditionally
        // to stay correct if that changes.
        let escaped_username = self.username.replace('=', "=3D").replace(',', "=2C");
        let client_first_bare = format!("n={escaped_username},r={nonce}");
        let client_first = format!("n,,{client_first_bare}");
        self.state = State::WaitingServerFirst { client_first_bare };
        Some(client_first.into_bytes())
    }

    fn respond(&mut self, challenge: &[u8]) -> Result<Vec<u8>, MechanismError> {
        match std::mem::replace(&mut self.state, State::Done) {
            State::WaitingServerFirst { client_first_bare } => {
                let server_first = std::str::from_utf8(challenge).map_err(|e| {
                    MechanismError::MalformedChallenge(format!("server-first is not UTF-8: {e}"))
                })?;
                let kv = parse_kv(server_first);
                let combined_nonce = kv.get("r").ok_or_else(|| {
                    MechanismError::MalformedChallenge("server-first missing r=".to_owned())
                })?;
                let client_nonce = client_first_bare
                    .rsplit_once("r=")
                    .map(|(_, n)| n)
                    .unwrap_or_default();
                if !combined_nonce.starts_with(client_nonce) {
                    return Err(MechanismError::NonceMismatch);
                }
                let salt_b64 = kv.get("s").ok_or_else(|| {
                    MechanismError::MalformedChallenge("server-first missing s=".to_owned())
                })?;
                let salt = B64.decode(salt_b64).map_err(|e| {
                    MechanismError::MalformedChallenge(format!("invalid salt base64: {e}"))
                })?;
                let iterations: u32 = kv
                    .get("i")
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| {
                        MechanismError::MalformedChallenge("server-first missing/bad i=".to_owned())
                    })?;

                let salted_password = P::derive(&self.password, &salt, iterations)
                    .map_err(|e| MechanismError::MalformedChallenge(e.to_string()))?;
                let client_key = P::hmac(&salted_password, b"Client Key");
                let stored_key = P::hash(&client_key);

                let client_final_without_proof = format!("c=biws,r={combined_nonce}");
                let auth_message =
                    format!("{client_first_bare},{server_first},{client_final_without_proof}");

                let client_signature = P::hmac(&stored_key, auth_message.as_bytes());
                let client_proof = xor(&client_key, &client_signature);

                let server_key = P::hmac(&salted_password, b"Server Key");
                let server_signature = P::hmac(&server_key, auth_message.as_bytes());

                let client_final = format!(
                    "{client_final_without_proof},p={}",
                    B64.encode(client_proof)
                );
                self.state = State::WaitingServerFinal { server_signature };
                Ok(client_final.into_bytes())
            }
            State::Initial => Err(MechanismError::MalformedChallenge(
                "received a challenge before sending the initial response".to_owned(),
            )),
            State::WaitingServerFinal { .. } | State::Done => Err(MechanismError::MalformedChallenge(
                "unexpected extra SCRAM challenge".to_owned(),
            )),
        }
    }

    fn success(&mut self, data: &[u8]) -> Result<(), MechanismError> {
        let State::WaitingServerFinal { server_signature } =
            std::mem::replace(&mut self.state, State::Done)
        else {
            // No server-final data to check (e.g. an abbreviated exchange);
            // nothing to verify against.
            return Ok(());
        };
        let text = std::str::from_utf8(data).map_err(|e| {
            MechanismError::MalformedChallenge(format!("server-final is not UTF-8: {e}"))
        })?;
        let kv = parse_kv(text);
        let v = kv.get("v").ok_or_else(|| {
            MechanismError::MalformedChallenge("server-final missing v=".to_owned())
        })?;
        let given = B64
            .decode(v)
            .map_err(|e| MechanismError::MalformedChallenge(format!("invalid v= base64: {e}")))?;
        if given != server_signature {
            return Err(MechanismError::ServerSignatureMismatch);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::scram::Sha1;

    /// RFC 5802 §5 / spec.md §8 scenario 1.
    #[test]
    fn sha1_happy_path_matches_rfc5802_vector() {
        force_client_nonce_for_test("fyko+d2lbbFgONRv9qkxdawL");

        let creds = Credentials::default()
            .with_username("user")
            .with_password("pencil");
        let mut client = ScramClient::<Sha1>::from_credentials(creds).unwrap();

        let first = client.initial_response().unwrap();
        assert_eq!(
            String::from_utf8(first).unwrap(),
            "n,,n=user,r=fyko+d2lbbFgONRv9qkxdawL"
        );

        let server_first =
            b"r=fyko+d2lbbFgONRv9qkxdawL3rfcNHYJY1ZVvWVs7j,s=QSXCR+Q6sek8bf92,i=4096";
        let final_msg = client.respond(server_first).unwrap();
        assert_eq!(
            String::from_utf8(final_msg).unwrap(),
            "c=biws,r=fyko+d2lbbFgONRv9qkxdawL3rfcNHYJY1ZVvWVs7j,\
             p=v0X8v3Bz2T0CJGbJQyF0X+HI4Ts="
        );

        client
            .success(b"v=rmF9pqV8S7suAoZWja4dJRkFsKQ=")
            .expect("server signature must verify");
    }

    #[test]
    fn mismatched_server_signature_is_rejected() {
        force_client_nonce_for_test("fyko+d2lbbFgONRv9qkxdawL");
        let creds = Credentials::default()
            .with_username("user")
            .with_password("pencil");
        let mut client = ScramClient::<Sha1>::from_credentials(creds).unwrap();
        client.initial_response().unwrap();
        client
            .respond(b"r=fyko+d2lbbFgONRv9qkxdawL3rfcNHYJY1ZVvWVs7j,s=QSXCR+Q6sek8bf92,i=4096")
            .unwrap();
        let err = client.success(b"v=AAAAAAAAAAAAAAAAAAAAAAAAAAA=").unwrap_err();
        assert!(matches!(err, MechanismError::ServerSignatureMismatch));
    }

    #[test]
    fn nonce_not_extending_client_nonce_is_rejected() {
        force_client_nonce_for_test("fyko+d2lbbFgONRv9qkxdawL");
        let creds = Credentials::default()
            .with_username("user")
            .with_password("pencil");
        let mut client = ScramClient::<Sha1>::from_credentials(creds).unwrap();
        client.initial_response().unwrap();
        let err = client
            .respond(b"r=totally-different-nonce,s=QSXCR+Q6sek8bf92,i=4096")
            .unwrap_err();
        assert!(matches!(err, MechanismError::NonceMismatch));
    }
}
