//! `PLAIN` (RFC 4616). Forbidden over an insecure channel by policy in
//! [`super::mechanisms::Mechanisms::select`]; this mechanism itself has no
//! way to know whether TLS is active, so the caller must gate it.

use super::{Mechanism, MechanismError};
use crate::common::Credentials;

/// `PLAIN`: sends `authzid\0authcid\0password` as the single response.
pub struct Plain {
    authzid: String,
    authcid: String,
    password: String,
}

impl Plain {
    /// Builds a `PLAIN` mechanism from credentials. Fails if no password is
    /// set.
    pub fn from_credentials(creds: Credentials) -> Result<Self, MechanismError> {
        let password = creds.password.ok_or(MechanismError::MissingCredentials)?;
        Ok(Self {
            authzid: String::new(),
            authcid: creds.username,
            password,
        })
    }
}

impl Mechanism for Plain {
    fn mechanism_name(&self) -> &str {
        "PLAIN"
    }

    fn initial_response(&mut self) -> Option<Vec<u8>> {
        let mut buf = Vec::with_capacity(
            self.authzid.len() + self.authcid.len() + self.password.len() + 2,
        );
        buf.extend_from_slice(self.authzid.as_bytes());
        buf.push(0);
        buf.extend_from_slice(self.authcid.as_bytes());
        buf.push(0);
        buf.extend_from_slice(self.password.as_bytes());
        Some(buf)
    }

    fn respond(&mut self, _challenge: &[u8]) -> Result<Vec<u8>, MechanismError> {
        // PLAIN never receives a challenge; a server sending one anyway is
        // malformed.
        Err(MechanismError::MalformedChallenge(
            "PLAIN does not expect a challenge".to_owned(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_response_is_null_separated() {
        let creds = Credentials::default()
            .with_username("user")
            .with_password("pencil");
        let mut mech = Plain::from_credentials(creds).unwrap();
        assert_eq!(mech.initial_response().unwrap(), b"\0user\0pencil");
    }

    #[test]
    fn missing_password_is_rejected() {
        let creds = Credentials::default().with_username("user");
        assert!(matches!(
            Plain::from_credentials(creds),
            Err(MechanismError::MissingCredentials)
        ));
    }
}
