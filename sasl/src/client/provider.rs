//! Provider-specific bearer-token mechanisms (`X-OAUTH2`-family). These are
//! the weakest mechanisms in the preference order: distinct from `PLAIN`
//! (bearer token, not a password) but no stronger, since they carry no
//! mutual authentication and are tolerated only for providers that offer
//! nothing better.

use super::{Mechanism, MechanismError};
use crate::common::{Credentials, ProviderToken};

/// Which provider's wire format to use for the initial response.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProviderKind {
    /// `X-GOOGLE-TOKEN`: `\0user\0token`.
    Google,
    /// `X-MESSENGER-OAUTH2` (Windows Live): `\0user\0token`.
    WindowsLive,
    /// `X-FACEBOOK-PLATFORM`: the bare access token, no user/null framing.
    Facebook,
}

impl ProviderKind {
    fn mechanism_name(self) -> &'static str {
        match self {
            Self::Google => "X-GOOGLE-TOKEN",
            Self::WindowsLive => "X-MESSENGER-OAUTH2",
            Self::Facebook => "X-FACEBOOK-PLATFORM",
        }
    }
}

/// A bearer-token mechanism for one of the supported identity providers.
pub struct ProviderMechanism {
    kind: ProviderKind,
    username: String,
    token: ProviderToken,
}

impl ProviderMechanism {
    /// Builds a provider mechanism from credentials. Fails if no provider
    /// token is set.
    pub fn from_credentials(
        kind: ProviderKind,
        creds: Credentials,
    ) -> Result<Self, MechanismError> {
        let token = creds
            .provider_token
            .ok_or(MechanismError::MissingCredentials)?;
        Ok(Self {
            kind,
            username: creds.username,
            token,
        })
    }
}

impl Mechanism for ProviderMechanism {
    fn mechanism_name(&self) -> &str {
        self.kind.mechanism_name()
    }

    fn initial_response(&mut self) -> Option<Vec<u8>> {
        match self.kind {
            ProviderKind::Facebook => Some(self.token.access_token.clone().into_bytes()),
            ProviderKind::Google | ProviderKind::WindowsLive => {
                let mut buf =
                    Vec::with_capacity(self.username.len() + self.token.access_token.len() + 2);
                buf.push(0);
                buf.extend_from_slice(self.username.as_bytes());
                buf.push(0);
                buf.extend_from_slice(self.token.access_token.as_bytes());
                Some(buf)
            }
        }
    }

    fn respond(&mut self, _challenge: &[u8]) -> Result<Vec<u8>, MechanismError> {
        Err(MechanismError::MalformedChallenge(
            "provider token mechanisms do not expect a challenge".to_owned(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facebook_initial_response_is_bare_token() {
        let creds = Credentials::default()
            .with_username("user")
            .with_provider_token(ProviderToken {
                access_token: "tok".to_owned(),
            });
        let mut mech = ProviderMechanism::from_credentials(ProviderKind::Facebook, creds).unwrap();
        assert_eq!(mech.initial_response().unwrap(), b"tok");
    }

    #[test]
    fn google_initial_response_is_null_framed() {
        let creds = Credentials::default()
            .with_username("user")
            .with_provider_token(ProviderToken {
                access_token: "tok".to_owned(),
            });
        let mut mech = ProviderMechanism::from_credentials(ProviderKind::Google, creds).unwrap();
        assert_eq!(mech.initial_response().unwrap(), b"\0user\0tok");
    }
}
