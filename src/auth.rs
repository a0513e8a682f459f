use crate::config;
use crate::error::AppError;
use crate::types::role::Role;

use base64::{STANDARD, STANDARD_NO_PAD, URL_SAFE_NO_PAD, decode_config, encode_config};
use jwt_simple::algorithms::MACLike;
use jwt_simple::prelude::{Claims, Duration as JwtDuration, HS256Key, VerificationOptions};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use std::collections::HashSet;

const ISSUER: &str = "magang-notify";

#[derive(Debug, Clone)]
pub struct AuthState {
    key: HS256Key,
    cookie_name: String,
    token_ttl: time::Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid auth key")]
    InvalidKey,
    #[error("invalid auth token")]
    InvalidToken,
    #[error("auth token missing expiry")]
    MissingExpiry,
    #[error("auth token missing subject")]
    MissingSubject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RoleClaims {
    role: Role,
}

/// Who is calling. Without auth configured every request is `Open` and may
/// act for any role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Open,
    Authenticated { subject: String, role: Role },
}

impl Caller {
    pub fn authorize(&self, requested: Role) -> Result<(), AppError> {
        match self {
            Caller::Open => Ok(()),
            Caller::Authenticated { role, .. } if *role == requested => Ok(()),
            Caller::Authenticated { .. } => Err(AppError::Forbidden {
                requested: requested.to_string(),
            }),
        }
    }

    /// The role a request acts for: the explicit one if given, else the token's.
    pub fn resolve_role(&self, requested: Option<Role>) -> Result<Role, AppError> {
        match (requested, self) {
            (Some(role), _) => {
                self.authorize(role)?;
                Ok(role)
            }
            (None, Caller::Authenticated { role, .. }) => Ok(*role),
            (None, Caller::Open) => Err(AppError::validation("role is required.")),
        }
    }
}

impl AuthState {
    pub fn from_config(config: &config::AppConfig) -> Result<Option<Self>, AuthError> {
        let Some(auth) = config.auth.as_ref() else {
            return Ok(None);
        };

        let key_bytes = decode_key(&auth.key)?;
        let key = HS256Key::from_bytes(&key_bytes);

        Ok(Some(Self {
            key,
            cookie_name: auth.cookie_name.clone(),
            token_ttl: auth.token_ttl,
        }))
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn issue_token(&self, subject: &str, role: Role) -> Result<String, AuthError> {
        let ttl_seconds = self.token_ttl.whole_seconds();
        if ttl_seconds <= 0 {
            return Err(AuthError::InvalidToken);
        }
        if subject.trim().is_empty() {
            return Err(AuthError::MissingSubject);
        }
        let claims = Claims::with_custom_claims(
            RoleClaims { role },
            JwtDuration::from_secs(ttl_seconds as u64),
        )
        .with_subject(subject.trim())
        .with_issuer(ISSUER);
        self.key
            .authenticate(claims)
            .map_err(|_| AuthError::InvalidToken)
    }

    pub fn verify_token(&self, token: &str) -> Result<Caller, AuthError> {
        let options = VerificationOptions {
            allowed_issuers: Some(HashSet::from([ISSUER.to_string()])),
            ..Default::default()
        };

        let claims = self
            .key
            .verify_token::<RoleClaims>(token, Some(options))
            .map_err(|_| AuthError::InvalidToken)?;

        if claims.expires_at.is_none() {
            return Err(AuthError::MissingExpiry);
        }

        let subject = claims.subject.ok_or(AuthError::MissingSubject)?;
        if subject.trim().is_empty() {
            return Err(AuthError::MissingSubject);
        }

        Ok(Caller::Authenticated {
            subject,
            role: claims.custom.role,
        })
    }
}

fn decode_key(raw: &str) -> Result<Vec<u8>, AuthError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AuthError::InvalidKey);
    }

    let decoded = decode_config(trimmed, URL_SAFE_NO_PAD)
        .or_else(|_| decode_config(trimmed, STANDARD))
        .or_else(|_| decode_config(trimmed, STANDARD_NO_PAD))
        .map_err(|_| AuthError::InvalidKey)?;

    if decoded.is_empty() {
        return Err(AuthError::InvalidKey);
    }

    Ok(decoded)
}

pub fn generate_auth_key() -> Result<String, AuthError> {
    let mut rng = OsRng;
    generate_auth_key_with_rng(&mut rng)
}

pub(crate) fn generate_auth_key_with_rng<R: RngCore + CryptoRng>(
    rng: &mut R,
) -> Result<String, AuthError> {
    let mut bytes = [0u8; 32];
    rng.fill_bytes(&mut bytes);
    let encoded = encode_config(bytes, URL_SAFE_NO_PAD);
    if encoded.is_empty() {
        return Err(AuthError::InvalidKey);
    }
    Ok(encoded)
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;

    struct ZeroRng;

    impl RngCore for ZeroRng {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    impl CryptoRng for ZeroRng {}

    fn auth_state(key: &[u8]) -> AuthState {
        let config = config::AppConfig {
            auth: Some(AuthConfig {
                key: encode_config(key, URL_SAFE_NO_PAD),
                token_ttl: time::Duration::hours(1),
                cookie_name: "magang_auth".to_string(),
            }),
            ..Default::default()
        };
        AuthState::from_config(&config)
            .expect("auth config")
            .expect("auth enabled")
    }

    #[test]
    fn generate_auth_key_with_rng__should_match_fixture() {
        // Given
        let mut rng = ZeroRng;

        // When
        let key = generate_auth_key_with_rng(&mut rng).expect("auth key");

        // Then
        assert_eq!(key, "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA");
    }

    #[test]
    fn verify_token__should_return_role_from_issued_token() {
        // Given
        let auth = auth_state(b"role-token-secret");
        let token = auth.issue_token("bu-sari", Role::Guru).expect("token");

        // When
        let caller = auth.verify_token(&token).expect("verify");

        // Then
        assert_eq!(
            caller,
            Caller::Authenticated {
                subject: "bu-sari".to_string(),
                role: Role::Guru,
            }
        );
    }

    #[test]
    fn verify_token__should_reject_token_signed_with_other_key() {
        // Given
        let token = auth_state(b"first-secret")
            .issue_token("andi", Role::Siswa)
            .expect("token");

        // When
        let result = auth_state(b"second-secret").verify_token(&token);

        // Then
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[test]
    fn from_config__should_reject_blank_key() {
        let config = config::AppConfig {
            auth: Some(AuthConfig {
                key: "  ".to_string(),
                token_ttl: time::Duration::hours(1),
                cookie_name: "magang_auth".to_string(),
            }),
            ..Default::default()
        };

        assert!(matches!(
            AuthState::from_config(&config),
            Err(AuthError::InvalidKey)
        ));
    }

    #[test]
    fn caller__should_only_authorize_own_role() {
        // Given
        let caller = Caller::Authenticated {
            subject: "andi".to_string(),
            role: Role::Siswa,
        };

        // Then
        assert!(caller.authorize(Role::Siswa).is_ok());
        assert!(matches!(
            caller.authorize(Role::Guru),
            Err(AppError::Forbidden { .. })
        ));
        assert_eq!(caller.resolve_role(None).expect("token role"), Role::Siswa);
        assert!(Caller::Open.authorize(Role::Guru).is_ok());
        assert!(Caller::Open.resolve_role(None).is_err());
    }
}
