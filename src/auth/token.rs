//! Access/refresh token issuance and verification (HS256).

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use super::claims::{AccessClaims, RefreshClaims};
use crate::config::SecurityConfig;
use crate::database::models::UserRecord;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token generation failed: {0}")]
    Generation(String),

    #[error("token expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),
}

/// Tokens handed to a client after login, register or refresh.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Nominal access-token lifetime in seconds.
    pub expires_in: u64,
}

#[derive(Clone)]
struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keys {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Signs and verifies both token kinds. Each kind has its own secret.
#[derive(Clone)]
pub struct TokenIssuer {
    access: Keys,
    refresh: Keys,
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
}

impl TokenIssuer {
    pub fn new(config: &SecurityConfig) -> Self {
        Self {
            access: Keys::from_secret(&config.jwt_secret),
            refresh: Keys::from_secret(&config.jwt_refresh_secret),
            access_ttl_secs: config.jwt_expires_in.as_secs(),
            refresh_ttl_secs: config.jwt_refresh_expires_in.as_secs(),
        }
    }

    pub fn access_ttl_secs(&self) -> u64 {
        self.access_ttl_secs
    }

    pub fn issue(&self, user: &UserRecord) -> Result<TokenPair, TokenError> {
        let access = AccessClaims::for_user(user, self.access_ttl_secs);
        let refresh = RefreshClaims::for_user(user.id, self.refresh_ttl_secs);

        Ok(TokenPair {
            access_token: sign(&access, &self.access.encoding)?,
            refresh_token: sign(&refresh, &self.refresh.encoding)?,
            expires_in: self.access_ttl_secs,
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        verify(token, &self.access.decoding)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        verify(token, &self.refresh.decoding)
    }
}

fn sign<T: Serialize>(claims: &T, key: &EncodingKey) -> Result<String, TokenError> {
    encode(&Header::new(Algorithm::HS256), claims, key)
        .map_err(|e| TokenError::Generation(e.to_string()))
}

fn verify<T: DeserializeOwned>(token: &str, key: &DecodingKey) -> Result<T, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_required_spec_claims(&["exp", "iat"]);

    decode::<T>(token, key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid(e.to_string()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;
    use uuid::Uuid;

    fn config() -> SecurityConfig {
        SecurityConfig {
            jwt_secret: "a".repeat(32),
            jwt_expires_in: Duration::from_secs(7 * 24 * 3600),
            jwt_refresh_secret: "b".repeat(32),
            jwt_refresh_expires_in: Duration::from_secs(30 * 24 * 3600),
            enable_cors: false,
            cors_origins: Vec::new(),
            password_min_length: 8,
        }
    }

    fn user() -> UserRecord {
        let now = Utc::now();
        UserRecord {
            id: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            password_hash: "irrelevant".to_string(),
            name: "A".to_string(),
            role: "USER".to_string(),
            created_at: now,
            updated_at: now,
            last_login: None,
            roles: Vec::new(),
            permissions: Vec::new(),
        }
    }

    #[test]
    fn access_token_carries_identity() {
        let issuer = TokenIssuer::new(&config());
        let user = user();
        let pair = issuer.issue(&user).unwrap();

        let claims = issuer.verify_access(&pair.access_token).unwrap();
        assert_eq!(claims.user_id, user.id);
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.role, "USER");
        assert_eq!(claims.exp - claims.iat, 604_800);
        assert_eq!(pair.expires_in, 604_800);
    }

    #[test]
    fn refresh_token_uses_its_own_secret() {
        let issuer = TokenIssuer::new(&config());
        let user = user();
        let pair = issuer.issue(&user).unwrap();

        let claims = issuer.verify_refresh(&pair.refresh_token).unwrap();
        assert_eq!(claims.user_id, user.id);
        assert_eq!(claims.exp - claims.iat, 2_592_000);

        assert!(issuer.verify_access(&pair.refresh_token).is_err());
        assert!(issuer.verify_refresh(&pair.access_token).is_err());
    }

    #[test]
    fn expired_token_is_reported() {
        let issuer = TokenIssuer::new(&config());
        let now = Utc::now().timestamp();
        let stale = RefreshClaims {
            user_id: Uuid::new_v4(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = sign(&stale, &issuer.refresh.encoding).unwrap();

        assert!(matches!(
            issuer.verify_refresh(&token),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn garbage_is_invalid() {
        let issuer = TokenIssuer::new(&config());
        assert!(matches!(
            issuer.verify_access("not.a.jwt"),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let issuer = TokenIssuer::new(&config());
        let mut other = config();
        other.jwt_secret = "c".repeat(32);
        let forged = TokenIssuer::new(&other).issue(&user()).unwrap();

        assert!(issuer.verify_access(&forged.access_token).is_err());
    }
}
