use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::UserRecord;

/// `now + ttl_secs` as a unix timestamp, saturating instead of wrapping.
fn expiry(now: i64, ttl_secs: u64) -> i64 {
    now.saturating_add(i64::try_from(ttl_secs).unwrap_or(i64::MAX))
}

/// Payload of an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessClaims {
    pub user_id: Uuid,
    pub email: String,
    pub role: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub iat: i64,
    pub exp: i64,
}

impl AccessClaims {
    pub fn for_user(user: &UserRecord, ttl_secs: u64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role.clone(),
            roles: user.role_names(),
            permissions: user.permission_names(),
            iat: now,
            exp: expiry(now, ttl_secs),
        }
    }
}

/// Payload of a refresh token. Only the user id travels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshClaims {
    pub user_id: Uuid,
    pub iat: i64,
    pub exp: i64,
}

impl RefreshClaims {
    pub fn for_user(user_id: Uuid, ttl_secs: u64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            user_id,
            iat: now,
            exp: expiry(now, ttl_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_saturates() {
        assert_eq!(expiry(1_000, 60), 1_060);
        assert_eq!(expiry(1_000, u64::MAX), i64::MAX);
        assert_eq!(expiry(1_000, i64::MAX as u64), i64::MAX);
    }

    #[test]
    fn refresh_claims_carry_the_ttl() {
        let id = Uuid::new_v4();
        let claims = RefreshClaims::for_user(id, 2_592_000);
        assert_eq!(claims.user_id, id);
        assert_eq!(claims.exp - claims.iat, 2_592_000);
    }
}
