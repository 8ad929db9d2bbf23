// handlers/public/auth/mod.rs - Public authentication handlers

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::TokenPair;
use crate::database::models::UserRecord;

pub mod login; // POST /api/auth/login - verify credentials, issue tokens
pub mod refresh; // POST /api/auth/refresh - trade a refresh token for a new pair
pub mod register; // POST /api/auth/register - create an account

pub use login::login_post;
pub use refresh::refresh_post;
pub use register::register_post;

/// The user as reported alongside freshly issued tokens: role and permission
/// names only.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&UserRecord> for SessionUser {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role.clone(),
            roles: user.role_names(),
            permissions: user.permission_names(),
            last_login: user.last_login,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: SessionUser,
    pub token: String,
    pub refresh_token: String,
    pub expires_in: u64,
}

impl SessionResponse {
    pub fn new(user: &UserRecord, tokens: TokenPair) -> Self {
        Self {
            user: SessionUser::from(user),
            token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_in: tokens.expires_in,
        }
    }
}
