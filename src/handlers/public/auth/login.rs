// handlers/public/auth/login.rs - POST /api/auth/login handler

use axum::extract::State;
use serde::Deserialize;
use tracing::{info, warn};

use super::SessionResponse;
use crate::auth::verify_password_or_dummy;
use crate::error::ApiError;
use crate::handlers::utils::{internal, normalize_email, provided};
use crate::middleware::{ApiResponse, ApiResult, JsonBody};
use crate::state::AppState;

const INVALID_CREDENTIALS: &str = "Invalid credentials";
const FAILED: &str = "Failed to login";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// POST /api/auth/login - Authenticate credentials and receive tokens
///
/// Input: `{"email": "...", "password": "..."}`
///
/// Output: `{"user": {..}, "token": "..", "refreshToken": "..", "expiresIn": 604800}`
///
/// Unknown email and wrong password produce the same 401 body.
pub async fn login_post(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> ApiResult<SessionResponse> {
    let (Some(email), Some(password)) = (
        provided(&body.email),
        body.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::bad_request("Email and password are required"));
    };
    let email = normalize_email(email);

    let user = state
        .db
        .find_user_by_email(&email)
        .await
        .map_err(internal(FAILED))?;

    let matched = match verify_password_or_dummy(
        password,
        user.as_ref().map(|u| u.password_hash.as_str()),
    ) {
        Ok(matched) => matched,
        Err(e) => {
            warn!("Unverifiable password hash for {}: {}", email, e);
            false
        }
    };

    let user = match user {
        Some(user) if matched => user,
        _ => {
            warn!("Failed login for {}", email);
            return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
        }
    };

    state
        .db
        .record_login(user.id)
        .await
        .map_err(internal(FAILED))?;
    let user = state
        .db
        .find_user_by_id(user.id)
        .await
        .map_err(internal(FAILED))?
        .ok_or_else(|| ApiError::unauthorized(INVALID_CREDENTIALS))?;

    let tokens = state.tokens.issue(&user).map_err(internal(FAILED))?;
    info!("User {} logged in", user.id);

    Ok(ApiResponse::success(SessionResponse::new(&user, tokens)))
}
