// handlers/public/auth/refresh.rs - POST /api/auth/refresh handler

use axum::extract::State;
use serde::Deserialize;
use tracing::debug;

use super::SessionResponse;
use crate::error::ApiError;
use crate::handlers::utils::{internal, provided};
use crate::middleware::{ApiResponse, ApiResult, JsonBody};
use crate::state::AppState;

const FAILED: &str = "Failed to refresh token";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// POST /api/auth/refresh - Exchange a refresh token for a new token pair
///
/// Input: `{"refreshToken": "..."}`. The user must still exist.
pub async fn refresh_post(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RefreshRequest>,
) -> ApiResult<SessionResponse> {
    let token = provided(&body.refresh_token)
        .ok_or_else(|| ApiError::bad_request("Refresh token is required"))?;

    let claims = state.tokens.verify_refresh(token).map_err(|e| {
        debug!("Refresh rejected: {}", e);
        ApiError::unauthorized("Unauthorized")
    })?;

    let user = state
        .db
        .find_user_by_id(claims.user_id)
        .await
        .map_err(internal(FAILED))?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;

    let tokens = state.tokens.issue(&user).map_err(internal(FAILED))?;
    Ok(ApiResponse::success(SessionResponse::new(&user, tokens)))
}
