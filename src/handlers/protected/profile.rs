// handlers/protected/profile.rs - The caller's own account

use axum::extract::State;
use serde::Deserialize;
use tracing::info;

use crate::auth::{hash_password, verify_password};
use crate::database::models::{PublicUser, UserChanges};
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::handlers::utils::{
    internal, normalize_email, provided, validate_email, validate_password,
};
use crate::middleware::{ApiResponse, ApiResult, Authenticated, JsonBody};
use crate::state::AppState;

const FETCH_FAILED: &str = "Failed to fetch user profile";
const UPDATE_FAILED: &str = "Failed to update user profile";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

/// GET /api/user/profile - The authenticated user, with roles and permissions
pub async fn profile_get(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
) -> ApiResult<PublicUser> {
    let user = state
        .db
        .find_user_by_id(ctx.user_id)
        .await
        .map_err(internal(FETCH_FAILED))?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(ApiResponse::success(user.into()))
}

/// PUT /api/user/profile - Partial update of name, email and password
///
/// Changing the password needs both `currentPassword` and `newPassword`.
pub async fn profile_put(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    JsonBody(body): JsonBody<ProfileUpdate>,
) -> ApiResult<PublicUser> {
    let user = state
        .db
        .find_user_by_id(ctx.user_id)
        .await
        .map_err(internal(UPDATE_FAILED))?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let mut changes = UserChanges {
        name: provided(&body.name).map(str::to_string),
        ..UserChanges::default()
    };

    if let Some(email) = provided(&body.email).map(normalize_email) {
        if email != user.email {
            validate_email(&email)?;
            let holder = state
                .db
                .find_user_by_email(&email)
                .await
                .map_err(internal(UPDATE_FAILED))?;
            if holder.is_some_and(|other| other.id != user.id) {
                return Err(ApiError::conflict("Email is already in use"));
            }
            changes.email = Some(email);
        }
    }

    let current = body.current_password.as_deref().filter(|p| !p.is_empty());
    let new = body.new_password.as_deref().filter(|p| !p.is_empty());
    match (current, new) {
        (Some(current), Some(new)) => {
            let valid = verify_password(current, &user.password_hash)
                .map_err(internal(UPDATE_FAILED))?;
            if !valid {
                return Err(ApiError::bad_request("Current password is incorrect"));
            }
            validate_password(new, state.password_min_length())?;
            changes.password_hash = Some(hash_password(new).map_err(internal(UPDATE_FAILED))?);
        }
        (None, None) => {}
        _ => {
            return Err(ApiError::bad_request(
                "Both currentPassword and newPassword are required to change the password",
            ));
        }
    }

    if changes.is_empty() {
        return Ok(ApiResponse::success(user.into()));
    }

    let password_changed = changes.password_hash.is_some();
    let updated = state
        .db
        .update_user(user.id, changes)
        .await
        .map_err(|e| match e {
            DatabaseError::Conflict(_) => ApiError::conflict("Email is already in use"),
            DatabaseError::NotFound(_) => ApiError::not_found("User not found"),
            other => internal(UPDATE_FAILED)(other),
        })?;

    if password_changed {
        info!("User {} changed their password", updated.id);
    }
    Ok(ApiResponse::success(updated.into()))
}
