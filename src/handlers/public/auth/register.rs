// handlers/public/auth/register.rs - POST /api/auth/register handler

use axum::extract::State;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::hash_password;
use crate::database::models::{NewUser, PublicUser};
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::handlers::utils::{
    internal, normalize_email, provided, validate_email, validate_password,
};
use crate::middleware::{ApiResponse, ApiResult, JsonBody};
use crate::rbac::Role;
use crate::state::AppState;

const FAILED: &str = "Failed to register user";
const EMAIL_TAKEN: &str = "User with this email already exists";

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: &'static str,
    pub user: PublicUser,
}

/// POST /api/auth/register - Create a `USER` account
///
/// Input: `{"email": "...", "password": "...", "name": "..."}`
///
/// Output (201): `{"message": "User registered successfully", "user": {..}}`
pub async fn register_post(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RegisterRequest>,
) -> ApiResult<RegisterResponse> {
    let (Some(email), Some(password), Some(name)) = (
        provided(&body.email),
        body.password.as_deref().filter(|p| !p.is_empty()),
        provided(&body.name),
    ) else {
        return Err(ApiError::bad_request(
            "Email, password, and name are required",
        ));
    };

    let email = normalize_email(email);
    validate_email(&email)?;
    validate_password(password, state.password_min_length())?;

    if state
        .db
        .find_user_by_email(&email)
        .await
        .map_err(internal(FAILED))?
        .is_some()
    {
        return Err(ApiError::conflict(EMAIL_TAKEN));
    }

    let password_hash = hash_password(password).map_err(internal(FAILED))?;
    let created = state
        .db
        .create_user(NewUser {
            email,
            password_hash,
            name: name.to_string(),
            role: Role::User.as_str().to_string(),
        })
        .await
        .map_err(|e| match e {
            DatabaseError::Conflict(_) => ApiError::conflict(EMAIL_TAKEN),
            other => internal(FAILED)(other),
        })?;

    state
        .rbac
        .assign_role_to_user(created.id, Role::User.as_str())
        .await
        .map_err(internal(FAILED))?;

    let user = state
        .db
        .find_user_by_id(created.id)
        .await
        .map_err(internal(FAILED))?
        .unwrap_or(created);

    info!("Registered user {}", user.id);
    Ok(ApiResponse::created(RegisterResponse {
        message: "User registered successfully",
        user: user.into(),
    }))
}
