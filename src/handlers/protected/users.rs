// handlers/protected/users.rs - Administrative user collection at /api/user

use axum::extract::State;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::hash_password;
use crate::database::models::{NewUser, PublicUser, UserChanges};
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::handlers::utils::{
    internal, normalize_email, provided, validate_email, validate_password,
};
use crate::middleware::auth::{UsersCreate, UsersDelete, UsersRead, UsersUpdate};
use crate::middleware::{ApiResponse, ApiResult, Authorized, JsonBody};
use crate::rbac::Role;
use crate::state::AppState;

const EMAIL_TAKEN: &str = "User with this email already exists";

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub id: Option<Uuid>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub role_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteUserRequest {
    pub id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct UserMessage {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<PublicUser>,
}

fn parse_role(label: &str) -> Result<Role, ApiError> {
    Role::parse(label)
        .ok_or_else(|| ApiError::invalid_field("role", format!("Unknown role '{}'", label)))
}

/// GET /api/user - Every user, without password hashes (`users:read`)
pub async fn users_get(
    State(state): State<AppState>,
    _: Authorized<UsersRead>,
) -> ApiResult<Vec<PublicUser>> {
    let users = state
        .db
        .list_users()
        .await
        .map_err(internal("Failed to fetch users"))?;
    Ok(ApiResponse::success(
        users.into_iter().map(PublicUser::from).collect(),
    ))
}

/// POST /api/user - Create a user with a role (`users:create`)
///
/// Input: `{"email", "password", "name", "role"?}`; role defaults to `USER`.
pub async fn users_post(
    State(state): State<AppState>,
    _: Authorized<UsersCreate>,
    JsonBody(body): JsonBody<CreateUserRequest>,
) -> ApiResult<UserMessage> {
    const FAILED: &str = "Failed to create user";

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
    let role = match provided(&body.role) {
        Some(label) => parse_role(label)?,
        None => Role::default(),
    };

    let password_hash = hash_password(password).map_err(internal(FAILED))?;
    let created = state
        .db
        .create_user(NewUser {
            email,
            password_hash,
            name: name.to_string(),
            role: role.as_str().to_string(),
        })
        .await
        .map_err(|e| match e {
            DatabaseError::Conflict(_) => ApiError::conflict(EMAIL_TAKEN),
            other => internal(FAILED)(other),
        })?;

    state
        .rbac
        .assign_role_to_user(created.id, role.as_str())
        .await
        .map_err(internal(FAILED))?;

    let user = state
        .db
        .find_user_by_id(created.id)
        .await
        .map_err(internal(FAILED))?
        .unwrap_or(created);

    info!("Created user {} with role {}", user.id, role);
    Ok(ApiResponse::created(UserMessage {
        message: "User created successfully",
        user: Some(user.into()),
    }))
}

/// PUT /api/user - Update another user (`users:update`)
///
/// Input: `{"id", "email"?, "name"?, "role"?, "roleIds"?}`. A role label
/// replaces the user's direct grants with that role's list; `roleIds`
/// replaces the role associations.
pub async fn users_put(
    State(state): State<AppState>,
    _: Authorized<UsersUpdate>,
    JsonBody(body): JsonBody<UpdateUserRequest>,
) -> ApiResult<PublicUser> {
    const FAILED: &str = "Failed to update user";

    let id = body
        .id
        .ok_or_else(|| ApiError::bad_request("User id is required"))?;

    let role = provided(&body.role).map(parse_role).transpose()?;

    let email = provided(&body.email).map(normalize_email);
    if let Some(email) = &email {
        validate_email(email)?;
    }

    if let Some(role_ids) = &body.role_ids {
        for role_id in role_ids {
            let exists = state
                .db
                .find_role_by_id(*role_id)
                .await
                .map_err(internal(FAILED))?
                .is_some();
            if !exists {
                return Err(ApiError::invalid_field(
                    "roleIds",
                    format!("Unknown role id {}", role_id),
                ));
            }
        }
    }

    let previous_role = match role {
        Some(_) => state
            .db
            .find_user_by_id(id)
            .await
            .map_err(internal(FAILED))?
            .map(|user| user.role),
        None => None,
    };

    let changes = UserChanges {
        email,
        name: provided(&body.name).map(str::to_string),
        password_hash: None,
        role: role.map(|r| r.as_str().to_string()),
        role_ids: body.role_ids,
    };

    let updated = state
        .db
        .update_user(id, changes)
        .await
        .map_err(|e| match e {
            DatabaseError::NotFound(_) => ApiError::not_found("User not found"),
            DatabaseError::Conflict(_) => ApiError::conflict(EMAIL_TAKEN),
            other => internal(FAILED)(other),
        })?;

    let Some(role) = role else {
        return Ok(ApiResponse::success(updated.into()));
    };

    // Restore the previous label when the grants cannot follow.
    if let Err(e) = state.rbac.assign_role_to_user(id, role.as_str()).await {
        error!("Granting {} to user {} failed: {}", role, id, e);
        let restore = UserChanges {
            role: previous_role,
            ..UserChanges::default()
        };
        if let Err(e) = state.db.update_user(id, restore).await {
            error!("Could not restore role label of user {}: {}", id, e);
        }
        return Err(ApiError::internal_server_error(FAILED));
    }

    let user = state
        .db
        .find_user_by_id(id)
        .await
        .map_err(internal(FAILED))?
        .unwrap_or(updated);

    info!("User {} now has role {}", id, role);
    Ok(ApiResponse::success(user.into()))
}

/// DELETE /api/user - Hard delete by id (`users:delete`)
pub async fn users_delete(
    State(state): State<AppState>,
    caller: Authorized<UsersDelete>,
    JsonBody(body): JsonBody<DeleteUserRequest>,
) -> ApiResult<UserMessage> {
    let id = body
        .id
        .ok_or_else(|| ApiError::bad_request("User id is required"))?;

    state.db.delete_user(id).await.map_err(|e| match e {
        DatabaseError::NotFound(_) => ApiError::not_found("User not found"),
        other => internal("Failed to delete user")(other),
    })?;

    info!("User {} deleted by {}", id, caller.0.user_id);
    Ok(ApiResponse::success(UserMessage {
        message: "User deleted successfully",
        user: None,
    }))
}
