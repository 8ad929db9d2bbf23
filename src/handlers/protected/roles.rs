// handlers/protected/roles.rs - Role entity management at /api/roles

use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::database::models::{NewRole, Role, RoleChanges, RoleStatus};
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::handlers::utils::{internal, provided};
use crate::middleware::auth::{RolesCreate, RolesDelete, RolesRead, RolesUpdate};
use crate::middleware::{ApiResponse, ApiResult, Authorized, JsonBody};
use crate::state::AppState;

const NAME_TAKEN: &str = "Role with this name already exists";
const NOT_FOUND: &str = "Role not found";

/// Body for both create and update. `permissions` holds permission names,
/// created on first use.
#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<RoleStatus>,
    pub permissions: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct RoleMessage {
    pub message: &'static str,
}

async fn resolve_permissions(
    state: &AppState,
    names: Option<&[String]>,
    failed: &'static str,
) -> Result<Option<Vec<Uuid>>, ApiError> {
    let Some(names) = names else {
        return Ok(None);
    };
    let names: Vec<&str> = names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .collect();

    let permissions = state
        .rbac
        .find_or_create_all(&names)
        .await
        .map_err(internal(failed))?;
    Ok(Some(permissions.into_iter().map(|p| p.id).collect()))
}

async fn ensure_name_free(
    state: &AppState,
    name: &str,
    except: Option<Uuid>,
    failed: &'static str,
) -> Result<(), ApiError> {
    let holder = state
        .db
        .find_role_by_name(name)
        .await
        .map_err(internal(failed))?;
    match holder {
        Some(role) if Some(role.id) != except => Err(ApiError::conflict(NAME_TAKEN)),
        _ => Ok(()),
    }
}

/// GET /api/roles - Every role with its permissions (`roles:read`)
pub async fn roles_get(
    State(state): State<AppState>,
    _: Authorized<RolesRead>,
) -> ApiResult<Vec<Role>> {
    let roles = state
        .db
        .list_roles()
        .await
        .map_err(internal("Failed to fetch roles"))?;
    Ok(ApiResponse::success(roles))
}

/// POST /api/roles - Create a role (`roles:create`)
pub async fn roles_post(
    State(state): State<AppState>,
    _: Authorized<RolesCreate>,
    JsonBody(body): JsonBody<RoleRequest>,
) -> ApiResult<Role> {
    const FAILED: &str = "Failed to create role";

    let name = provided(&body.name)
        .ok_or_else(|| ApiError::bad_request("Role name is required"))?
        .to_string();
    ensure_name_free(&state, &name, None, FAILED).await?;

    let permission_ids = resolve_permissions(&state, body.permissions.as_deref(), FAILED)
        .await?
        .unwrap_or_default();

    let role = state
        .db
        .create_role(NewRole {
            name,
            description: body.description.unwrap_or_default(),
            status: body.status.unwrap_or_default(),
            permission_ids,
        })
        .await
        .map_err(|e| match e {
            DatabaseError::Conflict(_) => ApiError::conflict(NAME_TAKEN),
            other => internal(FAILED)(other),
        })?;

    info!("Created role {} ({})", role.name, role.id);
    Ok(ApiResponse::created(role))
}

/// PUT /api/roles/:id - Partial update (`roles:update`)
///
/// A `permissions` list replaces the role's permission set.
pub async fn roles_put(
    State(state): State<AppState>,
    _: Authorized<RolesUpdate>,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<RoleRequest>,
) -> ApiResult<Role> {
    const FAILED: &str = "Failed to update role";

    let name = provided(&body.name).map(str::to_string);
    if let Some(name) = &name {
        ensure_name_free(&state, name, Some(id), FAILED).await?;
    }

    let changes = RoleChanges {
        name,
        description: body.description,
        status: body.status,
        permission_ids: resolve_permissions(&state, body.permissions.as_deref(), FAILED).await?,
    };

    let role = state
        .db
        .update_role(id, changes)
        .await
        .map_err(|e| match e {
            DatabaseError::NotFound(_) => ApiError::not_found(NOT_FOUND),
            DatabaseError::Conflict(_) => ApiError::conflict(NAME_TAKEN),
            other => internal(FAILED)(other),
        })?;

    Ok(ApiResponse::success(role))
}

/// DELETE /api/roles/:id - Delete a role and detach it from users (`roles:delete`)
pub async fn roles_delete(
    State(state): State<AppState>,
    _: Authorized<RolesDelete>,
    Path(id): Path<Uuid>,
) -> ApiResult<RoleMessage> {
    state.db.delete_role(id).await.map_err(|e| match e {
        DatabaseError::NotFound(_) => ApiError::not_found(NOT_FOUND),
        other => internal("Failed to delete role")(other),
    })?;

    info!("Deleted role {}", id);
    Ok(ApiResponse::success(RoleMessage {
        message: "Role deleted successfully",
    }))
}
