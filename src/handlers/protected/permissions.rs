// handlers/protected/permissions.rs - GET /api/permissions

use axum::extract::State;

use crate::database::models::Permission;
use crate::handlers::utils::internal;
use crate::middleware::auth::RolesRead;
use crate::middleware::{ApiResponse, ApiResult, Authorized};
use crate::state::AppState;

/// GET /api/permissions - Every permission record, by name
pub async fn permissions_get(
    State(state): State<AppState>,
    _: Authorized<RolesRead>,
) -> ApiResult<Vec<Permission>> {
    let permissions = state
        .db
        .list_permissions()
        .await
        .map_err(internal("Failed to fetch permissions"))?;
    Ok(ApiResponse::success(permissions))
}
