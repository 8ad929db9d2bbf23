use std::sync::Arc;

use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::database::PgDatabase;
use crate::rbac::PermissionResolver;

pub async fn handle_init(db: &PgDatabase, output_format: &OutputFormat) -> anyhow::Result<()> {
    let resolver = PermissionResolver::new(Arc::new(db.clone()));
    let report = resolver.initialize().await?;

    output_success(
        output_format,
        &format!(
            "RBAC initialized: {} permissions, {} roles created, {} roles updated",
            report.permissions, report.roles_created, report.roles_updated
        ),
        Some(json!({
            "permissions": report.permissions,
            "roles_created": report.roles_created,
            "roles_updated": report.roles_updated,
        })),
    )
}
