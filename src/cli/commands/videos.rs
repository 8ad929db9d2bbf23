use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::database::PgDatabase;
use crate::services::import_directory;

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Directory containing page-*.json search responses
    pub dir: PathBuf,
}

pub async fn handle_import(
    db: &PgDatabase,
    args: ImportArgs,
    output_format: &OutputFormat,
) -> anyhow::Result<()> {
    let report = import_directory(db, &args.dir)
        .await
        .with_context(|| format!("import from {} failed", args.dir.display()))?;

    output_success(
        output_format,
        &format!(
            "Import summary: {} found, {} imported, {} skipped, {} invalid",
            report.total, report.imported, report.skipped, report.invalid
        ),
        Some(json!({
            "files": report.files,
            "total": report.total,
            "imported": report.imported,
            "skipped": report.skipped,
            "invalid": report.invalid,
        })),
    )
}
