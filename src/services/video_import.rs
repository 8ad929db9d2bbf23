//! Bulk import of `page-*.json` search-response files into the video table.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::youtube::{SearchItem, SearchResponse};
use crate::database::models::NewVideo;
use crate::database::{DatabaseError, VideoRepository};

#[derive(Debug, Error)]
pub enum VideoImportError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub files: usize,
    pub total: usize,
    pub imported: usize,
    pub skipped: usize,
    pub invalid: usize,
}

/// `page-*.json` files in `dir`, in name order.
pub fn page_files(dir: &Path) -> Result<Vec<PathBuf>, VideoImportError> {
    let io_err = |source| VideoImportError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let is_page = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("page-") && n.ends_with(".json"))
            .unwrap_or(false);
        if is_page && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn to_new_video(item: &SearchItem) -> Option<NewVideo> {
    let published_at = DateTime::parse_from_rfc3339(&item.snippet.published_at)
        .ok()?
        .with_timezone(&Utc);

    Some(NewVideo {
        video_id: item.video_id().to_string(),
        title: item.snippet.title.clone(),
        description: item.snippet.description.clone(),
        published_at,
        thumbnail_url: item.snippet.thumbnails.best_url().to_string(),
        channel_title: item.snippet.channel_title.clone(),
        channel_id: item.snippet.channel_id.clone(),
    })
}

/// Import every video in the directory's page files. Videos whose platform
/// id is already stored are skipped; items with an unparseable publish date
/// are counted as invalid.
pub async fn import_directory(
    repo: &dyn VideoRepository,
    dir: &Path,
) -> Result<ImportReport, VideoImportError> {
    let mut report = ImportReport::default();

    for path in page_files(dir)? {
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| VideoImportError::Io {
                path: path.clone(),
                source,
            })?;
        let response: SearchResponse =
            serde_json::from_str(&raw).map_err(|source| VideoImportError::Parse {
                path: path.clone(),
                source,
            })?;
        report.files += 1;

        for item in &response.items {
            report.total += 1;

            let Some(video) = to_new_video(item) else {
                warn!(
                    "Skipping {} with invalid publishedAt '{}'",
                    item.video_id(),
                    item.snippet.published_at
                );
                report.invalid += 1;
                continue;
            };

            if repo.insert_video(video).await? {
                debug!("Imported video: {}", item.snippet.title);
                report.imported += 1;
            } else {
                debug!("Skipping existing video: {}", item.snippet.title);
                report.skipped += 1;
            }
        }
    }

    info!(
        "Imported {} of {} videos from {} files ({} existing, {} invalid)",
        report.imported, report.total, report.files, report.skipped, report.invalid
    );
    Ok(report)
}
