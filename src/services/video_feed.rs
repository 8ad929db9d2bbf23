//! Paginated video feed. The database is the primary source; when it fails
//! the feed is served from a static search-response file, paginated the same
//! way.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::SecondsFormat;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, warn};

use super::youtube::{SearchItem, SearchResponse};
use crate::config::VideoConfig;
use crate::database::models::Video;
use crate::database::VideoRepository;

#[derive(Debug, Error)]
pub enum VideoFeedError {
    #[error("Fallback JSON not found")]
    FallbackMissing,

    #[error("All sources failed")]
    AllSourcesFailed,

    #[error("Fallback data not found")]
    FeedMissing,

    #[error("Failed to serve fallback data")]
    FeedUnreadable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub id: String,
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub published_at: String,
    pub thumbnail_url: String,
    pub channel_title: String,
}

impl From<Video> for FeedItem {
    fn from(video: Video) -> Self {
        Self {
            id: video.id.to_string(),
            video_id: video.video_id,
            title: video.title,
            description: video.description,
            published_at: video
                .published_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            thumbnail_url: video.thumbnail_url,
            channel_title: video.channel_title,
        }
    }
}

impl From<SearchItem> for FeedItem {
    fn from(item: SearchItem) -> Self {
        let video_id = item.video_id().to_string();
        Self {
            id: video_id.clone(),
            video_id,
            thumbnail_url: item.snippet.thumbnails.best_url().to_string(),
            title: item.snippet.title,
            description: item.snippet.description,
            published_at: item.snippet.published_at,
            channel_title: item.snippet.channel_title,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoPage {
    pub items: Vec<FeedItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

#[derive(Clone)]
pub struct VideoFeed {
    repo: Arc<dyn VideoRepository>,
    page_size: usize,
    fallback_page: PathBuf,
    fallback_feed: PathBuf,
}

impl VideoFeed {
    pub fn new(repo: Arc<dyn VideoRepository>, config: &VideoConfig) -> Self {
        Self {
            repo,
            page_size: config.page_size.max(1),
            fallback_page: config.fallback_page.clone(),
            fallback_feed: config.fallback_feed.clone(),
        }
    }

    /// One page starting at offset `skip`.
    ///
    /// From the database, a next token is offered whenever the page is full.
    /// From the fallback file, only when items remain past this page.
    pub async fn page(&self, skip: usize) -> Result<VideoPage, VideoFeedError> {
        match self.repo.list_active_videos(skip, self.page_size).await {
            Ok(videos) => {
                let next_page_token =
                    (videos.len() == self.page_size).then(|| skip.saturating_add(self.page_size).to_string());
                Ok(VideoPage {
                    items: videos.into_iter().map(FeedItem::from).collect(),
                    next_page_token,
                })
            }
            Err(e) => {
                warn!("Video query failed, serving fallback file: {}", e);
                self.fallback(skip).await
            }
        }
    }

    async fn fallback(&self, skip: usize) -> Result<VideoPage, VideoFeedError> {
        let raw = match tokio::fs::read_to_string(&self.fallback_page).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                error!("Fallback file {} is missing", self.fallback_page.display());
                return Err(VideoFeedError::FallbackMissing);
            }
            Err(e) => {
                error!("Failed reading {}: {}", self.fallback_page.display(), e);
                return Err(VideoFeedError::AllSourcesFailed);
            }
        };

        let response: SearchResponse = serde_json::from_str(&raw).map_err(|e| {
            error!("Failed parsing {}: {}", self.fallback_page.display(), e);
            VideoFeedError::AllSourcesFailed
        })?;

        let total = response.items.len();
        let end = skip.saturating_add(self.page_size);
        let items = response
            .items
            .into_iter()
            .skip(skip)
            .take(self.page_size)
            .map(FeedItem::from)
            .collect();

        Ok(VideoPage {
            items,
            next_page_token: (total > end).then(|| end.to_string()),
        })
    }

    /// The standalone fallback feed document, passed through unchanged.
    pub async fn fallback_feed(&self) -> Result<Value, VideoFeedError> {
        let raw = match tokio::fs::read_to_string(&self.fallback_feed).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(VideoFeedError::FeedMissing),
            Err(e) => {
                error!("Error serving fallback data: {}", e);
                return Err(VideoFeedError::FeedUnreadable);
            }
        };

        serde_json::from_str(&raw).map_err(|e| {
            error!("Error serving fallback data: {}", e);
            VideoFeedError::FeedUnreadable
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::NewVideo;
    use crate::database::{DatabaseError, MemoryDatabase};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;
    use std::path::Path;

    struct BrokenStore;

    #[async_trait]
    impl VideoRepository for BrokenStore {
        async fn list_active_videos(
            &self,
            _skip: usize,
            _take: usize,
        ) -> Result<Vec<Video>, DatabaseError> {
            Err(DatabaseError::ConnectionError("connection refused".to_string()))
        }

        async fn insert_video(&self, _input: NewVideo) -> Result<bool, DatabaseError> {
            Err(DatabaseError::ConnectionError("connection refused".to_string()))
        }
    }

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("portal-feed-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn config(dir: &Path, page_size: usize) -> VideoConfig {
        VideoConfig {
            page_size,
            fallback_page: dir.join("page-0.json"),
            fallback_feed: dir.join("fallback-videos.json"),
        }
    }

    fn write_search_file(path: &Path, count: usize) {
        let items: Vec<Value> = (0..count)
            .map(|i| {
                json!({
                    "id": {"kind": "youtube#video", "videoId": format!("vid{}", i)},
                    "snippet": {
                        "title": format!("Session {}", i),
                        "description": "",
                        "publishedAt": "2024-05-01T09:00:00Z",
                        "thumbnails": {"high": {"url": format!("https://img/{}.jpg", i)}},
                        "channelTitle": "Assembly"
                    }
                })
            })
            .collect();
        std::fs::write(path, json!({ "items": items }).to_string()).unwrap();
    }

    async fn seed(db: &MemoryDatabase, count: usize) {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for i in 0..count {
            db.insert_video(NewVideo {
                video_id: format!("db{}", i),
                title: format!("Video {}", i),
                description: String::new(),
                published_at: base + Duration::days(i as i64),
                thumbnail_url: String::new(),
                channel_title: "Assembly".to_string(),
                channel_id: "UC1".to_string(),
            })
            .await
            .unwrap();
        }
    }

    #[tokio::test]
    async fn database_pages_offer_token_only_when_full() {
        let db = Arc::new(MemoryDatabase::new());
        seed(&db, 8).await;
        let feed = VideoFeed::new(db, &config(Path::new("/nonexistent"), 6));

        let first = feed.page(0).await.unwrap();
        assert_eq!(first.items.len(), 6);
        assert_eq!(first.items[0].video_id, "db7");
        assert_eq!(first.next_page_token.as_deref(), Some("6"));

        let second = feed.page(6).await.unwrap();
        assert_eq!(second.items.len(), 2);
        assert_eq!(second.next_page_token, None);
    }

    #[tokio::test]
    async fn database_timestamps_are_iso_with_millis() {
        let db = Arc::new(MemoryDatabase::new());
        seed(&db, 1).await;
        let feed = VideoFeed::new(db, &config(Path::new("/nonexistent"), 6));

        let page = feed.page(0).await.unwrap();
        assert_eq!(page.items[0].published_at, "2024-01-01T00:00:00.000Z");
    }

    #[tokio::test]
    async fn falls_back_to_static_file() {
        let dir = scratch_dir();
        write_search_file(&dir.join("page-0.json"), 8);
        let feed = VideoFeed::new(Arc::new(BrokenStore), &config(&dir, 6));

        let first = feed.page(0).await.unwrap();
        assert_eq!(first.items.len(), 6);
        assert_eq!(first.items[0].id, "vid0");
        assert_eq!(first.items[0].thumbnail_url, "https://img/0.jpg");
        assert_eq!(first.next_page_token.as_deref(), Some("6"));

        let last = feed.page(6).await.unwrap();
        assert_eq!(last.items.len(), 2);
        assert_eq!(last.next_page_token, None);
    }

    #[tokio::test]
    async fn fallback_with_exactly_one_page_has_no_token() {
        let dir = scratch_dir();
        write_search_file(&dir.join("page-0.json"), 6);
        let feed = VideoFeed::new(Arc::new(BrokenStore), &config(&dir, 6));

        let page = feed.page(0).await.unwrap();
        assert_eq!(page.items.len(), 6);
        assert_eq!(page.next_page_token, None);
    }

    #[tokio::test]
    async fn missing_fallback_is_reported() {
        let dir = scratch_dir();
        let feed = VideoFeed::new(Arc::new(BrokenStore), &config(&dir, 6));

        let err = feed.page(0).await.unwrap_err();
        assert!(matches!(err, VideoFeedError::FallbackMissing));
        assert_eq!(err.to_string(), "Fallback JSON not found");
    }

    #[tokio::test]
    async fn corrupt_fallback_means_all_sources_failed() {
        let dir = scratch_dir();
        std::fs::write(dir.join("page-0.json"), "{ not json").unwrap();
        let feed = VideoFeed::new(Arc::new(BrokenStore), &config(&dir, 6));

        let err = feed.page(0).await.unwrap_err();
        assert_eq!(err.to_string(), "All sources failed");
    }

    #[tokio::test]
    async fn fallback_feed_is_passed_through() {
        let dir = scratch_dir();
        let feed = VideoFeed::new(Arc::new(BrokenStore), &config(&dir, 6));
        assert!(matches!(
            feed.fallback_feed().await,
            Err(VideoFeedError::FeedMissing)
        ));

        std::fs::write(
            dir.join("fallback-videos.json"),
            r#"{"kind":"youtube#searchListResponse","items":[]}"#,
        )
        .unwrap();
        let doc = feed.fallback_feed().await.unwrap();
        assert_eq!(doc["kind"], "youtube#searchListResponse");
    }
}
