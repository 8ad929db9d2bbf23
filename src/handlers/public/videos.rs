// handlers/public/videos.rs - Public video feed

use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::Value;

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::VideoPage;
use crate::state::AppState;

const MAX_OFFSET: u64 = i64::MAX as u64;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    pub page_token: Option<String>,
}

impl FeedQuery {
    /// Offset into the feed. Anything that is not a non-negative integer
    /// starts from the beginning; offsets past `i64::MAX` are clamped to it.
    pub fn skip(&self) -> usize {
        let Some(token) = self.page_token.as_deref().map(str::trim) else {
            return 0;
        };
        if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
            let offset = token.parse::<u64>().unwrap_or(u64::MAX).min(MAX_OFFSET);
            return usize::try_from(offset).unwrap_or(usize::MAX);
        }
        0
    }
}

/// GET /api/videos?pageToken=<offset> - One page of the active video feed
pub async fn videos_get(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> ApiResult<VideoPage> {
    let page = state.videos.page(query.skip()).await?;
    Ok(ApiResponse::success(page))
}

/// GET /api/fallback-videos - The static fallback feed document
pub async fn fallback_videos_get(State(state): State<AppState>) -> ApiResult<Value> {
    let feed = state.videos.fallback_feed().await?;
    Ok(ApiResponse::success(feed))
}
