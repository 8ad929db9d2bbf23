//! Static YouTube search-response files used as the feed fallback and as
//! the import source.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchItem {
    pub id: ItemId,
    pub snippet: Snippet,
}

impl SearchItem {
    pub fn video_id(&self) -> &str {
        match &self.id {
            ItemId::Plain(id) => id,
            ItemId::Resource { video_id } => video_id,
        }
    }
}

/// Search results carry `{"videoId": ..}`; video-list exports carry a bare id.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Plain(String),
    Resource {
        #[serde(rename = "videoId")]
        video_id: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub published_at: String,
    #[serde(default)]
    pub thumbnails: Thumbnails,
    #[serde(default)]
    pub channel_title: String,
    #[serde(default)]
    pub channel_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thumbnails {
    pub high: Option<Thumbnail>,
    pub medium: Option<Thumbnail>,
    pub default: Option<Thumbnail>,
}

impl Thumbnails {
    /// Largest available thumbnail, or empty.
    pub fn best_url(&self) -> &str {
        self.high
            .as_ref()
            .or(self.medium.as_ref())
            .or(self.default.as_ref())
            .map(|t| t.url.as_str())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thumbnail {
    pub url: String,
}
