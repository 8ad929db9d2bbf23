pub mod video_feed;
pub mod video_import;
pub mod youtube;

pub use video_feed::{FeedItem, VideoFeed, VideoFeedError, VideoPage};
pub use video_import::{import_directory, ImportReport, VideoImportError};
