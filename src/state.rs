use std::sync::Arc;

use crate::auth::TokenIssuer;
use crate::config::AppConfig;
use crate::database::Database;
use crate::middleware::Authenticator;
use crate::rbac::PermissionResolver;
use crate::services::VideoFeed;

/// Handles shared by every handler. Built once at startup from an opened
/// data-access handle; cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    pub config: Arc<AppConfig>,
    pub tokens: TokenIssuer,
    pub auth: Authenticator,
    pub rbac: PermissionResolver,
    pub videos: VideoFeed,
}

impl AppState {
    pub fn new<D: Database + 'static>(db: Arc<D>, config: AppConfig) -> Self {
        let tokens = TokenIssuer::new(&config.security);
        let videos = VideoFeed::new(db.clone(), &config.videos);
        let db: Arc<dyn Database> = db;

        Self {
            auth: Authenticator::new(db.clone(), tokens.clone()),
            rbac: PermissionResolver::new(db.clone()),
            db,
            config: Arc::new(config),
            tokens,
            videos,
        }
    }

    pub fn password_min_length(&self) -> usize {
        self.config.security.password_min_length
    }
}
