//! Data access for accounts, roles, permissions and videos.
//!
//! Handlers never reach a global client: they receive an `Arc<dyn Database>`
//! through [`crate::state::AppState`], opened at process start and closed on
//! shutdown by the binary that owns it.

pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use models::{
    NewPermission, NewRole, NewUser, NewVideo, Permission, Role, RoleChanges, UserChanges,
    UserRecord, Video,
};

pub use memory::MemoryDatabase;
pub use postgres::PgDatabase;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Load a user with its roles and direct permission grants.
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, DatabaseError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, DatabaseError>;

    async fn list_users(&self) -> Result<Vec<UserRecord>, DatabaseError>;

    /// Fails with [`DatabaseError::Conflict`] when the email is taken.
    async fn create_user(&self, input: NewUser) -> Result<UserRecord, DatabaseError>;

    /// Fails with [`DatabaseError::NotFound`] for an unknown id and
    /// [`DatabaseError::Conflict`] when the new email belongs to another user.
    async fn update_user(&self, id: Uuid, changes: UserChanges)
        -> Result<UserRecord, DatabaseError>;

    /// Hard delete. Join rows go with the user.
    async fn delete_user(&self, id: Uuid) -> Result<(), DatabaseError>;

    async fn record_login(&self, id: Uuid) -> Result<(), DatabaseError>;

    /// Replace the user's direct permission grants with exactly `permission_ids`.
    async fn set_user_permissions(
        &self,
        user_id: Uuid,
        permission_ids: &[Uuid],
    ) -> Result<(), DatabaseError>;
}

#[async_trait]
pub trait PermissionRepository: Send + Sync {
    async fn find_permission_by_name(&self, name: &str)
        -> Result<Option<Permission>, DatabaseError>;

    /// Fails with [`DatabaseError::Conflict`] when the name already exists.
    async fn create_permission(&self, input: NewPermission) -> Result<Permission, DatabaseError>;

    async fn list_permissions(&self) -> Result<Vec<Permission>, DatabaseError>;
}

#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn list_roles(&self) -> Result<Vec<Role>, DatabaseError>;

    async fn find_role_by_id(&self, id: Uuid) -> Result<Option<Role>, DatabaseError>;

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, DatabaseError>;

    async fn create_role(&self, input: NewRole) -> Result<Role, DatabaseError>;

    async fn update_role(&self, id: Uuid, changes: RoleChanges) -> Result<Role, DatabaseError>;

    async fn delete_role(&self, id: Uuid) -> Result<(), DatabaseError>;
}

#[async_trait]
pub trait VideoRepository: Send + Sync {
    /// Active videos, newest first.
    async fn list_active_videos(&self, skip: usize, take: usize)
        -> Result<Vec<Video>, DatabaseError>;

    /// Insert unless a video with the same platform id is already stored.
    /// Returns `true` when a row was written.
    async fn insert_video(&self, input: NewVideo) -> Result<bool, DatabaseError>;
}

/// Everything the service needs from storage.
#[async_trait]
pub trait Database:
    UserRepository + PermissionRepository + RoleRepository + VideoRepository
{
    async fn health_check(&self) -> Result<(), DatabaseError>;

    /// Release connections. Called once by the owning binary at shutdown.
    async fn close(&self);
}
