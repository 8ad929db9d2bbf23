//! In-memory database for development and tests.
//!
//! Implements the same repository contracts as [`super::PgDatabase`]: unique
//! emails, unique permission names, cascading join rows on delete. Data is
//! lost when the value is dropped.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::models::{
    NewPermission, NewRole, NewUser, NewVideo, Permission, Role, RoleChanges, RoleStatus,
    UserChanges, UserRecord, Video,
};
use super::{
    Database, DatabaseError, PermissionRepository, RoleRepository, UserRepository,
    VideoRepository,
};

#[derive(Debug, Clone)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    name: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_login: Option<DateTime<Utc>>,
    role_ids: Vec<Uuid>,
    permission_ids: Vec<Uuid>,
}

#[derive(Debug, Clone)]
struct RoleRow {
    id: Uuid,
    name: String,
    description: String,
    status: RoleStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    permission_ids: Vec<Uuid>,
}

#[derive(Debug, Default)]
struct State {
    users: HashMap<Uuid, UserRow>,
    permissions: HashMap<Uuid, Permission>,
    roles: HashMap<Uuid, RoleRow>,
    videos: Vec<Video>,
}

impl State {
    fn permissions_for(&self, ids: &[Uuid]) -> Vec<Permission> {
        let mut found: Vec<Permission> = ids
            .iter()
            .filter_map(|id| self.permissions.get(id).cloned())
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found
    }

    fn hydrate_role(&self, row: &RoleRow) -> Role {
        Role {
            id: row.id,
            name: row.name.clone(),
            description: row.description.clone(),
            status: row.status,
            permissions: self.permissions_for(&row.permission_ids),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    fn hydrate_user(&self, row: &UserRow) -> UserRecord {
        let mut roles: Vec<Role> = row
            .role_ids
            .iter()
            .filter_map(|id| self.roles.get(id))
            .map(|r| self.hydrate_role(r))
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));

        UserRecord {
            id: row.id,
            email: row.email.clone(),
            password_hash: row.password_hash.clone(),
            name: row.name.clone(),
            role: row.role.clone(),
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_login: row.last_login,
            roles,
            permissions: self.permissions_for(&row.permission_ids),
        }
    }

    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }

    fn role_name_taken(&self, name: &str, except: Option<Uuid>) -> bool {
        self.roles
            .values()
            .any(|r| r.name == name && Some(r.id) != except)
    }

    fn check_permission_ids(&self, ids: &[Uuid]) -> Result<(), DatabaseError> {
        match ids.iter().find(|id| !self.permissions.contains_key(id)) {
            Some(missing) => Err(DatabaseError::NotFound(format!("permission {}", missing))),
            None => Ok(()),
        }
    }

    fn check_role_ids(&self, ids: &[Uuid]) -> Result<(), DatabaseError> {
        match ids.iter().find(|id| !self.roles.contains_key(id)) {
            Some(missing) => Err(DatabaseError::NotFound(format!("role {}", missing))),
            None => Ok(()),
        }
    }
}

fn dedup(ids: &[Uuid]) -> Vec<Uuid> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(id) {
            out.push(*id);
        }
    }
    out
}

#[derive(Debug, Default)]
pub struct MemoryDatabase {
    state: RwLock<State>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryDatabase {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state.users.get(&id).map(|row| state.hydrate_user(row)))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.email == email)
            .map(|row| state.hydrate_user(row)))
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, DatabaseError> {
        let state = self.state.read().await;
        let mut users: Vec<UserRecord> =
            state.users.values().map(|row| state.hydrate_user(row)).collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.email.cmp(&b.email)));
        Ok(users)
    }

    async fn create_user(&self, input: NewUser) -> Result<UserRecord, DatabaseError> {
        let mut state = self.state.write().await;
        if state.email_taken(&input.email, None) {
            return Err(DatabaseError::Conflict(format!("email {}", input.email)));
        }

        let now = Utc::now();
        let row = UserRow {
            id: Uuid::new_v4(),
            email: input.email,
            password_hash: input.password_hash,
            name: input.name,
            role: input.role,
            created_at: now,
            updated_at: now,
            last_login: None,
            role_ids: Vec::new(),
            permission_ids: Vec::new(),
        };
        let user = state.hydrate_user(&row);
        state.users.insert(row.id, row);

        debug!("memory: created user {}", user.id);
        Ok(user)
    }

    async fn update_user(
        &self,
        id: Uuid,
        changes: UserChanges,
    ) -> Result<UserRecord, DatabaseError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&id) {
            return Err(DatabaseError::NotFound(format!("user {}", id)));
        }
        if let Some(email) = &changes.email {
            if state.email_taken(email, Some(id)) {
                return Err(DatabaseError::Conflict(format!("email {}", email)));
            }
        }
        if let Some(role_ids) = &changes.role_ids {
            state.check_role_ids(role_ids)?;
        }

        let row = state
            .users
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound(format!("user {}", id)))?;
        if let Some(email) = changes.email {
            row.email = email;
        }
        if let Some(name) = changes.name {
            row.name = name;
        }
        if let Some(hash) = changes.password_hash {
            row.password_hash = hash;
        }
        if let Some(role) = changes.role {
            row.role = role;
        }
        if let Some(role_ids) = changes.role_ids {
            row.role_ids = dedup(&role_ids);
        }
        row.updated_at = Utc::now();

        let row = row.clone();
        Ok(state.hydrate_user(&row))
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        state
            .users
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DatabaseError::NotFound(format!("user {}", id)))
    }

    async fn record_login(&self, id: Uuid) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        let row = state
            .users
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound(format!("user {}", id)))?;
        row.last_login = Some(Utc::now());
        Ok(())
    }

    async fn set_user_permissions(
        &self,
        user_id: Uuid,
        permission_ids: &[Uuid],
    ) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        state.check_permission_ids(permission_ids)?;
        let row = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| DatabaseError::NotFound(format!("user {}", user_id)))?;
        row.permission_ids = dedup(permission_ids);
        row.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl PermissionRepository for MemoryDatabase {
    async fn find_permission_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Permission>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state.permissions.values().find(|p| p.name == name).cloned())
    }

    async fn create_permission(&self, input: NewPermission) -> Result<Permission, DatabaseError> {
        let mut state = self.state.write().await;
        if state.permissions.values().any(|p| p.name == input.name) {
            return Err(DatabaseError::Conflict(format!("permission {}", input.name)));
        }

        let permission = Permission {
            id: Uuid::new_v4(),
            name: input.name,
            resource: input.resource,
            action: input.action,
            description: input.description,
            created_at: Utc::now(),
        };
        state.permissions.insert(permission.id, permission.clone());
        Ok(permission)
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>, DatabaseError> {
        let state = self.state.read().await;
        let mut all: Vec<Permission> = state.permissions.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }
}

#[async_trait]
impl RoleRepository for MemoryDatabase {
    async fn list_roles(&self) -> Result<Vec<Role>, DatabaseError> {
        let state = self.state.read().await;
        let mut roles: Vec<Role> = state.roles.values().map(|r| state.hydrate_role(r)).collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn find_role_by_id(&self, id: Uuid) -> Result<Option<Role>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state.roles.get(&id).map(|r| state.hydrate_role(r)))
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state
            .roles
            .values()
            .find(|r| r.name == name)
            .map(|r| state.hydrate_role(r)))
    }

    async fn create_role(&self, input: NewRole) -> Result<Role, DatabaseError> {
        let mut state = self.state.write().await;
        state.check_permission_ids(&input.permission_ids)?;
        if state.role_name_taken(&input.name, None) {
            return Err(DatabaseError::Conflict(format!("role {}", input.name)));
        }

        let now = Utc::now();
        let row = RoleRow {
            id: Uuid::new_v4(),
            name: input.name,
            description: input.description,
            status: input.status,
            created_at: now,
            updated_at: now,
            permission_ids: dedup(&input.permission_ids),
        };
        let role = state.hydrate_role(&row);
        state.roles.insert(row.id, row);
        Ok(role)
    }

    async fn update_role(&self, id: Uuid, changes: RoleChanges) -> Result<Role, DatabaseError> {
        let mut state = self.state.write().await;
        if let Some(ids) = &changes.permission_ids {
            state.check_permission_ids(ids)?;
        }
        if let Some(name) = &changes.name {
            if state.role_name_taken(name, Some(id)) {
                return Err(DatabaseError::Conflict(format!("role {}", name)));
            }
        }

        let row = state
            .roles
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound(format!("role {}", id)))?;
        if let Some(name) = changes.name {
            row.name = name;
        }
        if let Some(description) = changes.description {
            row.description = description;
        }
        if let Some(status) = changes.status {
            row.status = status;
        }
        if let Some(ids) = changes.permission_ids {
            row.permission_ids = dedup(&ids);
        }
        row.updated_at = Utc::now();

        let row = row.clone();
        Ok(state.hydrate_role(&row))
    }

    async fn delete_role(&self, id: Uuid) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        if state.roles.remove(&id).is_none() {
            return Err(DatabaseError::NotFound(format!("role {}", id)));
        }
        for user in state.users.values_mut() {
            user.role_ids.retain(|r| *r != id);
        }
        Ok(())
    }
}

#[async_trait]
impl VideoRepository for MemoryDatabase {
    async fn list_active_videos(
        &self,
        skip: usize,
        take: usize,
    ) -> Result<Vec<Video>, DatabaseError> {
        let state = self.state.read().await;
        let mut active: Vec<&Video> = state.videos.iter().filter(|v| v.is_active).collect();
        active.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(active.into_iter().skip(skip).take(take).cloned().collect())
    }

    async fn insert_video(&self, input: NewVideo) -> Result<bool, DatabaseError> {
        let mut state = self.state.write().await;
        if state.videos.iter().any(|v| v.video_id == input.video_id) {
            return Ok(false);
        }
        state.videos.push(Video {
            id: Uuid::new_v4(),
            video_id: input.video_id,
            title: input.title,
            description: input.description,
            published_at: input.published_at,
            thumbnail_url: input.thumbnail_url,
            channel_title: input.channel_title,
            channel_id: input.channel_id,
            is_active: true,
            created_at: Utc::now(),
        });
        Ok(true)
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            name: "Test".to_string(),
            role: "USER".to_string(),
        }
    }

    #[tokio::test]
    async fn email_is_unique() {
        let db = MemoryDatabase::new();
        db.create_user(new_user("a@x.com")).await.unwrap();
        let err = db.create_user(new_user("a@x.com")).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_rejects_email_of_another_user() {
        let db = MemoryDatabase::new();
        db.create_user(new_user("a@x.com")).await.unwrap();
        let b = db.create_user(new_user("b@x.com")).await.unwrap();

        let changes = UserChanges {
            email: Some("a@x.com".to_string()),
            ..Default::default()
        };
        let err = db.update_user(b.id, changes).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict(_)));

        // Keeping one's own email is not a conflict.
        let changes = UserChanges {
            email: Some("b@x.com".to_string()),
            ..Default::default()
        };
        db.update_user(b.id, changes).await.unwrap();
    }

    #[tokio::test]
    async fn permission_grants_are_replaced_and_hydrated() {
        let db = MemoryDatabase::new();
        let user = db.create_user(new_user("a@x.com")).await.unwrap();
        let read = db
            .create_permission(NewPermission::from_name("users:read"))
            .await
            .unwrap();
        let delete = db
            .create_permission(NewPermission::from_name("users:delete"))
            .await
            .unwrap();

        db.set_user_permissions(user.id, &[read.id, delete.id, read.id])
            .await
            .unwrap();
        let loaded = db.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(loaded.permission_names(), vec!["users:delete", "users:read"]);

        db.set_user_permissions(user.id, &[read.id]).await.unwrap();
        let loaded = db.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(loaded.permission_names(), vec!["users:read"]);
    }

    #[tokio::test]
    async fn deleting_a_role_detaches_it_from_users() {
        let db = MemoryDatabase::new();
        let user = db.create_user(new_user("a@x.com")).await.unwrap();
        let role = db
            .create_role(NewRole {
                name: "EDITOR".to_string(),
                description: String::new(),
                status: RoleStatus::Active,
                permission_ids: vec![],
            })
            .await
            .unwrap();
        let changes = UserChanges {
            role_ids: Some(vec![role.id]),
            ..Default::default()
        };
        let updated = db.update_user(user.id, changes).await.unwrap();
        assert_eq!(updated.role_names(), vec!["EDITOR"]);

        db.delete_role(role.id).await.unwrap();
        let loaded = db.find_user_by_id(user.id).await.unwrap().unwrap();
        assert!(loaded.roles.is_empty());
    }

    #[tokio::test]
    async fn role_names_are_unique() {
        let db = MemoryDatabase::new();
        let role = |name: &str| NewRole {
            name: name.to_string(),
            description: String::new(),
            status: RoleStatus::default(),
            permission_ids: vec![],
        };
        db.create_role(role("EDITOR")).await.unwrap();
        let reviewer = db.create_role(role("REVIEWER")).await.unwrap();
        assert_eq!(reviewer.status, RoleStatus::Active);

        let err = db.create_role(role("EDITOR")).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict(_)));

        let rename = |name: &str| RoleChanges {
            name: Some(name.to_string()),
            ..Default::default()
        };
        let err = db.update_role(reviewer.id, rename("EDITOR")).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict(_)));
        db.update_role(reviewer.id, rename("REVIEWER")).await.unwrap();
    }

    #[tokio::test]
    async fn videos_are_paged_newest_first_and_deduplicated() {
        let db = MemoryDatabase::new();
        for (i, id) in ["a", "b", "c"].iter().enumerate() {
            let inserted = db
                .insert_video(NewVideo {
                    video_id: id.to_string(),
                    title: format!("video {}", id),
                    description: String::new(),
                    published_at: Utc::now() + chrono::Duration::minutes(i as i64),
                    thumbnail_url: String::new(),
                    channel_title: "Assembly".to_string(),
                    channel_id: "chan".to_string(),
                })
                .await
                .unwrap();
            assert!(inserted);
        }

        let dup = NewVideo {
            video_id: "a".to_string(),
            title: "again".to_string(),
            description: String::new(),
            published_at: Utc::now(),
            thumbnail_url: String::new(),
            channel_title: String::new(),
            channel_id: String::new(),
        };
        assert!(!db.insert_video(dup).await.unwrap());

        let page = db.list_active_videos(0, 2).await.unwrap();
        let ids: Vec<&str> = page.iter().map(|v| v.video_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);

        let rest = db.list_active_videos(2, 2).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].video_id, "a");
    }
}
