use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use super::models::{
    NewPermission, NewRole, NewUser, NewVideo, Permission, Role, RoleChanges, RoleStatus,
    UserChanges, UserRecord, Video,
};
use super::{
    Database, DatabaseError, PermissionRepository, RoleRepository, UserRepository,
    VideoRepository,
};
use crate::config::DatabaseConfig;

const USER_COLUMNS: &str =
    "id, email, password, name, role, created_at, updated_at, last_login";
const PERMISSION_COLUMNS: &str = "id, name, resource, action, description, created_at";
const ROLE_COLUMNS: &str = "id, name, description, status, created_at, updated_at";
const VIDEO_COLUMNS: &str = "id, video_id, title, description, published_at, thumbnail_url, \
     channel_title, channel_id, is_active, created_at";

#[derive(FromRow)]
struct RoleRow {
    id: Uuid,
    name: String,
    description: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RoleRow> for Role {
    type Error = DatabaseError;

    fn try_from(row: RoleRow) -> Result<Self, Self::Error> {
        let status = RoleStatus::parse(&row.status).ok_or_else(|| {
            DatabaseError::InvalidData(format!("role {} has status '{}'", row.id, row.status))
        })?;
        Ok(Role {
            id: row.id,
            name: row.name,
            description: row.description,
            status,
            permissions: Vec::new(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct OwnedPermission {
    owner_id: Uuid,
    #[sqlx(flatten)]
    permission: Permission,
}

#[derive(FromRow)]
struct OwnedRole {
    owner_id: Uuid,
    #[sqlx(flatten)]
    role: RoleRow,
}

fn map_unique(err: sqlx::Error, what: impl Into<String>) -> DatabaseError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            DatabaseError::Conflict(what.into())
        }
        _ => DatabaseError::Sqlx(err),
    }
}

/// Postgres-backed storage. Owns a single connection pool.
#[derive(Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    /// Open the pool and apply the embedded migrations.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| DatabaseError::ConnectionError("DATABASE_URL is not set".to_string()))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        info!(
            "Connected to database (max_connections={})",
            config.max_connections
        );
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn permissions_of_users(
        &self,
        user_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Permission>>, DatabaseError> {
        let rows = sqlx::query_as::<_, OwnedPermission>(
            "SELECT up.user_id AS owner_id, p.id, p.name, p.resource, p.action, p.description, p.created_at
             FROM user_permissions up
             JOIN permissions p ON p.id = up.permission_id
             WHERE up.user_id = ANY($1)
             ORDER BY p.name",
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(group(rows.into_iter().map(|r| (r.owner_id, r.permission))))
    }

    async fn permissions_of_roles(
        &self,
        role_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Permission>>, DatabaseError> {
        let rows = sqlx::query_as::<_, OwnedPermission>(
            "SELECT rp.role_id AS owner_id, p.id, p.name, p.resource, p.action, p.description, p.created_at
             FROM role_permissions rp
             JOIN permissions p ON p.id = rp.permission_id
             WHERE rp.role_id = ANY($1)
             ORDER BY p.name",
        )
        .bind(role_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(group(rows.into_iter().map(|r| (r.owner_id, r.permission))))
    }

    async fn roles_of_users(
        &self,
        user_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Role>>, DatabaseError> {
        let rows = sqlx::query_as::<_, OwnedRole>(
            "SELECT ur.user_id AS owner_id, r.id, r.name, r.description, r.status, r.created_at, r.updated_at
             FROM user_roles ur
             JOIN roles r ON r.id = ur.role_id
             WHERE ur.user_id = ANY($1)
             ORDER BY r.name",
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut pairs = Vec::with_capacity(rows.len());
        for row in rows {
            pairs.push((row.owner_id, Role::try_from(row.role)?));
        }
        let mut by_user = group(pairs.into_iter());

        let role_ids: Vec<Uuid> = by_user.values().flatten().map(|r| r.id).collect();
        let perms = self.permissions_of_roles(&role_ids).await?;
        for roles in by_user.values_mut() {
            for role in roles.iter_mut() {
                role.permissions = perms.get(&role.id).cloned().unwrap_or_default();
            }
        }

        Ok(by_user)
    }

    async fn hydrate_users(
        &self,
        mut users: Vec<UserRecord>,
    ) -> Result<Vec<UserRecord>, DatabaseError> {
        if users.is_empty() {
            return Ok(users);
        }
        let ids: Vec<Uuid> = users.iter().map(|u| u.id).collect();
        let mut permissions = self.permissions_of_users(&ids).await?;
        let mut roles = self.roles_of_users(&ids).await?;

        for user in users.iter_mut() {
            user.permissions = permissions.remove(&user.id).unwrap_or_default();
            user.roles = roles.remove(&user.id).unwrap_or_default();
        }
        Ok(users)
    }

    async fn hydrate_roles(&self, rows: Vec<RoleRow>) -> Result<Vec<Role>, DatabaseError> {
        let mut roles = rows
            .into_iter()
            .map(Role::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        if roles.is_empty() {
            return Ok(roles);
        }
        let ids: Vec<Uuid> = roles.iter().map(|r| r.id).collect();
        let mut permissions = self.permissions_of_roles(&ids).await?;
        for role in roles.iter_mut() {
            role.permissions = permissions.remove(&role.id).unwrap_or_default();
        }
        Ok(roles)
    }

    async fn fetch_user(&self, id: Uuid) -> Result<UserRecord, DatabaseError> {
        self.find_user_by_id(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("user {}", id)))
    }

    async fn fetch_role(&self, id: Uuid) -> Result<Role, DatabaseError> {
        self.find_role_by_id(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("role {}", id)))
    }
}

fn group<T>(pairs: impl Iterator<Item = (Uuid, T)>) -> HashMap<Uuid, Vec<T>> {
    let mut map: HashMap<Uuid, Vec<T>> = HashMap::new();
    for (owner, item) in pairs {
        map.entry(owner).or_default().push(item);
    }
    map
}

#[async_trait]
impl UserRepository for PgDatabase {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, DatabaseError> {
        let row = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(user) => Ok(self.hydrate_users(vec![user]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, DatabaseError> {
        let row = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(user) => Ok(self.hydrate_users(vec![user]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, DatabaseError> {
        let rows = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users ORDER BY created_at, email",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        self.hydrate_users(rows).await
    }

    async fn create_user(&self, input: NewUser) -> Result<UserRecord, DatabaseError> {
        let user = sqlx::query_as::<_, UserRecord>(&format!(
            "INSERT INTO users (id, email, password, name, role)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&input.email)
        .bind(&input.password_hash)
        .bind(&input.name)
        .bind(&input.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique(e, format!("email {}", input.email)))?;

        Ok(user)
    }

    async fn update_user(
        &self,
        id: Uuid,
        changes: UserChanges,
    ) -> Result<UserRecord, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE users SET
                email = COALESCE($2, email),
                name = COALESCE($3, name),
                password = COALESCE($4, password),
                role = COALESCE($5, role),
                updated_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(&changes.email)
        .bind(&changes.name)
        .bind(&changes.password_hash)
        .bind(&changes.role)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique(e, format!("email {}", changes.email.clone().unwrap_or_default())))?;

        if updated.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("user {}", id)));
        }

        if let Some(role_ids) = &changes.role_ids {
            sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "INSERT INTO user_roles (user_id, role_id)
                 SELECT $1, unnest($2::uuid[])
                 ON CONFLICT DO NOTHING",
            )
            .bind(id)
            .bind(role_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.fetch_user(id).await
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("user {}", id)));
        }
        Ok(())
    }

    async fn record_login(&self, id: Uuid) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE users SET last_login = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_user_permissions(
        &self,
        user_id: Uuid,
        permission_ids: &[Uuid],
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query("SELECT 1 FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(DatabaseError::NotFound(format!("user {}", user_id)));
        }

        sqlx::query("DELETE FROM user_permissions WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO user_permissions (user_id, permission_id)
             SELECT $1, unnest($2::uuid[])
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(permission_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl PermissionRepository for PgDatabase {
    async fn find_permission_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Permission>, DatabaseError> {
        let permission = sqlx::query_as::<_, Permission>(&format!(
            "SELECT {} FROM permissions WHERE name = $1",
            PERMISSION_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(permission)
    }

    async fn create_permission(&self, input: NewPermission) -> Result<Permission, DatabaseError> {
        sqlx::query_as::<_, Permission>(&format!(
            "INSERT INTO permissions (id, name, resource, action, description)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {}",
            PERMISSION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.resource)
        .bind(&input.action)
        .bind(&input.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique(e, format!("permission {}", input.name)))
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>, DatabaseError> {
        let permissions = sqlx::query_as::<_, Permission>(&format!(
            "SELECT {} FROM permissions ORDER BY name",
            PERMISSION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(permissions)
    }
}

#[async_trait]
impl RoleRepository for PgDatabase {
    async fn list_roles(&self) -> Result<Vec<Role>, DatabaseError> {
        let rows = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {} FROM roles ORDER BY name",
            ROLE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        self.hydrate_roles(rows).await
    }

    async fn find_role_by_id(&self, id: Uuid) -> Result<Option<Role>, DatabaseError> {
        let row = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {} FROM roles WHERE id = $1",
            ROLE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.hydrate_roles(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, DatabaseError> {
        let row = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {} FROM roles WHERE name = $1 ORDER BY created_at LIMIT 1",
            ROLE_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.hydrate_roles(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn create_role(&self, input: NewRole) -> Result<Role, DatabaseError> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO roles (id, name, description, status) VALUES ($1, $2, $3, $4)")
            .bind(id)
            .bind(&input.name)
            .bind(&input.description)
            .bind(input.status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_unique(e, format!("role {}", input.name)))?;

        sqlx::query(
            "INSERT INTO role_permissions (role_id, permission_id)
             SELECT $1, unnest($2::uuid[])
             ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(&input.permission_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.fetch_role(id).await
    }

    async fn update_role(&self, id: Uuid, changes: RoleChanges) -> Result<Role, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE roles SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                status = COALESCE($4, status),
                updated_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(changes.status.map(|s| s.as_str()))
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique(e, format!("role name of {}", id)))?;

        if updated.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("role {}", id)));
        }

        if let Some(permission_ids) = &changes.permission_ids {
            sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "INSERT INTO role_permissions (role_id, permission_id)
                 SELECT $1, unnest($2::uuid[])
                 ON CONFLICT DO NOTHING",
            )
            .bind(id)
            .bind(permission_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.fetch_role(id).await
    }

    async fn delete_role(&self, id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("role {}", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl VideoRepository for PgDatabase {
    async fn list_active_videos(
        &self,
        skip: usize,
        take: usize,
    ) -> Result<Vec<Video>, DatabaseError> {
        let videos = sqlx::query_as::<_, Video>(&format!(
            "SELECT {} FROM videos
             WHERE is_active
             ORDER BY published_at DESC
             LIMIT $1 OFFSET $2",
            VIDEO_COLUMNS
        ))
        .bind(i64::try_from(take).unwrap_or(i64::MAX))
        .bind(i64::try_from(skip).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        Ok(videos)
    }

    async fn insert_video(&self, input: NewVideo) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "INSERT INTO videos
                (id, video_id, title, description, published_at, thumbnail_url, channel_title, channel_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (video_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(&input.video_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.published_at)
        .bind(&input.thumbnail_url)
        .bind(&input.channel_title)
        .bind(&input.channel_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl Database for PgDatabase {
    /// Pings the pool to ensure connectivity
    async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("Closed database pool");
    }
}
