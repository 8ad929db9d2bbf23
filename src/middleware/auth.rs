//! Request Authenticator.
//!
//! Every protected handler goes through [`Authenticator::authenticate`] by
//! way of an extractor: [`Authenticated`] when any valid identity will do,
//! [`Authorized`] when specific permissions are required. Both run on the
//! request head, so a bad token is rejected before any body is parsed.

use std::marker::PhantomData;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::{debug, warn};

use crate::auth::{AuthContext, TokenIssuer};
use crate::database::Database;
use crate::error::ApiError;
use crate::state::AppState;

const UNAUTHORIZED: &str = "Unauthorized";
const USER_NOT_FOUND: &str = "User not found";
const FORBIDDEN: &str = "Forbidden";

#[derive(Clone)]
pub struct Authenticator {
    db: Arc<dyn Database>,
    tokens: TokenIssuer,
}

impl Authenticator {
    pub fn new(db: Arc<dyn Database>, tokens: TokenIssuer) -> Self {
        Self { db, tokens }
    }

    /// Resolve the caller and check that every permission in `required` is
    /// granted. Admins pass any permission check.
    ///
    /// All failures are terminal: 401 for a missing, malformed or expired
    /// token and for a token whose user no longer exists, 403 for missing
    /// permissions.
    pub async fn authenticate(
        &self,
        headers: &HeaderMap,
        required: &[&str],
    ) -> Result<AuthContext, ApiError> {
        let token = extract_jwt_from_headers(headers).map_err(|reason| {
            debug!("Rejected request: {}", reason);
            ApiError::unauthorized(UNAUTHORIZED)
        })?;

        let claims = self.tokens.verify_access(&token).map_err(|e| {
            debug!("Rejected token: {}", e);
            ApiError::unauthorized(UNAUTHORIZED)
        })?;

        let user = self
            .db
            .find_user_by_id(claims.user_id)
            .await?
            .ok_or_else(|| {
                warn!("Token for unknown user {}", claims.user_id);
                ApiError::unauthorized(USER_NOT_FOUND)
            })?;

        let context = AuthContext {
            user_id: user.id,
            email: user.email,
            role: user.role,
            permissions: user.permissions.into_iter().map(|p| p.name).collect(),
        };

        if !context.has_all(required) {
            warn!(
                "User {} ({}) lacks one of {:?}",
                context.user_id, context.role, required
            );
            return Err(ApiError::forbidden(FORBIDDEN));
        }

        Ok(context)
    }
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, &'static str> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .ok_or("Missing Authorization header")?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format")?;

    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or("Authorization header must use Bearer token format")?
        .trim();

    if token.is_empty() {
        return Err("Empty JWT token");
    }
    Ok(token.to_string())
}

/// Any authenticated caller, no specific permission required.
pub struct Authenticated(pub AuthContext);

#[async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        state
            .auth
            .authenticate(&parts.headers, &[])
            .await
            .map(Authenticated)
    }
}

/// Permissions an [`Authorized`] extractor demands, all of them.
pub trait Requirement: 'static {
    const PERMISSIONS: &'static [&'static str];
}

macro_rules! requirement {
    ($($name:ident => [$($perm:literal),+];)+) => {
        $(
            pub struct $name;

            impl Requirement for $name {
                const PERMISSIONS: &'static [&'static str] = &[$($perm),+];
            }
        )+
    };
}

requirement! {
    UsersRead => ["users:read"];
    UsersCreate => ["users:create"];
    UsersUpdate => ["users:update"];
    UsersDelete => ["users:delete"];
    RolesRead => ["roles:read"];
    RolesCreate => ["roles:create"];
    RolesUpdate => ["roles:update"];
    RolesDelete => ["roles:delete"];
}

/// A caller holding every permission in `R`. The context is field `.0`.
pub struct Authorized<R>(pub AuthContext, PhantomData<fn() -> R>);

#[async_trait]
impl<R: Requirement> FromRequestParts<AppState> for Authorized<R> {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let ctx = state
            .auth
            .authenticate(&parts.headers, R::PERMISSIONS)
            .await?;
        Ok(Authorized(ctx, PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};
    use std::time::Duration;

    use crate::auth::hash_password;
    use crate::config::SecurityConfig;
    use crate::database::models::{NewUser, UserRecord};
    use crate::database::{MemoryDatabase, UserRepository};
    use crate::rbac::PermissionResolver;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&SecurityConfig {
            jwt_secret: "access-secret-access-secret-0123".to_string(),
            jwt_expires_in: Duration::from_secs(3600),
            jwt_refresh_secret: "refresh-secret-refresh-secret-01".to_string(),
            jwt_refresh_expires_in: Duration::from_secs(7200),
            enable_cors: false,
            cors_origins: Vec::new(),
            password_min_length: 8,
        })
    }

    struct Fixture {
        db: Arc<MemoryDatabase>,
        tokens: TokenIssuer,
        auth: Authenticator,
    }

    impl Fixture {
        fn new() -> Self {
            let db = Arc::new(MemoryDatabase::new());
            let tokens = issuer();
            let auth = Authenticator::new(db.clone(), tokens.clone());
            Self { db, tokens, auth }
        }

        async fn user(&self, email: &str, role: &str) -> UserRecord {
            let user = self
                .db
                .create_user(NewUser {
                    email: email.to_string(),
                    password_hash: hash_password("Secret123").unwrap(),
                    name: "Test".to_string(),
                    role: role.to_string(),
                })
                .await
                .unwrap();
            PermissionResolver::new(self.db.clone())
                .assign_role_to_user(user.id, role)
                .await
                .unwrap();
            self.db.find_user_by_id(user.id).await.unwrap().unwrap()
        }

        fn bearer(&self, user: &UserRecord) -> HeaderMap {
            let token = self.tokens.issue(user).unwrap().access_token;
            with_authorization(&format!("Bearer {}", token))
        }
    }

    fn with_authorization(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn assert_status(result: Result<AuthContext, ApiError>, status: StatusCode, message: &str) {
        let err = result.unwrap_err();
        assert_eq!(err.status_code(), status);
        assert_eq!(err.message(), message);
    }

    #[tokio::test]
    async fn missing_or_malformed_header_is_unauthorized() {
        let f = Fixture::new();
        for headers in [
            HeaderMap::new(),
            with_authorization("Basic dXNlcjpwdw=="),
            with_authorization("Bearer "),
            with_authorization("Bearer not-a-token"),
        ] {
            assert_status(
                f.auth.authenticate(&headers, &["users:read"]).await,
                StatusCode::UNAUTHORIZED,
                "Unauthorized",
            );
        }
    }

    #[tokio::test]
    async fn deleted_user_is_unauthorized() {
        let f = Fixture::new();
        let user = f.user("gone@x.com", "USER").await;
        let headers = f.bearer(&user);
        f.db.delete_user(user.id).await.unwrap();

        assert_status(
            f.auth.authenticate(&headers, &[]).await,
            StatusCode::UNAUTHORIZED,
            "User not found",
        );
    }

    #[tokio::test]
    async fn no_requirement_only_needs_identity() {
        let f = Fixture::new();
        let user = f.user("a@x.com", "USER").await;
        let ctx = f.auth.authenticate(&f.bearer(&user), &[]).await.unwrap();
        assert_eq!(ctx.user_id, user.id);
        assert!(ctx.permissions.contains("profile:read"));
    }

    #[tokio::test]
    async fn every_required_permission_must_be_granted() {
        let f = Fixture::new();
        let moderator = f.user("mod@x.com", "MODERATOR").await;
        let headers = f.bearer(&moderator);

        assert!(f
            .auth
            .authenticate(&headers, &["users:read", "users:update"])
            .await
            .is_ok());
        assert_status(
            f.auth
                .authenticate(&headers, &["users:update", "users:delete"])
                .await,
            StatusCode::FORBIDDEN,
            "Forbidden",
        );
    }

    #[tokio::test]
    async fn admin_bypasses_grants() {
        let f = Fixture::new();
        let admin = f
            .db
            .create_user(NewUser {
                email: "root@x.com".to_string(),
                password_hash: "unused".to_string(),
                name: "Root".to_string(),
                role: "ADMIN".to_string(),
            })
            .await
            .unwrap();

        let ctx = f
            .auth
            .authenticate(&f.bearer(&admin), &["reports:export", "users:delete"])
            .await
            .unwrap();
        assert!(ctx.permissions.is_empty());
        assert!(ctx.is_admin());
    }

    #[tokio::test]
    async fn grants_are_read_from_the_store_not_the_token() {
        let f = Fixture::new();
        let user = f.user("a@x.com", "MODERATOR").await;
        let headers = f.bearer(&user);

        PermissionResolver::new(f.db.clone())
            .assign_role_to_user(user.id, "USER")
            .await
            .unwrap();

        assert_status(
            f.auth.authenticate(&headers, &["users:update"]).await,
            StatusCode::FORBIDDEN,
            "Forbidden",
        );
    }
}
