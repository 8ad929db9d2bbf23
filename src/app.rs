use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post, put},
    Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::config::SecurityConfig;
use crate::handlers::{protected, public};
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.security);

    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_public_routes())
        .merge(video_routes())
        // Protected
        .merge(user_routes())
        .merge(role_routes())
        // Global middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if !security.enable_cors {
        return CorsLayer::new();
    }
    if security.cors_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::permissive().allow_origin(origins)
}

fn auth_public_routes() -> Router<AppState> {
    use public::auth;

    Router::new()
        .route("/api/auth/login", post(auth::login_post))
        .route("/api/auth/register", post(auth::register_post))
        .route("/api/auth/refresh", post(auth::refresh_post))
}

fn video_routes() -> Router<AppState> {
    use public::videos;

    Router::new()
        .route("/api/videos", get(videos::videos_get))
        .route("/api/fallback-videos", get(videos::fallback_videos_get))
}

fn user_routes() -> Router<AppState> {
    use protected::{profile, users};

    Router::new()
        .route(
            "/api/user/profile",
            get(profile::profile_get).put(profile::profile_put),
        )
        .route(
            "/api/user",
            get(users::users_get)
                .post(users::users_post)
                .put(users::users_put)
                .delete(users::users_delete),
        )
}

fn role_routes() -> Router<AppState> {
    use protected::{permissions, roles};

    Router::new()
        .route("/api/roles", get(roles::roles_get).post(roles::roles_post))
        .route(
            "/api/roles/:id",
            put(roles::roles_put).delete(roles::roles_delete),
        )
        .route("/api/permissions", get(permissions::permissions_get))
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "name": "Assembly Portal API",
        "version": version,
        "description": "Accounts, roles and the public video feed for the assembly portal",
        "endpoints": {
            "home": "/ (public)",
            "health": "/health (public)",
            "auth": "/api/auth/login, /api/auth/register, /api/auth/refresh (public - token acquisition)",
            "videos": "/api/videos, /api/fallback-videos (public)",
            "profile": "/api/user/profile (protected)",
            "users": "/api/user (protected - users:read|create|update|delete)",
            "roles": "/api/roles[/:id], /api/permissions (protected - roles:*)",
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.db.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "database": "ok"
            })),
        ),
        Err(e) => {
            warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "timestamp": now,
                    "database": "unavailable"
                })),
            )
        }
    }
}
