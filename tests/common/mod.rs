#![allow(dead_code)]

use std::collections::HashMap;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use assembly_portal::auth::hash_password;
use assembly_portal::config::AppConfig;
use assembly_portal::database::models::NewUser;
use assembly_portal::database::{MemoryDatabase, UserRepository};
use assembly_portal::rbac::PermissionResolver;
use assembly_portal::{app, AppState};

pub const ACCESS_SECRET: &str = "test-access-secret-0123456789abcdef";
pub const REFRESH_SECRET: &str = "test-refresh-secret-0123456789abcdef";
pub const PASSWORD: &str = "Secret123";

fn base_env() -> Vec<(&'static str, String)> {
    vec![
        ("PORTAL_STORAGE", "memory".to_string()),
        ("JWT_SECRET", ACCESS_SECRET.to_string()),
        ("JWT_REFRESH_SECRET", REFRESH_SECRET.to_string()),
        ("SECURITY_ENABLE_CORS", "false".to_string()),
    ]
}

pub fn test_config(extra: &[(&str, &str)]) -> AppConfig {
    let mut env: HashMap<String, String> = base_env()
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    for (k, v) in extra {
        env.insert(k.to_string(), v.to_string());
    }
    AppConfig::from_lookup(|key| env.get(key).cloned()).expect("test configuration is valid")
}

/// Router over a fresh in-memory store, plus the store for direct seeding.
pub struct TestApp {
    pub router: Router,
    pub db: Arc<MemoryDatabase>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config(&[]))
    }

    pub fn with_config(config: AppConfig) -> Self {
        let db = Arc::new(MemoryDatabase::new());
        let router = app(AppState::new(db.clone(), config));
        Self { router, db }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, token, body).await
    }

    /// Store a user with `role` and that role's grants, bypassing the API.
    pub async fn seed_user(&self, email: &str, role: &str) -> uuid::Uuid {
        let user = self
            .db
            .create_user(NewUser {
                email: email.to_string(),
                password_hash: hash_password(PASSWORD).unwrap(),
                name: email.split('@').next().unwrap_or(email).to_string(),
                role: role.to_string(),
            })
            .await
            .unwrap();
        PermissionResolver::new(self.db.clone())
            .assign_role_to_user(user.id, role)
            .await
            .unwrap();
        user.id
    }

    pub async fn login(&self, email: &str) -> String {
        let (status, body) = self
            .post(
                "/api/auth/login",
                None,
                serde_json::json!({"email": email, "password": PASSWORD}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn seed_and_login(&self, email: &str, role: &str) -> (uuid::Uuid, String) {
        let id = self.seed_user(email, role).await;
        (id, self.login(email).await)
    }
}

/// The built server binary on a free port with in-memory storage. Killed on
/// drop.
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut cmd = Command::new(env!("CARGO_BIN_EXE_assembly-portal"));
        cmd.env("PORTAL_PORT", port.to_string())
            .env("PORTAL_HOST", "127.0.0.1")
            .env("VIDEO_FALLBACK_PAGE", "does-not-exist/page-0.json")
            .env("RUST_LOG", "warn")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        for (key, value) in base_env() {
            cmd.env(key, value);
        }

        let child = cmd.spawn().context("failed to spawn server binary")?;
        let server = Self {
            port,
            base_url,
            child,
        };
        server.wait_ready(Duration::from_secs(10)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        let url = format!("{}/health", self.base_url);
        while Instant::now() < deadline {
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == reqwest::StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
