use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Shortest signing secret accepted for either token kind.
pub const MIN_SECRET_BYTES: usize = 32;

pub const DEFAULT_PASSWORD_MIN_LENGTH: usize = 8;
/// Upper bound for configured durations: ten years.
pub const MAX_DURATION_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub videos: VideoConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

/// Token signing material. Secrets have no defaults: they must come from the
/// environment and pass [`validate_secret`].
#[derive(Clone)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expires_in: Duration,
    pub jwt_refresh_secret: String,
    pub jwt_refresh_expires_in: Duration,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub password_min_length: usize,
}

// Keep secrets out of `{:?}` output.
impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("jwt_secret", &"<redacted>")
            .field("jwt_expires_in", &self.jwt_expires_in)
            .field("jwt_refresh_secret", &"<redacted>")
            .field("jwt_refresh_expires_in", &self.jwt_refresh_expires_in)
            .field("enable_cors", &self.enable_cors)
            .field("cors_origins", &self.cors_origins)
            .field("password_min_length", &self.password_min_length)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct VideoConfig {
    pub page_size: usize,
    pub fallback_page: PathBuf,
    pub fallback_feed: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup. `from_env` is the
    /// production entry point; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        let defaults = Defaults::for_environment(environment);

        let server = ServerConfig {
            host: lookup("PORTAL_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: match lookup("PORTAL_PORT").or_else(|| lookup("PORT")) {
                Some(v) => parse_number("PORT", &v)?,
                None => 3000,
            },
        };

        let database = DatabaseConfig::from_lookup(&lookup, &defaults)?;
        let security = SecurityConfig::from_lookup(&lookup, &defaults)?;

        let videos = VideoConfig {
            page_size: match lookup("VIDEO_PAGE_SIZE") {
                Some(v) => {
                    let size: usize = parse_number("VIDEO_PAGE_SIZE", &v)?;
                    if size == 0 {
                        return Err(ConfigError::invalid("VIDEO_PAGE_SIZE", "must be positive"));
                    }
                    size
                }
                None => 6,
            },
            fallback_page: lookup("VIDEO_FALLBACK_PAGE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("public/data/page-0.json")),
            fallback_feed: lookup("VIDEO_FALLBACK_FEED")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("public/data/fallback-videos.json")),
        };

        Ok(Self {
            environment,
            server,
            database,
            security,
            videos,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl DatabaseConfig {
    /// Database settings alone, for CLI commands that never sign tokens.
    pub fn from_env() -> Result<Self, ConfigError> {
        let lookup = |key: &str| env::var(key).ok();
        let environment = match lookup("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        };
        Self::from_lookup(&lookup, &Defaults::for_environment(environment))
    }

    fn from_lookup<F>(lookup: &F, defaults: &Defaults) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("PORTAL_STORAGE").as_deref() {
            None | Some("postgres") | Some("postgresql") => StorageBackend::Postgres,
            Some("memory") => StorageBackend::Memory,
            Some(other) => {
                return Err(ConfigError::invalid(
                    "PORTAL_STORAGE",
                    format!("unknown backend '{}'", other),
                ))
            }
        };

        let url = lookup("DATABASE_URL");
        if backend == StorageBackend::Postgres {
            let raw = url.as_deref().ok_or(ConfigError::Missing("DATABASE_URL"))?;
            let parsed = url::Url::parse(raw)
                .map_err(|e| ConfigError::invalid("DATABASE_URL", e.to_string()))?;
            if !matches!(parsed.scheme(), "postgres" | "postgresql") {
                return Err(ConfigError::invalid(
                    "DATABASE_URL",
                    format!("unsupported scheme '{}'", parsed.scheme()),
                ));
            }
        }

        let mut config = Self {
            backend,
            url,
            max_connections: defaults.max_connections,
            connection_timeout: defaults.connection_timeout,
        };

        if let Some(v) = lookup("DATABASE_MAX_CONNECTIONS") {
            config.max_connections = parse_number("DATABASE_MAX_CONNECTIONS", &v)?;
        }
        if let Some(v) = lookup("DATABASE_CONNECTION_TIMEOUT") {
            config.connection_timeout = parse_number("DATABASE_CONNECTION_TIMEOUT", &v)?;
        }

        Ok(config)
    }
}

impl SecurityConfig {
    fn from_lookup<F>(lookup: &F, defaults: &Defaults) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        validate_secret("JWT_SECRET", &jwt_secret)?;

        let jwt_refresh_secret =
            lookup("JWT_REFRESH_SECRET").ok_or(ConfigError::Missing("JWT_REFRESH_SECRET"))?;
        validate_secret("JWT_REFRESH_SECRET", &jwt_refresh_secret)?;

        if jwt_secret == jwt_refresh_secret {
            return Err(ConfigError::invalid(
                "JWT_REFRESH_SECRET",
                "must differ from JWT_SECRET",
            ));
        }

        let jwt_expires_in = match lookup("JWT_EXPIRES_IN") {
            Some(v) => parse_duration("JWT_EXPIRES_IN", &v)?,
            None => Duration::from_secs(7 * 24 * 60 * 60),
        };
        let jwt_refresh_expires_in = match lookup("JWT_REFRESH_EXPIRES_IN") {
            Some(v) => parse_duration("JWT_REFRESH_EXPIRES_IN", &v)?,
            None => Duration::from_secs(30 * 24 * 60 * 60),
        };

        let mut config = Self {
            jwt_secret,
            jwt_expires_in,
            jwt_refresh_secret,
            jwt_refresh_expires_in,
            enable_cors: true,
            cors_origins: defaults.cors_origins.clone(),
            password_min_length: DEFAULT_PASSWORD_MIN_LENGTH,
        };

        if let Some(v) = lookup("SECURITY_ENABLE_CORS") {
            config.enable_cors = v
                .parse()
                .map_err(|_| ConfigError::invalid("SECURITY_ENABLE_CORS", "expected true or false"))?;
        }
        if let Some(v) = lookup("SECURITY_CORS_ORIGINS") {
            config.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(v) = lookup("PASSWORD_MIN_LENGTH") {
            config.password_min_length = parse_number("PASSWORD_MIN_LENGTH", &v)?;
        }

        Ok(config)
    }
}

struct Defaults {
    max_connections: u32,
    connection_timeout: u64,
    cors_origins: Vec<String>,
}

impl Defaults {
    fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Development => Self {
                max_connections: 10,
                connection_timeout: 30,
                cors_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:5173".to_string(),
                ],
            },
            Environment::Staging => Self {
                max_connections: 20,
                connection_timeout: 10,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
            Environment::Production => Self {
                max_connections: 50,
                connection_timeout: 5,
                cors_origins: vec!["https://app.example.com".to_string()],
            },
        }
    }
}

pub fn validate_secret(key: &'static str, secret: &str) -> Result<(), ConfigError> {
    if secret.trim().is_empty() {
        return Err(ConfigError::invalid(key, "must not be empty"));
    }
    if secret.len() < MIN_SECRET_BYTES {
        return Err(ConfigError::invalid(
            key,
            format!("must be at least {} bytes", MIN_SECRET_BYTES),
        ));
    }
    Ok(())
}

/// Parse `30s`, `15m`, `12h`, `7d` or a bare number of seconds.
pub fn parse_duration(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let raw = raw.trim();
    let (digits, multiplier) = match raw.char_indices().last() {
        Some((idx, 's')) => (&raw[..idx], 1),
        Some((idx, 'm')) => (&raw[..idx], 60),
        Some((idx, 'h')) => (&raw[..idx], 60 * 60),
        Some((idx, 'd')) => (&raw[..idx], 24 * 60 * 60),
        Some(_) => (raw, 1),
        None => return Err(ConfigError::invalid(key, "empty duration")),
    };

    let value: u64 = digits
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(key, format!("invalid duration '{}'", raw)))?;
    if value == 0 {
        return Err(ConfigError::invalid(key, "duration must be positive"));
    }

    match value.checked_mul(multiplier) {
        Some(secs) if secs <= MAX_DURATION_SECS => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::invalid(key, "duration exceeds ten years")),
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::invalid(key, format!("invalid number '{}'", raw)))
}
