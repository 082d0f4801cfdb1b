//! API server configuration.

use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;

use chatop_core::auth::jwt::{DEFAULT_TOKEN_TTL_SECS, MAX_TOKEN_TTL_SECS, resolve_jwt_secret};
use chatop_core::auth::password::{BCRYPT_COST_RANGE, DEFAULT_BCRYPT_COST};
use chatop_core::uploads::DEFAULT_MAX_UPLOAD_BYTES;
use thiserror::Error;
use tracing::warn;

/// Paths reachable without a bearer token. `/**` matches the prefix and
/// everything below it.
pub const DEFAULT_PUBLIC_PATHS: &[&str] = &[
    "/auth/register",
    "/auth/login",
    "/uploads/**",
    "/swagger-ui/**",
    "/swagger-ui.html",
    "/v3/api-docs",
    "/v3/api-docs/**",
    "/swagger-resources/**",
    "/webjars/**",
];

/// Configuration that cannot be served.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JWT_TTL_SECS must be between 1 and {MAX_TOKEN_TTL_SECS}, got {0}")]
    TokenTtl(i64),

    #[error("BCRYPT_COST must be between 4 and 31, got {0}")]
    BcryptCost(u32),

    #[error("Could not prepare upload directory: {0}")]
    UploadDir(#[from] std::io::Error),
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3001").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// JWT signing secret.
    pub jwt_secret: String,
    /// Bearer token lifetime in seconds.
    pub token_ttl_secs: i64,
    /// bcrypt work factor.
    pub bcrypt_cost: u32,
    /// Directory uploaded images are written to.
    pub upload_dir: PathBuf,
    /// Base used to build public upload URLs.
    pub public_base_url: String,
    /// Largest accepted upload in bytes.
    pub max_upload_bytes: u64,
    /// Browser origins allowed by CORS.
    pub cors_allowed_origins: Vec<String>,
    /// Route patterns that bypass the authentication requirement.
    pub public_paths: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3001".into(),
            pg_connection_url: "postgres://localhost:5432/chatop".into(),
            jwt_secret: String::new(),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            upload_dir: PathBuf::from("uploads"),
            public_base_url: "http://localhost:3001".into(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            cors_allowed_origins: vec!["http://localhost:4200".into()],
            public_paths: DEFAULT_PUBLIC_PATHS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable               | Default                                |
    /// |------------------------|----------------------------------------|
    /// | `BIND_ADDR`            | `127.0.0.1:3001`                       |
    /// | `DATABASE_URL`         | `postgres://localhost:5432/chatop`     |
    /// | `JWT_SECRET` / `AUTH_SECRET` | generated & persisted to file    |
    /// | `JWT_TTL_SECS`         | `86400`                                |
    /// | `BCRYPT_COST`          | `10`                                   |
    /// | `UPLOAD_DIR`           | `uploads`                              |
    /// | `PUBLIC_BASE_URL`      | `http://localhost:3001`                |
    /// | `MAX_UPLOAD_BYTES`     | `10485760`                             |
    /// | `CORS_ALLOWED_ORIGINS` | `http://localhost:4200`                |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            pg_connection_url: std::env::var("DATABASE_URL")
                .unwrap_or(defaults.pg_connection_url),
            jwt_secret: resolve_jwt_secret(),
            token_ttl_secs: env_parse_within(
                "JWT_TTL_SECS",
                defaults.token_ttl_secs,
                1..=MAX_TOKEN_TTL_SECS,
            ),
            bcrypt_cost: env_parse_within("BCRYPT_COST", defaults.bcrypt_cost, BCRYPT_COST_RANGE),
            upload_dir: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or(defaults.public_base_url),
            max_upload_bytes: env_parse("MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
            cors_allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.cors_allowed_origins),
            public_paths: defaults.public_paths,
        }
    }

    /// Reject values that would fail every registration or login.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_TOKEN_TTL_SECS).contains(&self.token_ttl_secs) {
            return Err(ConfigError::TokenTtl(self.token_ttl_secs));
        }
        if !BCRYPT_COST_RANGE.contains(&self.bcrypt_cost) {
            return Err(ConfigError::BcryptCost(self.bcrypt_cost));
        }
        Ok(())
    }
}

/// Like [`env_parse`], but also falls back to `default` outside `range`.
fn env_parse_within<T>(key: &str, default: T, range: RangeInclusive<T>) -> T
where
    T: FromStr + Copy + PartialOrd + std::fmt::Display,
{
    let value = env_parse(key, default);
    if range.contains(&value) {
        value
    } else {
        warn!(key, %value, %default, "value out of range, using default");
        default
    }
}

/// Parse `key` from the environment, keeping `default` when unset or invalid.
fn env_parse<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, %default, "invalid value, using default");
            default
        }),
        Err(_) => default,
    }
}

/// Split a comma-separated list, dropping blanks.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
