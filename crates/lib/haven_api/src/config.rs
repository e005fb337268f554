//! API server configuration.

use std::time::Duration;

use haven_core::auth::jwt::resolve_signing_secret;
use haven_core::auth::throttle::{DEFAULT_THRESHOLD, DEFAULT_WINDOW};
use haven_core::cache::DEFAULT_CACHE_TTL;

/// Which cache backend to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheDriver {
    /// In-process map. Default; suitable for a single instance.
    Memory,
    /// External Redis service (requires the `redis-cache` feature of
    /// `haven_core`).
    Redis,
}

impl CacheDriver {
    fn parse(raw: &str) -> Self {
        match raw {
            "redis" => CacheDriver::Redis,
            _ => CacheDriver::Memory,
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Transport-token signing secret.
    pub signing_secret: String,
    /// Whether this is a production deployment (`secure` cookies).
    pub production: bool,
    /// Cache backend selection.
    pub cache_driver: CacheDriver,
    /// Redis connection URL (only read when `cache_driver` is `Redis`).
    pub redis_url: String,
    /// Default TTL for cached query results.
    pub cache_ttl: Duration,
    /// Failed-login threshold per `(addr, email)` key.
    pub login_threshold: u32,
    /// Failed-login window.
    pub login_window: Duration,
    /// Email-verification code lifetime, in minutes.
    pub verify_code_ttl_minutes: i64,
    /// Password-reset code lifetime, in minutes.
    pub reset_code_ttl_minutes: i64,
    /// Base URL of the frontend, used in verification/reset links.
    pub frontend_url: String,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                | Default                               |
    /// |-------------------------|---------------------------------------|
    /// | `BIND_ADDR`             | `127.0.0.1:3100`                      |
    /// | `DATABASE_URL`          | `postgres://localhost:5432/haven`     |
    /// | `SIGNING_SECRET` / `JWT_SECRET` | generated & persisted to file |
    /// | `APP_ENV`               | `development`                         |
    /// | `CACHE_DRIVER`          | `memory` (`redis` for the service)    |
    /// | `REDIS_URL`             | `redis://localhost:6379`              |
    /// | `CACHE_TTL`             | `300` (seconds)                       |
    /// | `LOGIN_THRESHOLD`       | `10`                                  |
    /// | `LOGIN_WINDOW_HOURS`    | `24`                                  |
    /// | `VERIFY_CODE_TTL`       | `15` (minutes)                        |
    /// | `RESET_CODE_TTL`        | `120` (minutes)                       |
    /// | `FRONTEND_URL`          | `http://localhost:3000`               |
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_or("BIND_ADDR", "127.0.0.1:3100"),
            database_url: env_or("DATABASE_URL", "postgres://localhost:5432/haven"),
            signing_secret: resolve_signing_secret(),
            production: env_or("APP_ENV", "development") == "production",
            cache_driver: CacheDriver::parse(&env_or("CACHE_DRIVER", "memory")),
            redis_url: env_or("REDIS_URL", "redis://localhost:6379"),
            cache_ttl: Duration::from_secs(env_parsed("CACHE_TTL", DEFAULT_CACHE_TTL.as_secs())),
            login_threshold: env_parsed("LOGIN_THRESHOLD", DEFAULT_THRESHOLD),
            login_window: Duration::from_secs(
                env_parsed("LOGIN_WINDOW_HOURS", DEFAULT_WINDOW.as_secs() / 3600) * 3600,
            ),
            verify_code_ttl_minutes: env_parsed("VERIFY_CODE_TTL", 15),
            reset_code_ttl_minutes: env_parsed("RESET_CODE_TTL", 120),
            frontend_url: env_or("FRONTEND_URL", "http://localhost:3000"),
        }
    }
}
