//! Runtime configuration from the environment (and `.env`).

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_DATABASE_URL: &str = "pushup_counter.db";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_POSE_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Selects the in-memory session store instead of a SQLite file.
pub const MEMORY_DATABASE_URL: &str = ":memory:";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub pose_service_url: Option<String>,
    pub pose_timeout: Duration,
    pub max_body_bytes: usize,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            pose_service_url: None,
            pose_timeout: Duration::from_millis(DEFAULT_POSE_TIMEOUT_MS),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let pose_timeout = match non_empty("POSE_TIMEOUT_MS") {
            Some(raw) => Duration::from_millis(
                raw.trim()
                    .parse()
                    .with_context(|| format!("POSE_TIMEOUT_MS is not a number: {}", raw))?,
            ),
            None => defaults.pose_timeout,
        };
        let max_body_bytes = match non_empty("REPCOUNT_MAX_BODY_BYTES") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("REPCOUNT_MAX_BODY_BYTES is not a number: {}", raw))?,
            None => defaults.max_body_bytes,
        };

        Ok(Self {
            database_url: non_empty("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_addr: non_empty("REPCOUNT_BIND").unwrap_or(defaults.bind_addr),
            pose_service_url: non_empty("POSE_SERVICE_URL"),
            pose_timeout,
            max_body_bytes,
            log_level: non_empty("REPCOUNT_LOG").unwrap_or(defaults.log_level),
        })
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url == MEMORY_DATABASE_URL
    }
}
