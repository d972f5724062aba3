//! Database configuration.

use crate::error::{OrmError, OrmResult};
use std::time::Duration;

/// Default pool size when `DATABASE_POOL_MAX` is not set.
pub const DEFAULT_MAX_SIZE: usize = 16;

/// Connection and pool settings.
///
/// ```ignore
/// let config = DatabaseConfig::new("postgres://app@localhost/app")
///     .max_size(32)
///     .wait_timeout(Duration::from_secs(5));
/// let db = Database::connect(&config)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_size: usize,
    /// How long `acquire` waits for a free connection. `None` waits forever.
    pub wait_timeout: Option<Duration>,
    pub create_timeout: Option<Duration>,
    pub recycle_timeout: Option<Duration>,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_size: DEFAULT_MAX_SIZE,
            wait_timeout: None,
            create_timeout: None,
            recycle_timeout: None,
        }
    }

    /// Load from the process environment, reading `.env` first if present.
    ///
    /// - `DATABASE_URL` (required)
    /// - `DATABASE_POOL_MAX` (default 16)
    /// - `DATABASE_POOL_TIMEOUT_MS` (optional; applied as the wait timeout)
    pub fn from_env() -> OrmResult<Self> {
        // a missing .env file is fine
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> OrmResult<Self> {
        let url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| OrmError::config("DATABASE_URL is not set"))?;
        let mut config = Self::new(url);

        if let Some(raw) = lookup("DATABASE_POOL_MAX") {
            config.max_size = raw.trim().parse().map_err(|_| {
                OrmError::config(format!("DATABASE_POOL_MAX must be a positive integer, got '{raw}'"))
            })?;
            if config.max_size == 0 {
                return Err(OrmError::config("DATABASE_POOL_MAX must be greater than 0"));
            }
        }
        if let Some(raw) = lookup("DATABASE_POOL_TIMEOUT_MS") {
            let ms: u64 = raw.trim().parse().map_err(|_| {
                OrmError::config(format!("DATABASE_POOL_TIMEOUT_MS must be milliseconds, got '{raw}'"))
            })?;
            config.wait_timeout = Some(Duration::from_millis(ms));
        }
        Ok(config)
    }

    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }

    pub fn create_timeout(mut self, timeout: Duration) -> Self {
        self.create_timeout = Some(timeout);
        self
    }

    pub fn recycle_timeout(mut self, timeout: Duration) -> Self {
        self.recycle_timeout = Some(timeout);
        self
    }

    pub(crate) fn has_timeouts(&self) -> bool {
        self.wait_timeout.is_some() || self.create_timeout.is_some() || self.recycle_timeout.is_some()
    }
}
