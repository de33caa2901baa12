use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use softlock_db::{DEFAULT_LOCK_CAPACITY, DbConfig};

pub struct Config {
    pub db_path: PathBuf,
    pub db: DbConfig,
}

impl Config {
    /// Reads `SOFTLOCK_*` variables from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path: PathBuf = lookup("SOFTLOCK_DB_PATH")
            .unwrap_or_else(|| "database.sqlite".into())
            .into();
        let lock_capacity: u64 = match lookup("SOFTLOCK_LOCK_CAPACITY") {
            Some(v) => v
                .parse()
                .context("SOFTLOCK_LOCK_CAPACITY must be a number")?,
            None => DEFAULT_LOCK_CAPACITY,
        };
        let busy_timeout_ms: u64 = match lookup("SOFTLOCK_BUSY_TIMEOUT_MS") {
            Some(v) => v
                .parse()
                .context("SOFTLOCK_BUSY_TIMEOUT_MS must be a number")?,
            None => 5000,
        };

        Ok(Self {
            db_path,
            db: DbConfig {
                lock_capacity,
                busy_timeout: Duration::from_millis(busy_timeout_ms),
            },
        })
    }
}
