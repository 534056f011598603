#![forbid(unsafe_code)]

use std::time::Duration;

pub const DB_FILE_ENV: &str = "CRM_CACHE_DB_FILE";
pub const BUSY_TIMEOUT_ENV: &str = "CRM_CACHE_BUSY_TIMEOUT_MS";

const DEFAULT_DB_FILE: &str = "crm_cache.db";
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreOptions {
    pub db_file_name: String,
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            db_file_name: DEFAULT_DB_FILE.to_string(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

impl StoreOptions {
    /// Defaults overlaid with non-empty environment overrides.
    pub fn from_env() -> Self {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(raw) = lookup(DB_FILE_ENV)
            && !raw.trim().is_empty()
        {
            self.db_file_name = raw.trim().to_string();
        }
        if let Some(ms) = lookup(BUSY_TIMEOUT_ENV).and_then(|raw| raw.trim().parse::<u64>().ok()) {
            self.busy_timeout = Duration::from_millis(ms);
        }
        self
    }
}
