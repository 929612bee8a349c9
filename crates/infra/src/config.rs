//! Configuration loading from environment variables.

use std::time::Duration;

use thiserror::Error;

use crate::retry::RetryPolicy;

pub const ENV_MAX_RETRIES: &str = "STOCKBOOK_MAX_RETRIES";
pub const ENV_RETRY_BASE_MS: &str = "STOCKBOOK_RETRY_BASE_MS";
pub const ENV_RETRY_MAX_MS: &str = "STOCKBOOK_RETRY_MAX_MS";
pub const ENV_USE_PERSISTENT_STORES: &str = "USE_PERSISTENT_STORES";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be set when {reason}")]
    Missing { var: &'static str, reason: &'static str },

    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Engine tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Retry policy applied to transaction conflicts.
    pub retry: RetryPolicy,
    /// Digits in generated document codes (`PO-000001` has width 6).
    pub code_width: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            code_width: 6,
        }
    }
}

impl EngineConfig {
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_code_width(mut self, code_width: usize) -> Self {
        self.code_width = code_width;
        self
    }

    /// Defaults overridden by `STOCKBOOK_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(max) = parse::<u32>(&lookup, ENV_MAX_RETRIES)? {
            config.retry.max_retries = max;
        }
        if let Some(ms) = parse::<u64>(&lookup, ENV_RETRY_BASE_MS)? {
            config.retry.base_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse::<u64>(&lookup, ENV_RETRY_MAX_MS)? {
            config.retry.max_delay = Duration::from_millis(ms);
        }
        if config.retry.max_delay < config.retry.base_delay {
            config.retry.max_delay = config.retry.base_delay;
        }
        Ok(config)
    }
}

/// Which store backs the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    InMemory,
    Postgres { database_url: String },
}

impl StoreConfig {
    /// `USE_PERSISTENT_STORES=true` selects Postgres at `DATABASE_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let persistent = parse::<bool>(&lookup, ENV_USE_PERSISTENT_STORES)?.unwrap_or(false);
        if !persistent {
            return Ok(StoreConfig::InMemory);
        }
        match lookup(ENV_DATABASE_URL).filter(|url| !url.trim().is_empty()) {
            Some(database_url) => Ok(StoreConfig::Postgres { database_url }),
            None => Err(ConfigError::Missing {
                var: ENV_DATABASE_URL,
                reason: "USE_PERSISTENT_STORES=true",
            }),
        }
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn engine_defaults_without_env() {
        let config = EngineConfig::from_lookup(env(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.code_width, 6);
    }

    #[test]
    fn engine_reads_retry_overrides() {
        let config = EngineConfig::from_lookup(env(&[
            (ENV_MAX_RETRIES, "2"),
            (ENV_RETRY_BASE_MS, "50"),
            (ENV_RETRY_MAX_MS, "10"),
        ]))
        .unwrap();
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.base_delay, Duration::from_millis(50));
        assert_eq!(config.retry.max_delay, Duration::from_millis(50));
    }

    #[test]
    fn engine_rejects_garbage() {
        let err = EngineConfig::from_lookup(env(&[(ENV_MAX_RETRIES, "many")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                var: ENV_MAX_RETRIES,
                value: "many".into()
            }
        );
    }

    #[test]
    fn store_defaults_to_in_memory() {
        assert_eq!(StoreConfig::from_lookup(env(&[])).unwrap(), StoreConfig::InMemory);
        assert_eq!(
            StoreConfig::from_lookup(env(&[(ENV_USE_PERSISTENT_STORES, "false")])).unwrap(),
            StoreConfig::InMemory
        );
    }

    #[test]
    fn persistent_store_requires_database_url() {
        let err = StoreConfig::from_lookup(env(&[(ENV_USE_PERSISTENT_STORES, "true")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { var: ENV_DATABASE_URL, .. }));

        let config = StoreConfig::from_lookup(env(&[
            (ENV_USE_PERSISTENT_STORES, "true"),
            (ENV_DATABASE_URL, "postgres://localhost/stockbook"),
        ]))
        .unwrap();
        assert_eq!(
            config,
            StoreConfig::Postgres {
                database_url: "postgres://localhost/stockbook".into()
            }
        );
    }
}
