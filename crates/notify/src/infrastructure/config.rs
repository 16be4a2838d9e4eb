//! Notification layer configuration

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

/// Where unclaimed results are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Process lifetime only
    Memory,
    /// JSON file, survives restarts
    File,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(StorageBackend::Memory),
            "file" | "json" => Ok(StorageBackend::File),
            other => anyhow::bail!("unknown storage backend '{}', expected memory or file", other),
        }
    }
}

/// Configuration loaded from environment
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    /// How long an unclaimed result stays claimable
    pub pending_ttl: Duration,
    /// Upper bound on unclaimed results; the oldest is evicted beyond it
    pub pending_max_entries: usize,
    /// Generation flags older than this are released by the maintenance sweep
    pub generation_stale_after: Duration,
    /// Maintenance sweep interval
    pub maintenance_interval: Duration,
    /// How many delivered request ids are remembered for double-delivery detection
    pub delivery_window: usize,
    /// Storage backend for unclaimed results
    pub storage_backend: StorageBackend,
    /// JSON file path for the file backend (platform default if unset)
    pub storage_path: Option<PathBuf>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            pending_ttl: Duration::from_secs(24 * 60 * 60),
            pending_max_entries: 256,
            generation_stale_after: Duration::from_secs(30 * 60),
            maintenance_interval: Duration::from_secs(60),
            delivery_window: 512,
            storage_backend: StorageBackend::Memory,
            storage_path: None,
        }
    }
}

impl NotifyConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset variables fall back to defaults; malformed values are errors.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            pending_ttl: Duration::from_secs(parse_var(
                "LOOKBOOK_PENDING_TTL_SECONDS",
                defaults.pending_ttl.as_secs(),
            )?),
            pending_max_entries: parse_var(
                "LOOKBOOK_PENDING_MAX_ENTRIES",
                defaults.pending_max_entries,
            )?,
            generation_stale_after: Duration::from_secs(parse_var(
                "LOOKBOOK_GENERATION_STALE_SECONDS",
                defaults.generation_stale_after.as_secs(),
            )?),
            maintenance_interval: Duration::from_secs(parse_var(
                "LOOKBOOK_MAINTENANCE_INTERVAL_SECONDS",
                defaults.maintenance_interval.as_secs(),
            )?),
            delivery_window: parse_var("LOOKBOOK_DELIVERY_WINDOW", defaults.delivery_window)?,
            storage_backend: parse_var("LOOKBOOK_STORAGE_BACKEND", defaults.storage_backend)?,
            storage_path: env::var("LOOKBOOK_STORAGE_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| anyhow::anyhow!("{}", e))
            .with_context(|| format!("{} has an invalid value '{}'", name, raw)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_backend_parsing() {
        assert_eq!("memory".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert_eq!(" FILE ".parse::<StorageBackend>().unwrap(), StorageBackend::File);
        assert!("redis".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn parse_var_uses_default_when_unset() {
        let value: u64 = parse_var("LOOKBOOK_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn parse_var_rejects_malformed_values() {
        env::set_var("LOOKBOOK_TEST_MALFORMED_VARIABLE", "soon");
        let result: Result<u64> = parse_var("LOOKBOOK_TEST_MALFORMED_VARIABLE", 1);
        env::remove_var("LOOKBOOK_TEST_MALFORMED_VARIABLE");

        let err = result.unwrap_err();
        assert!(format!("{:#}", err).contains("LOOKBOOK_TEST_MALFORMED_VARIABLE"));
    }

    #[test]
    fn defaults_are_bounded() {
        let config = NotifyConfig::default();
        assert!(config.pending_max_entries > 0);
        assert!(config.delivery_window > 0);
        assert_eq!(config.storage_backend, StorageBackend::Memory);
    }
}
