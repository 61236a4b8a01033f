//! Configuration Module
//!
//! Handles loading and managing thread cache configuration from environment variables.

use std::env;
use std::time::Duration;

use crate::cache::DEFAULT_CAPACITY;
use crate::error::{CacheError, Result};

/// Upper bound for every freshness window, in seconds (one year).
pub const MAX_WINDOW_SECS: u64 = 365 * 24 * 60 * 60;

// == Cell Config ==
/// Freshness settings for a single TTL cell, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellConfig {
    /// How long a fetched value stays fresh
    pub max_age: Duration,
    /// Lead time before expiry at which a background refresh starts
    pub early_refresh_lead: Option<Duration>,
    /// Window after expiry during which the stale value is still served
    /// while a refresh runs
    pub stale_grace: Option<Duration>,
}

impl CellConfig {
    /// Creates a config with only a max age.
    pub fn new(max_age: Duration) -> Self {
        Self {
            max_age,
            early_refresh_lead: None,
            stale_grace: None,
        }
    }

    /// Checks that the windows are positive where required and bounded.
    pub fn validate(&self) -> Result<()> {
        if self.max_age.is_zero() {
            return Err(CacheError::InvalidConfig(
                "max_age must be positive".to_string(),
            ));
        }
        let bound = Duration::from_secs(MAX_WINDOW_SECS);
        let windows = [
            ("max_age", Some(self.max_age)),
            ("early_refresh_lead", self.early_refresh_lead),
            ("stale_grace", self.stale_grace),
        ];
        for (name, window) in windows {
            if window.map_or(false, |w| w > bound) {
                return Err(CacheError::InvalidConfig(format!(
                    "{} must not exceed {} seconds",
                    name, MAX_WINDOW_SECS
                )));
            }
        }
        Ok(())
    }

    pub fn with_early_refresh(mut self, lead: Duration) -> Self {
        self.early_refresh_lead = Some(lead);
        self
    }

    pub fn with_stale_grace(mut self, grace: Duration) -> Self {
        self.stale_grace = Some(grace);
        self
    }
}

impl Default for CellConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

/// Thread cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of threads held in the cache
    pub capacity: usize,
    /// Freshness window in seconds
    pub max_age: u64,
    /// Early refresh lead in seconds, None = disabled
    pub early_refresh_lead: Option<u64>,
    /// Stale grace window in seconds, None = disabled
    pub stale_grace: Option<u64>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `THREAD_CACHE_CAPACITY` - Maximum cached threads (default: 100)
    /// - `THREAD_CACHE_MAX_AGE` - Freshness window in seconds (default: 300)
    /// - `THREAD_CACHE_EARLY_REFRESH` - Early refresh lead in seconds (default: unset)
    /// - `THREAD_CACHE_STALE_GRACE` - Stale grace window in seconds (default: unset)
    ///
    /// A value of 0 for the two optional windows disables them.
    pub fn from_env() -> Self {
        Self {
            capacity: env::var("THREAD_CACHE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_CAPACITY),
            max_age: env::var("THREAD_CACHE_MAX_AGE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            early_refresh_lead: optional_secs("THREAD_CACHE_EARLY_REFRESH"),
            stale_grace: optional_secs("THREAD_CACHE_STALE_GRACE"),
        }
    }

    /// Checks that the configuration describes a usable cache.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "capacity must be positive".to_string(),
            ));
        }
        self.cell_config().validate()
    }

    /// Builds the per-thread cell configuration.
    pub fn cell_config(&self) -> CellConfig {
        CellConfig {
            max_age: Duration::from_secs(self.max_age),
            early_refresh_lead: self.early_refresh_lead.map(Duration::from_secs),
            stale_grace: self.stale_grace.map(Duration::from_secs),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            max_age: 300,
            early_refresh_lead: None,
            stale_grace: None,
        }
    }
}

fn optional_secs(name: &str) -> Option<u64> {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|secs| *secs > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.capacity, 100);
        assert_eq!(config.max_age, 300);
        assert!(config.early_refresh_lead.is_none());
        assert!(config.stale_grace.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("THREAD_CACHE_CAPACITY");
        env::remove_var("THREAD_CACHE_MAX_AGE");
        env::remove_var("THREAD_CACHE_EARLY_REFRESH");
        env::remove_var("THREAD_CACHE_STALE_GRACE");

        let config = Config::from_env();
        assert_eq!(config.capacity, 100);
        assert_eq!(config.max_age, 300);
        assert!(config.early_refresh_lead.is_none());
        assert!(config.stale_grace.is_none());
    }

    #[test]
    fn test_config_validate_rejects_zero_capacity() {
        let config = Config {
            capacity: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CacheError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_config_validate_rejects_zero_max_age() {
        let config = Config {
            max_age: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cell_config_conversion() {
        let config = Config {
            capacity: 10,
            max_age: 60,
            early_refresh_lead: Some(5),
            stale_grace: Some(30),
        };
        let cell = config.cell_config();
        assert_eq!(cell.max_age, Duration::from_secs(60));
        assert_eq!(cell.early_refresh_lead, Some(Duration::from_secs(5)));
        assert_eq!(cell.stale_grace, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_config_validate_window_bounds() {
        let at_bound = Config {
            max_age: MAX_WINDOW_SECS,
            early_refresh_lead: Some(MAX_WINDOW_SECS),
            stale_grace: Some(MAX_WINDOW_SECS),
            ..Config::default()
        };
        assert!(at_bound.validate().is_ok());

        let oversized = [
            Config {
                max_age: u64::MAX,
                ..Config::default()
            },
            Config {
                early_refresh_lead: Some(u64::MAX),
                ..Config::default()
            },
            Config {
                stale_grace: Some(MAX_WINDOW_SECS + 1),
                ..Config::default()
            },
        ];
        for config in oversized {
            assert!(matches!(
                config.validate(),
                Err(CacheError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_cell_config_validate() {
        assert!(CellConfig::default().validate().is_ok());
        assert!(CellConfig::new(Duration::ZERO).validate().is_err());
        assert!(CellConfig::new(Duration::MAX).validate().is_err());
        assert!(CellConfig::default()
            .with_stale_grace(Duration::MAX)
            .validate()
            .is_err());
    }

    #[test]
    fn test_cell_config_builders() {
        let cell = CellConfig::new(Duration::from_millis(1000))
            .with_early_refresh(Duration::from_millis(100))
            .with_stale_grace(Duration::from_millis(500));
        assert_eq!(cell.early_refresh_lead, Some(Duration::from_millis(100)));
        assert_eq!(cell.stale_grace, Some(Duration::from_millis(500)));
    }
}
