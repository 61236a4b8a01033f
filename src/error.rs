//! Error types for the thread cache
//!
//! Provides unified error handling using thiserror.

use std::sync::Arc;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the thread cache.
///
/// Errors are `Clone` because a single fetch outcome is shared by every
/// caller coalesced onto that fetch.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// The fetch closure failed (network, auth, upstream error or a panic)
    #[error("Fetch failed: {0}")]
    Fetch(Arc<anyhow::Error>),

    /// A fetch resolved but its value failed validation and no earlier
    /// valid value was available to serve instead
    #[error("Fetched value failed validation")]
    InvalidFetchResult,

    /// A complete-tier fetch was requested for a thread without messages
    #[error("Thread has no messages: {0}")]
    EmptyThread(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Wraps an upstream error as a fetch failure.
    pub fn fetch(err: impl Into<anyhow::Error>) -> Self {
        CacheError::Fetch(Arc::new(err.into()))
    }

    /// Returns true if this error came out of the fetch path rather than
    /// from cache configuration.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            CacheError::Fetch(_) | CacheError::InvalidFetchResult | CacheError::EmptyThread(_)
        )
    }
}

// == Result Type Alias ==
/// Convenience Result type for the thread cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_message() {
        let err = CacheError::fetch(anyhow::anyhow!("connection reset"));
        assert_eq!(err.to_string(), "Fetch failed: connection reset");
        assert!(err.is_fetch_failure());
    }

    #[test]
    fn test_fetch_error_clone_shares_source() {
        let err = CacheError::fetch(anyhow::anyhow!("timeout"));
        let cloned = err.clone();
        match (err, cloned) {
            (CacheError::Fetch(a), CacheError::Fetch(b)) => assert!(Arc::ptr_eq(&a, &b)),
            _ => panic!("expected fetch errors"),
        }
    }

    #[test]
    fn test_config_error_is_not_fetch_failure() {
        let err = CacheError::InvalidConfig("capacity must be positive".to_string());
        assert!(!err.is_fetch_failure());
        assert!(err.to_string().contains("capacity"));
    }
}
