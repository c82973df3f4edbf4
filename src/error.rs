//! Crate-wide error type
//!
//! Every fallible operation in the counter returns `CounterResult<T>`.
//! Cycle-level callers (service, scheduler) catch these at the cycle
//! boundary and log them; none of them are fatal to the process.

use thiserror::Error;

pub type CounterResult<T> = Result<T, CounterError>;

#[derive(Debug, Error)]
pub enum CounterError {
    /// Daily API budget used up. Recoverable on the next cycle after the
    /// window rolls over.
    #[error("analytics API quota of {limit} requests reached (window resets in {resets_in_secs}s)")]
    QuotaExceeded { limit: u64, resets_in_secs: i64 },

    /// Transport failure, timeout, or an empty/malformed remote payload
    #[error("remote fetch failed: {0}")]
    RemoteFetch(String),

    /// Credentials rejected by the analytics service
    #[error("analytics authentication failed: {0}")]
    Auth(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

impl CounterError {
    /// True for failures that the next scheduled cycle may clear on its own
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CounterError::QuotaExceeded { .. } | CounterError::RemoteFetch(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_error_display() {
        let err = CounterError::QuotaExceeded {
            limit: 10_000,
            resets_in_secs: 3600,
        };
        assert_eq!(
            err.to_string(),
            "analytics API quota of 10000 requests reached (window resets in 3600s)"
        );
        assert!(err.is_transient());
    }

    #[test]
    fn test_auth_is_not_transient() {
        let err = CounterError::Auth("invalid_grant".to_string());
        assert!(!err.is_transient());
        assert!(err.to_string().contains("invalid_grant"));
    }
}
