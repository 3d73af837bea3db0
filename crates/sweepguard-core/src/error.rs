// SPDX-FileCopyrightText: 2026 Sweepguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Sweepguard auto-delete engine.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across Sweepguard adapter traits and core operations.
#[derive(Debug, Error)]
pub enum SweepError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Transport adapter errors (connection failure, malformed update, closed channel).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Classified outcome of a failed platform delete call.
///
/// The transport adapter maps raw platform errors into this taxonomy so the
/// engine never handles platform-specific error types. Transient and
/// rate-limited failures are retried with backoff; permanent ones are not.
#[derive(Debug, Clone, Error)]
pub enum ApiFailure {
    /// The platform asked us to slow down and supplied a wait hint.
    #[error("rate limited, retry after {0:?}")]
    RetryAfter(Duration),

    /// Network trouble, server-side errors, or an unrecognized failure that
    /// is worth retrying.
    #[error("transient API failure: {0}")]
    Transient(String),

    /// The message no longer exists or can never be deleted. Treated as
    /// terminal success so unrecoverable ids cannot loop forever.
    #[error("message already gone or not deletable")]
    AlreadyGone,

    /// The bot lacks the rights to delete in this chat. Terminal failure.
    #[error("insufficient rights: {0}")]
    Forbidden(String),

    /// The platform rejected the batch call itself. The worker falls back to
    /// per-message deletion so one bad id cannot poison its chunk.
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl ApiFailure {
    /// Whether this failure should be retried with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiFailure::RetryAfter(_) | ApiFailure::Transient(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_error_has_all_variants() {
        let _config = SweepError::Config("test".into());
        let _storage = SweepError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _transport = SweepError::Transport {
            message: "test".into(),
            source: None,
        };
        let _timeout = SweepError::Timeout {
            duration: Duration::from_secs(30),
        };
        let _internal = SweepError::Internal("test".into());
    }

    #[test]
    fn retryable_classification() {
        assert!(ApiFailure::RetryAfter(Duration::from_secs(3)).is_retryable());
        assert!(ApiFailure::Transient("bad gateway".into()).is_retryable());
        assert!(!ApiFailure::AlreadyGone.is_retryable());
        assert!(!ApiFailure::Forbidden("not admin".into()).is_retryable());
        assert!(!ApiFailure::BadRequest("invalid id".into()).is_retryable());
    }
}
