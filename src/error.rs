//! StorageError - one error channel for every backend
//!
//! TigerStyle: "nothing matched" is never an error. Operations that find no
//! rows return `Ok(None)` or `Ok(false)`; everything in [`StoreError`] is a
//! real failure.

use thiserror::Error;

/// Boxed underlying cause of a backend failure.
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by drivers, the factory, and the transaction coordinator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Empty or malformed input: empty record, missing required conditions,
    /// mismatched bulk-item shapes, illegal identifiers.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown backend kind or missing connection settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Network, lock, or throttling failure that may succeed on retry.
    #[error("transient backend error: {message}")]
    TransientBackend {
        /// What was being attempted.
        message: String,
        /// Native driver error.
        #[source]
        source: Option<BoxedSource>,
    },

    /// A transaction action carried an unrecognized tag.
    #[error("invalid transaction action: {0}")]
    InvalidAction(String),

    /// Any other native driver failure.
    #[error("backend error: {message}")]
    Backend {
        /// What was being attempted.
        message: String,
        /// Native driver error.
        #[source]
        source: Option<BoxedSource>,
    },
}

impl StoreError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create an invalid action error.
    pub fn invalid_action(message: impl Into<String>) -> Self {
        Self::InvalidAction(message.into())
    }

    /// Create a transient backend error without a native cause.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::TransientBackend {
            message: message.into(),
            source: None,
        }
    }

    /// Create a transient backend error wrapping a native cause.
    pub fn transient_from(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::TransientBackend {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an opaque backend error without a native cause.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            source: None,
        }
    }

    /// Create an opaque backend error wrapping a native cause.
    pub fn backend_from(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Backend {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether the retry policy may try again after this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientBackend { .. })
    }
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_errors_are_retryable() {
        assert!(StoreError::transient("lock wait timeout").is_retryable());
        assert!(!StoreError::validation("empty record").is_retryable());
        assert!(!StoreError::configuration("no host").is_retryable());
        assert!(!StoreError::invalid_action("upsert").is_retryable());
        assert!(!StoreError::backend("syntax error").is_retryable());
    }

    #[test]
    fn test_error_messages() {
        let err = StoreError::validation("conditions cannot be empty");
        assert_eq!(err.to_string(), "validation error: conditions cannot be empty");

        let err = StoreError::transient_from(
            "get failed",
            std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"),
        );
        assert_eq!(err.to_string(), "transient backend error: get failed");
        assert!(std::error::Error::source(&err).is_some());
    }
}
