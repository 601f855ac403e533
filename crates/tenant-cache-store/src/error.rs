//! Error types for the store.

use tenant_cache_core::CoreError;
use thiserror::Error;

/// A result type using `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No object is stored under the key.
    #[error("object not found: {key}")]
    NotFound {
        /// The key that missed.
        key: String,
    },

    /// The stored version differs from the version the caller expected.
    #[error("version conflict on {key}: expected {expected:?}, found {found:?}")]
    VersionConflict {
        /// The contested key.
        key: String,
        /// The version the caller expected.
        expected: String,
        /// The version currently stored, if any.
        found: Option<String>,
    },

    /// The object cannot be indexed.
    #[error("invalid object: {0}")]
    InvalidObject(String),

    /// A key could not be formed.
    #[error("malformed key {key:?}: {reason}")]
    MalformedKey {
        /// The offending key.
        key: String,
        /// Why the key was rejected.
        reason: &'static str,
    },
}

impl StoreError {
    /// Returns true if the error is a cache miss.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<CoreError> for StoreError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::MalformedKey { key, reason } => Self::MalformedKey { key, reason },
            other => Self::InvalidObject(other.to_string()),
        }
    }
}
