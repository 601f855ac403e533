//! Error types for the informer layer.

use tenant_cache_core::CoreError;
use tenant_cache_store::StoreError;
use thiserror::Error;

/// Errors returned by listers and informers.
#[derive(Debug, Error)]
pub enum InformerError {
    /// No object is stored under the key.
    #[error("{kind} not found: {key}")]
    NotFound {
        /// Kind the lister serves.
        kind: &'static str,
        /// Lookup key.
        key: String,
    },

    /// The lookup key could not be formed.
    #[error("malformed key {key:?}: {reason}")]
    MalformedKey {
        /// The offending key.
        key: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// A stored object does not decode as the kind the lister serves.
    ///
    /// This means the store was fed by the wrong source and is fatal for the cache.
    #[error("store corruption for {kind} at {key}: {reason}")]
    StoreCorruption {
        /// Kind the lister serves.
        kind: &'static str,
        /// Key of the object that failed to decode.
        key: String,
        /// Decoder message.
        reason: String,
    },

    /// The object handed to the cache is invalid.
    #[error("invalid object: {0}")]
    InvalidObject(String),
}

impl InformerError {
    /// Returns true if the error reports a missing object.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<CoreError> for InformerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::MalformedKey { key, reason } => Self::MalformedKey { key, reason },
            other => Self::InvalidObject(other.to_string()),
        }
    }
}

impl From<StoreError> for InformerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MalformedKey { key, reason } => Self::MalformedKey { key, reason },
            StoreError::NotFound { key } => Self::NotFound { kind: "object", key },
            other => Self::InvalidObject(other.to_string()),
        }
    }
}

/// Result type for informer operations.
pub type Result<T> = std::result::Result<T, InformerError>;
