//! Common error types for tenant-cache.
//!
//! This module provides the identity-level errors shared by the store, the
//! informer and the listers.

use thiserror::Error;

use crate::selector::SelectorError;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors raised while forming keys, validating objects or decoding kinds.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A key could not be formed or decomposed.
    #[error("malformed key {key:?}: {reason}")]
    MalformedKey {
        /// The offending key, or the segments it was formed from.
        key: String,
        /// Why the key was rejected.
        reason: &'static str,
    },

    /// An object failed metadata validation.
    #[error("invalid object: {0}")]
    InvalidObject(String),

    /// A tenant string cannot be carried on an object.
    #[error("invalid tenant {0:?}")]
    InvalidTenant(String),

    /// A label selector could not be parsed.
    #[error("invalid label selector: {0}")]
    Selector(#[from] SelectorError),

    /// A dynamic object carried a different kind tag than requested.
    #[error("kind mismatch: expected {expected}, found {found}")]
    KindMismatch {
        /// The kind the caller asked for.
        expected: &'static str,
        /// The kind tag found on the object.
        found: String,
    },

    /// A dynamic object payload could not be converted to or from a typed kind.
    #[error("failed to convert {kind} payload: {source}")]
    Decode {
        /// The kind being converted.
        kind: &'static str,
        /// The underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}

impl CoreError {
    pub(crate) fn malformed(key: impl Into<String>, reason: &'static str) -> Self {
        Self::MalformedKey {
            key: key.into(),
            reason,
        }
    }
}
