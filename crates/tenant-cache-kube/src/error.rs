//! Error types for the Kubernetes event source.

use tenant_cache_informer::SourceError;
use thiserror::Error;

/// Errors raised while talking to the API server or converting its objects.
#[derive(Error, Debug)]
pub enum KubeSourceError {
    /// Kubernetes API error.
    #[error("Kubernetes API error: {0}")]
    KubeApi(#[from] kube::Error),

    /// No API resource is registered for the kind.
    #[error("Unknown kind: {0}")]
    UnknownKind(String),

    /// An object from the API server cannot be represented in the cache.
    #[error("Conversion failed for {kind} {name}: {reason}")]
    Conversion {
        /// Kind tag.
        kind: String,
        /// Object name, or empty if missing.
        name: String,
        /// What is wrong with the object.
        reason: String,
    },
}

impl KubeSourceError {
    /// Check if this error is retriable.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::KubeApi(kube::Error::Api(response)) => {
                response.code == 410 || response.code == 429 || response.code >= 500
            }
            Self::KubeApi(_) => true,
            Self::UnknownKind(_) | Self::Conversion { .. } => false,
        }
    }
}

impl From<KubeSourceError> for SourceError {
    fn from(err: KubeSourceError) -> Self {
        match err {
            KubeSourceError::KubeApi(kube::Error::Api(response)) if response.code == 410 => {
                Self::Gone(response.message)
            }
            KubeSourceError::KubeApi(kube::Error::Api(response)) => Self::Status {
                code: response.code,
                message: response.message,
            },
            KubeSourceError::KubeApi(e) => Self::Connection(e.to_string()),
            KubeSourceError::UnknownKind(kind) => Self::Status {
                code: 404,
                message: format!("no API resource registered for kind {kind}"),
            },
            e @ KubeSourceError::Conversion { .. } => Self::Decode(e.to_string()),
        }
    }
}

/// A specialized Result type for Kubernetes source operations.
pub type Result<T> = std::result::Result<T, KubeSourceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn api_error(code: u16) -> KubeSourceError {
        KubeSourceError::KubeApi(kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: format!("status {code}"),
            reason: "Test".to_string(),
            code,
        }))
    }

    #[test]
    fn expired_version_maps_to_gone() {
        let err = api_error(410);
        assert!(err.is_retriable());
        assert!(SourceError::from(err).is_gone());
    }

    #[test]
    fn client_errors_are_not_retriable() {
        assert!(!api_error(403).is_retriable());
        assert!(api_error(503).is_retriable());
        assert!(matches!(
            SourceError::from(api_error(403)),
            SourceError::Status { code: 403, .. }
        ));
    }

    #[test]
    fn unknown_kind_is_permanent() {
        let err = KubeSourceError::UnknownKind("Widget".to_string());
        assert!(!err.is_retriable());
        assert_eq!(err.to_string(), "Unknown kind: Widget");
    }
}
