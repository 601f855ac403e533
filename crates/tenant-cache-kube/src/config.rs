//! Kubernetes source configuration.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for [`KubeEventSource`](crate::KubeEventSource).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KubeSourceConfig {
    /// Annotation naming the tenant that owns an object.
    #[serde(default = "KubeSourceConfig::default_tenant_annotation")]
    pub tenant_annotation: String,

    /// Server-side watch timeout in seconds. The API server caps it below 295.
    #[serde(default = "KubeSourceConfig::default_watch_timeout")]
    pub watch_timeout_seconds: u32,
}

impl KubeSourceConfig {
    fn default_tenant_annotation() -> String {
        "multitenancy.io/tenant".to_string()
    }

    const fn default_watch_timeout() -> u32 {
        290
    }

    /// Load configuration from environment variables.
    ///
    /// Supported environment variables:
    /// - `TENANT_CACHE_TENANT_ANNOTATION`: annotation carrying the tenant
    /// - `TENANT_CACHE_WATCH_TIMEOUT_SECONDS`: server-side watch timeout
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("TENANT_CACHE_TENANT_ANNOTATION") {
            if !val.is_empty() {
                config.tenant_annotation = val;
            }
        }
        if let Ok(val) = std::env::var("TENANT_CACHE_WATCH_TIMEOUT_SECONDS") {
            if let Ok(n) = val.parse::<u32>() {
                config.watch_timeout_seconds = n.min(Self::default_watch_timeout());
            }
        }

        config
    }

    /// Get the watch timeout as a `Duration`.
    #[must_use]
    pub fn watch_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.watch_timeout_seconds))
    }
}

impl Default for KubeSourceConfig {
    fn default() -> Self {
        Self {
            tenant_annotation: Self::default_tenant_annotation(),
            watch_timeout_seconds: Self::default_watch_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = KubeSourceConfig::default();
        assert_eq!(config.tenant_annotation, "multitenancy.io/tenant");
        assert_eq!(config.watch_timeout(), Duration::from_secs(290));
    }

    #[test]
    fn deserialize_partial() {
        let config: KubeSourceConfig =
            serde_json::from_str(r#"{"tenant_annotation": "example.com/owner"}"#).unwrap();
        assert_eq!(config.tenant_annotation, "example.com/owner");
        assert_eq!(config.watch_timeout_seconds, 290);
    }
}
