//! Informer configuration.

use std::time::Duration;

use serde::Deserialize;

/// Tuning for reflectors and subscriptions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InformerConfig {
    /// Events buffered per subscription before the subscriber counts as slow.
    #[serde(default = "InformerConfig::default_queue_capacity")]
    pub queue_capacity: usize,

    /// How long the reflector waits on a full subscription queue before
    /// replacing its backlog with a snapshot, in milliseconds.
    #[serde(default = "InformerConfig::default_lag_threshold")]
    pub lag_threshold_ms: u64,

    /// Objects requested per LIST page.
    #[serde(default = "InformerConfig::default_page_size")]
    pub page_size: u32,

    /// First retry delay after a failure, in milliseconds.
    #[serde(default = "InformerConfig::default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Upper bound on the retry delay, in milliseconds.
    #[serde(default = "InformerConfig::default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl InformerConfig {
    const fn default_queue_capacity() -> usize {
        256
    }

    const fn default_lag_threshold() -> u64 {
        1_000
    }

    const fn default_page_size() -> u32 {
        500
    }

    const fn default_initial_backoff() -> u64 {
        50
    }

    const fn default_max_backoff() -> u64 {
        30_000
    }

    /// Load configuration from environment variables.
    ///
    /// Supported environment variables:
    /// - `TENANT_CACHE_QUEUE_CAPACITY`: events buffered per subscription
    /// - `TENANT_CACHE_LAG_THRESHOLD_MS`: wait on a full queue before resyncing
    /// - `TENANT_CACHE_PAGE_SIZE`: objects per LIST page
    /// - `TENANT_CACHE_INITIAL_BACKOFF_MS`: first retry delay
    /// - `TENANT_CACHE_MAX_BACKOFF_MS`: retry delay cap
    ///
    /// Unset or unparsable variables keep their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(n) = env_parse("TENANT_CACHE_QUEUE_CAPACITY") {
            config.queue_capacity = n;
        }
        if let Some(n) = env_parse("TENANT_CACHE_LAG_THRESHOLD_MS") {
            config.lag_threshold_ms = n;
        }
        if let Some(n) = env_parse("TENANT_CACHE_PAGE_SIZE") {
            config.page_size = n;
        }
        if let Some(n) = env_parse("TENANT_CACHE_INITIAL_BACKOFF_MS") {
            config.initial_backoff_ms = n;
        }
        if let Some(n) = env_parse("TENANT_CACHE_MAX_BACKOFF_MS") {
            config.max_backoff_ms = n;
        }

        config
    }

    /// Get the lag threshold as a `Duration`.
    #[must_use]
    pub const fn lag_threshold(&self) -> Duration {
        Duration::from_millis(self.lag_threshold_ms)
    }

    /// Get the initial back-off as a `Duration`.
    #[must_use]
    pub const fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    /// Get the back-off cap as a `Duration`.
    #[must_use]
    pub const fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

impl Default for InformerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: Self::default_queue_capacity(),
            lag_threshold_ms: Self::default_lag_threshold(),
            page_size: Self::default_page_size(),
            initial_backoff_ms: Self::default_initial_backoff(),
            max_backoff_ms: Self::default_max_backoff(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|val| val.parse().ok())
}
