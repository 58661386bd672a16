//! Client configuration.

use std::time::Duration;

/// Default interval between poll ticks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Synchronizer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Delay between the end of one tick and the start of the next.
    pub poll_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { poll_interval: DEFAULT_POLL_INTERVAL }
    }
}

impl SyncConfig {
    /// Configuration with the poll interval given in milliseconds.
    pub fn from_millis(poll_interval_ms: u64) -> Self {
        Self { poll_interval: Duration::from_millis(poll_interval_ms) }
    }
}

/// HTTP transport configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    /// Base URL of the API, without trailing slash.
    pub base_url: String,
    /// Timeout applied to every request.
    pub request_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl HttpConfig {
    /// Configuration pointing at `base_url` with the default timeout.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, ..Self::default() }
    }
}
