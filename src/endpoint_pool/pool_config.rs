use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for an individual chain endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// The JSON-RPC endpoint URL
    pub url: String,
}

impl From<&str> for EndpointConfig {
    fn from(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }
}

impl From<String> for EndpointConfig {
    fn from(url: String) -> Self {
        Self { url }
    }
}

/// Which endpoints a submission round fans out to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CandidateSet {
    /// Every endpoint whose last probe succeeded
    #[default]
    AllLive,
    /// The `n` lowest-latency live endpoints
    Fastest(usize),
}

/// Pool timing knobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    /// Upper bound on a single liveness probe
    pub probe_timeout: Duration,
    /// Pause between full passes when no endpoint answers
    pub reselect_pause: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(2),
            reselect_pause: Duration::from_millis(10),
        }
    }
}
