use crate::chain::ChainClient;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Result of the most recent probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Liveness {
    /// Never probed
    Unknown,
    Live,
    Dead,
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unknown => "unknown",
            Self::Live => "live",
            Self::Dead => "dead",
        };
        f.write_str(label)
    }
}

/// Point-in-time probe outcome; replaced atomically as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSnapshot {
    pub liveness: Liveness,
    /// Round-trip of the last successful probe
    pub latency: Option<Duration>,
    /// Height reported by the last successful probe
    pub height: Option<u64>,
}

impl ProbeSnapshot {
    pub const fn unknown() -> Self {
        Self {
            liveness: Liveness::Unknown,
            latency: None,
            height: None,
        }
    }

    pub const fn live(latency: Duration, height: u64) -> Self {
        Self {
            liveness: Liveness::Live,
            latency: Some(latency),
            height: Some(height),
        }
    }

    pub const fn dead() -> Self {
        Self {
            liveness: Liveness::Dead,
            latency: None,
            height: None,
        }
    }

    /// Live by latency first, then never-probed, then dead
    pub(crate) fn rank_key(&self) -> (u8, Duration) {
        match self.liveness {
            Liveness::Live => (0, self.latency.unwrap_or(Duration::MAX)),
            Liveness::Unknown => (1, Duration::MAX),
            Liveness::Dead => (2, Duration::MAX),
        }
    }
}

/// Lock-free probe counters
#[derive(Debug, Default)]
pub struct ProbeStats {
    total_probes: AtomicU64,
    failed_probes: AtomicU64,
    consecutive_failures: AtomicU64,
}

impl ProbeStats {
    fn record(&self, live: bool) {
        self.total_probes.fetch_add(1, Ordering::Relaxed);
        if live {
            self.consecutive_failures.store(0, Ordering::Relaxed);
        } else {
            self.failed_probes.fetch_add(1, Ordering::Relaxed);
            self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn total_probes(&self) -> u64 {
        self.total_probes.load(Ordering::Relaxed)
    }

    pub fn failed_probes(&self) -> u64 {
        self.failed_probes.load(Ordering::Relaxed)
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }
}

/// One configured chain endpoint with its probe state
pub struct Endpoint {
    index: usize,
    url: String,
    client: Arc<dyn ChainClient>,
    state: ArcSwap<ProbeSnapshot>,
    stats: ProbeStats,
}

impl Endpoint {
    pub fn new(index: usize, url: impl Into<String>, client: Arc<dyn ChainClient>) -> Self {
        Self {
            index,
            url: url.into(),
            client,
            state: ArcSwap::from_pointee(ProbeSnapshot::unknown()),
            stats: ProbeStats::default(),
        }
    }

    /// Position in the configured list
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn client(&self) -> &Arc<dyn ChainClient> {
        &self.client
    }

    pub fn snapshot(&self) -> ProbeSnapshot {
        **self.state.load()
    }

    pub fn liveness(&self) -> Liveness {
        self.snapshot().liveness
    }

    pub fn is_live(&self) -> bool {
        self.liveness() == Liveness::Live
    }

    pub fn latency(&self) -> Option<Duration> {
        self.snapshot().latency
    }

    pub fn stats(&self) -> &ProbeStats {
        &self.stats
    }

    /// Publish a new probe result, returning the one it replaced
    pub(crate) fn record_probe(&self, snapshot: ProbeSnapshot) -> ProbeSnapshot {
        self.stats.record(snapshot.liveness == Liveness::Live);
        *self.state.swap(Arc::new(snapshot))
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("index", &self.index)
            .field("url", &self.url)
            .field("state", &self.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockChainClient;

    #[test]
    fn starts_unknown_and_tracks_failures() {
        let endpoint = Endpoint::new(0, "http://a", Arc::new(MockChainClient::new("http://a")));
        assert_eq!(endpoint.liveness(), Liveness::Unknown);

        endpoint.record_probe(ProbeSnapshot::dead());
        endpoint.record_probe(ProbeSnapshot::dead());
        assert_eq!(endpoint.stats().consecutive_failures(), 2);

        let previous = endpoint.record_probe(ProbeSnapshot::live(Duration::from_millis(40), 10));
        assert_eq!(previous.liveness, Liveness::Dead);
        assert!(endpoint.is_live());
        assert_eq!(endpoint.latency(), Some(Duration::from_millis(40)));
        assert_eq!(endpoint.stats().consecutive_failures(), 0);
        assert_eq!(endpoint.stats().failed_probes(), 2);
        assert_eq!(endpoint.stats().total_probes(), 3);
    }

    #[test]
    fn rank_orders_live_unknown_dead() {
        let fast = ProbeSnapshot::live(Duration::from_millis(5), 1).rank_key();
        let slow = ProbeSnapshot::live(Duration::from_millis(50), 1).rank_key();
        let unknown = ProbeSnapshot::unknown().rank_key();
        let dead = ProbeSnapshot::dead().rank_key();

        assert!(fast < slow);
        assert!(slow < unknown);
        assert!(unknown < dead);
    }
}
