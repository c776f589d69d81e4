use super::endpoint::{Endpoint, Liveness, ProbeSnapshot};
use super::pool_config::{CandidateSet, EndpointConfig, PoolSettings};
use crate::cancel::CancelToken;
use crate::chain::ChainConnector;
use crate::errors::BroadcastError;
use crate::metrics::metrics;
use crate::reporter::{EventBus, ProgressEvent};
use futures::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Ordered set of chain endpoints with probe-based liveness and latency
#[derive(Debug)]
pub struct EndpointPool {
    endpoints: Vec<Arc<Endpoint>>,
    settings: PoolSettings,
    /// Round-robin position for re-probing when nothing is live
    cursor: AtomicUsize,
    events: EventBus,
}

impl EndpointPool {
    /// Connect to every configured endpoint and probe them all concurrently.
    ///
    /// Never fails because endpoints are unreachable; they are simply marked
    /// dead. Fails only when the list is empty or a URL cannot be used at all.
    #[instrument(skip_all, fields(endpoints = configs.len()))]
    pub async fn initialize(
        configs: Vec<EndpointConfig>,
        connector: &dyn ChainConnector,
        settings: PoolSettings,
        events: EventBus,
    ) -> Result<Self, BroadcastError> {
        if configs.is_empty() {
            return Err(BroadcastError::NoEndpointsConfigured);
        }

        let mut endpoints = Vec::with_capacity(configs.len());
        for (index, config) in configs.into_iter().enumerate() {
            let client = connector
                .connect(&config.url)
                .map_err(|e| BroadcastError::Configuration(e.to_string()))?;
            endpoints.push(Arc::new(Endpoint::new(index, config.url, client)));
        }

        let pool = Self {
            endpoints,
            settings,
            cursor: AtomicUsize::new(0),
            events,
        };
        pool.probe_all().await;

        info!(
            live = pool.live_count(),
            total = pool.len(),
            fastest = %pool.fastest().map(|e| e.url().to_string()).unwrap_or_default(),
            "🌐 Endpoint pool initialized"
        );

        Ok(pool)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn endpoints(&self) -> &[Arc<Endpoint>] {
        &self.endpoints
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Endpoint>> {
        self.endpoints.get(index)
    }

    pub fn by_url(&self, url: &str) -> Option<&Arc<Endpoint>> {
        self.endpoints.iter().find(|e| e.url() == url)
    }

    pub fn live_count(&self) -> usize {
        self.endpoints.iter().filter(|e| e.is_live()).count()
    }

    /// Probe every endpoint concurrently
    pub async fn probe_all(&self) {
        join_all(self.endpoints.iter().map(|e| self.probe(e))).await;
        metrics().live_endpoints.set(self.live_count() as i64);
    }

    /// Re-probe `suspects` and every endpoint currently dead, concurrently
    pub async fn reprobe(&self, suspects: &[Arc<Endpoint>]) {
        let mut targets: Vec<&Endpoint> = self
            .endpoints
            .iter()
            .filter(|e| e.liveness() == Liveness::Dead)
            .map(|e| e.as_ref())
            .collect();
        for suspect in suspects {
            if !targets.iter().any(|t| t.index() == suspect.index()) {
                targets.push(suspect.as_ref());
            }
        }
        if targets.is_empty() {
            return;
        }

        debug!(count = targets.len(), "Re-probing suspect and dead endpoints");
        join_all(targets.into_iter().map(|e| self.probe(e))).await;
        metrics().live_endpoints.set(self.live_count() as i64);
    }

    /// Measure one block-height round trip and publish the result
    #[instrument(skip(self, endpoint), fields(url = %endpoint.url()))]
    pub async fn probe(&self, endpoint: &Endpoint) -> Liveness {
        let started = Instant::now();
        let outcome = tokio::time::timeout(self.settings.probe_timeout, endpoint.client().block_height()).await;
        let elapsed = started.elapsed();

        let snapshot = match outcome {
            Ok(Ok(height)) => {
                debug!(height, latency_ms = elapsed.as_millis() as u64, "Probe succeeded");
                metrics().probe_latency.observe(elapsed.as_secs_f64());
                ProbeSnapshot::live(elapsed, height)
            }
            Ok(Err(e)) => {
                debug!(error = %e, "Probe failed");
                metrics().probe_failures.inc();
                ProbeSnapshot::dead()
            }
            Err(_) => {
                debug!(timeout_ms = self.settings.probe_timeout.as_millis() as u64, "Probe timed out");
                metrics().probe_failures.inc();
                ProbeSnapshot::dead()
            }
        };
        metrics().probes_total.inc();

        let previous = endpoint.record_probe(snapshot);
        if previous.liveness != snapshot.liveness && previous.liveness != Liveness::Unknown {
            info!(
                url = %endpoint.url(),
                old = %previous.liveness,
                new = %snapshot.liveness,
                "Endpoint liveness changed"
            );
        }

        self.events.emit(ProgressEvent::EndpointProbed {
            index: endpoint.index(),
            url: endpoint.url().to_string(),
            liveness: snapshot.liveness,
            latency: snapshot.latency,
        });

        snapshot.liveness
    }

    /// Live endpoints by ascending latency, then unknown, then dead.
    /// Ties keep configured order.
    pub fn rank_by_latency(&self) -> Vec<Arc<Endpoint>> {
        let mut ranked: Vec<_> = self
            .endpoints
            .iter()
            .map(|e| (e.snapshot().rank_key(), Arc::clone(e)))
            .collect();
        ranked.sort_by_key(|(key, _)| *key);
        ranked.into_iter().map(|(_, e)| e).collect()
    }

    /// Live endpoints only, fastest first
    pub fn live_endpoints(&self) -> Vec<Arc<Endpoint>> {
        self.rank_by_latency()
            .into_iter()
            .filter(|e| e.is_live())
            .collect()
    }

    pub fn fastest(&self) -> Option<Arc<Endpoint>> {
        self.rank_by_latency().into_iter().next().filter(|e| e.is_live())
    }

    /// Endpoints a submission round should fan out to
    pub fn candidates(&self, set: CandidateSet) -> Vec<Arc<Endpoint>> {
        let live = self.live_endpoints();
        match set {
            CandidateSet::AllLive => live,
            CandidateSet::Fastest(n) => live.into_iter().take(n.max(1)).collect(),
        }
    }

    /// Fastest live endpoint; when none is live, cycle through re-probes
    /// (pausing between passes) until one answers.
    #[instrument(skip(self))]
    pub async fn select_current(&self) -> Arc<Endpoint> {
        if let Some(endpoint) = self.fastest() {
            return endpoint;
        }

        warn!(total = self.len(), "No live endpoint, re-probing round-robin");
        let total = self.len().max(1);
        loop {
            for _ in 0..total {
                let index = self.cursor.fetch_add(1, Ordering::Relaxed) % total;
                let Some(endpoint) = self.endpoints.get(index) else {
                    continue;
                };
                if self.probe(endpoint).await == Liveness::Live {
                    info!(url = %endpoint.url(), "Recovered live endpoint");
                    return Arc::clone(endpoint);
                }
            }

            tokio::time::sleep(self.settings.reselect_pause).await;

            // A concurrent probe may have revived something meanwhile
            if let Some(endpoint) = self.fastest() {
                return endpoint;
            }
        }
    }

    /// Re-probe the whole pool every `interval` until cancelled
    pub fn spawn_health_checks(self: Arc<Self>, interval: Duration, cancel: CancelToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_ms = interval.as_millis() as u64, "🩺 Starting background health checks");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => self.probe_all().await,
                }
            }
            debug!("Health checks stopped");
        })
    }
}
