//! Metrics collection and export module

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Endpoint pool
    pub probes_total: IntCounter,
    pub probe_failures: IntCounter,
    pub live_endpoints: IntGauge,
    pub probe_latency: Histogram,

    // Activation
    pub activation_lateness: Histogram,
    pub block_polls: IntCounter,

    // Submission
    pub rounds_total: IntCounter,
    pub attempts_total: IntCounter,
    pub attempts_failed: IntCounterVec,
    pub runs_success: IntCounter,
    pub runs_exhausted: IntCounter,
    pub dispatch_latency: Histogram,
    pub run_duration: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let probes_total = IntCounter::with_opts(Opts::new(
            "strike_probes_total",
            "Endpoint liveness probes performed",
        ))?;

        let probe_failures = IntCounter::with_opts(Opts::new(
            "strike_probe_failures_total",
            "Probes that errored or timed out",
        ))?;

        let live_endpoints = IntGauge::with_opts(Opts::new(
            "strike_live_endpoints",
            "Endpoints whose last probe succeeded",
        ))?;

        let probe_latency = Histogram::with_opts(
            HistogramOpts::new("strike_probe_latency_seconds", "Block height probe round trip")
                .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0]),
        )?;

        let activation_lateness = Histogram::with_opts(
            HistogramOpts::new(
                "strike_activation_lateness_seconds",
                "How far past the activation instant the waiter returned",
            )
            .buckets(vec![0.0005, 0.001, 0.002, 0.005, 0.01, 0.05]),
        )?;

        let block_polls = IntCounter::with_opts(Opts::new(
            "strike_block_polls_total",
            "Block height queries issued while waiting for activation",
        ))?;

        let rounds_total = IntCounter::with_opts(Opts::new(
            "strike_rounds_total",
            "Submission rounds started",
        ))?;

        let attempts_total = IntCounter::with_opts(Opts::new(
            "strike_attempts_total",
            "Per-endpoint submission attempts launched",
        ))?;

        let attempts_failed = IntCounterVec::new(
            Opts::new("strike_attempts_failed_total", "Failed attempts by classification"),
            &["class"],
        )?;

        let runs_success = IntCounter::with_opts(Opts::new(
            "strike_runs_success_total",
            "Campaigns ending in an accepted submission",
        ))?;

        let runs_exhausted = IntCounter::with_opts(Opts::new(
            "strike_runs_exhausted_total",
            "Campaigns ending without an accepted submission",
        ))?;

        let dispatch_latency = Histogram::with_opts(
            HistogramOpts::new("strike_dispatch_latency_seconds", "Raw submission round trip")
                .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        )?;

        let run_duration = Histogram::with_opts(
            HistogramOpts::new("strike_run_duration_seconds", "Activation to campaign outcome")
                .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(probes_total.clone()))?;
        registry.register(Box::new(probe_failures.clone()))?;
        registry.register(Box::new(live_endpoints.clone()))?;
        registry.register(Box::new(probe_latency.clone()))?;
        registry.register(Box::new(activation_lateness.clone()))?;
        registry.register(Box::new(block_polls.clone()))?;
        registry.register(Box::new(rounds_total.clone()))?;
        registry.register(Box::new(attempts_total.clone()))?;
        registry.register(Box::new(attempts_failed.clone()))?;
        registry.register(Box::new(runs_success.clone()))?;
        registry.register(Box::new(runs_exhausted.clone()))?;
        registry.register(Box::new(dispatch_latency.clone()))?;
        registry.register(Box::new(run_duration.clone()))?;

        Ok(Self {
            registry,
            probes_total,
            probe_failures,
            live_endpoints,
            probe_latency,
            activation_lateness,
            block_polls,
            rounds_total,
            attempts_total,
            attempts_failed,
            runs_success,
            runs_exhausted,
            dispatch_latency,
            run_duration,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Prometheus text exposition of everything registered
    pub fn encode(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}
