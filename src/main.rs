//! strike - precision-timed transaction broadcaster
//!
//! Entry point: load configuration, build the endpoint pool, wait for the
//! activation condition, race the submission, then optionally watch for
//! inclusion.

// Compiler warning configuration
#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(dead_code)]
#![warn(unused_must_use)]

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use strike::activation::{Activation, ActivationWaiter};
use strike::chain::{
    ChainConnector, JsonRpcConnector, RemoteSigner, SimulatedConnector, TransactionBuilder,
    UnsignedBuilder,
};
use strike::confirmation::ConfirmationWatcher;
use strike::reporter::spawn_log_reporter;
use strike::{
    ActivationCondition, BroadcastError, CancelToken, Clock, Config, EndpointPool, EventBus, Mode,
    MonotonicClock, RunResult, SubmissionRacer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "STRIKE_CONFIG", default_value = "strike.toml")]
    config: PathBuf,

    /// Operating mode
    #[arg(short, long, value_enum, default_value = "simulation")]
    mode: Mode,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Fire at this RFC 3339 instant (overrides the config file)
    #[arg(long, conflicts_with = "block")]
    at: Option<DateTime<Utc>>,

    /// Fire once this block height is observed (overrides the config file)
    #[arg(long)]
    block: Option<u64>,

    /// Serve Prometheus metrics on this port (implies metrics enabled)
    #[arg(long)]
    metrics_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.json_logs)?;

    info!("🚀 Starting strike");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    info!("📋 Loading configuration from: {}", args.config.display());
    let config = load_config(&args)?;
    let condition = config.activation_condition()?;
    let templates = config.tx_templates()?;
    let policy = config.retry_policy()?;

    info!("🎯 Operating Mode: {:?}", args.mode);
    for template in &templates {
        info!(
            from = %template.from,
            to = %template.to,
            chain_id = template.chain_id,
            value = %template.value,
            "📝 Transaction template loaded"
        );
    }

    // Progress events -> logs
    let events = EventBus::default();
    spawn_log_reporter(events.subscribe(), events.correlation_id().clone());

    // Initialize metrics
    if config.monitoring.enable_metrics {
        let port = config.monitoring.metrics_port;
        info!("📊 Starting metrics server on port {}", port);
        tokio::spawn(async move {
            if let Err(e) = strike::endpoints::endpoint_server(port).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    let (connector, builder) = chain_backend(args.mode, &config)?;

    info!("🌐 Probing {} endpoints", config.endpoints.urls.len());
    let pool = Arc::new(
        EndpointPool::initialize(
            config.endpoint_configs(),
            connector.as_ref(),
            config.pool_settings(),
            events.clone(),
        )
        .await
        .context("Failed to initialize endpoint pool")?,
    );
    if pool.live_count() == 0 {
        warn!("No endpoint answered the initial probe; will keep re-probing");
    }

    let cancel = CancelToken::new();
    spawn_shutdown_listener(cancel.clone());

    if let Some(interval) = config.health_check_interval() {
        pool.clone().spawn_health_checks(interval, cancel.clone());
    }

    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());

    // Wait for activation
    info!("⏰ Waiting for activation {}", condition);
    let waiter = ActivationWaiter::new(
        clock.clone(),
        config.waiter_settings(),
        events.clone(),
        cancel.clone(),
    );
    match waiter.wait(&condition, &pool).await {
        Ok(Activation::Time { lateness }) => {
            info!(lateness_us = lateness.as_micros() as u64, "🔔 Activation time reached");
        }
        Ok(Activation::Height { observed, polls }) => {
            info!(observed, polls, "🔔 Activation height reached");
        }
        Err(BroadcastError::Cancelled) => {
            info!("🛑 Cancelled before activation, nothing submitted");
            return Ok(());
        }
        Err(e) => return Err(e).context("Activation wait failed"),
    }

    // Race one submission per account, all sharing the pool
    let racers: Vec<SubmissionRacer> = templates
        .iter()
        .map(|_| {
            SubmissionRacer::new(builder.clone(), clock.clone(), events.clone())
                .with_candidates(config.retry.candidates)
        })
        .collect();
    let results = join_all(
        racers
            .iter()
            .zip(&templates)
            .map(|(racer, template)| racer.run(template, &pool, &policy)),
    )
    .await;

    let watcher = ConfirmationWatcher::new(
        Duration::from_millis(config.monitoring.confirmation_poll_ms),
        Duration::from_secs(config.monitoring.confirmation_timeout_secs),
    );
    let watch = config.monitoring.watch_confirmation && args.mode == Mode::Production;
    let mut confirmations = Vec::new();
    let mut failed = 0;

    for (template, result) in templates.iter().zip(&results) {
        match result {
            RunResult::Success {
                handle, endpoint, ..
            } => {
                if !watch {
                    continue;
                }
                if let Some(winner) = pool.by_url(endpoint) {
                    confirmations.push(watcher.watch(winner.client().clone(), handle, &cancel));
                }
            }
            RunResult::Exhausted { attempts, reason } => {
                error!(account = %template.from, attempts, "❌ Submission failed: {}", reason);
                failed += 1;
            }
        }
    }
    join_all(confirmations).await;

    if failed > 0 {
        cancel.cancel();
        bail!("{} of {} account(s) failed to submit", failed, templates.len());
    }

    cancel.cancel();
    info!("👋 Done");
    Ok(())
}

/// Initialize logging
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose { "strike=debug,info" } else { "strike=info,warn" };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| env_filter.into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()?;
    }

    Ok(())
}

/// Load, override and validate configuration
fn load_config(args: &Args) -> Result<Config> {
    let mut config = Config::from_file_with_env(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if let Some(at) = args.at {
        config.override_activation(ActivationCondition::At(at));
    } else if let Some(block) = args.block {
        config.override_activation(ActivationCondition::Height(block));
    }
    if let Some(port) = args.metrics_port {
        config.monitoring.enable_metrics = true;
        config.monitoring.metrics_port = port;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Connector and builder for the selected mode
fn chain_backend(
    mode: Mode,
    config: &Config,
) -> Result<(Box<dyn ChainConnector>, Arc<dyn TransactionBuilder>)> {
    let rpc = JsonRpcConnector::new(Duration::from_millis(config.endpoints.request_timeout_ms))
        .context("Failed to create HTTP client")?;

    match mode {
        Mode::Simulation => {
            info!("🧪 Simulation mode: submissions are built unsigned and never broadcast");
            Ok((
                Box::new(SimulatedConnector::new(rpc)),
                Arc::new(UnsignedBuilder),
            ))
        }
        Mode::Production => {
            info!("🔑 Using remote signer at {}", config.signer.url);
            let signer = RemoteSigner::new(
                config.signer.url.clone(),
                Duration::from_millis(config.signer.timeout_ms),
            )
            .context("Failed to create signer client")?;
            Ok((Box::new(rpc), Arc::new(signer)))
        }
    }
}

/// Cancel waiting on Ctrl-C
fn spawn_shutdown_listener(cancel: CancelToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, shutting down");
            cancel.cancel();
        }
    });
}
