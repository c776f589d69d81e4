//! Progress events and structured log reporting
//!
//! Components publish [`ProgressEvent`]s on a broadcast bus; the log reporter
//! (or a UI, or a test) subscribes and renders them.

use crate::endpoint_pool::Liveness;
use crate::errors::FailureClass;
use crate::types::{ActivationCondition, RunResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Correlation ID tying together every log line of one campaign
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub enum ProgressEvent {
    EndpointProbed {
        index: usize,
        url: String,
        liveness: Liveness,
        latency: Option<Duration>,
    },
    CountdownTick {
        remaining: Duration,
    },
    BlockObserved {
        height: u64,
        target: u64,
    },
    ActivationReached {
        condition: ActivationCondition,
        lateness: Duration,
    },
    RoundStarted {
        round: u32,
        endpoints: usize,
    },
    AttemptFailed {
        round: u32,
        endpoint: String,
        class: FailureClass,
        message: String,
    },
    RoundFailed {
        round: u32,
        reason: String,
    },
    Finished(RunResult),
}

const DEFAULT_CAPACITY: usize = 1024;

/// Fire-and-forget event fan-out
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ProgressEvent>,
    correlation_id: CorrelationId,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            correlation_id: CorrelationId::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Best effort send - don't block or fail if no receivers
    pub fn emit(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// `HH:MM:SS.mmm`, hours unbounded
pub fn format_countdown(remaining: Duration) -> String {
    let total_ms = remaining.as_millis();
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms / 60_000) % 60;
    let seconds = (total_ms / 1_000) % 60;
    let millis = total_ms % 1_000;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}

/// Render events as tracing output until the bus closes
pub fn spawn_log_reporter(mut rx: broadcast::Receiver<ProgressEvent>, correlation_id: CorrelationId) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => report(&correlation_id, &event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Log reporter lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn report(correlation_id: &CorrelationId, event: &ProgressEvent) {
    match event {
        ProgressEvent::EndpointProbed {
            index,
            url,
            liveness,
            latency,
        } => match latency {
            Some(latency) => debug!(
                context_id = %correlation_id,
                index,
                url = %url,
                liveness = %liveness,
                latency_ms = latency.as_millis() as u64,
                "Endpoint probed"
            ),
            None => debug!(
                context_id = %correlation_id,
                index,
                url = %url,
                liveness = %liveness,
                "Endpoint probed"
            ),
        },
        ProgressEvent::CountdownTick { remaining } => {
            info!(
                context_id = %correlation_id,
                "⏳ Time remaining: {}",
                format_countdown(*remaining)
            );
        }
        ProgressEvent::BlockObserved { height, target } => {
            info!(
                context_id = %correlation_id,
                height,
                target,
                remaining = target.saturating_sub(*height),
                "📦 Block observed"
            );
        }
        ProgressEvent::ActivationReached { condition, lateness } => {
            info!(
                context_id = %correlation_id,
                condition = %condition,
                lateness_ms = lateness.as_secs_f64() * 1000.0,
                "🎯 Activation reached"
            );
        }
        ProgressEvent::RoundStarted { round, endpoints } => {
            info!(
                context_id = %correlation_id,
                round = round + 1,
                endpoints,
                "🚀 Submission round started"
            );
        }
        ProgressEvent::AttemptFailed {
            round,
            endpoint,
            class,
            message,
        } => {
            warn!(
                context_id = %correlation_id,
                round = round + 1,
                endpoint = %endpoint,
                class = class.as_str(),
                error = %message,
                "Attempt failed"
            );
        }
        ProgressEvent::RoundFailed { round, reason } => {
            warn!(
                context_id = %correlation_id,
                round = round + 1,
                reason = %reason,
                "Round failed"
            );
        }
        ProgressEvent::Finished(result) => match result {
            RunResult::Success {
                handle,
                endpoint,
                attempts,
            } => info!(
                context_id = %correlation_id,
                handle = %handle,
                endpoint = %endpoint,
                attempts,
                "✅ Submission accepted"
            ),
            RunResult::Exhausted { attempts, reason } => warn!(
                context_id = %correlation_id,
                attempts,
                reason = %reason,
                "❌ Submission campaign exhausted"
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_format() {
        assert_eq!(format_countdown(Duration::from_millis(0)), "00:00:00.000");
        assert_eq!(format_countdown(Duration::from_millis(61_001)), "00:01:01.001");
        assert_eq!(
            format_countdown(Duration::from_millis(3 * 3_600_000 + 59 * 60_000 + 7_250)),
            "03:59:07.250"
        );
        assert_eq!(format_countdown(Duration::from_secs(100 * 3600)), "100:00:00.000");
    }

    #[tokio::test]
    async fn emit_without_subscribers_is_silent() {
        let bus = EventBus::new(4);
        bus.emit(ProgressEvent::CountdownTick {
            remaining: Duration::from_secs(1),
        });

        let mut rx = bus.subscribe();
        bus.emit(ProgressEvent::BlockObserved { height: 9, target: 10 });
        assert!(matches!(
            rx.recv().await.unwrap(),
            ProgressEvent::BlockObserved { height: 9, target: 10 }
        ));
    }

    #[tokio::test]
    async fn reporter_exits_when_bus_closes() {
        let bus = EventBus::new(4);
        let handle = spawn_log_reporter(bus.subscribe(), bus.correlation_id().clone());
        bus.emit(ProgressEvent::RoundStarted { round: 0, endpoints: 2 });
        drop(bus);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("reporter stops")
            .unwrap();
    }
}
