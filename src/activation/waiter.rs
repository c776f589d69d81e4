use crate::cancel::CancelToken;
use crate::clock::{floor_millis, lateness, remaining_until, Clock};
use crate::endpoint_pool::{Endpoint, EndpointPool};
use crate::errors::BroadcastError;
use crate::metrics::metrics;
use crate::reporter::{EventBus, ProgressEvent};
use crate::types::ActivationCondition;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const FINEST_STEP: Duration = Duration::from_millis(1);

/// Waiter timing knobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaiterSettings {
    /// Below this much remaining time, switch from coarse sleeps to fine polling
    pub coarse_threshold: Duration,
    /// Longest single coarse sleep; also the countdown tick period
    pub tick_interval: Duration,
    /// Upper bound on one block-height query
    pub height_query_timeout: Duration,
    /// Poll interval while more than 10 blocks remain
    pub block_poll_distant: Duration,
    /// Poll interval while 2..=10 blocks remain
    pub block_poll_near: Duration,
    /// Poll interval for the final block
    pub block_poll_final: Duration,
}

impl Default for WaiterSettings {
    fn default() -> Self {
        Self {
            coarse_threshold: Duration::from_millis(300),
            tick_interval: Duration::from_secs(1),
            height_query_timeout: Duration::from_secs(1),
            block_poll_distant: Duration::from_millis(100),
            block_poll_near: Duration::from_millis(10),
            block_poll_final: Duration::from_millis(1),
        }
    }
}

impl WaiterSettings {
    /// Sleep before the next block-height poll, given blocks still to go
    pub fn block_poll_interval(&self, gap: u64) -> Duration {
        match gap {
            0 | 1 => self.block_poll_final,
            2..=10 => self.block_poll_near,
            _ => self.block_poll_distant,
        }
    }

    /// Sleep before the next clock check, given time remaining
    pub fn time_step(&self, remaining: Duration) -> Duration {
        if remaining > self.coarse_threshold {
            let coarse = floor_millis(remaining - self.coarse_threshold).min(self.tick_interval);
            return coarse.max(FINEST_STEP);
        }
        fine_step(remaining)
    }
}

/// Fine-polling step: never past the target, never a zero-length spin
pub fn fine_step(remaining: Duration) -> Duration {
    let step = if remaining > Duration::from_millis(50) {
        Duration::from_millis(10)
    } else if remaining > Duration::from_millis(10) {
        Duration::from_millis(2)
    } else {
        FINEST_STEP
    };
    step.min(floor_millis(remaining)).max(FINEST_STEP)
}

/// How the activation condition was met
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Time {
        /// How far past the target `now()` was on return
        lateness: Duration,
    },
    Height {
        /// First observed height at or above the target
        observed: u64,
        /// Height queries issued, failures included
        polls: u64,
    },
}

/// Suspends until an [`ActivationCondition`] holds, as close to the instant
/// as possible and never before it.
#[derive(Debug)]
pub struct ActivationWaiter {
    clock: Arc<dyn Clock>,
    settings: WaiterSettings,
    events: EventBus,
    cancel: CancelToken,
}

impl ActivationWaiter {
    pub fn new(clock: Arc<dyn Clock>, settings: WaiterSettings, events: EventBus, cancel: CancelToken) -> Self {
        Self {
            clock,
            settings,
            events,
            cancel,
        }
    }

    pub fn settings(&self) -> &WaiterSettings {
        &self.settings
    }

    pub async fn wait(&self, condition: &ActivationCondition, pool: &EndpointPool) -> Result<Activation, BroadcastError> {
        match *condition {
            ActivationCondition::At(target) => {
                let lateness = self.wait_until(target).await?;
                Ok(Activation::Time { lateness })
            }
            ActivationCondition::Height(target) => {
                let (observed, polls) = self.wait_for_height(target, pool).await?;
                Ok(Activation::Height { observed, polls })
            }
        }
    }

    /// Coarse sleeps until the final stretch, then short polls; returns the
    /// lateness at the first `now() >= target`.
    #[instrument(skip(self), fields(target = %target))]
    pub async fn wait_until(&self, target: DateTime<Utc>) -> Result<Duration, BroadcastError> {
        let mut next_tick: Option<Duration> = None;

        loop {
            let now = self.clock.now();
            let Some(remaining) = remaining_until(now, target) else {
                let late = lateness(now, target);
                metrics().activation_lateness.observe(late.as_secs_f64());
                self.events.emit(ProgressEvent::ActivationReached {
                    condition: ActivationCondition::At(target),
                    lateness: late,
                });
                return Ok(late);
            };

            if remaining > self.settings.coarse_threshold {
                // One tick per tick_interval of remaining time
                let due = next_tick.map_or(true, |tick| remaining <= tick);
                if due {
                    self.events.emit(ProgressEvent::CountdownTick { remaining });
                    next_tick = Some(remaining.saturating_sub(self.settings.tick_interval));
                }
            }

            self.pause(self.settings.time_step(remaining)).await?;
        }
    }

    /// Poll block height on the fastest live endpoint, tightening the
    /// interval as the target nears. Returns the observed height and the
    /// number of queries issued.
    #[instrument(skip(self, pool))]
    pub async fn wait_for_height(&self, target: u64, pool: &EndpointPool) -> Result<(u64, u64), BroadcastError> {
        let mut last_seen: Option<u64> = None;
        let mut polls = 0u64;

        loop {
            let endpoint = self.select(pool).await?;
            polls += 1;
            metrics().block_polls.inc();

            match self.query_height(&endpoint).await {
                Ok(height) => {
                    if last_seen != Some(height) {
                        debug!(height, target, url = %endpoint.url(), "New block height");
                        self.events.emit(ProgressEvent::BlockObserved { height, target });
                        last_seen = Some(height);
                    }

                    if height >= target {
                        info!(height, target, polls, "🎯 Target block reached");
                        self.events.emit(ProgressEvent::ActivationReached {
                            condition: ActivationCondition::Height(target),
                            lateness: Duration::ZERO,
                        });
                        return Ok((height, polls));
                    }

                    self.pause(self.settings.block_poll_interval(target - height)).await?;
                }
                Err(reason) => {
                    warn!(url = %endpoint.url(), error = %reason, "Height query failed, re-selecting endpoint");
                    pool.probe(&endpoint).await;
                }
            }
        }
    }

    async fn query_height(&self, endpoint: &Endpoint) -> Result<u64, String> {
        match tokio::time::timeout(self.settings.height_query_timeout, endpoint.client().block_height()).await {
            Ok(Ok(height)) => Ok(height),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!(
                "timed out after {}ms",
                self.settings.height_query_timeout.as_millis()
            )),
        }
    }

    async fn select(&self, pool: &EndpointPool) -> Result<Arc<Endpoint>, BroadcastError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(BroadcastError::Cancelled),
            endpoint = pool.select_current() => Ok(endpoint),
        }
    }

    async fn pause(&self, duration: Duration) -> Result<(), BroadcastError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(BroadcastError::Cancelled),
            _ = self.clock.sleep(duration) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fine_steps_shrink_toward_target() {
        assert_eq!(fine_step(Duration::from_millis(300)), Duration::from_millis(10));
        assert_eq!(fine_step(Duration::from_millis(51)), Duration::from_millis(10));
        assert_eq!(fine_step(Duration::from_millis(50)), Duration::from_millis(2));
        assert_eq!(fine_step(Duration::from_millis(11)), Duration::from_millis(2));
        assert_eq!(fine_step(Duration::from_millis(10)), Duration::from_millis(1));
        assert_eq!(fine_step(Duration::from_micros(1_500)), Duration::from_millis(1));
        // sub-millisecond remainder still sleeps rather than spinning
        assert_eq!(fine_step(Duration::from_micros(300)), Duration::from_millis(1));
    }

    #[test]
    fn coarse_step_stops_at_threshold() {
        let settings = WaiterSettings::default();
        assert_eq!(settings.time_step(Duration::from_secs(10)), Duration::from_secs(1));
        assert_eq!(settings.time_step(Duration::from_millis(1200)), Duration::from_millis(900));
        assert_eq!(settings.time_step(Duration::from_millis(300)), Duration::from_millis(10));
        assert_eq!(settings.time_step(Duration::from_micros(300_400)), Duration::from_millis(1));
    }

    #[test]
    fn block_intervals_tighten() {
        let settings = WaiterSettings::default();
        assert_eq!(settings.block_poll_interval(500), Duration::from_millis(100));
        assert_eq!(settings.block_poll_interval(11), Duration::from_millis(100));
        assert_eq!(settings.block_poll_interval(10), Duration::from_millis(10));
        assert_eq!(settings.block_poll_interval(2), Duration::from_millis(10));
        assert_eq!(settings.block_poll_interval(1), Duration::from_millis(1));
    }
}
