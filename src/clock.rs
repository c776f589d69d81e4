//! Time source used for activation and backoff

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Injectable clock: wall time for comparisons, plus a sleep that tests can
/// run on tokio's paused virtual time.
#[async_trait]
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock sampled once, then advanced by tokio's monotonic instant.
///
/// NTP steps after construction do not move `now()` backwards, and under
/// `start_paused` tests the whole clock is virtual.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    anchor_wall: DateTime<Utc>,
    anchor: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::anchored_at(Utc::now())
    }

    /// Clock whose `now()` starts at `wall`
    pub fn anchored_at(wall: DateTime<Utc>) -> Self {
        Self {
            anchor_wall: wall,
            anchor: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for MonotonicClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.anchor.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.anchor_wall + elapsed
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Time left until `target`, or `None` once it has been reached
pub fn remaining_until(now: DateTime<Utc>, target: DateTime<Utc>) -> Option<Duration> {
    if now >= target {
        return None;
    }
    (target - now).to_std().ok()
}

/// How far past `target` `now` is (zero if not yet reached)
pub fn lateness(now: DateTime<Utc>, target: DateTime<Utc>) -> Duration {
    (now - target).to_std().unwrap_or(Duration::ZERO)
}

/// Truncate to whole milliseconds
pub fn floor_millis(duration: Duration) -> Duration {
    Duration::from_millis(duration.as_millis().min(u64::MAX as u128) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn monotonic_clock_follows_virtual_time() {
        let start = Utc::now();
        let clock = MonotonicClock::anchored_at(start);

        clock.sleep(Duration::from_millis(1500)).await;

        let advanced = clock.now() - start;
        assert_eq!(advanced.num_milliseconds(), 1500);
    }

    #[test]
    fn remaining_and_lateness() {
        let target = Utc::now();
        let before = target - chrono::Duration::milliseconds(250);
        let after = target + chrono::Duration::milliseconds(3);

        assert_eq!(
            remaining_until(before, target),
            Some(Duration::from_millis(250))
        );
        assert_eq!(remaining_until(target, target), None);
        assert_eq!(remaining_until(after, target), None);
        assert_eq!(lateness(after, target), Duration::from_millis(3));
        assert_eq!(lateness(before, target), Duration::ZERO);
    }

    #[test]
    fn floor_drops_sub_millisecond_part() {
        assert_eq!(
            floor_millis(Duration::from_micros(10_999)),
            Duration::from_millis(10)
        );
        assert_eq!(floor_millis(Duration::from_micros(999)), Duration::ZERO);
    }
}
