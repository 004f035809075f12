//! Interval construction shared by the periodic loops.

use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Longest period a periodic loop waits between ticks (one year).
pub const MAX_PERIOD: Duration = Duration::from_secs(365 * 24 * 60 * 60);

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Builds an [`Interval`] whose missed ticks are delayed rather than bursted.
///
/// `period` is clamped to `1ms..=MAX_PERIOD`. When `immediate` is false the
/// first tick fires one period after the call.
pub fn ticker(period: Duration, immediate: bool) -> Interval {
    let period = period.clamp(MIN_PERIOD, MAX_PERIOD);
    let now = Instant::now();
    let start = if immediate {
        now
    } else {
        now.checked_add(period).unwrap_or(now)
    };
    let mut tick = interval_at(start, period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tick
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn huge_period_is_clamped() {
        let mut tick = ticker(Duration::from_secs(u64::MAX), true);
        assert_eq!(tick.period(), MAX_PERIOD);
        tick.tick().await;
    }

    #[tokio::test]
    async fn zero_period_is_clamped() {
        let mut tick = ticker(Duration::ZERO, true);
        assert_eq!(tick.period(), MIN_PERIOD);
        tick.tick().await;
        tick.tick().await;
    }

    #[tokio::test]
    async fn delayed_start_waits_one_period() {
        let started = Instant::now();
        let mut tick = ticker(Duration::from_millis(50), false);
        tick.tick().await;
        assert!(started.elapsed() >= Duration::from_millis(40));
    }
}
