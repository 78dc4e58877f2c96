//! Heartbeat monitor
//!
//! Owns the single heartbeat timer. The monitor runs exactly while the
//! connection is Open; starting replaces any previous timer, so at most one
//! interval is ever armed.

use core::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

// ----------------------------------------------------------------------------
// Heartbeat Monitor
// ----------------------------------------------------------------------------

/// Periodic liveness probe timer
#[derive(Debug)]
pub struct HeartbeatMonitor {
    period: Duration,
    ticker: Option<Interval>,
}

impl HeartbeatMonitor {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            ticker: None,
        }
    }

    /// Arm the timer; the first tick fires one full period from now
    pub fn start(&mut self) {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
    }

    /// Disarm the timer
    pub fn stop(&mut self) {
        self.ticker = None;
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    /// Wait for the next tick; pends forever while stopped
    pub async fn tick(&mut self) {
        match &mut self.ticker {
            Some(ticker) => {
                ticker.tick().await;
            }
            None => futures::future::pending().await,
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_one_period() {
        let mut monitor = HeartbeatMonitor::new(Duration::from_secs(30));
        monitor.start();
        assert!(monitor.is_running());

        assert!(monitor.tick().now_or_never().is_none());

        advance(Duration::from_secs(30)).await;
        assert!(monitor.tick().now_or_never().is_some());

        // Next tick needs another full period
        assert!(monitor.tick().now_or_never().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_monitor_never_ticks() {
        let mut monitor = HeartbeatMonitor::new(Duration::from_secs(30));
        assert!(!monitor.is_running());
        advance(Duration::from_secs(120)).await;
        assert!(monitor.tick().now_or_never().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_timer() {
        let mut monitor = HeartbeatMonitor::new(Duration::from_secs(30));
        monitor.start();
        advance(Duration::from_secs(29)).await;

        // Re-arming cancels the almost-elapsed timer
        monitor.start();
        advance(Duration::from_secs(1)).await;
        assert!(monitor.tick().now_or_never().is_none());

        advance(Duration::from_secs(29)).await;
        assert!(monitor.tick().now_or_never().is_some());
    }
}
