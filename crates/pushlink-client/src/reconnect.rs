//! Reconnect supervisor
//!
//! Owns the single reconnect timer. Scheduling while a retry is already
//! pending replaces the old timer, so at most one retry is ever armed. The
//! attempt counter feeds the reconnect policy and resets on a successful
//! open.

use std::pin::Pin;

use tokio::time::{sleep, Sleep};
use tracing::debug;

use pushlink_core::ReconnectPolicy;

// ----------------------------------------------------------------------------
// Reconnect Supervisor
// ----------------------------------------------------------------------------

/// Single-shot retry timer driven by the configured policy
pub struct ReconnectSupervisor {
    policy: ReconnectPolicy,
    attempt: u32,
    pending: Option<Pin<Box<Sleep>>>,
}

impl ReconnectSupervisor {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempt: 0,
            pending: None,
        }
    }

    /// Arm a retry, replacing any pending one
    pub fn schedule(&mut self) {
        let delay = self.policy.delay_for(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        debug!(attempt = self.attempt, ?delay, "reconnect scheduled");
        self.pending = Some(Box::pin(sleep(delay)));
    }

    /// Cancel a pending retry, keeping the attempt counter
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Cancel any pending retry and reset the attempt counter; called after a
    /// successful open
    pub fn reset(&mut self) {
        self.pending = None;
        self.attempt = 0;
    }

    pub fn is_scheduled(&self) -> bool {
        self.pending.is_some()
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Wait for the pending retry to fire; pends forever while disarmed
    pub async fn fired(&mut self) {
        match self.pending.as_mut() {
            Some(timer) => timer.as_mut().await,
            None => futures::future::pending().await,
        }
        self.pending = None;
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use futures::FutureExt;
    use tokio::time::advance;

    fn fixed(secs: u64) -> ReconnectSupervisor {
        ReconnectSupervisor::new(ReconnectPolicy::Fixed(Duration::from_secs(secs)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let mut supervisor = fixed(5);
        supervisor.schedule();
        assert!(supervisor.is_scheduled());

        assert!(supervisor.fired().now_or_never().is_none());
        advance(Duration::from_secs(5)).await;
        assert!(supervisor.fired().now_or_never().is_some());

        // Firing disarms the timer
        assert!(!supervisor.is_scheduled());
        assert!(supervisor.fired().now_or_never().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_replaces_pending() {
        let mut supervisor = fixed(5);
        supervisor.schedule();
        advance(Duration::from_secs(4)).await;

        supervisor.schedule();
        advance(Duration::from_secs(1)).await;
        // Old timer would have fired by now; the replacement has not
        assert!(supervisor.fired().now_or_never().is_none());
        assert_eq!(supervisor.attempts(), 2);

        advance(Duration::from_secs(4)).await;
        assert!(supervisor.fired().now_or_never().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_and_reset() {
        let mut supervisor = fixed(5);
        supervisor.schedule();
        supervisor.cancel();
        assert!(!supervisor.is_scheduled());
        assert_eq!(supervisor.attempts(), 1);

        supervisor.schedule();
        supervisor.reset();
        assert!(!supervisor.is_scheduled());
        assert_eq!(supervisor.attempts(), 0);

        advance(Duration::from_secs(60)).await;
        assert!(supervisor.fired().now_or_never().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_attempts_feed_policy() {
        let mut supervisor = ReconnectSupervisor::new(ReconnectPolicy::Backoff {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(8),
            multiplier: 2.0,
        });
        supervisor.schedule();
        assert_eq!(supervisor.attempts(), 1);
        // Full jitter keeps the delay within the cap regardless of attempt
        advance(Duration::from_secs(8)).await;
        assert!(supervisor.fired().now_or_never().is_some());
    }
}
