//! Reconnect policy and the single-slot retry timer.

use std::{future, time::Duration};

use tokio::time::{Instant, sleep_until};

/// Why a reconnect was scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    /// The channel reported an error.
    Error,

    /// The subscription attempt timed out.
    Timeout,
}

/// Fixed reconnect delays per failure kind. Retries continue indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay after a channel error.
    pub error_delay: Duration,

    /// Delay after a timeout; timeouts are usually short-lived network blips.
    pub timeout_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            error_delay: Duration::from_secs(5),
            timeout_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait before reconnecting after `reason`.
    pub fn delay_for(&self, reason: RetryReason) -> Duration {
        match reason {
            RetryReason::Error => self.error_delay,
            RetryReason::Timeout => self.timeout_delay,
        }
    }
}

/// Cancellable timer holding at most one pending retry.
#[derive(Debug, Default)]
pub struct RetryTimer {
    pending: Option<(Instant, RetryReason)>,
}

impl RetryTimer {
    /// Create a timer with nothing scheduled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a retry after `delay`. Returns `false`, leaving the existing deadline in
    /// place, if a retry is already pending.
    pub fn schedule(&mut self, reason: RetryReason, delay: Duration) -> bool {
        if self.pending.is_some() {
            return false;
        }

        self.pending = Some((Instant::now() + delay, reason));

        true
    }

    /// Drop the pending retry. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// Whether a retry is pending.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending retry fires.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|(deadline, _)| deadline)
    }

    /// Wait for the pending retry to fire and clear it.
    ///
    /// Never resolves when nothing is scheduled. Cancel safe: dropping the future keeps
    /// the retry pending.
    pub async fn fired(&mut self) -> RetryReason {
        let Some((deadline, reason)) = self.pending else {
            return future::pending().await;
        };

        sleep_until(deadline).await;
        self.pending = None;

        reason
    }
}
