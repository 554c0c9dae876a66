//! Binding state machine.
//!
//! Pure transition logic for one binding. Each input returns the effects the driver
//! must perform; nothing here touches the channel, the cache or the clock.

use std::time::Duration;

use smallvec::{SmallVec, smallvec};

use crate::realtime::{
    ChangeEvent, ChannelStatus,
    retry::{RetryPolicy, RetryReason},
};

/// Lifecycle of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    /// Created, not yet connecting.
    Idle,

    /// Waiting for the channel to confirm the subscription.
    Connecting,

    /// Receiving change events.
    Subscribed,

    /// The channel failed; a reconnect is scheduled.
    Degraded,

    /// Torn down. Terminal.
    Closed,
}

/// Work the driver performs in response to a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Open a channel for the binding's topic.
    OpenChannel,

    /// Close the current channel, if any.
    CloseChannel,

    /// Arm the retry timer.
    ScheduleRetry {
        /// Failure that caused the retry.
        reason: RetryReason,

        /// Delay before reconnecting.
        delay: Duration,
    },

    /// Disarm the retry timer.
    CancelRetry,

    /// Invoke the callback registered for the event's kind.
    Dispatch(ChangeEvent),

    /// Invalidate the bound cache key.
    Invalidate,
}

/// Effects produced by a single input.
pub type Effects = SmallVec<[Effect; 2]>;

/// State machine for one binding.
#[derive(Debug, Clone)]
pub struct BindingMachine {
    state: BindingState,
    policy: RetryPolicy,
    retry_pending: Option<RetryReason>,
}

impl BindingMachine {
    /// Create an idle machine.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            state: BindingState::Idle,
            policy,
            retry_pending: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> BindingState {
        self.state
    }

    /// The failure a retry is currently scheduled for, if any.
    pub fn retry_pending(&self) -> Option<RetryReason> {
        self.retry_pending
    }

    /// Whether the binding has been torn down.
    pub fn is_closed(&self) -> bool {
        self.state == BindingState::Closed
    }

    /// Start connecting. Only valid from `Idle`.
    pub fn activate(&mut self) -> Effects {
        if self.state != BindingState::Idle {
            return Effects::new();
        }

        self.state = BindingState::Connecting;

        smallvec![Effect::OpenChannel]
    }

    /// Apply a status reported by the channel.
    pub fn on_status(&mut self, status: &ChannelStatus) -> Effects {
        if matches!(self.state, BindingState::Idle | BindingState::Closed) {
            return Effects::new();
        }

        match status {
            ChannelStatus::Subscribed => {
                self.state = BindingState::Subscribed;

                if self.retry_pending.take().is_some() {
                    smallvec![Effect::CancelRetry]
                } else {
                    Effects::new()
                }
            }
            ChannelStatus::Error(_) => self.degrade(RetryReason::Error),
            ChannelStatus::Timeout => self.degrade(RetryReason::Timeout),
            ChannelStatus::Closed => Effects::new(),
        }
    }

    /// Apply a change event. Only subscribed bindings react.
    pub fn on_change(&mut self, event: ChangeEvent) -> Effects {
        if self.state != BindingState::Subscribed {
            return Effects::new();
        }

        smallvec![Effect::Dispatch(event), Effect::Invalidate]
    }

    /// The retry timer fired: tear down the failed channel and open a new one.
    pub fn retry_elapsed(&mut self) -> Effects {
        if self.state != BindingState::Degraded || self.retry_pending.take().is_none() {
            return Effects::new();
        }

        self.state = BindingState::Connecting;

        smallvec![Effect::CloseChannel, Effect::OpenChannel]
    }

    /// Tear the binding down. Returns `false` if it was already closed.
    pub fn close(&mut self) -> bool {
        if self.is_closed() {
            return false;
        }

        self.state = BindingState::Closed;
        self.retry_pending = None;

        true
    }

    fn degrade(&mut self, reason: RetryReason) -> Effects {
        self.state = BindingState::Degraded;

        if self.retry_pending.is_some() {
            return Effects::new();
        }

        self.retry_pending = Some(reason);

        smallvec![Effect::ScheduleRetry {
            reason,
            delay: self.policy.delay_for(reason),
        }]
    }
}
