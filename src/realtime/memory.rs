//! In-memory realtime channel for demos and tests.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;

use crate::realtime::{
    ChangeEvent, ChannelError, ChannelHandle, ChannelMessage, ChannelStatus, ChannelSubscription,
    RealtimeChannel, Topic,
};

#[derive(Debug, Default)]
struct MemoryChannelState {
    next_handle: u64,
    subscribers: FxHashMap<ChannelHandle, (Topic, mpsc::UnboundedSender<ChannelMessage>)>,
    opened: u64,
    closed: u64,
    failures: VecDeque<String>,
}

/// Loopback [`RealtimeChannel`]: whatever is published is delivered to every open
/// subscription on the same topic.
///
/// Clones share the same subscriptions.
#[derive(Debug, Clone)]
pub struct MemoryChannel {
    inner: Arc<Mutex<MemoryChannelState>>,
    auto_subscribe: bool,
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryChannel {
    /// A channel that confirms every subscription as soon as it is opened.
    pub fn new() -> Self {
        Self {
            inner: Arc::default(),
            auto_subscribe: true,
        }
    }

    /// A channel that leaves subscriptions connecting until
    /// [`ChannelStatus::Subscribed`] is emitted explicitly.
    pub fn manual() -> Self {
        Self {
            inner: Arc::default(),
            auto_subscribe: false,
        }
    }

    /// Make the next `open` fail with `reason`.
    pub fn fail_next_open(&self, reason: impl Into<String>) {
        self.lock().failures.push_back(reason.into());
    }

    /// Deliver `event` to subscriptions on `topic`. Returns how many received it.
    pub fn publish(&self, topic: &Topic, event: ChangeEvent) -> usize {
        self.send(topic, &ChannelMessage::Change(event))
    }

    /// Deliver `status` to subscriptions on `topic`. Returns how many received it.
    pub fn emit_status(&self, topic: &Topic, status: ChannelStatus) -> usize {
        self.send(topic, &ChannelMessage::Status(status))
    }

    /// Number of `open` calls, including failed ones.
    pub fn opened(&self) -> u64 {
        self.lock().opened
    }

    /// Number of channels closed.
    pub fn closed(&self) -> u64 {
        self.lock().closed
    }

    /// Number of channels currently open.
    pub fn live(&self) -> usize {
        self.lock().subscribers.len()
    }

    fn send(&self, topic: &Topic, message: &ChannelMessage) -> usize {
        self.lock()
            .subscribers
            .values()
            .filter(|(subscribed, _sender)| subscribed == topic)
            .filter(|(_topic, sender)| sender.send(message.clone()).is_ok())
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryChannelState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RealtimeChannel for MemoryChannel {
    async fn open(&self, topic: &Topic) -> Result<ChannelSubscription, ChannelError> {
        let mut state = self.lock();

        state.opened += 1;

        if let Some(reason) = state.failures.pop_front() {
            return Err(ChannelError::Open {
                topic: topic.to_string(),
                reason,
            });
        }

        state.next_handle += 1;

        let handle = ChannelHandle::new(state.next_handle);
        let (sender, messages) = mpsc::unbounded_channel();

        if self.auto_subscribe {
            _ = sender.send(ChannelMessage::Status(ChannelStatus::Subscribed));
        }

        state.subscribers.insert(handle, (topic.clone(), sender));

        Ok(ChannelSubscription { handle, messages })
    }

    async fn close(&self, handle: ChannelHandle) {
        let mut state = self.lock();

        if state.subscribers.remove(&handle).is_some() {
            state.closed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use testresult::TestResult;

    use crate::realtime::ChangeKind;

    use super::*;

    #[tokio::test]
    async fn publishes_only_to_matching_topic() -> TestResult {
        let channel = MemoryChannel::manual();
        let orders = Topic::new("guest_orders").with_filter("guest_id=eq.g1");

        let mut subscription = channel.open(&orders).await?;
        let _other = channel.open(&Topic::new("amenities")).await?;

        let delivered = channel.publish(
            &orders,
            ChangeEvent::new(ChangeKind::Insert, json!({ "id": "o1" })),
        );

        assert_eq!(delivered, 1);
        assert!(matches!(
            subscription.messages.recv().await,
            Some(ChannelMessage::Change(event)) if event.kind == ChangeKind::Insert
        ));

        Ok(())
    }

    #[tokio::test]
    async fn auto_subscribe_confirms_on_open() -> TestResult {
        let channel = MemoryChannel::new();

        let mut subscription = channel.open(&Topic::new("amenities")).await?;

        assert_eq!(
            subscription.messages.recv().await,
            Some(ChannelMessage::Status(ChannelStatus::Subscribed))
        );

        Ok(())
    }

    #[tokio::test]
    async fn queued_failure_applies_to_one_open() {
        let channel = MemoryChannel::new();
        channel.fail_next_open("offline");

        let first = channel.open(&Topic::new("amenities")).await;
        let second = channel.open(&Topic::new("amenities")).await;

        assert!(matches!(first, Err(ChannelError::Open { reason, .. }) if reason == "offline"));
        assert!(second.is_ok());
        assert_eq!(channel.opened(), 2);
        assert_eq!(channel.live(), 1);
    }

    #[tokio::test]
    async fn closing_unknown_handle_is_noop() -> TestResult {
        let channel = MemoryChannel::new();
        let subscription = channel.open(&Topic::new("amenities")).await?;

        channel.close(subscription.handle).await;
        channel.close(subscription.handle).await;

        assert_eq!(channel.closed(), 1);
        assert_eq!(channel.live(), 0);

        Ok(())
    }
}
