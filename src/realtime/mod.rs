//! Realtime
//!
//! Push-channel collaborator types and the sync bridge that turns change events into
//! cache invalidations.

use std::fmt;

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

pub mod bridge;
pub mod machine;
pub mod memory;
pub mod retry;

pub use bridge::{
    BindingHandle, BindingSpec, BridgeError, CallbackError, ChangeHandlers, SyncBridge,
};
pub use machine::{BindingMachine, BindingState, Effect};
pub use memory::MemoryChannel;
pub use retry::{RetryPolicy, RetryReason, RetryTimer};

/// A realtime data source: a backend table, optionally narrowed by a filter expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    table: String,
    filter: Option<String>,
}

impl Topic {
    /// Subscribe to every row of `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: None,
        }
    }

    /// Narrow the topic with a filter such as `guest_id=eq.42`.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Filter expression, if any.
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.filter {
            Some(filter) => write!(f, "{}?{filter}", self.table),
            None => f.write_str(&self.table),
        }
    }
}

/// Kind of row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// A row was inserted.
    Insert,

    /// A row was updated.
    Update,

    /// A row was deleted.
    Delete,
}

/// A row change pushed by the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// What happened to the row.
    pub kind: ChangeKind,

    /// Row payload as sent by the backend.
    pub payload: Value,
}

impl ChangeEvent {
    /// Create a change event.
    pub fn new(kind: ChangeKind, payload: Value) -> Self {
        Self { kind, payload }
    }
}

/// Subscription status reported by the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelStatus {
    /// The subscription is live.
    Subscribed,

    /// The channel failed; the detail is for diagnostics only.
    Error(String),

    /// The subscription attempt timed out.
    Timeout,

    /// The channel was closed.
    Closed,
}

/// Anything a subscription can deliver.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelMessage {
    /// A row change.
    Change(ChangeEvent),

    /// A status transition.
    Status(ChannelStatus),
}

/// Opaque identifier of an open channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelHandle(u64);

impl ChannelHandle {
    /// Wrap a channel id assigned by the collaborator.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw id.
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// An open channel and the stream of messages it delivers, in emission order.
#[derive(Debug)]
pub struct ChannelSubscription {
    /// Handle used to close the channel.
    pub handle: ChannelHandle,

    /// Messages for this channel.
    pub messages: mpsc::UnboundedReceiver<ChannelMessage>,
}

/// Errors opening a channel.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    /// The collaborator refused or failed to open the channel.
    #[error("failed to open realtime channel for {topic}: {reason}")]
    Open {
        /// Topic being opened.
        topic: String,

        /// Failure detail.
        reason: String,
    },
}

/// Push channel the bridge subscribes through.
#[automock]
#[async_trait]
pub trait RealtimeChannel: Send + Sync {
    /// Open a subscription for `topic`.
    async fn open(&self, topic: &Topic) -> Result<ChannelSubscription, ChannelError>;

    /// Close a previously opened channel. Closing an unknown handle is a no-op.
    async fn close(&self, handle: ChannelHandle);
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use testresult::TestResult;

    use super::*;

    #[test]
    fn topic_displays_filter() {
        let topic = Topic::new("guest_orders").with_filter("guest_id=eq.42");

        assert_eq!(topic.to_string(), "guest_orders?guest_id=eq.42");
        assert_eq!(Topic::new("amenities").to_string(), "amenities");
    }

    #[test]
    fn change_event_deserializes_lowercase_kind() -> TestResult {
        let event: ChangeEvent =
            serde_json::from_value(json!({ "kind": "update", "payload": { "id": "m1" } }))?;

        assert_eq!(event.kind, ChangeKind::Update);
        assert_eq!(event.payload, json!({ "id": "m1" }));

        Ok(())
    }
}
