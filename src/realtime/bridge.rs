//! Sync Bridge
//!
//! Binds a realtime topic to a cache key. Each binding runs a driver task that feeds
//! channel messages and retry deadlines into a [`BindingMachine`] and performs the
//! effects it returns.

use std::{
    collections::VecDeque,
    fmt, future,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use thiserror::Error;
use tokio::{
    runtime::{Handle, TryCurrentError},
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    cache::{CacheKey, QueryCache},
    realtime::{
        ChangeEvent, ChangeKind, ChannelHandle, ChannelMessage, ChannelStatus, RealtimeChannel,
        Topic,
        machine::{BindingMachine, BindingState, Effect, Effects},
        retry::{RetryPolicy, RetryTimer},
    },
};

/// Error returned by a change callback. Logged by the bridge, never propagated.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct CallbackError(String);

impl CallbackError {
    /// Create a callback error with a diagnostic message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Callback invoked for a change event.
pub type ChangeCallback = Arc<dyn Fn(&ChangeEvent) -> Result<(), CallbackError> + Send + Sync>;

/// Optional callbacks per change kind.
#[derive(Clone, Default)]
pub struct ChangeHandlers {
    insert: Option<ChangeCallback>,
    update: Option<ChangeCallback>,
    delete: Option<ChangeCallback>,
}

impl ChangeHandlers {
    /// No callbacks; events only invalidate the cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `callback` for inserted rows.
    #[must_use]
    pub fn on_insert<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ChangeEvent) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.insert = Some(Arc::new(callback));
        self
    }

    /// Call `callback` for updated rows.
    #[must_use]
    pub fn on_update<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ChangeEvent) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.update = Some(Arc::new(callback));
        self
    }

    /// Call `callback` for deleted rows.
    #[must_use]
    pub fn on_delete<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ChangeEvent) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.delete = Some(Arc::new(callback));
        self
    }

    /// The callback registered for `kind`, if any.
    pub fn handler_for(&self, kind: ChangeKind) -> Option<&ChangeCallback> {
        match kind {
            ChangeKind::Insert => self.insert.as_ref(),
            ChangeKind::Update => self.update.as_ref(),
            ChangeKind::Delete => self.delete.as_ref(),
        }
    }
}

impl fmt::Debug for ChangeHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeHandlers")
            .field("insert", &self.insert.is_some())
            .field("update", &self.update.is_some())
            .field("delete", &self.delete.is_some())
            .finish()
    }
}

/// What a binding subscribes to and which cache entry it keeps fresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSpec {
    /// Realtime topic.
    pub topic: Topic,

    /// Cache entry invalidated on every change.
    pub cache_key: CacheKey,
}

impl BindingSpec {
    /// Create a binding spec.
    pub fn new(topic: Topic, cache_key: CacheKey) -> Self {
        Self { topic, cache_key }
    }
}

/// Errors creating a binding.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Bindings spawn a driver task and need a Tokio runtime.
    #[error("realtime bindings must be created inside a Tokio runtime")]
    NoRuntime(#[from] TryCurrentError),
}

/// Creates realtime bindings against a channel and a cache.
#[derive(Clone)]
pub struct SyncBridge {
    channel: Arc<dyn RealtimeChannel>,
    cache: Arc<dyn QueryCache>,
    policy: RetryPolicy,
}

impl SyncBridge {
    /// Create a bridge with the default retry policy.
    pub fn new(channel: Arc<dyn RealtimeChannel>, cache: Arc<dyn QueryCache>) -> Self {
        Self {
            channel,
            cache,
            policy: RetryPolicy::default(),
        }
    }

    /// Override the reconnect delays.
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The cache bindings invalidate.
    pub fn cache(&self) -> &Arc<dyn QueryCache> {
        &self.cache
    }

    /// Reconnect delays used by new bindings.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Bind `spec`, opening its channel immediately.
    ///
    /// The binding stays live until the returned handle is closed or dropped.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NoRuntime`] when called outside a Tokio runtime.
    pub fn bind(
        &self,
        spec: BindingSpec,
        handlers: ChangeHandlers,
    ) -> Result<BindingHandle, BridgeError> {
        let runtime = Handle::try_current()?;

        let shared = Arc::new(Mutex::new(Shared {
            machine: BindingMachine::new(self.policy),
            live: None,
        }));

        let (stop, stopped) = watch::channel(false);

        let driver = Driver {
            spec: spec.clone(),
            handlers,
            channel: Arc::clone(&self.channel),
            cache: Arc::clone(&self.cache),
            shared: Arc::clone(&shared),
            stopped,
        };

        debug!(topic = %spec.topic, cache_key = %spec.cache_key, "binding realtime topic");

        let task = runtime.spawn(driver.run());

        Ok(BindingHandle {
            spec,
            shared,
            channel: Arc::clone(&self.channel),
            runtime,
            stop,
            task: Some(task),
        })
    }
}

impl fmt::Debug for SyncBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncBridge")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct Shared {
    machine: BindingMachine,
    live: Option<ChannelHandle>,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A live binding. Dropping the handle tears the binding down.
pub struct BindingHandle {
    spec: BindingSpec,
    shared: Arc<Mutex<Shared>>,
    channel: Arc<dyn RealtimeChannel>,
    runtime: Handle,
    stop: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl BindingHandle {
    /// What this binding subscribes to.
    pub fn spec(&self) -> &BindingSpec {
        &self.spec
    }

    /// Current binding state.
    pub fn state(&self) -> BindingState {
        lock(&self.shared).machine.state()
    }

    /// Tear the binding down without waiting for the channel to close.
    ///
    /// After this returns no callback runs and no invalidation is issued for this
    /// binding, and no reconnect is attempted. Calling it again is a no-op.
    pub fn close(&self) {
        if let Some(live) = self.teardown() {
            let channel = Arc::clone(&self.channel);

            self.runtime.spawn(async move {
                channel.close(live).await;
            });
        }
    }

    /// Tear the binding down and wait for its channel to close.
    ///
    /// An `open` already in flight is allowed to finish so the channel it returns
    /// can be closed as well.
    pub async fn shutdown(mut self) {
        if let Some(live) = self.teardown() {
            self.channel.close(live).await;
        }

        if let Some(task) = self.task.take()
            && let Err(error) = task.await
        {
            warn!(topic = %self.spec.topic, %error, "realtime driver did not stop cleanly");
        }
    }

    fn teardown(&self) -> Option<ChannelHandle> {
        let mut shared = lock(&self.shared);

        if !shared.machine.close() {
            return None;
        }

        self.stop.send_replace(true);

        debug!(topic = %self.spec.topic, "realtime binding closed");

        shared.live.take()
    }
}

impl Drop for BindingHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for BindingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingHandle")
            .field("spec", &self.spec)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

struct Driver {
    spec: BindingSpec,
    handlers: ChangeHandlers,
    channel: Arc<dyn RealtimeChannel>,
    cache: Arc<dyn QueryCache>,
    shared: Arc<Mutex<Shared>>,
    stopped: watch::Receiver<bool>,
}

#[derive(Default)]
struct Link {
    messages: Option<mpsc::UnboundedReceiver<ChannelMessage>>,
    timer: RetryTimer,
}

enum Wake {
    Message(Option<ChannelMessage>),
    Retry,
    Stop,
}

async fn next_message(
    messages: Option<&mut mpsc::UnboundedReceiver<ChannelMessage>>,
) -> Option<ChannelMessage> {
    match messages {
        Some(messages) => messages.recv().await,
        None => future::pending().await,
    }
}

impl Driver {
    async fn run(mut self) {
        let mut link = Link::default();

        let effects = self.lock().machine.activate();
        self.apply(effects, &mut link).await;

        loop {
            if self.lock().machine.is_closed() {
                break;
            }

            let wake = tokio::select! {
                _ = self.stopped.wait_for(|stopped| *stopped) => Wake::Stop,
                message = next_message(link.messages.as_mut()) => Wake::Message(message),
                _ = link.timer.fired() => Wake::Retry,
            };

            let effects = match wake {
                Wake::Message(Some(ChannelMessage::Change(event))) => {
                    self.lock().machine.on_change(event)
                }
                Wake::Message(Some(ChannelMessage::Status(status))) => {
                    self.log_status(&status);
                    self.lock().machine.on_status(&status)
                }
                Wake::Message(None) => {
                    link.messages = None;

                    let status = ChannelStatus::Error("channel stream ended".to_string());
                    self.log_status(&status);
                    self.lock().machine.on_status(&status)
                }
                Wake::Retry => {
                    info!(topic = %self.spec.topic, "reconnecting realtime channel");
                    self.lock().machine.retry_elapsed()
                }
                Wake::Stop => break,
            };

            self.apply(effects, &mut link).await;
        }
    }

    async fn apply(&self, effects: Effects, link: &mut Link) {
        let mut queue: VecDeque<Effect> = effects.into_iter().collect();

        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::OpenChannel => match self.channel.open(&self.spec.topic).await {
                    Ok(subscription) => {
                        let closed = {
                            let mut shared = self.lock();
                            let closed = shared.machine.is_closed();

                            if !closed {
                                shared.live = Some(subscription.handle);
                            }

                            closed
                        };

                        if closed {
                            self.channel.close(subscription.handle).await;
                            return;
                        }

                        link.messages = Some(subscription.messages);
                    }
                    Err(error) => {
                        warn!(topic = %self.spec.topic, %error, "failed to open realtime channel");

                        let status = ChannelStatus::Error(error.to_string());
                        queue.extend(self.lock().machine.on_status(&status));
                    }
                },
                Effect::CloseChannel => {
                    link.messages = None;

                    let live = self.lock().live.take();

                    if let Some(handle) = live {
                        self.channel.close(handle).await;
                    }
                }
                Effect::ScheduleRetry { reason, delay } => {
                    warn!(
                        topic = %self.spec.topic,
                        ?reason,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "scheduling realtime reconnect"
                    );

                    link.timer.schedule(reason, delay);
                }
                Effect::CancelRetry => {
                    link.timer.cancel();
                }
                Effect::Dispatch(event) => self.dispatch(&event),
                Effect::Invalidate => {
                    let shared = self.lock();

                    if !shared.machine.is_closed() {
                        debug!(cache_key = %self.spec.cache_key, "invalidating cached query");
                        self.cache.invalidate(&self.spec.cache_key);
                    }
                }
            }
        }
    }

    fn dispatch(&self, event: &ChangeEvent) {
        if self.lock().machine.is_closed() {
            return;
        }

        let Some(callback) = self.handlers.handler_for(event.kind) else {
            return;
        };

        match catch_unwind(AssertUnwindSafe(|| callback(event))) {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                warn!(
                    topic = %self.spec.topic,
                    kind = ?event.kind,
                    %error,
                    "change callback failed"
                );
            }
            Err(_panic) => {
                warn!(topic = %self.spec.topic, kind = ?event.kind, "change callback panicked");
            }
        }
    }

    fn log_status(&self, status: &ChannelStatus) {
        match status {
            ChannelStatus::Subscribed => {
                info!(topic = %self.spec.topic, "realtime channel subscribed");
            }
            ChannelStatus::Error(detail) => {
                warn!(topic = %self.spec.topic, %detail, "realtime channel error");
            }
            ChannelStatus::Timeout => {
                warn!(topic = %self.spec.topic, "realtime channel timed out");
            }
            ChannelStatus::Closed => {
                debug!(topic = %self.spec.topic, "realtime channel closed");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        lock(&self.shared)
    }
}
