//! Live Queries
//!
//! A live query reads a list through the query cache and keeps it fresh with one realtime
//! binding. [`Feed`] names the lists a guest session subscribes to.

use crate::{
    cache::{CacheKey, CacheRead},
    realtime::{
        BindingHandle, BindingSpec, BindingState, BridgeError, ChangeHandlers, SyncBridge, Topic,
    },
    session::GuestIdentity,
};

/// Lists a guest session keeps live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feed {
    /// Restaurant and room-service menu.
    MenuItems,

    /// Shop catalogue.
    ShopProducts,

    /// Requestable amenities.
    Amenities,

    /// Hotel information and theme settings.
    HotelSettings,

    /// The guest's own orders.
    GuestOrders,

    /// The guest's chat with staff.
    ChatMessages,
}

impl Feed {
    /// Every feed, in the order a session mounts them.
    pub const ALL: [Self; 6] = [
        Self::MenuItems,
        Self::ShopProducts,
        Self::Amenities,
        Self::HotelSettings,
        Self::GuestOrders,
        Self::ChatMessages,
    ];

    /// Backend table behind the feed.
    pub fn table(self) -> &'static str {
        match self {
            Self::MenuItems => "menu_items",
            Self::ShopProducts => "shop_products",
            Self::Amenities => "amenities",
            Self::HotelSettings => "hotel_settings",
            Self::GuestOrders => "guest_orders",
            Self::ChatMessages => "chat_messages",
        }
    }

    /// Whether rows are private to a guest rather than shared across the hotel.
    pub fn is_guest_scoped(self) -> bool {
        matches!(self, Self::GuestOrders | Self::ChatMessages)
    }

    /// Realtime topic for `identity`.
    pub fn topic(self, identity: &GuestIdentity) -> Topic {
        let filter = if self.is_guest_scoped() {
            identity.guest_filter()
        } else {
            identity.hotel_filter()
        };

        Topic::new(self.table()).with_filter(filter)
    }

    /// Cache key for `identity`.
    pub fn cache_key(self, identity: &GuestIdentity) -> CacheKey {
        let scope = if self.is_guest_scoped() {
            &identity.guest_id
        } else {
            &identity.hotel_id
        };

        CacheKey::new([self.table(), scope.as_str()])
    }

    /// Binding for `identity`.
    pub fn binding(self, identity: &GuestIdentity) -> BindingSpec {
        BindingSpec::new(self.topic(identity), self.cache_key(identity))
    }
}

/// A cached list kept fresh by a realtime binding while active.
#[derive(Debug)]
pub struct LiveQuery {
    bridge: SyncBridge,
    spec: BindingSpec,
    handlers: ChangeHandlers,
    binding: Option<BindingHandle>,
}

impl LiveQuery {
    /// Mount the query, binding immediately when `active`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError`] if the binding cannot be created.
    pub fn mount(
        bridge: SyncBridge,
        spec: BindingSpec,
        handlers: ChangeHandlers,
        active: bool,
    ) -> Result<Self, BridgeError> {
        let mut query = Self {
            bridge,
            spec,
            handlers,
            binding: None,
        };

        if active {
            query.bind()?;
        }

        Ok(query)
    }

    /// Read the list from the cache.
    pub fn read(&self) -> CacheRead {
        self.bridge.cache().read(&self.spec.cache_key)
    }

    /// What the query subscribes to.
    pub fn spec(&self) -> &BindingSpec {
        &self.spec
    }

    /// Whether a binding is mounted.
    pub fn is_active(&self) -> bool {
        self.binding.is_some()
    }

    /// State of the current binding, if any.
    pub fn state(&self) -> Option<BindingState> {
        self.binding.as_ref().map(BindingHandle::state)
    }

    /// Activate or deactivate the query. Deactivating tears the binding down.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError`] if activation cannot create the binding.
    pub async fn set_active(&mut self, active: bool) -> Result<(), BridgeError> {
        match (active, self.binding.take()) {
            (true, Some(binding)) => {
                self.binding = Some(binding);
            }
            (true, None) => self.bind()?,
            (false, Some(binding)) => binding.shutdown().await,
            (false, None) => {}
        }

        Ok(())
    }

    /// Point the query at a new topic or cache key.
    ///
    /// The old channel is closed before the new one is opened. Re-binding to the same
    /// spec is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError`] if the new binding cannot be created.
    pub async fn rebind(&mut self, spec: BindingSpec) -> Result<(), BridgeError> {
        if spec == self.spec {
            return Ok(());
        }

        self.spec = spec;

        if let Some(binding) = self.binding.take() {
            binding.shutdown().await;
            self.bind()?;
        }

        Ok(())
    }

    /// Tear the query down and wait for its channel to close.
    pub async fn unmount(mut self) {
        if let Some(binding) = self.binding.take() {
            binding.shutdown().await;
        }
    }

    fn bind(&mut self) -> Result<(), BridgeError> {
        let binding = self.bridge.bind(self.spec.clone(), self.handlers.clone())?;
        self.binding = Some(binding);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mockall::predicate::eq;
    use serde_json::json;
    use testresult::TestResult;

    use crate::{
        cache::{MemoryCache, MockQueryCache},
        realtime::{ChangeEvent, ChangeKind, MemoryChannel},
    };

    use super::*;

    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    fn guest() -> GuestIdentity {
        GuestIdentity::new("h1", "g42")
    }

    #[test]
    fn catalog_feeds_scope_to_hotel() {
        let topic = Feed::MenuItems.topic(&guest());

        assert_eq!(topic.table(), "menu_items");
        assert_eq!(topic.filter(), Some("hotel_id=eq.h1"));
        assert_eq!(Feed::MenuItems.cache_key(&guest()).to_string(), "menu_items:h1");
    }

    #[test]
    fn personal_feeds_scope_to_guest() {
        for feed in [Feed::GuestOrders, Feed::ChatMessages] {
            let binding = feed.binding(&guest());

            assert_eq!(binding.topic.filter(), Some("guest_id=eq.g42"));
            assert_eq!(binding.cache_key.parts().last().map(String::as_str), Some("g42"));
        }
    }

    #[tokio::test]
    async fn read_goes_through_cache() -> TestResult {
        let mut cache = MockQueryCache::new();
        let key = Feed::Amenities.cache_key(&guest());

        cache
            .expect_read()
            .with(eq(key))
            .times(1)
            .returning(|_key| CacheRead::Ready(json!([{ "id": "a1" }])));

        let bridge = SyncBridge::new(Arc::new(MemoryChannel::new()), Arc::new(cache));
        let query = LiveQuery::mount(
            bridge,
            Feed::Amenities.binding(&guest()),
            ChangeHandlers::new(),
            false,
        )?;

        assert_eq!(query.read(), CacheRead::Ready(json!([{ "id": "a1" }])));
        assert!(!query.is_active());

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn inactive_query_opens_nothing_until_activated() -> TestResult {
        let channel = MemoryChannel::new();
        let bridge = SyncBridge::new(Arc::new(channel.clone()), Arc::new(MemoryCache::new()));

        let mut query = LiveQuery::mount(
            bridge,
            Feed::GuestOrders.binding(&guest()),
            ChangeHandlers::new(),
            false,
        )?;
        settle().await;

        assert_eq!(channel.opened(), 0);

        query.set_active(true).await?;
        query.set_active(true).await?;
        settle().await;

        assert_eq!(channel.opened(), 1);
        assert_eq!(query.state(), Some(BindingState::Subscribed));

        query.set_active(false).await?;

        assert_eq!(channel.live(), 0);
        assert_eq!(query.state(), None);

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn rebind_closes_old_channel_first() -> TestResult {
        let channel = MemoryChannel::new();
        let cache = Arc::new(MemoryCache::new());
        let bridge = SyncBridge::new(Arc::new(channel.clone()), cache.clone());

        let mut query = LiveQuery::mount(
            bridge,
            Feed::ChatMessages.binding(&guest()),
            ChangeHandlers::new(),
            true,
        )?;
        settle().await;

        let old_topic = query.spec().topic.clone();
        let other_guest = GuestIdentity::new("h1", "g7");

        query.rebind(Feed::ChatMessages.binding(&other_guest)).await?;

        assert_eq!(channel.closed(), 1, "old channel closed before rebinding");

        settle().await;

        assert_eq!(channel.live(), 1);

        let late = channel.publish(
            &old_topic,
            ChangeEvent::new(ChangeKind::Insert, json!({ "id": "c1" })),
        );
        settle().await;

        assert_eq!(late, 0);
        assert_eq!(cache.invalidation_count(), 0);

        channel.publish(
            &Feed::ChatMessages.topic(&other_guest),
            ChangeEvent::new(ChangeKind::Insert, json!({ "id": "c2" })),
        );
        settle().await;

        assert!(cache.is_stale(&Feed::ChatMessages.cache_key(&other_guest)));

        query.unmount().await;

        assert_eq!(channel.live(), 0);

        Ok(())
    }
}
