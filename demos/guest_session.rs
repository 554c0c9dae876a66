//! Guest Session Example
//!
//! Fills a guest's carts from a catalog fixture, prints the summary, keeps the guest's
//! orders list live through an in-memory realtime channel, and checks out the dining cart.
//!
//! Use `--catalog` to load a catalog file instead of `fixtures/catalog/harbour.yml`

use std::{io, sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use concierge::{
    config::EngineConfig,
    fixtures::Catalog,
    logging,
    orders::{
        CheckoutDetails, OrderSnapshot, OrderSubmitter, ServiceDetails, SubmissionOutcome,
        checkout,
    },
    prelude::{
        CacheRead, CartEngine, ChangeEvent, ChangeHandlers, ChangeKind, Feed, GuestIdentity,
        LiveQuery, MemoryCache, MemoryChannel, SyncBridge,
    },
    summary,
};
use serde_json::json;
use tracing::{info, warn};

/// Accepts every order and publishes it on the guest's orders topic.
struct LoopbackSubmitter {
    channel: MemoryChannel,
    identity: GuestIdentity,
}

#[async_trait]
impl OrderSubmitter for LoopbackSubmitter {
    async fn submit(&self, order: OrderSnapshot) -> SubmissionOutcome {
        self.channel.publish(
            &Feed::GuestOrders.topic(&self.identity),
            ChangeEvent::new(
                ChangeKind::Insert,
                json!({
                    "kind": order.kind.as_str(),
                    "lines": order.lines.len(),
                    "subtotal_minor": order.subtotal.to_minor_units(),
                }),
            ),
        );

        SubmissionOutcome::Accepted
    }
}

/// Guest Session Example
#[tokio::main(flavor = "current_thread")]
pub async fn main() -> Result<()> {
    let config = EngineConfig::load()?;

    logging::init(&config.logging)?;

    let catalog = match config.catalog.as_deref() {
        Some(path) => Catalog::from_path(path)?,
        None => Catalog::from_set("harbour")?,
    };

    let currency = match catalog.currency() {
        Some(currency) => currency,
        None => config.currency()?,
    };

    let identity = GuestIdentity::new("harbour-house", "guest-42").with_room_number("214");
    let mut engine = CartEngine::new(currency);

    engine
        .shop_mut()
        .add(catalog.shop_line("bath-robe")?.with_quantity(2));
    engine.service_mut().add(catalog.menu_line("club-sandwich")?)?;
    engine.service_mut().increment("club-sandwich");
    engine
        .amenities_mut()
        .add(catalog.amenity_line("extra-towels")?);

    if let Err(conflict) = engine.service_mut().add(catalog.menu_line("porridge")?) {
        warn!(%conflict, "menu item not added");
    }

    summary::write_to(&engine, io::stdout().lock())?;

    let channel = MemoryChannel::new();
    let cache = Arc::new(MemoryCache::new());
    let bridge = SyncBridge::new(Arc::new(channel.clone()), cache.clone())
        .with_policy(config.retry_policy());

    let orders_key = Feed::GuestOrders.cache_key(&identity);
    cache.store(orders_key.clone(), json!([]));

    let handlers = ChangeHandlers::new().on_insert(|event: &ChangeEvent| {
        info!(order = %event.payload, "order placed");
        Ok(())
    });

    let orders = LiveQuery::mount(
        bridge,
        Feed::GuestOrders.binding(&identity),
        handlers,
        true,
    )?;

    tokio::time::sleep(Duration::from_millis(10)).await;

    let submitter = LoopbackSubmitter {
        channel: channel.clone(),
        identity: identity.clone(),
    };

    let details = CheckoutDetails::new()
        .with_special_instructions("No tomato, please")
        .with_service(ServiceDetails::Restaurant {
            venue_id: Some("harbour-grill".to_string()),
            party_size: 2,
        });

    checkout(engine.service_mut(), details, &submitter).await?;

    tokio::time::sleep(Duration::from_millis(10)).await;

    for key in cache.take_stale() {
        info!(cache_key = %key, "refetching");
        cache.store(key, json!([{ "kind": "service", "status": "received" }]));
    }

    if let CacheRead::Ready(value) = orders.read() {
        info!(orders = %value, "guest orders refreshed");
    }

    orders.unmount().await;

    summary::write_to(&engine, io::stdout().lock())?;

    Ok(())
}
