//! Concierge prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    cache::{CacheKey, CacheRead, MemoryCache, QueryCache},
    cart::{AddOutcome, Cart, CartTotalError, line_total},
    config::{ConfigError, EngineConfig, LogFormat, LoggingConfig},
    engine::CartEngine,
    fixtures::{Catalog, FixtureError},
    lines::{
        AmenityLine, CartLine, Line, LineError, LineId, Price, QuantifiedLine, ServiceLine,
        ServiceType, ShopLine,
    },
    live::{Feed, LiveQuery},
    orders::{
        CheckoutCart, CheckoutDetails, CheckoutError, OrderKind, OrderSnapshot, OrderSubmitter,
        ServiceDetails, SubmissionOutcome, checkout,
    },
    realtime::{
        BindingHandle, BindingSpec, BindingState, BridgeError, CallbackError, ChangeEvent,
        ChangeHandlers, ChangeKind, ChannelStatus, MemoryChannel, RealtimeChannel, RetryPolicy,
        SyncBridge, Topic,
    },
    service::{ServiceCart, ServiceTypeConflict},
    session::{BackendConnector, GuestIdentity, SessionContext},
    summary::SummaryError,
};
