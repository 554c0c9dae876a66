//! Concierge
//!
//! Concierge is the client-side engine behind a hotel guest-services app: typed shopping carts
//! for shop products, restaurant and room-service menus and amenities, plus a realtime bridge
//! that keeps cached queries fresh as backend rows change.

pub mod cache;
pub mod cart;
pub mod config;
pub mod engine;
pub mod fixtures;
pub mod lines;
pub mod live;
pub mod logging;
pub mod orders;
pub mod prelude;
pub mod realtime;
pub mod service;
pub mod session;
pub mod summary;
