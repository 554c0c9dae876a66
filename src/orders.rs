//! Orders
//!
//! Checkout snapshots a cart, hands it to the order submission collaborator and clears
//! the cart only once the order is accepted.

use std::fmt;

use async_trait::async_trait;
use jiff::civil::DateTime;
use mockall::automock;
use thiserror::Error;
use tracing::{Span, info, warn};

use crate::{
    cart::{Cart, CartTotalError},
    lines::{AmenityLine, CartLine, Line, Price, ServiceType, ShopLine},
    service::ServiceCart,
};

/// Which cart an order came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderKind {
    /// Shop purchase.
    Shop,

    /// Restaurant or room-service order.
    Service,

    /// Amenity request.
    Amenity,
}

impl OrderKind {
    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            OrderKind::Shop => "shop",
            OrderKind::Service => "service",
            OrderKind::Amenity => "amenity",
        }
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fulfilment details that depend on the service type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ServiceDetails {
    /// Nothing service-specific.
    #[default]
    Unspecified,

    /// Deliver to a room.
    RoomService {
        /// Room to deliver to.
        room_number: String,
    },

    /// Serve at a restaurant table.
    Restaurant {
        /// Venue, when the hotel has more than one.
        venue_id: Option<String>,

        /// Number of guests.
        party_size: u32,
    },
}

/// Metadata captured at checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutDetails {
    /// When the guest wants the order fulfilled; `None` means as soon as possible.
    pub requested_for: Option<DateTime>,

    /// Free-text notes for staff.
    pub special_instructions: Option<String>,

    /// Service-specific fields.
    pub service: ServiceDetails,
}

impl CheckoutDetails {
    /// As soon as possible, no notes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request fulfilment at `when`.
    #[must_use]
    pub fn requested_for(mut self, when: DateTime) -> Self {
        self.requested_for = Some(when);
        self
    }

    /// Attach notes for staff.
    #[must_use]
    pub fn with_special_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.special_instructions = Some(instructions.into());
        self
    }

    /// Attach service-specific fields.
    #[must_use]
    pub fn with_service(mut self, service: ServiceDetails) -> Self {
        self.service = service;
        self
    }
}

/// Immutable copy of a cart handed to the submission collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSnapshot {
    /// Source cart.
    pub kind: OrderKind,

    /// Locked service type, for service orders.
    pub service_type: Option<ServiceType>,

    /// Lines in the order they were added.
    pub lines: Vec<CartLine>,

    /// Sum of line totals.
    pub subtotal: Price,

    /// Checkout metadata.
    pub details: CheckoutDetails,
}

/// Result of submitting an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The backend accepted the order.
    Accepted,

    /// The backend refused the order.
    Rejected {
        /// Reason shown to the guest.
        error: String,
    },
}

/// Order submission collaborator.
#[automock]
#[async_trait]
pub trait OrderSubmitter: Send + Sync {
    /// Submit `order`.
    async fn submit(&self, order: OrderSnapshot) -> SubmissionOutcome;
}

/// Errors that can occur at checkout. The cart is left untouched in every case.
#[derive(Debug, Error, PartialEq)]
pub enum CheckoutError {
    /// Nothing to order.
    #[error("cannot check out an empty cart")]
    EmptyCart,

    /// The submission collaborator rejected the order.
    #[error("order rejected: {0}")]
    Rejected(String),

    /// The subtotal could not be computed.
    #[error(transparent)]
    Total(#[from] CartTotalError),
}

/// Lines that can be ordered straight from a plain [`Cart`].
pub trait OrderLine: Line + Clone + Into<CartLine> {
    /// Kind of order these lines produce.
    const KIND: OrderKind;
}

impl OrderLine for ShopLine {
    const KIND: OrderKind = OrderKind::Shop;
}

impl OrderLine for AmenityLine {
    const KIND: OrderKind = OrderKind::Amenity;
}

/// A cart that can be checked out.
pub trait CheckoutCart {
    /// Kind of order produced.
    fn order_kind(&self) -> OrderKind;

    /// Service type to record on the order.
    fn order_service_type(&self) -> Option<ServiceType> {
        None
    }

    /// Copy of the current lines.
    fn order_lines(&self) -> Vec<CartLine>;

    /// Current subtotal.
    ///
    /// # Errors
    ///
    /// Returns [`CartTotalError`] if the lines cannot be totalled.
    fn order_subtotal(&self) -> Result<Price, CartTotalError>;

    /// Empty the cart after a successful order.
    fn clear_ordered(&mut self);
}

impl<L: OrderLine> CheckoutCart for Cart<L> {
    fn order_kind(&self) -> OrderKind {
        L::KIND
    }

    fn order_lines(&self) -> Vec<CartLine> {
        self.iter().cloned().map(Into::into).collect()
    }

    fn order_subtotal(&self) -> Result<Price, CartTotalError> {
        self.total()
    }

    fn clear_ordered(&mut self) {
        self.clear();
    }
}

impl CheckoutCart for ServiceCart {
    fn order_kind(&self) -> OrderKind {
        OrderKind::Service
    }

    fn order_service_type(&self) -> Option<ServiceType> {
        self.locked_service_type().cloned()
    }

    fn order_lines(&self) -> Vec<CartLine> {
        self.iter().cloned().map(CartLine::from).collect()
    }

    fn order_subtotal(&self) -> Result<Price, CartTotalError> {
        self.total()
    }

    fn clear_ordered(&mut self) {
        self.clear();
    }
}

/// Submit the contents of `cart` as an order.
///
/// The cart is cleared only when the submitter accepts the order. An empty cart is
/// refused without contacting the submitter.
///
/// # Errors
///
/// Returns [`CheckoutError::EmptyCart`] for an empty cart, [`CheckoutError::Rejected`]
/// when the submitter refuses the order, or [`CheckoutError::Total`] if the subtotal
/// cannot be computed.
#[tracing::instrument(
    name = "orders.checkout",
    skip(cart, details, submitter),
    fields(
        kind = %cart.order_kind(),
        line_count = tracing::field::Empty,
        subtotal_minor = tracing::field::Empty
    ),
    err
)]
pub async fn checkout<C>(
    cart: &mut C,
    details: CheckoutDetails,
    submitter: &dyn OrderSubmitter,
) -> Result<(), CheckoutError>
where
    C: CheckoutCart + ?Sized,
{
    let lines = cart.order_lines();

    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let subtotal = cart.order_subtotal()?;

    let span = Span::current();
    span.record("line_count", lines.len());
    span.record("subtotal_minor", subtotal.to_minor_units());

    let order = OrderSnapshot {
        kind: cart.order_kind(),
        service_type: cart.order_service_type(),
        lines,
        subtotal,
        details,
    };

    match submitter.submit(order).await {
        SubmissionOutcome::Accepted => {
            cart.clear_ordered();

            info!("order accepted");

            Ok(())
        }
        SubmissionOutcome::Rejected { error } => {
            warn!(%error, "order rejected, cart preserved");

            Err(CheckoutError::Rejected(error))
        }
    }
}
