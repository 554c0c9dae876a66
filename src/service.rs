//! Service Cart
//!
//! Restaurant and room-service orders are fulfilled through a single channel, so the
//! menu cart locks itself to one service type once it holds anything. The lock is the
//! first service type declared by the first line added to an empty cart and is released
//! only when the cart empties again.

use std::ops::Deref;

use rusty_money::iso::Currency;
use thiserror::Error;

use crate::{
    cart::{AddOutcome, Cart},
    lines::{Line, LineId, ServiceLine, ServiceType},
};

/// A menu line could not be added because the cart is locked to another service type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{line} is not available for {locked}")]
pub struct ServiceTypeConflict {
    /// The rejected line.
    pub line: LineId,

    /// The service type the cart is locked to.
    pub locked: ServiceType,

    /// The service types the rejected line declared.
    pub offered: Vec<ServiceType>,
}

/// Cart of restaurant and room-service items with a service type lock.
#[derive(Debug, Clone)]
pub struct ServiceCart {
    cart: Cart<ServiceLine>,
    locked: Option<ServiceType>,
}

impl ServiceCart {
    /// Create an empty, unlocked cart priced in `currency`.
    pub fn new(currency: &'static Currency) -> Self {
        Self {
            cart: Cart::new(currency),
            locked: None,
        }
    }

    /// The service type the cart is locked to, if any.
    pub fn locked_service_type(&self) -> Option<&ServiceType> {
        self.locked.as_ref()
    }

    /// Whether a line declaring `service_types` may be added.
    pub fn can_add(&self, service_types: &[ServiceType]) -> bool {
        self.blocking_lock(service_types).is_none()
    }

    /// Add a line, subject to the service type lock.
    ///
    /// # Errors
    ///
    /// Returns a [`ServiceTypeConflict`] and leaves the cart untouched when the line's
    /// service types exclude the locked type.
    pub fn add(&mut self, line: ServiceLine) -> Result<AddOutcome, ServiceTypeConflict> {
        if let Some(locked) = self.blocking_lock(line.service_types()) {
            return Err(ServiceTypeConflict {
                line: line.id().clone(),
                locked: locked.clone(),
                offered: line.service_types().to_vec(),
            });
        }

        if self.cart.is_empty() {
            self.locked = line.service_types().first().cloned();
        }

        Ok(self.cart.add(line))
    }

    /// Remove a line by id.
    pub fn remove(&mut self, id: &str) -> Option<ServiceLine> {
        let removed = self.cart.remove(id);
        self.release_if_empty();
        removed
    }

    /// Replace a line's quantity; zero removes the line.
    pub fn set_quantity(&mut self, id: &str, quantity: u32) -> u32 {
        let quantity = self.cart.set_quantity(id, quantity);
        self.release_if_empty();
        quantity
    }

    /// Add one to a line's quantity.
    pub fn increment(&mut self, id: &str) -> u32 {
        self.cart.increment(id)
    }

    /// Take one from a line's quantity, removing it at zero.
    pub fn decrement(&mut self, id: &str) -> u32 {
        let quantity = self.cart.decrement(id);
        self.release_if_empty();
        quantity
    }

    /// Empty the cart and release the lock.
    pub fn clear(&mut self) {
        self.cart.clear();
        self.locked = None;
    }

    fn blocking_lock(&self, service_types: &[ServiceType]) -> Option<&ServiceType> {
        self.locked.as_ref().filter(|locked| {
            !self.cart.is_empty() && !service_types.is_empty() && !service_types.contains(locked)
        })
    }

    fn release_if_empty(&mut self) {
        if self.cart.is_empty() {
            self.locked = None;
        }
    }
}

impl Deref for ServiceCart {
    type Target = Cart<ServiceLine>;

    fn deref(&self) -> &Self::Target {
        &self.cart
    }
}
