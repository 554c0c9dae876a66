//! Cart lines

use std::{fmt, num::NonZeroU32};

use rusty_money::{Money, iso::Currency};
use smallvec::SmallVec;
use thiserror::Error;

/// Price of a single unit of a line.
pub type Price = Money<'static, Currency>;

/// Service types declared by a menu line; almost always one or two.
pub type ServiceTypes = SmallVec<[ServiceType; 2]>;

/// Errors raised while constructing a line.
#[derive(Debug, Error, PartialEq)]
pub enum LineError {
    /// The line was given a price below zero.
    #[error("line {0} has a negative price")]
    NegativePrice(LineId),
}

/// Identifier of a line within a cart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineId(String);

impl LineId {
    /// Create a line id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LineId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for LineId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fulfilment channel a menu line can be ordered through, e.g. "Restaurant" or "Room Service".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceType(String);

impl ServiceType {
    /// Create a service type from its display name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The "Restaurant" service type.
    pub fn restaurant() -> Self {
        Self::new("Restaurant")
    }

    /// The "Room Service" service type.
    pub fn room_service() -> Self {
        Self::new("Room Service")
    }

    /// Borrow the service type name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ServiceType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ServiceType {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Behaviour shared by every kind of line a cart can hold.
pub trait Line {
    /// Line identifier, unique within a cart.
    fn id(&self) -> &LineId;

    /// Display name.
    fn name(&self) -> &str;

    /// Unit price.
    fn price(&self) -> &Price;

    /// Current quantity. Always at least one.
    fn quantity(&self) -> u32;

    /// Fold an incoming line with the same id into this one.
    fn absorb(&mut self, incoming: Self)
    where
        Self: Sized;
}

/// Lines whose quantity can be changed after they are added.
pub trait QuantifiedLine: Line {
    /// Replace the quantity.
    fn set_quantity(&mut self, quantity: NonZeroU32);
}

fn checked_price(id: &LineId, price: Price) -> Result<Price, LineError> {
    if price.to_minor_units() < 0 {
        return Err(LineError::NegativePrice(id.clone()));
    }

    Ok(price)
}

fn at_least_one(quantity: u32) -> NonZeroU32 {
    NonZeroU32::new(quantity).unwrap_or(NonZeroU32::MIN)
}

/// A shop product.
#[derive(Debug, Clone, PartialEq)]
pub struct ShopLine {
    id: LineId,
    name: String,
    description: Option<String>,
    price: Price,
    quantity: NonZeroU32,
    image_url: Option<String>,
}

impl ShopLine {
    /// Create a shop line with a quantity of one.
    ///
    /// # Errors
    ///
    /// Returns [`LineError::NegativePrice`] if `price` is below zero.
    pub fn new(
        id: impl Into<LineId>,
        name: impl Into<String>,
        price: Price,
    ) -> Result<Self, LineError> {
        let id = id.into();
        let price = checked_price(&id, price)?;

        Ok(Self {
            id,
            name: name.into(),
            description: None,
            price,
            quantity: NonZeroU32::MIN,
            image_url: None,
        })
    }

    /// Set the quantity being added. Zero is treated as one.
    #[must_use]
    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = at_least_one(quantity);
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the image URL.
    #[must_use]
    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    /// Product description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Product image.
    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }
}

impl Line for ShopLine {
    fn id(&self) -> &LineId {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn price(&self) -> &Price {
        &self.price
    }

    fn quantity(&self) -> u32 {
        self.quantity.get()
    }

    fn absorb(&mut self, incoming: Self) {
        self.quantity = self.quantity.saturating_add(incoming.quantity.get());
    }
}

impl QuantifiedLine for ShopLine {
    fn set_quantity(&mut self, quantity: NonZeroU32) {
        self.quantity = quantity;
    }
}

/// A restaurant or room-service menu item.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceLine {
    id: LineId,
    name: String,
    description: Option<String>,
    price: Price,
    quantity: NonZeroU32,
    image_url: Option<String>,
    service_types: ServiceTypes,
    venue_ids: Vec<String>,
}

impl ServiceLine {
    /// Create a menu line with a quantity of one and no service type restriction.
    ///
    /// # Errors
    ///
    /// Returns [`LineError::NegativePrice`] if `price` is below zero.
    pub fn new(
        id: impl Into<LineId>,
        name: impl Into<String>,
        price: Price,
    ) -> Result<Self, LineError> {
        let id = id.into();
        let price = checked_price(&id, price)?;

        Ok(Self {
            id,
            name: name.into(),
            description: None,
            price,
            quantity: NonZeroU32::MIN,
            image_url: None,
            service_types: ServiceTypes::new(),
            venue_ids: Vec::new(),
        })
    }

    /// Set the quantity being added. Zero is treated as one.
    #[must_use]
    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = at_least_one(quantity);
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the image URL.
    #[must_use]
    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    /// Restrict the line to the given service types, in order of preference.
    #[must_use]
    pub fn with_service_types<I, S>(mut self, service_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ServiceType>,
    {
        self.service_types = service_types.into_iter().map(Into::into).collect();
        self
    }

    /// Set the venues serving this item.
    #[must_use]
    pub fn with_venue_ids<I, S>(mut self, venue_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.venue_ids = venue_ids.into_iter().map(Into::into).collect();
        self
    }

    /// Item description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Item image.
    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    /// Service types this item may be ordered through. Empty means unrestricted.
    pub fn service_types(&self) -> &[ServiceType] {
        &self.service_types
    }

    /// Venues serving this item.
    pub fn venue_ids(&self) -> &[String] {
        &self.venue_ids
    }
}

impl Line for ServiceLine {
    fn id(&self) -> &LineId {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn price(&self) -> &Price {
        &self.price
    }

    fn quantity(&self) -> u32 {
        self.quantity.get()
    }

    fn absorb(&mut self, incoming: Self) {
        self.quantity = self.quantity.saturating_add(incoming.quantity.get());
    }
}

impl QuantifiedLine for ServiceLine {
    fn set_quantity(&mut self, quantity: NonZeroU32) {
        self.quantity = quantity;
    }
}

/// A standalone amenity request. Amenities are either in the cart or not.
#[derive(Debug, Clone, PartialEq)]
pub struct AmenityLine {
    id: LineId,
    name: String,
    description: Option<String>,
    price: Price,
    image_url: Option<String>,
}

impl AmenityLine {
    /// Create an amenity line.
    ///
    /// # Errors
    ///
    /// Returns [`LineError::NegativePrice`] if `price` is below zero.
    pub fn new(
        id: impl Into<LineId>,
        name: impl Into<String>,
        price: Price,
    ) -> Result<Self, LineError> {
        let id = id.into();
        let price = checked_price(&id, price)?;

        Ok(Self {
            id,
            name: name.into(),
            description: None,
            price,
            image_url: None,
        })
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the image URL.
    #[must_use]
    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    /// Amenity description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Amenity image.
    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }
}

impl Line for AmenityLine {
    fn id(&self) -> &LineId {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn price(&self) -> &Price {
        &self.price
    }

    fn quantity(&self) -> u32 {
        1
    }

    fn absorb(&mut self, _incoming: Self) {}
}

/// Any line, tagged by the cart it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum CartLine {
    /// Shop product.
    Shop(ShopLine),

    /// Restaurant or room-service item.
    Service(ServiceLine),

    /// Amenity request.
    Amenity(AmenityLine),
}

impl CartLine {
    /// Line identifier.
    pub fn id(&self) -> &LineId {
        match self {
            CartLine::Shop(line) => line.id(),
            CartLine::Service(line) => line.id(),
            CartLine::Amenity(line) => line.id(),
        }
    }

    /// Display name.
    pub fn name(&self) -> &str {
        match self {
            CartLine::Shop(line) => line.name(),
            CartLine::Service(line) => line.name(),
            CartLine::Amenity(line) => line.name(),
        }
    }

    /// Unit price.
    pub fn price(&self) -> &Price {
        match self {
            CartLine::Shop(line) => line.price(),
            CartLine::Service(line) => line.price(),
            CartLine::Amenity(line) => line.price(),
        }
    }

    /// Quantity; amenities always count as one.
    pub fn quantity(&self) -> u32 {
        match self {
            CartLine::Shop(line) => line.quantity(),
            CartLine::Service(line) => line.quantity(),
            CartLine::Amenity(line) => line.quantity(),
        }
    }
}

impl From<ShopLine> for CartLine {
    fn from(line: ShopLine) -> Self {
        CartLine::Shop(line)
    }
}

impl From<ServiceLine> for CartLine {
    fn from(line: ServiceLine) -> Self {
        CartLine::Service(line)
    }
}

impl From<AmenityLine> for CartLine {
    fn from(line: AmenityLine) -> Self {
        CartLine::Amenity(line)
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::GBP;
    use testresult::TestResult;

    use super::*;

    #[test]
    fn negative_price_is_rejected() {
        let result = ShopLine::new("soap", "Soap", Money::from_minor(-1, GBP));

        assert_eq!(result, Err(LineError::NegativePrice(LineId::from("soap"))));
    }

    #[test]
    fn zero_price_is_allowed() -> TestResult {
        let line = AmenityLine::new("towels", "Extra towels", Money::from_minor(0, GBP))?;

        assert_eq!(line.price().to_minor_units(), 0);

        Ok(())
    }

    #[test]
    fn zero_quantity_is_treated_as_one() -> TestResult {
        let line = ShopLine::new("robe", "Robe", Money::from_minor(4500, GBP))?.with_quantity(0);

        assert_eq!(line.quantity(), 1);

        Ok(())
    }

    #[test]
    fn shop_absorb_adds_incoming_quantity() -> TestResult {
        let mut line = ShopLine::new("robe", "Robe", Money::from_minor(4500, GBP))?;
        let incoming =
            ShopLine::new("robe", "Robe", Money::from_minor(4500, GBP))?.with_quantity(3);

        line.absorb(incoming);

        assert_eq!(line.quantity(), 4);

        Ok(())
    }

    #[test]
    fn amenity_absorb_keeps_single_quantity() -> TestResult {
        let mut line = AmenityLine::new("crib", "Baby crib", Money::from_minor(0, GBP))?;

        line.absorb(line.clone());

        assert_eq!(line.quantity(), 1);

        Ok(())
    }

    #[test]
    fn service_line_keeps_declared_order() -> TestResult {
        let line = ServiceLine::new("m1", "Club sandwich", Money::from_minor(1200, GBP))?
            .with_service_types(["Restaurant", "Room Service"])
            .with_venue_ids(["terrace"]);

        assert_eq!(
            line.service_types(),
            &[ServiceType::restaurant(), ServiceType::room_service()]
        );
        assert_eq!(line.venue_ids(), &["terrace".to_string()]);

        Ok(())
    }

    #[test]
    fn service_line_accepts_owned_type_names() -> TestResult {
        let names = vec!["Room Service".to_string(), "Spa".to_string()];
        let line = ServiceLine::new("m2", "Porridge", Money::from_minor(500, GBP))?
            .with_service_types(names);

        assert_eq!(
            line.service_types(),
            &[ServiceType::room_service(), ServiceType::new("Spa")]
        );

        Ok(())
    }

    #[test]
    fn cart_line_delegates_to_variant() -> TestResult {
        let line: CartLine = ServiceLine::new("m1", "Club sandwich", Money::from_minor(1200, GBP))?
            .with_quantity(2)
            .into();

        assert_eq!(line.id().as_str(), "m1");
        assert_eq!(line.name(), "Club sandwich");
        assert_eq!(line.quantity(), 2);
        assert_eq!(line.price().to_minor_units(), 1200);

        Ok(())
    }
}
