//! Cart Engine
//!
//! Owns the three independent carts of a guest session.

use rusty_money::iso::Currency;

use crate::{
    cart::Cart,
    lines::{AmenityLine, ShopLine},
    service::ServiceCart,
};

/// Shop, menu and amenity carts for one guest session.
#[derive(Debug, Clone)]
pub struct CartEngine {
    shop: Cart<ShopLine>,
    service: ServiceCart,
    amenities: Cart<AmenityLine>,
}

impl CartEngine {
    /// Create empty carts priced in `currency`.
    pub fn new(currency: &'static Currency) -> Self {
        Self {
            shop: Cart::new(currency),
            service: ServiceCart::new(currency),
            amenities: Cart::new(currency),
        }
    }

    /// Shop cart.
    pub fn shop(&self) -> &Cart<ShopLine> {
        &self.shop
    }

    /// Mutable shop cart.
    pub fn shop_mut(&mut self) -> &mut Cart<ShopLine> {
        &mut self.shop
    }

    /// Restaurant and room-service cart.
    pub fn service(&self) -> &ServiceCart {
        &self.service
    }

    /// Mutable restaurant and room-service cart.
    pub fn service_mut(&mut self) -> &mut ServiceCart {
        &mut self.service
    }

    /// Amenity cart.
    pub fn amenities(&self) -> &Cart<AmenityLine> {
        &self.amenities
    }

    /// Mutable amenity cart.
    pub fn amenities_mut(&mut self) -> &mut Cart<AmenityLine> {
        &mut self.amenities
    }

    /// Combined item count across all carts, as shown on the cart badge.
    pub fn count(&self) -> u64 {
        self.shop.count() + self.service.count() + self.amenities.count()
    }

    /// Check if every cart is empty.
    pub fn is_empty(&self) -> bool {
        self.shop.is_empty() && self.service.is_empty() && self.amenities.is_empty()
    }

    /// Empty every cart, e.g. when the session ends.
    pub fn clear(&mut self) {
        self.shop.clear();
        self.service.clear();
        self.amenities.clear();
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::{Money, iso::GBP};
    use testresult::TestResult;

    use crate::lines::ServiceLine;

    use super::*;

    #[test]
    fn carts_are_independent() -> TestResult {
        let mut engine = CartEngine::new(GBP);

        engine
            .shop_mut()
            .add(ShopLine::new("robe", "Robe", Money::from_minor(4500, GBP))?.with_quantity(2));
        engine
            .amenities_mut()
            .add(AmenityLine::new("crib", "Baby crib", Money::from_minor(0, GBP))?);

        assert_eq!(engine.shop().count(), 2);
        assert_eq!(engine.amenities().count(), 1);
        assert!(engine.service().is_empty());
        assert_eq!(engine.count(), 3);

        engine.shop_mut().clear();

        assert_eq!(engine.amenities().count(), 1);

        Ok(())
    }

    #[test]
    fn clear_empties_everything_and_releases_lock() -> TestResult {
        let mut engine = CartEngine::new(GBP);

        engine.service_mut().add(
            ServiceLine::new("m1", "Club sandwich", Money::from_minor(1200, GBP))?
                .with_service_types(["Room Service"]),
        )?;

        engine.clear();

        assert!(engine.is_empty());
        assert_eq!(engine.service().locked_service_type(), None);

        Ok(())
    }
}
