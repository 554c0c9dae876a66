//! Cart

use std::num::NonZeroU32;

use rusty_money::{Money, MoneyError, iso::Currency};
use thiserror::Error;

use crate::lines::{Line, LineId, Price, QuantifiedLine};

/// Errors that can occur while totalling a cart.
#[derive(Debug, Error, PartialEq)]
pub enum CartTotalError {
    /// Price times quantity did not fit in minor units.
    #[error("line total for {0} overflowed")]
    Overflow(LineId),

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// What `add` did with the incoming line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The line was new and was appended.
    Inserted,

    /// The line already existed and its quantity grew.
    Merged,

    /// The line already existed and nothing changed.
    Unchanged,
}

/// An ordered collection of lines, unique by id.
#[derive(Debug, Clone)]
pub struct Cart<L> {
    lines: Vec<L>,
    currency: &'static Currency,
}

impl<L: Line> Cart<L> {
    /// Create an empty cart priced in `currency`.
    pub fn new(currency: &'static Currency) -> Self {
        Cart {
            lines: Vec::new(),
            currency,
        }
    }

    /// Add a line, folding it into an existing line with the same id.
    pub fn add(&mut self, line: L) -> AddOutcome {
        if let Some(existing) = self.find_mut(line.id().as_str()) {
            let before = existing.quantity();

            existing.absorb(line);

            return if existing.quantity() == before {
                AddOutcome::Unchanged
            } else {
                AddOutcome::Merged
            };
        }

        self.lines.push(line);

        AddOutcome::Inserted
    }

    /// Remove the line with the given id, returning it if it was present.
    pub fn remove(&mut self, id: &str) -> Option<L> {
        let position = self.position(id)?;

        Some(self.lines.remove(position))
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Sum of quantities across all lines.
    pub fn count(&self) -> u64 {
        self.lines
            .iter()
            .map(|line| u64::from(line.quantity()))
            .sum()
    }

    /// Sum of `price * quantity` across all lines.
    ///
    /// # Errors
    ///
    /// - [`CartTotalError::Overflow`]: a line total does not fit in minor units.
    /// - [`CartTotalError::Money`]: a line is priced in a different currency to the cart.
    pub fn total(&self) -> Result<Price, CartTotalError> {
        self.lines
            .iter()
            .try_fold(Money::from_minor(0, self.currency), |total, line| {
                Ok(total.add(line_total(line)?)?)
            })
    }

    /// Quantity of the line with the given id, or zero when absent.
    pub fn quantity_of(&self, id: &str) -> u32 {
        self.get(id).map_or(0, Line::quantity)
    }

    /// Look up a line by id.
    pub fn get(&self, id: &str) -> Option<&L> {
        self.lines.iter().find(|line| line.id().as_str() == id)
    }

    /// Whether a line with the given id is present.
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Iterate over lines in the order they were added.
    pub fn iter(&self) -> impl Iterator<Item = &L> {
        self.lines.iter()
    }

    /// Number of distinct lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Check if the cart is empty.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Currency the cart is priced in.
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.lines.iter().position(|line| line.id().as_str() == id)
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut L> {
        self.lines.iter_mut().find(|line| line.id().as_str() == id)
    }
}

impl<L: QuantifiedLine> Cart<L> {
    /// Replace a line's quantity; zero removes the line. Returns the new quantity.
    pub fn set_quantity(&mut self, id: &str, quantity: u32) -> u32 {
        let Some(quantity) = NonZeroU32::new(quantity) else {
            self.remove(id);
            return 0;
        };

        match self.find_mut(id) {
            Some(line) => {
                line.set_quantity(quantity);
                quantity.get()
            }
            None => 0,
        }
    }

    /// Add one to a line's quantity. Returns the new quantity, or zero when absent.
    pub fn increment(&mut self, id: &str) -> u32 {
        let quantity = self.quantity_of(id);

        if quantity == 0 {
            return 0;
        }

        self.set_quantity(id, quantity.saturating_add(1))
    }

    /// Take one from a line's quantity, removing it at zero. Returns the new quantity.
    pub fn decrement(&mut self, id: &str) -> u32 {
        let quantity = self.quantity_of(id);

        if quantity == 0 {
            return 0;
        }

        self.set_quantity(id, quantity - 1)
    }
}

/// Price of a line multiplied by its quantity.
///
/// # Errors
///
/// Returns [`CartTotalError::Overflow`] if the product does not fit in minor units.
pub fn line_total<L: Line>(line: &L) -> Result<Price, CartTotalError> {
    let minor_units = line
        .price()
        .to_minor_units()
        .checked_mul(i64::from(line.quantity()))
        .ok_or_else(|| CartTotalError::Overflow(line.id().clone()))?;

    Ok(Money::from_minor(minor_units, line.price().currency()))
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::{GBP, USD};
    use testresult::TestResult;

    use crate::lines::{AmenityLine, ShopLine};

    use super::*;

    fn robe() -> Result<ShopLine, crate::lines::LineError> {
        ShopLine::new("robe", "Robe", Money::from_minor(4500, GBP))
    }

    fn slippers() -> Result<ShopLine, crate::lines::LineError> {
        ShopLine::new("slippers", "Slippers", Money::from_minor(1250, GBP))
    }

    #[test]
    fn new_cart_is_empty() -> TestResult {
        let cart = Cart::<ShopLine>::new(GBP);

        assert!(cart.is_empty());
        assert_eq!(cart.count(), 0);
        assert_eq!(cart.total()?, Money::from_minor(0, GBP));
        assert_eq!(cart.currency(), GBP);

        Ok(())
    }

    #[test]
    fn adding_existing_id_merges_quantity() -> TestResult {
        let mut cart = Cart::new(GBP);

        assert_eq!(cart.add(robe()?), AddOutcome::Inserted);
        assert_eq!(cart.add(robe()?.with_quantity(2)), AddOutcome::Merged);

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.quantity_of("robe"), 3);

        Ok(())
    }

    #[test]
    fn lines_keep_insertion_order() -> TestResult {
        let mut cart = Cart::new(GBP);

        cart.add(slippers()?);
        cart.add(robe()?);
        cart.add(slippers()?);

        let ids: Vec<&str> = cart.iter().map(|line| line.id().as_str()).collect();

        assert_eq!(ids, ["slippers", "robe"]);

        Ok(())
    }

    #[test]
    fn remove_unknown_id_is_noop() -> TestResult {
        let mut cart = Cart::new(GBP);
        cart.add(robe()?);

        assert!(cart.remove("missing").is_none());
        assert_eq!(cart.len(), 1);

        Ok(())
    }

    #[test]
    fn decrement_at_one_matches_remove() -> TestResult {
        let mut decremented = Cart::new(GBP);
        decremented.add(slippers()?);
        decremented.add(robe()?);

        let mut removed = decremented.clone();

        assert_eq!(decremented.decrement("robe"), 0);
        removed.remove("robe");

        let left: Vec<&ShopLine> = decremented.iter().collect();
        let right: Vec<&ShopLine> = removed.iter().collect();

        assert_eq!(left, right);
        assert!(!decremented.contains("robe"));

        Ok(())
    }

    #[test]
    fn set_quantity_zero_removes_line() -> TestResult {
        let mut cart = Cart::new(GBP);
        cart.add(robe()?.with_quantity(4));

        assert_eq!(cart.set_quantity("robe", 0), 0);
        assert!(cart.is_empty());

        Ok(())
    }

    #[test]
    fn set_quantity_replaces_quantity() -> TestResult {
        let mut cart = Cart::new(GBP);
        cart.add(robe()?.with_quantity(4));

        assert_eq!(cart.set_quantity("robe", 2), 2);
        assert_eq!(cart.quantity_of("robe"), 2);

        Ok(())
    }

    #[test]
    fn quantity_changes_on_unknown_id_are_noops() -> TestResult {
        let mut cart = Cart::new(GBP);
        cart.add(robe()?);

        assert_eq!(cart.increment("missing"), 0);
        assert_eq!(cart.decrement("missing"), 0);
        assert_eq!(cart.set_quantity("missing", 5), 0);
        assert_eq!(cart.count(), 1);

        Ok(())
    }

    #[test]
    fn count_and_total_track_every_mutation() -> TestResult {
        let mut cart = Cart::new(GBP);

        let check = |cart: &Cart<ShopLine>| -> TestResult {
            let quantities: u64 = cart.iter().map(|line| u64::from(line.quantity())).sum();
            let minor: i64 = cart
                .iter()
                .map(|line| line.price().to_minor_units() * i64::from(line.quantity()))
                .sum();

            assert_eq!(cart.count(), quantities);
            assert_eq!(cart.total()?.to_minor_units(), minor);

            Ok(())
        };

        cart.add(robe()?);
        check(&cart)?;
        cart.add(slippers()?.with_quantity(3));
        check(&cart)?;
        cart.increment("robe");
        check(&cart)?;
        cart.decrement("slippers");
        check(&cart)?;
        cart.remove("robe");
        check(&cart)?;
        cart.add(robe()?);
        cart.decrement("robe");
        check(&cart)?;

        assert_eq!(cart.count(), 2);
        assert_eq!(cart.total()?, Money::from_minor(2500, GBP));

        Ok(())
    }

    #[test]
    fn amenity_add_is_idempotent() -> TestResult {
        let mut cart = Cart::new(GBP);
        let crib = AmenityLine::new("crib", "Baby crib", Money::from_minor(0, GBP))?;

        assert_eq!(cart.add(crib.clone()), AddOutcome::Inserted);
        assert_eq!(cart.add(crib), AddOutcome::Unchanged);

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.count(), 1);
        assert_eq!(cart.quantity_of("crib"), 1);

        Ok(())
    }

    #[test]
    fn amenity_total_sums_prices() -> TestResult {
        let mut cart = Cart::new(GBP);

        cart.add(AmenityLine::new("spa", "Spa access", Money::from_minor(3000, GBP))?);
        cart.add(AmenityLine::new("late", "Late checkout", Money::from_minor(2000, GBP))?);

        assert_eq!(cart.total()?, Money::from_minor(5000, GBP));

        Ok(())
    }

    #[test]
    fn total_with_foreign_currency_errors() -> TestResult {
        let mut cart = Cart::new(GBP);
        cart.add(ShopLine::new("mug", "Mug", Money::from_minor(900, USD))?);

        assert!(matches!(cart.total(), Err(CartTotalError::Money(_))));

        Ok(())
    }

    #[test]
    fn total_overflow_is_reported() -> TestResult {
        let mut cart = Cart::new(GBP);
        cart.add(
            ShopLine::new("gold", "Gold bar", Money::from_minor(i64::MAX, GBP))?.with_quantity(2),
        );

        assert_eq!(
            cart.total(),
            Err(CartTotalError::Overflow(LineId::from("gold")))
        );

        Ok(())
    }
}
