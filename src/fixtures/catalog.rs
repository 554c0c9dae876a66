//! Catalog Fixtures

use rust_decimal::{Decimal, prelude::ToPrimitive};
use rustc_hash::FxHashMap;
use rusty_money::{
    Money,
    iso::{Currency, EUR, GBP, USD},
};
use serde::Deserialize;

use crate::{
    fixtures::FixtureError,
    lines::{AmenityLine, ServiceLine, ShopLine},
};

/// Top-level catalog document.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogFixture {
    /// Hotel name shown in demos.
    #[serde(default)]
    pub hotel: Option<String>,

    /// Shop products keyed by id.
    #[serde(default)]
    pub shop: FxHashMap<String, ShopFixture>,

    /// Menu items keyed by id.
    #[serde(default)]
    pub menu: FxHashMap<String, MenuFixture>,

    /// Amenities keyed by id.
    #[serde(default)]
    pub amenities: FxHashMap<String, AmenityFixture>,
}

/// Shop product fixture
#[derive(Debug, Deserialize)]
pub struct ShopFixture {
    /// Product name
    pub name: String,

    /// Product description
    #[serde(default)]
    pub description: Option<String>,

    /// Product price (e.g., "45.00 GBP")
    pub price: String,

    /// Product image
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Menu item fixture
#[derive(Debug, Deserialize)]
pub struct MenuFixture {
    /// Item name
    pub name: String,

    /// Item description
    #[serde(default)]
    pub description: Option<String>,

    /// Item price (e.g., "12.00 GBP")
    pub price: String,

    /// Item image
    #[serde(default)]
    pub image_url: Option<String>,

    /// Service types the item can be ordered through
    #[serde(default)]
    pub service_types: Vec<String>,

    /// Venues serving the item
    #[serde(default)]
    pub venue_ids: Vec<String>,
}

/// Amenity fixture
#[derive(Debug, Deserialize)]
pub struct AmenityFixture {
    /// Amenity name
    pub name: String,

    /// Amenity description
    #[serde(default)]
    pub description: Option<String>,

    /// Amenity price; most amenities are free (e.g., "0.00 GBP")
    pub price: String,

    /// Amenity image
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Parse price string (e.g., "12.00 GBP") into minor units and currency
///
/// # Errors
///
/// Returns an error if the string is not in the format "AMOUNT CURRENCY",
/// if the amount is not a decimal number, or if the currency code
/// is not recognized.
pub fn parse_price(s: &str) -> Result<(i64, &'static Currency), FixtureError> {
    let mut parts = s.split_whitespace();

    let (Some(amount), Some(code), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(FixtureError::InvalidPrice(format!(
            "Expected format 'AMOUNT CURRENCY', got: {s}"
        )));
    };

    let minor_units = amount
        .parse::<Decimal>()
        .ok()
        .and_then(|amount| amount.checked_mul(Decimal::ONE_HUNDRED))
        .and_then(|value| value.round_dp(0).to_i64())
        .ok_or_else(|| FixtureError::InvalidPrice(s.to_string()))?;

    Ok((minor_units, parse_currency(code)?))
}

/// Look up a supported ISO currency code.
///
/// # Errors
///
/// Returns [`FixtureError::UnknownCurrency`] for anything other than GBP, USD or EUR.
pub fn parse_currency(code: &str) -> Result<&'static Currency, FixtureError> {
    match code {
        "GBP" => Ok(GBP),
        "USD" => Ok(USD),
        "EUR" => Ok(EUR),
        other => Err(FixtureError::UnknownCurrency(other.to_string())),
    }
}

fn price_of(s: &str) -> Result<Money<'static, Currency>, FixtureError> {
    let (minor_units, currency) = parse_price(s)?;

    Ok(Money::from_minor(minor_units, currency))
}

impl ShopFixture {
    /// Build a shop line with a quantity of one.
    ///
    /// # Errors
    ///
    /// Returns an error if the price cannot be parsed or is negative.
    pub fn into_line(self, id: &str) -> Result<ShopLine, FixtureError> {
        let mut line = ShopLine::new(id, self.name, price_of(&self.price)?)?;

        if let Some(description) = self.description {
            line = line.with_description(description);
        }

        if let Some(image_url) = self.image_url {
            line = line.with_image_url(image_url);
        }

        Ok(line)
    }
}

impl MenuFixture {
    /// Build a menu line with a quantity of one.
    ///
    /// # Errors
    ///
    /// Returns an error if the price cannot be parsed or is negative.
    pub fn into_line(self, id: &str) -> Result<ServiceLine, FixtureError> {
        let mut line = ServiceLine::new(id, self.name, price_of(&self.price)?)?
            .with_service_types(self.service_types)
            .with_venue_ids(self.venue_ids);

        if let Some(description) = self.description {
            line = line.with_description(description);
        }

        if let Some(image_url) = self.image_url {
            line = line.with_image_url(image_url);
        }

        Ok(line)
    }
}

impl AmenityFixture {
    /// Build an amenity line.
    ///
    /// # Errors
    ///
    /// Returns an error if the price cannot be parsed or is negative.
    pub fn into_line(self, id: &str) -> Result<AmenityLine, FixtureError> {
        let mut line = AmenityLine::new(id, self.name, price_of(&self.price)?)?;

        if let Some(description) = self.description {
            line = line.with_description(description);
        }

        if let Some(image_url) = self.image_url {
            line = line.with_image_url(image_url);
        }

        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_price_rejects_invalid_format() {
        let result = parse_price("12.00GBP");

        assert!(matches!(result, Err(FixtureError::InvalidPrice(_))));
    }

    #[test]
    fn parse_price_rejects_trailing_tokens() {
        let result = parse_price("12.00 GBP each");

        assert!(matches!(result, Err(FixtureError::InvalidPrice(_))));
    }

    #[test]
    fn parse_price_rejects_unknown_currency() {
        let result = parse_price("2.99 ABC");

        assert!(matches!(result, Err(FixtureError::UnknownCurrency(code)) if code == "ABC"));
    }

    #[test]
    fn parse_price_rounds_to_minor_units() -> Result<(), FixtureError> {
        let (gbp_minor, gbp) = parse_price("12.005 GBP")?;
        let (eur_minor, eur) = parse_price("2.50 EUR")?;

        assert_eq!(gbp_minor, 1200);
        assert_eq!(gbp, GBP);
        assert_eq!(eur_minor, 250);
        assert_eq!(eur, EUR);

        Ok(())
    }

    #[test]
    fn negative_fixture_price_is_rejected() {
        let fixture = AmenityFixture {
            name: "Refund".to_string(),
            description: None,
            price: "-1.00 GBP".to_string(),
            image_url: None,
        };

        assert!(matches!(fixture.into_line("refund"), Err(FixtureError::Line(_))));
    }
}
