//! Fixtures
//!
//! YAML catalogs of shop products, menu items and amenities, converted into cart lines.

use std::{
    fs,
    path::{Path, PathBuf},
};

use rustc_hash::FxHashMap;
use rusty_money::iso::Currency;
use thiserror::Error;
use tracing::debug;

use crate::lines::{AmenityLine, Line, LineError, ServiceLine, ShopLine};

pub mod catalog;

pub use catalog::{CatalogFixture, parse_currency, parse_price};

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Invalid price format
    #[error("Invalid price format: {0}")]
    InvalidPrice(String),

    /// Unknown currency code
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// Currency mismatch between catalog entries
    #[error("Currency mismatch: expected {0}, found {1}")]
    CurrencyMismatch(String, String),

    /// Line construction error
    #[error(transparent)]
    Line(#[from] LineError),

    /// Catalog entry not found
    #[error("{section} entry not found: {id}")]
    NotFound {
        /// Catalog section searched
        section: &'static str,

        /// Requested id
        id: String,
    },
}

/// A loaded catalog.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    hotel: Option<String>,
    shop: FxHashMap<String, ShopLine>,
    menu: FxHashMap<String, ServiceLine>,
    amenities: FxHashMap<String, AmenityLine>,
    currency: Option<&'static Currency>,
}

impl Catalog {
    /// Parse a catalog from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed, a price cannot be parsed, or entries are
    /// priced in different currencies.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, FixtureError> {
        let fixture: CatalogFixture = serde_norway::from_str(yaml)?;

        Self::try_from(fixture)
    }

    /// Load a catalog file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;

        debug!(path = %path.display(), "loading catalog fixture");

        Self::from_yaml_str(&contents)
    }

    /// Load `./fixtures/catalog/{name}.yml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_set(name: &str) -> Result<Self, FixtureError> {
        Self::from_set_in("./fixtures", name)
    }

    /// Load `{base_path}/catalog/{name}.yml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_set_in(base_path: impl Into<PathBuf>, name: &str) -> Result<Self, FixtureError> {
        let path = base_path.into().join("catalog").join(format!("{name}.yml"));

        Self::from_path(path)
    }

    /// Hotel name, if the catalog declares one.
    pub fn hotel(&self) -> Option<&str> {
        self.hotel.as_deref()
    }

    /// Currency shared by every entry; `None` for an empty catalog.
    pub fn currency(&self) -> Option<&'static Currency> {
        self.currency
    }

    /// A fresh shop line for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::NotFound`] for an unknown id.
    pub fn shop_line(&self, id: &str) -> Result<ShopLine, FixtureError> {
        self.shop.get(id).cloned().ok_or_else(|| not_found("shop", id))
    }

    /// A fresh menu line for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::NotFound`] for an unknown id.
    pub fn menu_line(&self, id: &str) -> Result<ServiceLine, FixtureError> {
        self.menu.get(id).cloned().ok_or_else(|| not_found("menu", id))
    }

    /// A fresh amenity line for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::NotFound`] for an unknown id.
    pub fn amenity_line(&self, id: &str) -> Result<AmenityLine, FixtureError> {
        self.amenities
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("amenities", id))
    }

    /// Shop products sorted by id.
    pub fn shop_lines(&self) -> Vec<&ShopLine> {
        sorted(&self.shop)
    }

    /// Menu items sorted by id.
    pub fn menu_lines(&self) -> Vec<&ServiceLine> {
        sorted(&self.menu)
    }

    /// Amenities sorted by id.
    pub fn amenity_lines(&self) -> Vec<&AmenityLine> {
        sorted(&self.amenities)
    }

    fn check_currency(&mut self, currency: &'static Currency) -> Result<(), FixtureError> {
        match self.currency {
            Some(existing) if existing != currency => Err(FixtureError::CurrencyMismatch(
                existing.iso_alpha_code.to_string(),
                currency.iso_alpha_code.to_string(),
            )),
            Some(_) => Ok(()),
            None => {
                self.currency = Some(currency);
                Ok(())
            }
        }
    }
}

impl TryFrom<CatalogFixture> for Catalog {
    type Error = FixtureError;

    fn try_from(fixture: CatalogFixture) -> Result<Self, Self::Error> {
        let mut catalog = Catalog {
            hotel: fixture.hotel,
            ..Catalog::default()
        };

        for (id, entry) in fixture.shop {
            let line = entry.into_line(&id)?;
            catalog.check_currency(line.price().currency())?;
            catalog.shop.insert(id, line);
        }

        for (id, entry) in fixture.menu {
            let line = entry.into_line(&id)?;
            catalog.check_currency(line.price().currency())?;
            catalog.menu.insert(id, line);
        }

        for (id, entry) in fixture.amenities {
            let line = entry.into_line(&id)?;
            catalog.check_currency(line.price().currency())?;
            catalog.amenities.insert(id, line);
        }

        Ok(catalog)
    }
}

fn not_found(section: &'static str, id: &str) -> FixtureError {
    FixtureError::NotFound {
        section,
        id: id.to_string(),
    }
}

fn sorted<L: Line>(lines: &FxHashMap<String, L>) -> Vec<&L> {
    let mut lines: Vec<&L> = lines.values().collect();
    lines.sort_by(|a, b| a.id().cmp(b.id()));
    lines
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rusty_money::iso::{GBP, USD};
    use testresult::TestResult;

    use crate::lines::ServiceType;

    use super::*;

    const CATALOG: &str = r#"
hotel: Harbour House
shop:
  robe:
    name: Bath robe
    price: "45.00 GBP"
menu:
  club:
    name: Club sandwich
    price: "12.00 GBP"
    service_types: [Restaurant, Room Service]
    venue_ids: [harbour-grill]
amenities:
  crib:
    name: Baby crib
    price: "0.00 GBP"
"#;

    #[test]
    fn parses_every_section() -> TestResult {
        let catalog = Catalog::from_yaml_str(CATALOG)?;

        assert_eq!(catalog.hotel(), Some("Harbour House"));
        assert_eq!(catalog.currency(), Some(GBP));
        assert_eq!(catalog.shop_line("robe")?.price().to_minor_units(), 4500);
        assert_eq!(catalog.amenity_line("crib")?.name(), "Baby crib");

        let club = catalog.menu_line("club")?;

        assert_eq!(
            club.service_types(),
            &[ServiceType::restaurant(), ServiceType::room_service()]
        );
        assert_eq!(club.venue_ids(), &["harbour-grill".to_string()]);

        Ok(())
    }

    #[test]
    fn unknown_id_is_not_found() -> TestResult {
        let catalog = Catalog::from_yaml_str(CATALOG)?;

        assert!(matches!(
            catalog.menu_line("lobster"),
            Err(FixtureError::NotFound { section: "menu", id }) if id == "lobster"
        ));

        Ok(())
    }

    #[test]
    fn mixed_currencies_are_rejected() {
        let yaml = r#"
shop:
  robe:
    name: Bath robe
    price: "45.00 GBP"
amenities:
  crib:
    name: Baby crib
    price: "0.00 USD"
"#;

        let result = Catalog::from_yaml_str(yaml);

        assert!(matches!(result, Err(FixtureError::CurrencyMismatch(_, _))));
    }

    #[test]
    fn loads_from_file() -> TestResult {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(
            b"amenities:\n  towels:\n    name: Extra towels\n    price: \"0.00 USD\"\n",
        )?;

        let catalog = Catalog::from_path(file.path())?;

        assert_eq!(catalog.currency(), Some(USD));
        assert_eq!(catalog.amenity_lines().len(), 1);
        assert!(catalog.shop_lines().is_empty());

        Ok(())
    }

    #[test]
    fn loads_named_set() -> TestResult {
        let dir = tempfile::tempdir()?;
        let catalog_dir = dir.path().join("catalog");

        fs::create_dir_all(&catalog_dir)?;
        fs::write(catalog_dir.join("spa.yml"), CATALOG)?;

        let catalog = Catalog::from_set_in(dir.path(), "spa")?;

        assert_eq!(catalog.menu_lines().len(), 1);

        Ok(())
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = Catalog::from_set_in("./does-not-exist", "nothing");

        assert!(matches!(result, Err(FixtureError::Io(_))));
    }
}
