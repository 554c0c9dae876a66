//! Engine configuration

use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser};
use rusty_money::iso::Currency;
use thiserror::Error;

use crate::{fixtures::parse_currency, realtime::RetryPolicy};

/// Errors converting configuration into engine types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configured currency is not supported.
    #[error("unsupported currency: {0}")]
    UnknownCurrency(String),

    /// Command line or environment could not be parsed.
    #[error(transparent)]
    Parse(#[from] clap::Error),
}

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Compact, human-readable logs.
    #[default]
    Compact,

    /// Structured JSON logs.
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, Args)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Log format (compact, json)
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
        }
    }
}

/// Realtime reconnect settings.
#[derive(Debug, Clone, Args)]
pub struct RetryConfig {
    /// Delay before reconnecting after a channel error, in milliseconds
    #[arg(long, env = "CONCIERGE_ERROR_RETRY_MS", default_value_t = 5_000_u64)]
    pub error_retry_ms: u64,

    /// Delay before reconnecting after a subscription timeout, in milliseconds
    #[arg(long, env = "CONCIERGE_TIMEOUT_RETRY_MS", default_value_t = 1_000_u64)]
    pub timeout_retry_ms: u64,
}

/// Concierge engine configuration
#[derive(Debug, Clone, Parser)]
#[command(name = "concierge", about = "Concierge cart and realtime sync engine", long_about = None)]
pub struct EngineConfig {
    /// ISO currency code carts are priced in
    #[arg(long, env = "CONCIERGE_CURRENCY", default_value = "GBP")]
    pub currency: String,

    /// Catalog fixture to load
    #[arg(long, env = "CONCIERGE_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Realtime reconnect settings.
    #[command(flatten)]
    pub retry: RetryConfig,

    /// Logging output settings.
    #[command(flatten)]
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Load configuration from environment and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Ok(Self::try_parse()?)
    }

    /// Reconnect delays for the sync bridge.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            error_delay: Duration::from_millis(self.retry.error_retry_ms),
            timeout_delay: Duration::from_millis(self.retry.timeout_retry_ms),
        }
    }

    /// Currency carts are priced in.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownCurrency`] for unsupported codes.
    pub fn currency(&self) -> Result<&'static Currency, ConfigError> {
        let code = self.currency.trim();

        parse_currency(code).map_err(|_err| ConfigError::UnknownCurrency(code.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::{GBP, USD};
    use testresult::TestResult;

    use super::*;

    #[test]
    fn default_delays_match_bridge_policy() -> TestResult {
        let config = EngineConfig::try_parse_from([
            "concierge",
            "--currency",
            "GBP",
            "--error-retry-ms",
            "5000",
            "--timeout-retry-ms",
            "1000",
            "--log-format",
            "compact",
        ])?;

        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.logging.log_format, LogFormat::Compact);
        assert_eq!(config.currency()?, GBP);

        Ok(())
    }

    #[test]
    fn flags_override_defaults() -> TestResult {
        let config = EngineConfig::try_parse_from([
            "concierge",
            "--currency",
            "USD",
            "--error-retry-ms",
            "250",
            "--timeout-retry-ms",
            "50",
            "--log-format",
            "json",
            "--catalog",
            "fixtures/catalog/harbour.yml",
        ])?;

        assert_eq!(config.currency()?, USD);
        assert_eq!(config.retry_policy().error_delay, Duration::from_millis(250));
        assert_eq!(config.retry_policy().timeout_delay, Duration::from_millis(50));
        assert_eq!(config.logging.log_format, LogFormat::Json);
        assert_eq!(
            config.catalog,
            Some(PathBuf::from("fixtures/catalog/harbour.yml"))
        );

        Ok(())
    }

    #[test]
    fn unknown_currency_is_rejected() -> TestResult {
        let config = EngineConfig::try_parse_from(["concierge", "--currency", "XYZ"])?;

        assert!(matches!(
            config.currency(),
            Err(ConfigError::UnknownCurrency(code)) if code == "XYZ"
        ));

        Ok(())
    }
}
