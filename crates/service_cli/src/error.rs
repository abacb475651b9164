//! CLI error types.

use credit_core::market_data::MarketDataError;
use credit_core::types::DateError;
use credit_models::BasketError;
use thiserror::Error;

/// CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Deal file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Command-line or deal argument out of range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A required deal field is absent.
    #[error("Missing deal field: {0}")]
    MissingField(&'static str),

    /// Deal file could not be read or deserialised.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Date text could not be parsed.
    #[error(transparent)]
    Date(#[from] DateError),

    /// Curve construction failed.
    #[error(transparent)]
    MarketData(#[from] MarketDataError),

    /// Engine or model failure.
    #[error(transparent)]
    Basket(#[from] BasketError),

    /// Result serialisation failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for CliError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// CLI result type.
pub type Result<T> = std::result::Result<T, CliError>;
