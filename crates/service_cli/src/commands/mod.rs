//! CLI command implementations
//!
//! Each submodule implements a specific CLI command.

pub mod points;
pub mod price;

use crate::{CliError, Result};

/// Report rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Boxed text table
    Table,
    /// Pretty-printed JSON
    Json,
    /// TOML document
    Toml,
}

impl std::str::FromStr for OutputFormat {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "toml" => Ok(Self::Toml),
            other => Err(CliError::InvalidArgument(format!(
                "Unknown format: {}. Supported: table, json, toml",
                other
            ))),
        }
    }
}
