//! Credit CLI - Command Line Loss-Distribution Pricing
//!
//! This is the operational entry point for the credit basket engines.
//!
//! # Commands
//!
//! - `credit-cli price --deal <file>` - Tranche expected-loss profiles for a deal
//! - `credit-cli points --family <tag> --pool-size <n>` - Integration point advice
//!
//! # Architecture
//!
//! As the service layer, this crate wires credit_core curves and
//! credit_models copulas into credit_pricing engines and formats the output.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;
mod error;

pub use error::{CliError, Result};

/// Credit basket loss-distribution CLI
#[derive(Parser)]
#[command(name = "credit-cli")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Price the tranches of a deal file
    Price {
        /// Path to the deal description (TOML)
        #[arg(short, long, default_value = "deal.toml")]
        deal: PathBuf,

        /// Output format (table, json, toml)
        #[arg(short, long, default_value = "table")]
        format: String,

        /// Shorthand for --format json
        #[arg(long)]
        json: bool,
    },

    /// Recommend factor integration points
    Points {
        /// Copula family tag (gauss, student_t, double_t, clayton, ...)
        #[arg(short, long, default_value = "gauss")]
        family: String,

        /// Number of names in the pool
        #[arg(short, long)]
        pool_size: usize,

        /// Tranche attachment
        #[arg(short, long)]
        attach: Option<f64>,

        /// Tranche detachment
        #[arg(short, long)]
        detach: Option<f64>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    match cli.command {
        Commands::Price { deal, format, json } => {
            let format = if json { "json" } else { format.as_str() };
            commands::price::run(&deal, format)?
        }
        Commands::Points {
            family,
            pool_size,
            attach,
            detach,
        } => commands::points::run(&family, pool_size, attach, detach)?,
    }
    Ok(())
}
