//! Price command implementation
//!
//! Loads a deal, builds the pool engine and the tranche mappers through the
//! factory, and reports expected loss and amortization per grid date.

use std::path::Path;
use std::sync::Arc;

use credit_pricing::factory::BasketPricerFactory;
use credit_pricing::tranche::{NthToDefault, PoolContext};
use serde::Serialize;
use tracing::info;

use super::OutputFormat;
use crate::config::DealConfig;
use crate::Result;

/// Expected loss profile of one tranche.
#[derive(Debug, Clone, Serialize)]
pub struct TrancheReport {
    /// Report label
    pub label: String,
    /// Attachment
    pub attach: f64,
    /// Detachment
    pub detach: f64,
    /// Fraction of the slice lost, per grid date
    pub expected_loss: Vec<f64>,
    /// Fraction of the slice amortized, per grid date
    pub expected_amortization: Vec<f64>,
}

/// Nth-to-default figures at deal maturity.
#[derive(Debug, Clone, Serialize)]
pub struct NthToDefaultReport {
    /// Default order
    pub order: usize,
    /// Probability of at least `order` defaults
    pub probability: f64,
    /// Expected loss fraction of the basket
    pub expected_loss: f64,
}

/// Full pricing output.
#[derive(Debug, Clone, Serialize)]
pub struct PriceReport {
    /// Strategy that computed the pool
    pub engine: String,
    /// Names in the pool
    pub names: usize,
    /// Pool notional
    pub total_principal: f64,
    /// Grid dates
    pub dates: Vec<String>,
    /// Pool expected loss fraction per grid date
    pub pool_expected_loss: Vec<f64>,
    /// Tranches in file order
    pub tranches: Vec<TrancheReport>,
    /// Requested nth-to-default orders
    pub nth_to_default: Vec<NthToDefaultReport>,
}

/// Price a deal.
pub fn price(deal: &DealConfig) -> Result<PriceReport> {
    let maturity = deal.maturity()?;
    let curves = deal.curves()?;
    let principals = deal.principals();
    let slices = deal.slices()?;

    let mut factory = BasketPricerFactory::new(deal.copula()?, deal.correlation()?)
        .with_config(deal.basket_config()?);
    if let Some(kind) = deal.engine_kind()? {
        factory = factory.with_engine(kind);
    }
    if let Some(curve) = deal.discount_curve()? {
        factory = factory.with_discount_curve(curve);
    }

    let engine = factory.build_engine(&curves, Some(&principals), &slices, maturity)?;
    let pool = PoolContext::new(engine, None);
    let (engine, names, total_principal) =
        pool.read(|e| (e.kind().name().to_string(), e.count(), e.total_principal()));
    let dates = pool.read(|e| e.grid_dates())?;
    info!(engine = %engine, names, dates = dates.len(), "pool engine ready");

    let pool_expected_loss = dates
        .iter()
        .map(|&d| pool.read(|e| e.expected_loss(d)))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut tranches = Vec::with_capacity(slices.len());
    if !slices.is_empty() {
        let mappers = factory.build_tranches(&curves, Some(&principals), &slices, maturity)?;
        for (i, mut mapper) in mappers.into_iter().enumerate() {
            let mut expected_loss = Vec::with_capacity(dates.len());
            let mut expected_amortization = Vec::with_capacity(dates.len());
            for &d in &dates {
                expected_loss.push(mapper.expected_loss(d)?);
                expected_amortization.push(mapper.expected_amortization(d)?);
            }
            tranches.push(TrancheReport {
                label: deal.tranche_label(i),
                attach: mapper.slice().attach(),
                detach: mapper.slice().detach(),
                expected_loss,
                expected_amortization,
            });
        }
    }

    let nth_to_default = deal
        .nth_to_default
        .iter()
        .map(|&order| {
            let basket = NthToDefault::new(Arc::clone(&pool), order)?;
            Ok(NthToDefaultReport {
                order,
                probability: basket.probability(maturity)?,
                expected_loss: basket.expected_loss(maturity)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(PriceReport {
        engine,
        names,
        total_principal,
        dates: dates.iter().map(ToString::to_string).collect(),
        pool_expected_loss,
        tranches,
        nth_to_default,
    })
}

/// Run the price command
pub fn run(deal: &Path, format: &str) -> Result<()> {
    let format: OutputFormat = format.parse()?;
    info!("Starting pricing...");
    info!("  Deal: {}", deal.display());

    let deal = DealConfig::load(deal)?;
    let report = price(&deal)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Toml => println!("{}", toml::to_string_pretty(&report)?),
        OutputFormat::Table => print_table(&report),
    }

    info!("Pricing complete");
    Ok(())
}

fn print_table(report: &PriceReport) {
    println!(
        "\n{} engine, {} names, notional {:.2}",
        report.engine, report.names, report.total_principal
    );

    let mut header = format!("│ {:<10} │ {:>10} │", "Date", "Pool EL");
    for t in &report.tranches {
        header.push_str(&format!(" {:>12} │", t.label));
    }
    let rule = "─".repeat(header.chars().count().saturating_sub(2));
    println!("┌{}┐", rule);
    println!("{}", header);
    println!("├{}┤", rule);
    for (i, date) in report.dates.iter().enumerate() {
        let mut row = format!("│ {:<10} │ {:>10.6} │", date, report.pool_expected_loss[i]);
        for t in &report.tranches {
            row.push_str(&format!(" {:>12.6} │", t.expected_loss[i]));
        }
        println!("{}", row);
    }
    println!("└{}┘", rule);

    for ntd in &report.nth_to_default {
        println!(
            "{}-to-default: probability {:.6}, expected loss {:.6}",
            ntd.order, ntd.probability, ntd.expected_loss
        );
    }
}
