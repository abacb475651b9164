//! Deal description loading.
//!
//! A deal is read from a TOML file and overlaid with `CREDIT_*` environment
//! variables (`CREDIT_CORRELATION=0.4`, `CREDIT_ENGINE__KIND=monte_carlo`), then
//! turned into curves, a copula, a correlation input and an engine
//! configuration.

use std::path::Path;

use credit_core::market_data::curves::{DiscountCurve, RecoveryCurve, SurvivalCurve};
use credit_core::types::{Date, Tenor};
use credit_models::copula::{Copula, CopulaFamily};
use credit_models::correlation::{BaseCorrelation, CorrelationInput, StrikeMethod};
use credit_models::tranche::TrancheSlice;
use credit_pricing::engine::{BasketConfig, EngineKind};
use serde::{Deserialize, Serialize};

use crate::{CliError, Result};

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "CREDIT";

/// One reference name.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NameConfig {
    /// Curve identifier
    pub id: String,
    /// Flat hazard rate
    pub hazard: f64,
    /// Flat recovery rate
    #[serde(default = "default_recovery")]
    pub recovery: f64,
    /// Notional
    #[serde(default = "default_principal")]
    pub principal: f64,
    /// Refinance date (YYYY-MM-DD)
    #[serde(default)]
    pub refinance: Option<String>,
}

fn default_recovery() -> f64 {
    0.4
}

fn default_principal() -> f64 {
    1.0
}

/// One tranche slice.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrancheConfig {
    /// Label used in reports
    #[serde(default)]
    pub label: Option<String>,
    /// Attachment as a pool fraction
    pub attach: f64,
    /// Detachment as a pool fraction
    pub detach: f64,
    /// Whether recoveries amortize the slice from the top
    #[serde(default)]
    pub amortizing: bool,
    /// Slice maturity (YYYY-MM-DD)
    #[serde(default)]
    pub maturity: Option<String>,
    /// Recovery correlation override
    #[serde(default)]
    pub recovery_correlation: Option<f64>,
}

/// Copula family and shape parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CopulaConfig {
    /// Family tag (gauss, student_t, double_t, clayton, nig, rfl, ...)
    pub family: String,
    /// Student-t or factor degrees of freedom
    #[serde(default)]
    pub dof: Option<f64>,
    /// Idiosyncratic degrees of freedom (double t)
    #[serde(default)]
    pub idio_dof: Option<f64>,
    /// NIG tail parameter
    #[serde(default)]
    pub alpha: Option<f64>,
    /// NIG skew parameter
    #[serde(default)]
    pub beta: Option<f64>,
    /// Random factor loading threshold
    #[serde(default)]
    pub threshold: Option<f64>,
    /// Random factor loading shift
    #[serde(default)]
    pub shift: Option<f64>,
    /// Recovery correlation
    #[serde(default)]
    pub recovery_correlation: Option<f64>,
}

impl Default for CopulaConfig {
    fn default() -> Self {
        Self {
            family: "gauss".to_string(),
            dof: None,
            idio_dof: None,
            alpha: None,
            beta: None,
            threshold: None,
            shift: None,
            recovery_correlation: None,
        }
    }
}

/// Base correlation quotes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BaseCorrelationConfig {
    /// Detachment strikes, strictly increasing
    pub strikes: Vec<f64>,
    /// Base correlation per strike
    pub correlations: Vec<f64>,
    /// Strike scaling (unscaled, expected_loss, discounted_expected_loss)
    #[serde(default = "default_strike_method")]
    pub method: String,
}

fn default_strike_method() -> String {
    "unscaled".to_string()
}

/// Engine settings; unset fields keep the engine defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Strategy (auto, uniform, large_pool, semi_analytic, monte_carlo)
    #[serde(default)]
    pub kind: Option<String>,
    /// Loss grid spacing
    #[serde(default)]
    pub grid_size: Option<f64>,
    /// Time grid step as a tenor (3M, 6M, 1Y)
    #[serde(default)]
    pub step: Option<String>,
    /// Factor integration points
    #[serde(default)]
    pub integration_points: Option<usize>,
    /// Monte Carlo paths
    #[serde(default)]
    pub sample_size: Option<usize>,
    /// Monte Carlo seed; 0 is the fixed default, -1 draws from entropy
    #[serde(default)]
    pub seed: Option<i64>,
    /// Skip amortization tracking
    #[serde(default)]
    pub no_amortization: Option<bool>,
    /// Loss window start (YYYY-MM-DD)
    #[serde(default)]
    pub portfolio_start: Option<String>,
}

/// Complete deal description.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DealConfig {
    /// Valuation date (YYYY-MM-DD)
    pub as_of: String,
    /// Deal maturity (YYYY-MM-DD)
    pub maturity: String,
    /// Flat correlation, used when no base correlation is given
    #[serde(default)]
    pub correlation: Option<f64>,
    /// Flat continuously compounded discount rate
    #[serde(default)]
    pub discount_rate: Option<f64>,
    /// Nth-to-default orders to report
    #[serde(default)]
    pub nth_to_default: Vec<usize>,
    /// Copula
    #[serde(default)]
    pub copula: CopulaConfig,
    /// Engine settings
    #[serde(default)]
    pub engine: EngineConfig,
    /// Base correlation quotes
    #[serde(default)]
    pub base_correlation: Option<BaseCorrelationConfig>,
    /// Reference names
    pub names: Vec<NameConfig>,
    /// Tranche slices
    #[serde(default)]
    pub tranches: Vec<TrancheConfig>,
}

impl DealConfig {
    /// Read a deal file and apply `CREDIT_*` overrides.
    ///
    /// Nested fields use a double underscore: `CREDIT_ENGINE__SEED=7`.
    ///
    /// # Errors
    ///
    /// `FileNotFound` for a missing file, `Config` for unreadable or
    /// malformed content.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CliError::FileNotFound(path.display().to_string()));
        }
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Parse a deal from TOML text without environment overrides.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Valuation date.
    pub fn as_of(&self) -> Result<Date> {
        Ok(Date::parse(&self.as_of)?)
    }

    /// Deal maturity.
    pub fn maturity(&self) -> Result<Date> {
        Ok(Date::parse(&self.maturity)?)
    }

    /// Survival curves in name order, each calibrated to its recovery.
    pub fn curves(&self) -> Result<Vec<Option<SurvivalCurve>>> {
        let as_of = self.as_of()?;
        self.names
            .iter()
            .map(|name| {
                let mut curve = SurvivalCurve::flat(name.id.clone(), as_of, name.hazard)?
                    .with_recovery(RecoveryCurve::flat(as_of, name.recovery)?);
                if let Some(date) = &name.refinance {
                    curve = curve.with_refinance(Date::parse(date)?);
                }
                Ok(Some(curve))
            })
            .collect()
    }

    /// Notional per name.
    pub fn principals(&self) -> Vec<f64> {
        self.names.iter().map(|n| n.principal).collect()
    }

    /// Copula with its shape parameters.
    pub fn copula(&self) -> Result<Copula> {
        let c = &self.copula;
        let family: CopulaFamily = c.family.parse()?;
        let need = |value: Option<f64>, field: &'static str| {
            value.ok_or(CliError::MissingField(field))
        };
        let copula = match family {
            CopulaFamily::StudentT => Copula::student_t(need(c.dof, "copula.dof")?)?,
            CopulaFamily::DoubleT => Copula::double_t(
                need(c.dof, "copula.dof")?,
                need(c.idio_dof, "copula.idio_dof")?,
            )?,
            CopulaFamily::Nig => {
                Copula::nig(need(c.alpha, "copula.alpha")?, c.beta.unwrap_or(0.0))?
            }
            CopulaFamily::RandomFactorLoading => Copula::random_factor_loading(
                need(c.threshold, "copula.threshold")?,
                need(c.shift, "copula.shift")?,
            )?,
            other => Copula::new(other),
        };
        match c.recovery_correlation {
            Some(rc) => Ok(copula.with_recovery_correlation(rc)?),
            None => Ok(copula),
        }
    }

    /// Base correlation when quoted, otherwise the flat correlation.
    pub fn correlation(&self) -> Result<CorrelationInput> {
        if let Some(base) = &self.base_correlation {
            let method: StrikeMethod = base.method.parse()?;
            let curve =
                BaseCorrelation::new(base.strikes.clone(), base.correlations.clone(), method)?;
            return Ok(CorrelationInput::Base(curve));
        }
        self.correlation
            .map(CorrelationInput::Scalar)
            .ok_or(CliError::MissingField("correlation"))
    }

    /// Flat discount curve when a rate is given.
    pub fn discount_curve(&self) -> Result<Option<DiscountCurve>> {
        match self.discount_rate {
            Some(rate) => Ok(Some(DiscountCurve::flat(self.as_of()?, rate))),
            None => Ok(None),
        }
    }

    /// Forced strategy, or `None` for automatic selection.
    pub fn engine_kind(&self) -> Result<Option<EngineKind>> {
        let Some(tag) = &self.engine.kind else {
            return Ok(None);
        };
        match tag.to_ascii_lowercase().replace(['_', '-', ' '], "").as_str() {
            "auto" => Ok(None),
            "uniform" => Ok(Some(EngineKind::Uniform)),
            "largepool" => Ok(Some(EngineKind::LargePool)),
            "semianalytic" => Ok(Some(EngineKind::SemiAnalytic)),
            "montecarlo" | "mc" => Ok(Some(EngineKind::MonteCarlo)),
            _ => Err(CliError::InvalidArgument(format!(
                "unknown engine '{tag}'. Supported: auto, uniform, large_pool, \
                 semi_analytic, monte_carlo"
            ))),
        }
    }

    /// Engine configuration with the deal's overrides applied.
    pub fn basket_config(&self) -> Result<BasketConfig> {
        let e = &self.engine;
        let mut builder = BasketConfig::builder();
        if let Some(grid_size) = e.grid_size {
            builder = builder.grid_size(grid_size);
        }
        if let Some(step) = &e.step {
            builder = builder.step(step.parse::<Tenor>()?);
        }
        if let Some(points) = e.integration_points {
            builder = builder.integration_points(points);
        }
        if let Some(n) = e.sample_size {
            builder = builder.sample_size(n);
        }
        if let Some(seed) = e.seed {
            builder = builder.seed(seed);
        }
        if let Some(flag) = e.no_amortization {
            builder = builder.no_amortization(flag);
        }
        if let Some(start) = &e.portfolio_start {
            builder = builder.portfolio_start(Date::parse(start)?);
        }
        builder.build().map_err(|err| CliError::Basket(err.into()))
    }

    /// Tranche slices in file order.
    pub fn slices(&self) -> Result<Vec<TrancheSlice>> {
        self.tranches
            .iter()
            .map(|t| {
                let mut slice = TrancheSlice::new(t.attach, t.detach)?.amortizing(t.amortizing);
                if let Some(date) = &t.maturity {
                    slice = slice.with_maturity(Date::parse(date)?);
                }
                if let Some(c) = t.recovery_correlation {
                    slice = slice.with_recovery_correlation(c)?;
                }
                Ok(slice)
            })
            .collect()
    }

    /// Report label of tranche `i`.
    pub fn tranche_label(&self, i: usize) -> String {
        let t = &self.tranches[i];
        t.label
            .clone()
            .unwrap_or_else(|| format!("{:.2}%-{:.2}%", 100.0 * t.attach, 100.0 * t.detach))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const DEAL: &str = r#"
as_of = "2024-03-20"
maturity = "2029-03-20"
correlation = 0.3
nth_to_default = [1, 2]

[copula]
family = "student_t"
dof = 5.0

[engine]
kind = "semi_analytic"
step = "6M"
seed = 11

[[names]]
id = "ALPHA"
hazard = 0.02

[[names]]
id = "BETA"
hazard = 0.03
recovery = 0.35
principal = 2.0

[[tranches]]
attach = 0.0
detach = 0.03
amortizing = true

[[tranches]]
label = "mezz"
attach = 0.03
detach = 0.07
maturity = "2027-03-20"
"#;

    // ========================================
    // Parsing
    // ========================================

    #[test]
    fn test_parse_deal() {
        let deal = DealConfig::from_toml_str(DEAL).unwrap();
        assert_eq!(deal.names.len(), 2);
        assert_abs_diff_eq!(deal.names[0].recovery, 0.4);
        assert_abs_diff_eq!(deal.names[1].recovery, 0.35);
        assert_abs_diff_eq!(deal.principals().as_slice(), [1.0, 2.0].as_slice());
        assert_eq!(deal.nth_to_default, vec![1, 2]);
        assert_eq!(deal.maturity().unwrap(), Date::from_ymd(2029, 3, 20).unwrap());
        assert_eq!(deal.tranche_label(0), "0.00%-3.00%");
        assert_eq!(deal.tranche_label(1), "mezz");
    }

    #[test]
    fn test_build_model_inputs() {
        let deal = DealConfig::from_toml_str(DEAL).unwrap();
        assert_eq!(deal.copula().unwrap().family(), CopulaFamily::StudentT);
        assert_eq!(deal.engine_kind().unwrap(), Some(EngineKind::SemiAnalytic));
        match deal.correlation().unwrap() {
            CorrelationInput::Scalar(rho) => assert_abs_diff_eq!(rho, 0.3),
            other => panic!("expected scalar correlation, got {other:?}"),
        }

        let config = deal.basket_config().unwrap();
        assert_eq!(config.seed(), 11);
        assert_eq!(config.step(), "6M".parse::<Tenor>().unwrap());

        let slices = deal.slices().unwrap();
        assert!(slices[0].amortizes());
        assert_eq!(slices[1].maturity(), Some(Date::from_ymd(2027, 3, 20).unwrap()));
        let curves = deal.curves().unwrap();
        assert_eq!(curves.len(), 2);
        let beta = curves[1].as_ref().unwrap();
        let recovery = beta.recovery_curve().unwrap();
        assert_abs_diff_eq!(recovery.recovery_rate(deal.maturity().unwrap()), 0.35);
        assert!(deal.discount_curve().unwrap().is_none());
    }

    // ========================================
    // Errors
    // ========================================

    #[test]
    fn test_missing_dof_is_reported() {
        let text = DEAL.replace("dof = 5.0", "");
        let deal = DealConfig::from_toml_str(&text).unwrap();
        assert!(matches!(deal.copula(), Err(CliError::MissingField("copula.dof"))));
    }

    #[test]
    fn test_missing_correlation_is_reported() {
        let text = DEAL.replace("correlation = 0.3", "");
        let deal = DealConfig::from_toml_str(&text).unwrap();
        assert!(matches!(deal.correlation(), Err(CliError::MissingField("correlation"))));
    }

    #[test]
    fn test_base_correlation_section() {
        let section = r#"
[base_correlation]
strikes = [0.03, 0.07]
correlations = [0.2, 0.3]
method = "expected_loss"
"#;
        let text = format!("{DEAL}{section}");
        let deal = DealConfig::from_toml_str(&text).unwrap();
        match deal.correlation().unwrap() {
            CorrelationInput::Base(base) => assert_eq!(base.method(), StrikeMethod::ExpectedLoss),
            other => panic!("expected base correlation, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_engine_rejected() {
        let text = DEAL.replace("semi_analytic", "lattice");
        let deal = DealConfig::from_toml_str(&text).unwrap();
        assert!(matches!(deal.engine_kind(), Err(CliError::InvalidArgument(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = DealConfig::load(Path::new("does/not/exist.toml")).unwrap_err();
        assert!(matches!(err, CliError::FileNotFound(_)));
    }
}
