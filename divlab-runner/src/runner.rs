//! Backtest runner — wires fetch, engine, and metrics into a result bundle.

use divlab_core::{
    run_simulation, CancelToken, ConfigError, DailySeries, DividendRecord, FetchProgress,
    HoldingSnapshot, MarketDataProvider, PortfolioState, RebalancingEvent, SimulationError,
    SimulationOutput, TaxPayment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ConfigFileError, RunConfig};
use crate::fetch::{fetch_market, ExcludedSymbol, FetchError};
use crate::metrics::Metrics;

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("config file error: {0}")]
    ConfigFile(#[from] ConfigFileError),

    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("simulation error: {0}")]
    Simulation(#[from] SimulationError),
}

/// Complete, immutable result of one backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: String,
    pub config: RunConfig,
    pub provider: String,
    pub dataset_hash: String,
    pub metrics: Metrics,
    pub series: DailySeries,
    pub dividends: Vec<DividendRecord>,
    pub tax_payments: Vec<TaxPayment>,
    pub rebalances: Vec<RebalancingEvent>,
    pub holdings: Vec<HoldingSnapshot>,
    pub final_portfolio: PortfolioState,
    pub totals: divlab_core::CashFlowTotals,
    pub excluded_symbols: Vec<ExcludedSymbol>,
    pub warnings: Vec<String>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Run one backtest end to end: validate, fetch with a barrier, simulate,
/// compute metrics.
pub fn run_backtest(
    config: &RunConfig,
    provider: &dyn MarketDataProvider,
    progress: &dyn FetchProgress,
    cancel: &CancelToken,
) -> Result<BacktestResult, RunError> {
    // Fail fast on bad inputs before any fetch work.
    let mut params = config.to_params();
    params.validate()?;

    let fetched = fetch_market(
        provider,
        &config.symbols,
        config.reference_symbol.as_deref(),
        config.benchmark,
        config.start_date,
        config.end_date,
        progress,
        cancel,
    )?;

    // Dropped symbols give up their weight; survivors are renormalized.
    if !fetched.excluded.is_empty() {
        params.symbols = fetched.included.clone();
        params.weights.retain(|s, _| fetched.included.contains(s));
        let sum: f64 = params.weights.values().sum();
        if sum > 0.0 {
            for w in params.weights.values_mut() {
                *w /= sum;
            }
        } else {
            let w = 1.0 / fetched.included.len() as f64;
            params.weights = fetched.included.iter().map(|s| (s.clone(), w)).collect();
        }
    }

    let output: SimulationOutput = run_simulation(&params, &fetched.market, progress, cancel)?;
    let metrics = Metrics::compute(&output, config.risk_free_rate);

    let mut warnings = fetched.warnings;
    warnings.extend(output.warnings);

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id: config.run_id(),
        config: config.clone(),
        provider: provider.name().to_string(),
        dataset_hash: fetched.dataset_hash,
        metrics,
        series: output.series,
        dividends: output.dividends,
        tax_payments: output.tax_payments,
        rebalances: output.rebalances,
        holdings: output.holdings,
        final_portfolio: output.final_portfolio,
        totals: output.totals,
        excluded_symbols: fetched.excluded,
        warnings,
    })
}
