//! Serializable run configuration.

use chrono::NaiveDate;
use divlab_core::{RebalanceFrequency, SimulationParams, TaxConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Unique identifier for a run (content-addressable hash).
pub type RunId = String;

/// Failure to load a config file; distinct from semantic validation, which
/// happens in [`SimulationParams::validate`].
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Everything needed to reproduce a backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// 1–20 symbols to hold.
    pub symbols: Vec<String>,

    /// Target weight per symbol; omitted means equal weights.
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,

    /// Backtest start date (inclusive).
    pub start_date: NaiveDate,

    /// Backtest end date (inclusive).
    pub end_date: NaiveDate,

    /// Lump invested on the first trading day.
    pub initial_investment: f64,

    /// Added on each monthly anniversary of the start date.
    #[serde(default)]
    pub monthly_contribution: f64,

    /// Reinvest dividends into the paying symbol.
    #[serde(default = "default_true")]
    pub drip: bool,

    /// Fraction of each reinvested dividend lost to the DRIP fee.
    #[serde(default)]
    pub drip_fee_pct: f64,

    /// Tax rates; omitted disables tax modeling.
    #[serde(default)]
    pub tax: Option<TaxConfig>,

    #[serde(default)]
    pub rebalance: RebalanceFrequency,

    /// Flat fee fraction on every rebalancing trade's gross value.
    #[serde(default)]
    pub rebalance_fee_pct: f64,

    /// Fetch and track the provider's benchmark series.
    #[serde(default = "default_true")]
    pub benchmark: bool,

    /// Optional reference fund tracked with the same cash flows.
    #[serde(default)]
    pub reference_symbol: Option<String>,

    /// Annual risk-free rate for Sharpe/Sortino.
    #[serde(default)]
    pub risk_free_rate: f64,
}

fn default_true() -> bool {
    true
}

impl RunConfig {
    pub fn from_toml_path(path: &Path) -> Result<Self, ConfigFileError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }

    /// Target weights with the equal-weight default applied.
    pub fn effective_weights(&self) -> BTreeMap<String, f64> {
        if !self.weights.is_empty() {
            return self.weights.clone();
        }
        let w = 1.0 / self.symbols.len().max(1) as f64;
        self.symbols.iter().map(|s| (s.clone(), w)).collect()
    }

    /// Lower this config into validated-on-entry engine parameters.
    pub fn to_params(&self) -> SimulationParams {
        SimulationParams {
            symbols: self.symbols.clone(),
            weights: self.effective_weights(),
            start: self.start_date,
            end: self.end_date,
            initial_investment: self.initial_investment,
            monthly_contribution: self.monthly_contribution,
            drip: self.drip,
            drip_fee_pct: self.drip_fee_pct,
            tax: self.tax,
            rebalance: self.rebalance,
            rebalance_fee_pct: self.rebalance_fee_pct,
        }
    }

    /// Deterministic content hash of this configuration. Two identical
    /// configs share a RunId and can share cached artifacts.
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}
