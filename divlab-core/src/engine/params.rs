//! Simulation parameters and fail-fast validation.

use crate::rebalance::RebalanceFrequency;
use crate::tax::TaxConfig;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Hard cap on the number of symbols in one run.
pub const MAX_SYMBOLS: usize = 20;

/// Allowed deviation of the target-weight sum from 1.0.
pub const WEIGHT_TOLERANCE: f64 = 0.01;

/// Upper bound on configured tax rates.
pub const MAX_TAX_RATE: f64 = 0.5;

/// Invalid run inputs, caught before any simulation work. Always fatal,
/// never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no symbols configured")]
    NoSymbols,

    #[error("too many symbols: {count} (max {MAX_SYMBOLS})")]
    TooManySymbols { count: usize },

    #[error("duplicate symbol: {symbol}")]
    DuplicateSymbol { symbol: String },

    #[error("weight for '{symbol}' is not in the symbol list")]
    UnknownWeightSymbol { symbol: String },

    #[error("target weights sum to {sum:.4}, expected 1.0 ± {WEIGHT_TOLERANCE}")]
    WeightSum { sum: f64 },

    #[error("weight for '{symbol}' is negative")]
    NegativeWeight { symbol: String },

    #[error("end date {end} is not after start date {start}")]
    DateOrder { start: NaiveDate, end: NaiveDate },

    #[error("{field} must be non-negative, got {value}")]
    NegativeAmount { field: &'static str, value: f64 },

    #[error("initial investment and monthly contribution are both zero")]
    NoCapital,

    #[error("{field} must be in [0, {max}], got {value}")]
    RateOutOfRange {
        field: &'static str,
        value: f64,
        max: f64,
    },
}

/// Everything the simulation engine needs for one run.
///
/// Built by the runner from a validated [`RunConfig`]-style source; the
/// engine re-validates on entry so it can never start from bad inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationParams {
    pub symbols: Vec<String>,
    /// Target weight per symbol; keys must be a subset of `symbols` and
    /// values must sum to 1.0 within [`WEIGHT_TOLERANCE`].
    pub weights: BTreeMap<String, f64>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Lump deployed on the first trading day.
    pub initial_investment: f64,
    /// Added and deployed on each monthly anniversary of the start date.
    pub monthly_contribution: f64,
    pub drip: bool,
    /// Fraction of each reinvested dividend lost to the DRIP fee.
    pub drip_fee_pct: f64,
    /// `None` disables tax modeling entirely (net == gross).
    pub tax: Option<TaxConfig>,
    pub rebalance: RebalanceFrequency,
    /// Flat fee fraction on the gross value of every rebalancing trade.
    pub rebalance_fee_pct: f64,
}

impl SimulationParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.is_empty() {
            return Err(ConfigError::NoSymbols);
        }
        if self.symbols.len() > MAX_SYMBOLS {
            return Err(ConfigError::TooManySymbols {
                count: self.symbols.len(),
            });
        }
        let mut seen = std::collections::BTreeSet::new();
        for symbol in &self.symbols {
            if !seen.insert(symbol) {
                return Err(ConfigError::DuplicateSymbol {
                    symbol: symbol.clone(),
                });
            }
        }
        for (symbol, weight) in &self.weights {
            if !self.symbols.contains(symbol) {
                return Err(ConfigError::UnknownWeightSymbol {
                    symbol: symbol.clone(),
                });
            }
            if *weight < 0.0 {
                return Err(ConfigError::NegativeWeight {
                    symbol: symbol.clone(),
                });
            }
        }
        let sum: f64 = self.weights.values().sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(ConfigError::WeightSum { sum });
        }
        if self.end <= self.start {
            return Err(ConfigError::DateOrder {
                start: self.start,
                end: self.end,
            });
        }
        for (field, value) in [
            ("initial_investment", self.initial_investment),
            ("monthly_contribution", self.monthly_contribution),
        ] {
            if value < 0.0 {
                return Err(ConfigError::NegativeAmount { field, value });
            }
        }
        if self.initial_investment + self.monthly_contribution <= 0.0 {
            return Err(ConfigError::NoCapital);
        }
        for (field, value) in [
            ("drip_fee_pct", self.drip_fee_pct),
            ("rebalance_fee_pct", self.rebalance_fee_pct),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::RateOutOfRange {
                    field,
                    value,
                    max: 1.0,
                });
            }
        }
        if let Some(tax) = &self.tax {
            for (field, value) in [
                ("qualified_dividend_rate", tax.qualified_dividend_rate),
                ("ordinary_dividend_rate", tax.ordinary_dividend_rate),
                ("long_term_gains_rate", tax.long_term_gains_rate),
            ] {
                if !(0.0..=MAX_TAX_RATE).contains(&value) {
                    return Err(ConfigError::RateOutOfRange {
                        field,
                        value,
                        max: MAX_TAX_RATE,
                    });
                }
            }
        }
        Ok(())
    }
}
