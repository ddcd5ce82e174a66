//! Immutable event records emitted by the simulation: dividends, tax
//! payments, rebalancing events, and the final holdings snapshot.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Dividend classification for tax purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DividendClass {
    /// All paying shares held at least the qualified-holding threshold.
    Qualified,
    /// No paying shares aged past the threshold.
    Ordinary,
    /// Lots straddle the threshold; taxed pro-rata.
    Mixed,
}

/// One dividend payment applied to the portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendRecord {
    pub date: NaiveDate,
    pub symbol: String,
    /// Shares held at the prior day's close (the paying share count).
    pub shares: f64,
    /// Per-share cash amount on the ex-date.
    pub amount_per_share: f64,
    pub gross: f64,
    pub tax_withheld: f64,
    pub net: f64,
    pub class: DividendClass,
    /// Whether the net amount was reinvested into new shares.
    pub reinvested: bool,
    /// Shares purchased by reinvestment (0 when not reinvested).
    pub shares_purchased: f64,
}

/// What a tax payment was levied on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxKind {
    QualifiedDividend,
    OrdinaryDividend,
    CapitalGains,
}

/// A single tax payment: each dividend or realized gain is taxed at most once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxPayment {
    pub date: NaiveDate,
    pub symbol: String,
    pub kind: TaxKind,
    pub gross: f64,
    pub tax: f64,
    pub net: f64,
}

/// One leg of a rebalancing pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalanceTrade {
    pub symbol: String,
    /// Positive = shares bought, negative = shares sold.
    pub shares_delta: f64,
    /// Gross traded value (always positive).
    pub value: f64,
    /// Realized gain (+) or loss (−); zero for buys.
    pub realized_gain: f64,
}

/// Record of one rebalancing date. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalancingEvent {
    pub date: NaiveDate,
    pub pre_weights: BTreeMap<String, f64>,
    pub target_weights: BTreeMap<String, f64>,
    pub trades: Vec<RebalanceTrade>,
    pub fees: f64,
    pub taxes: f64,
}

/// Final per-symbol snapshot for the holdings table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingSnapshot {
    pub symbol: String,
    pub shares: f64,
    pub last_price: f64,
    pub market_value: f64,
    pub cumulative_dividends: f64,
}
