//! Portfolio state — cash plus all holdings, owned by the simulation engine.
//!
//! Mutated once per simulated trading day by engine transitions only, then
//! frozen into the result bundle. Cash and share counts never go negative;
//! the engine aborts the run if they would.

use super::holding::Holding;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate portfolio state: as-of date, cash balance, and one holding per
/// symbol. The valuation identity holds at every step:
/// `total_value == cash + sum(shares * last known price)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioState {
    pub as_of: NaiveDate,
    pub cash: f64,
    pub holdings: BTreeMap<String, Holding>,
}

impl PortfolioState {
    pub fn new(as_of: NaiveDate, cash: f64) -> Self {
        Self {
            as_of,
            cash,
            holdings: BTreeMap::new(),
        }
    }

    /// Holding for `symbol`, creating an empty one on first touch.
    pub fn holding_mut(&mut self, symbol: &str) -> &mut Holding {
        self.holdings
            .entry(symbol.to_string())
            .or_insert_with(|| Holding::new(symbol))
    }

    pub fn shares(&self, symbol: &str) -> f64 {
        self.holdings.get(symbol).map_or(0.0, |h| h.shares())
    }

    /// Total market value: cash + sum of position values at `prices`.
    ///
    /// Symbols without a price entry contribute nothing; the engine always
    /// supplies a carried-forward price for every held symbol.
    pub fn total_value(&self, prices: &BTreeMap<String, f64>) -> f64 {
        let positions: f64 = self
            .holdings
            .values()
            .map(|h| {
                let price = prices.get(&h.symbol).copied().unwrap_or(0.0);
                h.market_value(price)
            })
            .sum();
        self.cash + positions
    }

    /// Current portfolio weights per symbol at `prices` (cash excluded from
    /// the numerator, included in the denominator).
    pub fn weights(&self, prices: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
        let total = self.total_value(prices);
        let mut out = BTreeMap::new();
        if total <= 0.0 {
            return out;
        }
        for h in self.holdings.values() {
            let price = prices.get(&h.symbol).copied().unwrap_or(0.0);
            out.insert(h.symbol.clone(), h.market_value(price) / total);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn total_value_cash_only() {
        let p = PortfolioState::new(d(2024, 1, 2), 10_000.0);
        assert_eq!(p.total_value(&BTreeMap::new()), 10_000.0);
    }

    #[test]
    fn total_value_with_positions() {
        let mut p = PortfolioState::new(d(2024, 1, 2), 500.0);
        p.holding_mut("KO").lots.add(d(2024, 1, 2), 10.0, 60.0);
        p.holding_mut("PEP").lots.add(d(2024, 1, 2), 2.0, 170.0);

        let prices: BTreeMap<String, f64> = [("KO".to_string(), 62.0), ("PEP".to_string(), 165.0)]
            .into_iter()
            .collect();
        // 500 + 10*62 + 2*165 = 1450
        assert!((p.total_value(&prices) - 1450.0).abs() < 1e-9);
    }

    #[test]
    fn weights_sum_to_invested_fraction() {
        let mut p = PortfolioState::new(d(2024, 1, 2), 0.0);
        p.holding_mut("KO").lots.add(d(2024, 1, 2), 10.0, 60.0);
        p.holding_mut("PEP").lots.add(d(2024, 1, 2), 10.0, 60.0);

        let prices: BTreeMap<String, f64> = [("KO".to_string(), 60.0), ("PEP".to_string(), 60.0)]
            .into_iter()
            .collect();
        let w = p.weights(&prices);
        assert!((w["KO"] - 0.5).abs() < 1e-12);
        assert!((w["PEP"] - 0.5).abs() < 1e-12);
    }
}
