//! A single symbol's position: its lot book plus dividend bookkeeping.

use super::lot::LotBook;
use serde::{Deserialize, Serialize};

/// Position in one symbol. Share count is always derived from the lot book,
/// so the two can never disagree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub lots: LotBook,
    /// After-tax dividends received over the life of the run.
    pub cumulative_dividends: f64,
}

impl Holding {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            lots: LotBook::new(),
            cumulative_dividends: 0.0,
        }
    }

    pub fn shares(&self) -> f64 {
        self.lots.total_shares()
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.shares() * price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn shares_track_lot_book() {
        let mut h = Holding::new("KO");
        assert_eq!(h.shares(), 0.0);
        h.lots
            .add(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), 10.0, 60.0);
        assert!((h.shares() - 10.0).abs() < 1e-12);
        assert!((h.market_value(62.0) - 620.0).abs() < 1e-9);
    }
}
