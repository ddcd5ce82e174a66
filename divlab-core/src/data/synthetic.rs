//! Deterministic synthetic market data for demos and tests.
//!
//! Each symbol's series is a random walk seeded from `blake3(symbol)`, so
//! the same symbol always produces the same path. Dividends are paid
//! quarterly at a configurable annual yield. Clearly fake; never mix with
//! real data in reports.

use super::provider::{DataError, DividendPoint, MarketDataProvider, PricePoint, SymbolData};
use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Synthetic random-walk provider with quarterly dividends.
#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    /// Annual dividend yield paid in four quarterly installments.
    pub annual_yield: f64,
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self { annual_yield: 0.03 }
    }
}

impl SyntheticProvider {
    pub fn new(annual_yield: f64) -> Self {
        Self { annual_yield }
    }

    fn walk(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> SymbolData {
        let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
        let mut rng = StdRng::from_seed(seed);

        let mut closes = Vec::new();
        let mut dividends = Vec::new();
        let mut price = 100.0_f64 * rng.gen_range(0.5..2.0);
        let mut current = start;
        let mut trading_days = 0usize;

        while current <= end {
            let weekday = current.weekday();
            if weekday == Weekday::Sat || weekday == Weekday::Sun {
                current += chrono::Duration::days(1);
                continue;
            }

            let daily_return: f64 = rng.gen_range(-0.02..0.021);
            price *= 1.0 + daily_return;
            closes.push(PricePoint {
                date: current,
                close: price,
            });

            trading_days += 1;
            // Roughly one ex-date per quarter of trading days.
            if trading_days % 63 == 0 && self.annual_yield > 0.0 {
                dividends.push(DividendPoint {
                    ex_date: current,
                    amount: price * self.annual_yield / 4.0,
                });
            }

            current += chrono::Duration::days(1);
        }

        SymbolData {
            symbol: symbol.to_string(),
            closes,
            dividends,
        }
    }
}

impl MarketDataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch_symbol(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<SymbolData, DataError> {
        let data = self.walk(symbol, start, end);
        if data.is_empty() {
            return Err(DataError::EmptyRange {
                symbol: symbol.to_string(),
            });
        }
        Ok(data)
    }

    fn fetch_benchmark(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, DataError> {
        // Benchmark pays no dividends in the synthetic world.
        Ok(self.walk("__benchmark__", start, end).closes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn deterministic_per_symbol() {
        let p = SyntheticProvider::default();
        let a = p.fetch_symbol("KO", d(2024, 1, 1), d(2024, 3, 31)).unwrap();
        let b = p.fetch_symbol("KO", d(2024, 1, 1), d(2024, 3, 31)).unwrap();
        assert_eq!(a.closes.len(), b.closes.len());
        for (x, y) in a.closes.iter().zip(&b.closes) {
            assert_eq!(x.close, y.close);
        }
    }

    #[test]
    fn different_symbols_differ() {
        let p = SyntheticProvider::default();
        let a = p.fetch_symbol("KO", d(2024, 1, 1), d(2024, 1, 31)).unwrap();
        let b = p.fetch_symbol("PEP", d(2024, 1, 1), d(2024, 1, 31)).unwrap();
        assert_ne!(a.closes[0].close, b.closes[0].close);
    }

    #[test]
    fn skips_weekends() {
        let p = SyntheticProvider::default();
        let data = p.fetch_symbol("KO", d(2024, 1, 1), d(2024, 1, 14)).unwrap();
        for point in &data.closes {
            let wd = point.date.weekday();
            assert!(wd != Weekday::Sat && wd != Weekday::Sun);
        }
    }

    #[test]
    fn pays_quarterly_dividends_over_a_year() {
        let p = SyntheticProvider::new(0.04);
        let data = p.fetch_symbol("KO", d(2023, 1, 1), d(2023, 12, 31)).unwrap();
        assert!(!data.dividends.is_empty());
        for div in &data.dividends {
            assert!(div.amount > 0.0);
        }
    }
}
