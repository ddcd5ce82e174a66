//! Alignment of per-symbol series onto a shared trading-date axis.
//!
//! The axis is the sorted union of all symbols' close dates inside the
//! requested range. A symbol with no observation on an axis date gets a NaN
//! close there (a gap); the engine carries the last known price forward over
//! gaps. Dividend amounts are placed on their ex-dates; dates with no
//! dividend hold 0.0.

use super::provider::{PricePoint, SymbolData};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// All market inputs for one run, aligned on a single date axis.
#[derive(Debug, Clone, Default)]
pub struct AlignedMarket {
    /// Trading-date axis (sorted, unique). Non-trading days are simply
    /// absent — the day loop skips nothing.
    pub dates: Vec<NaiveDate>,
    /// Per-symbol closes; NaN marks a gap on that axis date.
    pub closes: BTreeMap<String, Vec<f64>>,
    /// Per-symbol dividend per-share amounts; 0.0 when none.
    pub dividends: BTreeMap<String, Vec<f64>>,
    /// Benchmark closes on the same axis (NaN gaps), if supplied.
    pub benchmark: Option<Vec<f64>>,
    /// Reference-fund closes on the same axis (NaN gaps), if supplied.
    pub reference: Option<Vec<f64>>,
}

impl AlignedMarket {
    pub fn symbols(&self) -> impl Iterator<Item = &String> {
        self.closes.keys()
    }

    pub fn num_days(&self) -> usize {
        self.dates.len()
    }
}

/// Build the aligned market view from fetched symbol data.
///
/// Only dates within `[start, end]` enter the axis. Symbols with no closes
/// in range must be filtered out by the caller before alignment.
pub fn align_market(
    symbols: &[SymbolData],
    benchmark: Option<&[PricePoint]>,
    reference: Option<&[PricePoint]>,
    start: NaiveDate,
    end: NaiveDate,
) -> AlignedMarket {
    let mut axis: BTreeSet<NaiveDate> = BTreeSet::new();
    for data in symbols {
        for p in &data.closes {
            if p.date >= start && p.date <= end {
                axis.insert(p.date);
            }
        }
    }
    let dates: Vec<NaiveDate> = axis.into_iter().collect();
    let index: BTreeMap<NaiveDate, usize> =
        dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();

    let mut closes = BTreeMap::new();
    let mut dividends = BTreeMap::new();

    for data in symbols {
        let mut close_row = vec![f64::NAN; dates.len()];
        for p in &data.closes {
            if let Some(&i) = index.get(&p.date) {
                close_row[i] = p.close;
            }
        }

        let mut div_row = vec![0.0; dates.len()];
        for div in &data.dividends {
            // An ex-date that is not a trading day in our axis rolls forward
            // to the next trading day so the payment is not lost.
            match index.get(&div.ex_date) {
                Some(&i) => div_row[i] += div.amount,
                None => {
                    if let Some(i) = dates.iter().position(|d| *d > div.ex_date) {
                        div_row[i] += div.amount;
                    }
                }
            }
        }

        closes.insert(data.symbol.clone(), close_row);
        dividends.insert(data.symbol.clone(), div_row);
    }

    let place_series = |points: &[PricePoint]| -> Vec<f64> {
        let mut row = vec![f64::NAN; dates.len()];
        for p in points {
            if let Some(&i) = index.get(&p.date) {
                row[i] = p.close;
            }
        }
        row
    };

    let benchmark = benchmark.map(&place_series);
    let reference = reference.map(&place_series);

    AlignedMarket {
        dates,
        closes,
        dividends,
        benchmark,
        reference,
    }
}
