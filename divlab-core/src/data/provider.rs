//! Market-data provider trait and structured error types.
//!
//! The MarketDataProvider trait abstracts over data sources (CSV directory,
//! deterministic synthetic series, in-memory fixtures for tests) so the
//! engine never fetches anything itself — it consumes pre-fetched series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One daily close observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// One dividend event: per-share cash amount on the ex-date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DividendPoint {
    pub ex_date: NaiveDate,
    pub amount: f64,
}

/// Everything fetched for a single symbol: date-indexed closes plus the
/// dividend calendar for the same range.
#[derive(Debug, Clone, Default)]
pub struct SymbolData {
    pub symbol: String,
    pub closes: Vec<PricePoint>,
    pub dividends: Vec<DividendPoint>,
}

impl SymbolData {
    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }
}

/// Structured errors from data providers. A per-symbol failure is
/// recoverable at the run level: the symbol is dropped with a warning as
/// long as at least one symbol survives.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("no price data for '{symbol}' in the requested range")]
    EmptyRange { symbol: String },

    #[error("malformed data for '{symbol}': {reason}")]
    Malformed { symbol: String, reason: String },

    #[error("data source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("data error: {0}")]
    Other(String),
}

/// Trait for market-data sources.
///
/// Implementations may fetch per-symbol series however they like; callers
/// fan out over symbols concurrently, so implementations must be `Sync`.
pub trait MarketDataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Daily close series and dividend calendar for `symbol` over the range.
    fn fetch_symbol(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<SymbolData, DataError>;

    /// Benchmark close series for the same range (no symbol argument — the
    /// provider decides what its benchmark is).
    fn fetch_benchmark(&self, start: NaiveDate, end: NaiveDate)
        -> Result<Vec<PricePoint>, DataError>;
}

/// Progress callback for the fetch-then-simulate sequence.
pub trait FetchProgress: Send + Sync {
    /// Called when starting to fetch a symbol.
    fn on_fetch_start(&self, symbol: &str, index: usize, total: usize);

    /// Called when a symbol fetch completes.
    fn on_fetch_complete(&self, symbol: &str, result: Result<(), &DataError>);

    /// Called once all fetches have completed or definitively failed.
    fn on_fetch_barrier(&self, succeeded: usize, failed: usize);

    /// Coarse simulation progress: days stepped out of the total.
    fn on_simulation_progress(&self, days_done: usize, days_total: usize);
}

/// Progress reporter that prints to stdout.
pub struct StdoutProgress;

impl FetchProgress for StdoutProgress {
    fn on_fetch_start(&self, symbol: &str, index: usize, total: usize) {
        println!("[{}/{}] Fetching {symbol}...", index + 1, total);
    }

    fn on_fetch_complete(&self, symbol: &str, result: Result<(), &DataError>) {
        match result {
            Ok(()) => println!("  OK: {symbol}"),
            Err(e) => println!("  FAIL: {symbol}: {e}"),
        }
    }

    fn on_fetch_barrier(&self, succeeded: usize, failed: usize) {
        println!("Fetch complete: {succeeded} succeeded, {failed} failed");
    }

    fn on_simulation_progress(&self, days_done: usize, days_total: usize) {
        if days_total > 0 && days_done % 252 == 0 {
            println!("  Simulated {days_done}/{days_total} trading days");
        }
    }
}

/// No-op progress reporter for embedding and tests.
pub struct SilentProgress;

impl FetchProgress for SilentProgress {
    fn on_fetch_start(&self, _symbol: &str, _index: usize, _total: usize) {}
    fn on_fetch_complete(&self, _symbol: &str, _result: Result<(), &DataError>) {}
    fn on_fetch_barrier(&self, _succeeded: usize, _failed: usize) {}
    fn on_simulation_progress(&self, _days_done: usize, _days_total: usize) {}
}
