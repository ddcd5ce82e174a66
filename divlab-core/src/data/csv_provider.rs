//! CSV-directory market-data provider for offline runs.
//!
//! Layout: one `{SYMBOL}.csv` per symbol under the data directory, plus an
//! optional `benchmark.csv`. Rows are `date,close,dividend` with an ISO date,
//! a positive close, and a per-share dividend amount (0 or empty on most
//! days; nonzero marks an ex-date).

use super::provider::{DataError, DividendPoint, MarketDataProvider, PricePoint, SymbolData};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// File name used for the benchmark series.
const BENCHMARK_FILE: &str = "benchmark.csv";

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: NaiveDate,
    close: f64,
    #[serde(default)]
    dividend: Option<f64>,
}

/// Provider backed by a directory of per-symbol CSV files.
#[derive(Debug, Clone)]
pub struct CsvDirProvider {
    dir: PathBuf,
}

impl CsvDirProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn read_file(
        &self,
        path: &Path,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<SymbolData, DataError> {
        if !path.exists() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }

        let mut rdr = csv::Reader::from_path(path).map_err(|e| DataError::Malformed {
            symbol: symbol.to_string(),
            reason: e.to_string(),
        })?;

        let mut closes = Vec::new();
        let mut dividends = Vec::new();
        for row in rdr.deserialize::<CsvRow>() {
            let row = row.map_err(|e| DataError::Malformed {
                symbol: symbol.to_string(),
                reason: e.to_string(),
            })?;
            if row.date < start || row.date > end {
                continue;
            }
            if !row.close.is_finite() || row.close <= 0.0 {
                return Err(DataError::Malformed {
                    symbol: symbol.to_string(),
                    reason: format!("non-positive close on {}", row.date),
                });
            }
            closes.push(PricePoint {
                date: row.date,
                close: row.close,
            });
            if let Some(amount) = row.dividend {
                if amount > 0.0 {
                    dividends.push(DividendPoint {
                        ex_date: row.date,
                        amount,
                    });
                }
            }
        }

        closes.sort_by_key(|p| p.date);
        dividends.sort_by_key(|p| p.ex_date);

        if closes.is_empty() {
            return Err(DataError::EmptyRange {
                symbol: symbol.to_string(),
            });
        }

        Ok(SymbolData {
            symbol: symbol.to_string(),
            closes,
            dividends,
        })
    }
}

impl MarketDataProvider for CsvDirProvider {
    fn name(&self) -> &str {
        "csv-dir"
    }

    fn fetch_symbol(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<SymbolData, DataError> {
        let path = self.dir.join(format!("{symbol}.csv"));
        self.read_file(&path, symbol, start, end)
    }

    fn fetch_benchmark(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, DataError> {
        let path = self.dir.join(BENCHMARK_FILE);
        let data = self.read_file(&path, "benchmark", start, end)?;
        Ok(data.closes)
    }
}
