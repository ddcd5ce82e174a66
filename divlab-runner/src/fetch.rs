//! Concurrent market-data acquisition with a completion barrier.
//!
//! Per-symbol fetches share no mutable state, so they fan out across the
//! rayon pool; the simulation must not begin until every fetch has completed
//! or definitively failed. A failed symbol is dropped with a warning as long
//! as at least one survives; losing every symbol is fatal. Benchmark and
//! reference failures only cost their comparison tracks.

use chrono::NaiveDate;
use divlab_core::{
    align_market, AlignedMarket, CancelToken, DataError, FetchProgress, MarketDataProvider,
    PricePoint, SymbolData,
};
use rayon::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("all {count} symbols failed to fetch; first error: {first}")]
    AllSymbolsFailed { count: usize, first: String },

    #[error("fetch cancelled")]
    Cancelled,
}

/// A symbol dropped from the run, with the provider's reason.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExcludedSymbol {
    pub symbol: String,
    pub reason: String,
}

/// Everything gathered at the fetch barrier.
#[derive(Debug)]
pub struct FetchedMarket {
    pub market: AlignedMarket,
    /// Symbols that survived, in the original request order.
    pub included: Vec<String>,
    pub excluded: Vec<ExcludedSymbol>,
    pub warnings: Vec<String>,
    /// Content hash of the fetched dataset, for reproducibility checks.
    pub dataset_hash: String,
}

/// Fetch all series for a run and align them on one date axis.
pub fn fetch_market(
    provider: &dyn MarketDataProvider,
    symbols: &[String],
    reference_symbol: Option<&str>,
    want_benchmark: bool,
    start: NaiveDate,
    end: NaiveDate,
    progress: &dyn FetchProgress,
    cancel: &CancelToken,
) -> Result<FetchedMarket, FetchError> {
    let total = symbols.len();
    let results: Vec<(String, Result<SymbolData, DataError>)> = symbols
        .par_iter()
        .enumerate()
        .map(|(i, symbol)| {
            if cancel.is_cancelled() {
                return (
                    symbol.clone(),
                    Err(DataError::Other("cancelled".to_string())),
                );
            }
            progress.on_fetch_start(symbol, i, total);
            let result = provider.fetch_symbol(symbol, start, end);
            progress.on_fetch_complete(symbol, result.as_ref().map(|_| ()));
            (symbol.clone(), result)
        })
        .collect();

    if cancel.is_cancelled() {
        return Err(FetchError::Cancelled);
    }

    let mut fetched = Vec::new();
    let mut included = Vec::new();
    let mut excluded = Vec::new();
    let mut warnings = Vec::new();
    for (symbol, result) in results {
        match result {
            Ok(data) if !data.is_empty() => {
                included.push(symbol);
                fetched.push(data);
            }
            Ok(_) => {
                warnings.push(format!("excluding '{symbol}': no data in range"));
                excluded.push(ExcludedSymbol {
                    symbol,
                    reason: "no data in range".to_string(),
                });
            }
            Err(e) => {
                warnings.push(format!("excluding '{symbol}': {e}"));
                excluded.push(ExcludedSymbol {
                    symbol,
                    reason: e.to_string(),
                });
            }
        }
    }
    progress.on_fetch_barrier(included.len(), excluded.len());

    if included.is_empty() {
        return Err(FetchError::AllSymbolsFailed {
            count: total,
            first: excluded
                .first()
                .map(|e| e.reason.clone())
                .unwrap_or_else(|| "no symbols requested".to_string()),
        });
    }

    let benchmark: Option<Vec<PricePoint>> = if want_benchmark {
        match provider.fetch_benchmark(start, end) {
            Ok(points) if !points.is_empty() => Some(points),
            Ok(_) => {
                warnings.push("benchmark series empty; comparison disabled".to_string());
                None
            }
            Err(e) => {
                warnings.push(format!("benchmark fetch failed: {e}; comparison disabled"));
                None
            }
        }
    } else {
        None
    };

    let reference: Option<Vec<PricePoint>> = match reference_symbol {
        Some(symbol) => match provider.fetch_symbol(symbol, start, end) {
            Ok(data) if !data.is_empty() => Some(data.closes),
            Ok(_) => {
                warnings.push(format!("reference '{symbol}' empty; track disabled"));
                None
            }
            Err(e) => {
                warnings.push(format!("reference '{symbol}' fetch failed: {e}; track disabled"));
                None
            }
        },
        None => None,
    };

    let dataset_hash = hash_dataset(&fetched, benchmark.as_deref(), reference.as_deref());
    let market = align_market(
        &fetched,
        benchmark.as_deref(),
        reference.as_deref(),
        start,
        end,
    );

    Ok(FetchedMarket {
        market,
        included,
        excluded,
        warnings,
        dataset_hash,
    })
}

/// blake3 over every fetched observation, in a stable order.
fn hash_dataset(
    symbols: &[SymbolData],
    benchmark: Option<&[PricePoint]>,
    reference: Option<&[PricePoint]>,
) -> String {
    let mut hasher = blake3::Hasher::new();
    let mut feed = |tag: &str, points: &[PricePoint]| {
        hasher.update(tag.as_bytes());
        for p in points {
            hasher.update(p.date.to_string().as_bytes());
            hasher.update(&p.close.to_le_bytes());
        }
    };
    for data in symbols {
        feed(&data.symbol, &data.closes);
    }
    if let Some(points) = benchmark {
        feed("__benchmark__", points);
    }
    if let Some(points) = reference {
        feed("__reference__", points);
    }
    for data in symbols {
        hasher.update(data.symbol.as_bytes());
        for div in &data.dividends {
            hasher.update(div.ex_date.to_string().as_bytes());
            hasher.update(&div.amount.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}
