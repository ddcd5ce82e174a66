//! DivLab Runner — backtest orchestration, metrics, and export.
//!
//! This crate builds on `divlab-core` to provide:
//! - TOML run configuration with content-addressed run ids
//! - Concurrent market-data fetch with a completion barrier
//! - Single-backtest runner producing an immutable result bundle
//! - Risk and performance metrics over the daily value series
//! - JSON / CSV / Markdown artifact export

pub mod config;
pub mod export;
pub mod fetch;
pub mod metrics;
pub mod runner;

pub use config::{ConfigFileError, RunConfig, RunId};
pub use export::{
    export_dividends_csv, export_holdings_csv, export_json, export_metrics_csv,
    export_rebalancing_csv, export_series_csv, export_tax_csv, generate_report, import_json,
    load_artifacts, save_artifacts,
};
pub use fetch::{fetch_market, ExcludedSymbol, FetchError, FetchedMarket};
pub use metrics::Metrics;
pub use runner::{run_backtest, BacktestResult, RunError, SCHEMA_VERSION};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn run_config_is_send_sync() {
        assert_send::<RunConfig>();
        assert_sync::<RunConfig>();
    }

    #[test]
    fn metrics_is_send_sync() {
        assert_send::<Metrics>();
        assert_sync::<Metrics>();
    }

    #[test]
    fn backtest_result_is_send_sync() {
        assert_send::<BacktestResult>();
        assert_sync::<BacktestResult>();
    }

    #[test]
    fn excluded_symbol_is_send_sync() {
        assert_send::<ExcludedSymbol>();
        assert_sync::<ExcludedSymbol>();
    }
}
