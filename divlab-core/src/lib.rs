//! divlab-core: deterministic dividend-portfolio backtest engine.
//!
//! A pure function of its explicit inputs: pre-fetched market data goes in,
//! an immutable result bundle comes out. Day-by-day simulation with DRIP,
//! qualified/ordinary dividend tax, FIFO capital-gains accounting, and
//! periodic rebalancing. No network, no persistence, no hidden state.

pub mod data;
pub mod domain;
pub mod engine;
pub mod rebalance;
pub mod tax;

pub use data::{
    align_market, AlignedMarket, CsvDirProvider, DataError, DividendPoint, FetchProgress,
    MarketDataProvider, PricePoint, SilentProgress, StdoutProgress, SymbolData, SyntheticProvider,
};
pub use domain::{
    DailyPoint, DailySeries, DividendClass, DividendRecord, Holding, HoldingSnapshot, LotBook,
    PortfolioState, RebalanceTrade, RebalancingEvent, TaxKind, TaxLot, TaxPayment,
};
pub use engine::{
    run_simulation, CancelToken, CashFlowTotals, ConfigError, SimulationError, SimulationOutput,
    SimulationParams, MAX_SYMBOLS,
};
pub use rebalance::{execute_rebalance, RebalanceFrequency, RebalanceOutcome};
pub use tax::{TaxConfig, DEFAULT_QUALIFIED_HOLDING_DAYS, SHORT_TERM_MAX_DAYS};
