//! Domain types: lots, holdings, portfolio state, event records, series.

pub mod events;
pub mod holding;
pub mod lot;
pub mod portfolio;
pub mod series;

pub use events::{
    DividendClass, DividendRecord, HoldingSnapshot, RebalanceTrade, RebalancingEvent, TaxKind,
    TaxPayment,
};
pub use holding::Holding;
pub use lot::{LotBook, MatchedLot, TaxLot};
pub use portfolio::PortfolioState;
pub use series::{DailyPoint, DailySeries};
