//! Market-data boundary: provider trait, alignment, offline sources.

pub mod align;
pub mod csv_provider;
pub mod provider;
pub mod synthetic;

pub use align::{align_market, AlignedMarket};
pub use csv_provider::CsvDirProvider;
pub use provider::{
    DataError, DividendPoint, FetchProgress, MarketDataProvider, PricePoint, SilentProgress,
    StdoutProgress, SymbolData,
};
pub use synthetic::SyntheticProvider;
