//! The day-stepping simulation engine and its inputs.

pub mod params;
pub mod schedule;
pub mod sim;

pub use params::{ConfigError, SimulationParams, MAX_SYMBOLS, MAX_TAX_RATE, WEIGHT_TOLERANCE};
pub use sim::{run_simulation, CancelToken, CashFlowTotals, SimulationError, SimulationOutput};
