pub mod backtest;
pub mod cointegration;
pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod scanner;
pub mod signal;
pub mod spread;
pub mod stats;
pub mod types;

pub use error::PairsError;
pub use types::*;

/// Standard result type for all pairs-study computations
pub type PairsResult<T> = Result<T, PairsError>;
