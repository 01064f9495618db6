//! Backtesting engine: edge-triggered long-only simulation over a signal series.
//!
//! The engine consumes a sorted price series and a sorted signal series and
//! walks them bar by bar:
//!
//! 1. Look up the close for the signal date (skip the date if absent)
//! 2. Compare the signal to the last observed one; act only on changes
//! 3. Buy (sized by [`SizingPolicy`]) or liquidate, with fee + slippage
//! 4. Mark to market and record the NAV point

pub mod config;
pub mod simulator;
pub mod sizing;
pub mod state;

pub use config::{BacktestConfig, ExecutionTiming};
pub use simulator::{run_backtest, BacktestOutcome};
pub use sizing::{SizingError, SizingPolicy};
pub use state::{PortfolioState, SkipReason, StepOutcome};

use thiserror::Error;

/// Errors that stop a simulation before it starts.
///
/// Economic no-ops (insufficient cash, sell while flat) are not errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid backtest configuration: {0}")]
    InvalidConfig(String),

    #[error("price series is not in strictly increasing date order")]
    UnsortedPrices,

    #[error("signal series is not in strictly increasing date order (at index {index})")]
    UnsortedSignals { index: usize },
}

impl From<SizingError> for EngineError {
    fn from(e: SizingError) -> Self {
        EngineError::InvalidConfig(e.to_string())
    }
}
