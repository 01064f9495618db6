//! Quanta Core: signal engine, backtest simulator, and performance analysis.
//!
//! This crate is pure computation with no file I/O:
//! - Domain types (price bars, signals, trades, NAV points, run identity)
//! - Rolling indicators (SMA, RSI-style oscillator)
//! - Strategies that turn a price series into a signal series
//! - Edge-triggered long-only backtest simulator
//! - Performance metrics over a NAV series

pub mod domain;
pub mod engine;
pub mod indicators;
pub mod performance;
pub mod strategy;

pub use engine::{run_backtest, BacktestConfig, BacktestOutcome, EngineError};
pub use performance::{analyze, PerformanceError, PerformanceRecord, RunId};
pub use strategy::{generate_signals, Strategy, StrategyError};
