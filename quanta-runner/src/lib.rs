//! Quanta Runner: file interchange and orchestration around `quanta-core`.
//!
//! This crate provides:
//! - TOML runner configuration
//! - Price loading from local CSV or Parquet files
//! - Parameter grids with fixed-width `param_id` numbering
//! - Signal files and parameter logs
//! - Single runs and parallel batches
//! - The results table (`performance_master.csv`) and per-run artifacts
//! - Ranked, filtered reports over the results table

pub mod batch;
pub mod config;
pub mod data_loader;
pub mod param_log;
pub mod param_space;
pub mod report;
pub mod results;
pub mod runner;
pub mod signal_store;

pub use batch::{collect_signal_files, merge, run_grid, run_signal_files, Batch, BatchSummary};
pub use config::{ConfigError, PathsConfig, RunnerConfig};
pub use data_loader::{load_prices, DateRange, LoadError};
pub use param_log::{lookup_params, ParamLog};
pub use param_space::{GridParseError, ParamEntry, ParamGrid};
pub use report::{generate, Condition, ExportFormat, Metric, ReportError, ReportRequest, Selection};
pub use results::{ExportOptions, NavFormat, PerformanceRow, ResultsStore, UnknownNavFormat};
pub use runner::{
    generate_signal_files, run_entry, run_signal_file, run_single, RunError, RunOutput,
    SignalFileRun,
};
pub use signal_store::{read_signals, write_signals, StoreError};
