//! Backtest runner: wires signals, simulator, and analyzer for one run.
//!
//! Entry points:
//! - `run_single()`: pre-loaded prices and signals plus an explicit descriptor. No I/O.
//! - `run_entry()`: generates signals for one grid entry, then `run_single()`.
//! - `run_signal_file()`: the file-based path; derives the descriptor from a
//!   legacy signal file name and its parameter log.
//! - `generate_signal_files()`: sweeps a grid and writes signal files plus the
//!   parameter log.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use quanta_core::domain::{PriceSeries, RunDescriptor, SignalPoint};
use quanta_core::engine::{run_backtest, BacktestConfig, BacktestOutcome, EngineError};
use quanta_core::performance::{analyze, PerformanceError, PerformanceRecord};
use quanta_core::strategy::{generate_signals, StrategyError};

use crate::config::RunnerConfig;
use crate::data_loader::{load_prices, DateRange, LoadError};
use crate::param_log::{lookup_params, ParamLog};
use crate::param_space::{ParamEntry, ParamGrid};
use crate::signal_store::{
    parse_signal_file_name, read_signals, run_dir, signal_file_name, write_signals, StoreError,
};

/// Errors from the runner.
///
/// Per-run failures carry the strategy, symbol, and parameter id they belong to.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("{strategy} {symbol} #{param_id}: {source}")]
    Strategy {
        strategy: String,
        symbol: String,
        param_id: String,
        #[source]
        source: StrategyError,
    },

    #[error("{strategy} {symbol} #{param_id}: {source}")]
    Engine {
        strategy: String,
        symbol: String,
        param_id: String,
        #[source]
        source: EngineError,
    },

    #[error("{strategy} {symbol} #{param_id}: {source}")]
    Performance {
        strategy: String,
        symbol: String,
        param_id: String,
        #[source]
        source: PerformanceError,
    },

    #[error("grid error: {0}")]
    Grid(#[source] StrategyError),

    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("data error: {0}")]
    Data(#[from] LoadError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl RunError {
    /// `(strategy, symbol, param_id)` for per-run failures.
    pub fn run_context(&self) -> Option<(&str, &str, &str)> {
        match self {
            RunError::Strategy {
                strategy,
                symbol,
                param_id,
                ..
            }
            | RunError::Engine {
                strategy,
                symbol,
                param_id,
                ..
            }
            | RunError::Performance {
                strategy,
                symbol,
                param_id,
                ..
            } => Some((strategy, symbol, param_id)),
            _ => None,
        }
    }
}

/// Everything one run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutput {
    pub descriptor: RunDescriptor,
    pub outcome: BacktestOutcome,
    pub record: PerformanceRecord,
}

/// Simulate and analyze one run over pre-loaded inputs.
pub fn run_single(
    prices: &PriceSeries,
    signals: &[SignalPoint],
    descriptor: &RunDescriptor,
    config: &BacktestConfig,
) -> Result<RunOutput, RunError> {
    let outcome = run_backtest(prices, signals, config).map_err(|source| RunError::Engine {
        strategy: descriptor.strategy.clone(),
        symbol: descriptor.symbol.clone(),
        param_id: descriptor.param_id.to_string(),
        source,
    })?;
    let record = analyze(&outcome.nav, descriptor).map_err(|source| RunError::Performance {
        strategy: descriptor.strategy.clone(),
        symbol: descriptor.symbol.clone(),
        param_id: descriptor.param_id.to_string(),
        source,
    })?;

    tracing::info!(
        run = %descriptor.file_stem(),
        run_id = %record.run_id,
        trades = outcome.trades.len(),
        skipped_dates = outcome.skipped_dates,
        total_return = record.total_return,
        max_drawdown = record.max_drawdown,
        "run complete"
    );
    Ok(RunOutput {
        descriptor: descriptor.clone(),
        outcome,
        record,
    })
}

/// Descriptor for a grid entry on `prices`.
pub fn entry_descriptor(prices: &PriceSeries, entry: &ParamEntry) -> RunDescriptor {
    RunDescriptor::new(
        entry.strategy.name(),
        prices.symbol(),
        entry.param_id.clone(),
        entry.params(),
    )
}

/// Generate signals for one grid entry and run it.
pub fn run_entry(
    prices: &PriceSeries,
    entry: &ParamEntry,
    config: &BacktestConfig,
) -> Result<RunOutput, RunError> {
    let descriptor = entry_descriptor(prices, entry);
    let signals = generate_signals(prices, &entry.strategy).map_err(|source| RunError::Strategy {
        strategy: descriptor.strategy.clone(),
        symbol: descriptor.symbol.clone(),
        param_id: descriptor.param_id.to_string(),
        source,
    })?;
    run_single(prices, &signals, &descriptor, config)
}

/// A signal file run, with the results sub-folder it belongs to.
#[derive(Debug, Clone)]
pub struct SignalFileRun {
    pub output: RunOutput,
    /// Name of the directory holding the signal file.
    pub group: String,
}

/// Run the backtest for one signal file on disk.
///
/// `symbol` overrides the price symbol; by default the symbol parsed from the
/// file name is used.
pub fn run_signal_file(
    runner: &RunnerConfig,
    config: &BacktestConfig,
    signal_path: &Path,
    symbol: Option<&str>,
) -> Result<SignalFileRun, RunError> {
    let name = parse_signal_file_name(signal_path)?;
    let params = lookup_params(
        signal_path,
        &runner.paths.signals_dir,
        &name.strategy,
        &name.symbol,
        &name.param_id,
    )?;
    let price_symbol = symbol.unwrap_or(&name.symbol);
    let prices = load_prices(&runner.paths.data_dir, price_symbol, DateRange::default())?;
    let signals = read_signals(signal_path)?;

    let descriptor = RunDescriptor::new(name.strategy, name.symbol, name.param_id, params);
    let output = run_single(&prices, &signals, &descriptor, config)?;
    let group = signal_path
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(SignalFileRun { output, group })
}

/// Summary of a signal generation sweep.
#[derive(Debug, Clone)]
pub struct SignalSweep {
    pub dir: PathBuf,
    pub files: Vec<PathBuf>,
    pub param_log: PathBuf,
}

/// Load prices, expand `grid`, write one signal file per valid entry, then the
/// parameter log.
pub fn generate_signal_files(
    runner: &RunnerConfig,
    symbol: &str,
    strategy: &str,
    grid: &ParamGrid,
    range: DateRange,
) -> Result<SignalSweep, RunError> {
    let prices = load_prices(&runner.paths.data_dir, symbol, range)?;
    let entries = grid.expand(strategy).map_err(RunError::Grid)?;
    let dir = run_dir(&runner.paths.signals_dir, strategy, symbol);

    let mut files = Vec::with_capacity(entries.len());
    for entry in &entries {
        let descriptor = entry_descriptor(&prices, entry);
        let signals =
            generate_signals(&prices, &entry.strategy).map_err(|source| RunError::Strategy {
                strategy: descriptor.strategy.clone(),
                symbol: descriptor.symbol.clone(),
                param_id: descriptor.param_id.to_string(),
                source,
            })?;
        let path = dir.join(signal_file_name(&descriptor));
        write_signals(&path, &signals)?;
        tracing::debug!(path = %path.display(), "wrote signal file");
        files.push(path);
    }

    let param_log = ParamLog::from_entries(symbol, &entries).save(&dir, strategy, symbol)?;
    tracing::info!(strategy, symbol, files = files.len(), dir = %dir.display(), "generated signals");
    Ok(SignalSweep {
        dir,
        files,
        param_log,
    })
}
