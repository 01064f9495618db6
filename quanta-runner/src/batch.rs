//! Batch execution: many independent runs in parallel, merged afterwards.
//!
//! Runs share nothing but immutable inputs, so they fan out with rayon. A
//! failing run yields its own [`RunError`] in the result vector and never
//! aborts its siblings. Writing to the results table happens in [`merge`],
//! after the parallel section, on the calling thread.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use quanta_core::domain::PriceSeries;
use quanta_core::engine::BacktestConfig;

use crate::config::RunnerConfig;
use crate::param_space::ParamEntry;
use crate::results::{ExportOptions, ResultsStore, SavedRun};
use crate::runner::{run_entry, run_signal_file, RunError, RunOutput, SignalFileRun};
use crate::signal_store::StoreError;

/// Counts over a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    fn of<T>(results: &[Result<T, RunError>]) -> Self {
        let failed = results.iter().filter(|r| r.is_err()).count();
        Self {
            total: results.len(),
            succeeded: results.len() - failed,
            failed,
        }
    }
}

/// Per-run results in input order.
#[derive(Debug)]
pub struct Batch<T> {
    pub results: Vec<Result<T, RunError>>,
}

impl<T> Batch<T> {
    fn new(results: Vec<Result<T, RunError>>) -> Self {
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            tracing::warn!(error = %err, "run failed");
        }
        let batch = Self { results };
        let summary = batch.summary();
        tracing::info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "batch complete"
        );
        batch
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary::of(&self.results)
    }

    pub fn successes(&self) -> impl Iterator<Item = &T> {
        self.results.iter().filter_map(|r| r.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &RunError> {
        self.results.iter().filter_map(|r| r.as_ref().err())
    }
}

/// Run every grid entry against one price series.
pub fn run_grid(
    prices: &PriceSeries,
    entries: &[ParamEntry],
    config: &BacktestConfig,
    parallel: bool,
) -> Batch<RunOutput> {
    let results = if parallel {
        entries
            .par_iter()
            .map(|entry| run_entry(prices, entry, config))
            .collect()
    } else {
        entries
            .iter()
            .map(|entry| run_entry(prices, entry, config))
            .collect()
    };
    Batch::new(results)
}

/// Run a backtest for each signal file.
pub fn run_signal_files(
    runner: &RunnerConfig,
    config: &BacktestConfig,
    files: &[PathBuf],
    symbol: Option<&str>,
    parallel: bool,
) -> Batch<SignalFileRun> {
    let run = |path: &PathBuf| run_signal_file(runner, config, path, symbol);
    let results = if parallel {
        files.par_iter().map(run).collect()
    } else {
        files.iter().map(run).collect()
    };
    Batch::new(results)
}

/// Persist every successful run, in input order. Stops at the first write error.
pub fn merge(
    store: &ResultsStore,
    batch: &Batch<SignalFileRun>,
    options: &ExportOptions,
) -> anyhow::Result<Vec<SavedRun>> {
    batch
        .successes()
        .map(|run| store.save(&run.group, &run.output, options))
        .collect()
}

/// Signal CSVs in `dir` and its immediate sub-directories, sorted by path.
pub fn collect_signal_files(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let mut files = Vec::new();
    for sub in scan_dir(dir, &mut files)? {
        scan_dir(&sub, &mut files)?;
    }
    files.sort();
    Ok(files)
}

/// Push the CSV files of `dir` onto `files`; return its sub-directories.
fn scan_dir(dir: &Path, files: &mut Vec<PathBuf>) -> Result<Vec<PathBuf>, StoreError> {
    let mut subdirs = Vec::new();
    let entries = std::fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| StoreError::io(dir, e))?.path();
        if path.is_dir() {
            subdirs.push(path);
        } else if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        {
            files.push(path);
        }
    }
    Ok(subdirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param_space::ParamGrid;
    use chrono::NaiveDate;
    use quanta_core::domain::ParamId;
    use quanta_core::strategy::Strategy;

    fn prices() -> PriceSeries {
        let closes: Vec<f64> = (0..80).map(|i| 50.0 + 5.0 * (i as f64 * 0.2).cos()).collect();
        PriceSeries::from_closes("2330.TW", NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(), &closes)
    }

    #[test]
    fn parallel_matches_sequential() {
        let entries = ParamGrid::default_for(Strategy::SMA_CROSS)
            .unwrap()
            .expand(Strategy::SMA_CROSS)
            .unwrap();
        let config = BacktestConfig::default();
        let par = run_grid(&prices(), &entries, &config, true);
        let seq = run_grid(&prices(), &entries, &config, false);

        assert_eq!(par.summary(), seq.summary());
        for (a, b) in par.successes().zip(seq.successes()) {
            assert_eq!(a.descriptor, b.descriptor);
            assert_eq!(a.outcome, b.outcome);
            assert_eq!(a.record.total_return, b.record.total_return);
        }
    }

    #[test]
    fn failing_run_does_not_abort_siblings() {
        let mut entries = ParamGrid::new()
            .with("short_period", vec![3.0])
            .with("long_period", vec![10.0])
            .expand(Strategy::SMA_CROSS)
            .unwrap();
        entries.push(ParamEntry {
            param_id: ParamId::from_index(2),
            strategy: Strategy::Rsi {
                period: 14,
                overbought: 30.0,
                oversold: 70.0,
            },
        });

        let batch = run_grid(&prices(), &entries, &BacktestConfig::default(), true);
        assert_eq!(
            batch.summary(),
            BatchSummary {
                total: 2,
                succeeded: 1,
                failed: 1
            }
        );
        let err = batch.failures().next().unwrap();
        assert_eq!(err.run_context(), Some(("RSI", "2330.TW", "0002")));
    }

    #[test]
    fn collects_csv_one_level_deep() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("RSI_SPY");
        let deeper = sub.join("archive");
        std::fs::create_dir_all(&deeper).unwrap();
        std::fs::write(dir.path().join("SMA_CROSS_SPY_0001.csv"), "").unwrap();
        std::fs::write(sub.join("RSI_SPY_0002.csv"), "").unwrap();
        std::fs::write(sub.join("RSI_SPY_0001.csv"), "").unwrap();
        std::fs::write(sub.join("param_log_RSI_SPY.json"), "{}").unwrap();
        std::fs::write(deeper.join("RSI_SPY_0009.csv"), "").unwrap();

        let files = collect_signal_files(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["RSI_SPY_0001.csv", "RSI_SPY_0002.csv", "SMA_CROSS_SPY_0001.csv"]
        );
    }
}
