//! Results table persistence.
//!
//! Each run is saved under `{results_dir}/{group}/`, where `group` is the
//! directory its signal file came from:
//! - `performance_{STRATEGY}_{SYMBOL}_{param_id}.csv`: the single performance row
//! - `nav_{STRATEGY}_{SYMBOL}_{param_id}.parquet` (or `.csv`): the NAV series
//! - `trades_{STRATEGY}_{SYMBOL}_{param_id}.csv`: the trade log
//!
//! The row is also appended to `performance_master.csv` in the group folder and
//! at the results root. Appends happen on one thread only (see `batch`).

use std::fmt;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use quanta_core::domain::{NavPoint, TradeRecord};
use quanta_core::performance::PerformanceRecord;

use crate::runner::RunOutput;

pub const MASTER_FILE: &str = "performance_master.csv";

/// One flat row of the results table. `params` holds the parameter set as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRow {
    pub total_return: f64,
    pub max_drawdown: f64,
    pub run_id: String,
    pub strategy: String,
    pub symbol: String,
    pub param_id: String,
    pub params: String,
}

impl From<&PerformanceRecord> for PerformanceRow {
    fn from(record: &PerformanceRecord) -> Self {
        Self {
            total_return: record.total_return,
            max_drawdown: record.max_drawdown,
            run_id: record.run_id.to_string(),
            strategy: record.strategy.clone(),
            symbol: record.symbol.clone(),
            param_id: record.param_id.to_string(),
            params: record.params.to_json(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavFormat {
    Csv,
    #[default]
    Parquet,
}

impl NavFormat {
    pub fn extension(self) -> &'static str {
        match self {
            NavFormat::Csv => "csv",
            NavFormat::Parquet => "parquet",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("unknown NAV format '{0}' (expected csv or parquet)")]
pub struct UnknownNavFormat(pub String);

impl FromStr for NavFormat {
    type Err = UnknownNavFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(NavFormat::Csv),
            "parquet" => Ok(NavFormat::Parquet),
            other => Err(UnknownNavFormat(other.to_string())),
        }
    }
}

impl fmt::Display for NavFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Which per-run artifacts to write. The master tables are always updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub performance: bool,
    pub nav: Option<NavFormat>,
    pub trades: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            performance: true,
            nav: Some(NavFormat::Parquet),
            trades: true,
        }
    }
}

/// Paths written for one saved run.
#[derive(Debug, Clone, Default)]
pub struct SavedRun {
    pub performance: Option<PathBuf>,
    pub nav: Option<PathBuf>,
    pub trades: Option<PathBuf>,
    pub masters: Vec<PathBuf>,
}

/// The results directory tree.
#[derive(Debug, Clone)]
pub struct ResultsStore {
    root: PathBuf,
}

impl ResultsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The root `performance_master.csv`.
    pub fn master_path(&self) -> PathBuf {
        self.root.join(MASTER_FILE)
    }

    /// Write the artifacts of one run into `group` and append its row to both
    /// master tables.
    pub fn save(&self, group: &str, output: &RunOutput, options: &ExportOptions) -> Result<SavedRun> {
        let dir = if group.is_empty() {
            self.root.clone()
        } else {
            self.root.join(group)
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create results directory {}", dir.display()))?;

        let stem = output.descriptor.file_stem();
        let row = PerformanceRow::from(&output.record);
        let mut saved = SavedRun::default();

        if options.performance {
            let path = dir.join(format!("performance_{stem}.csv"));
            let text = export_performance_csv(std::slice::from_ref(&row))?;
            fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))?;
            saved.performance = Some(path);
        }
        if let Some(format) = options.nav {
            let path = dir.join(format!("nav_{stem}.{}", format.extension()));
            match format {
                NavFormat::Csv => {
                    let text = export_nav_csv(&output.outcome.nav)?;
                    fs::write(&path, text)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                }
                NavFormat::Parquet => write_nav_parquet(&path, &output.outcome.nav)?,
            }
            saved.nav = Some(path);
        }
        if options.trades {
            let path = dir.join(format!("trades_{stem}.csv"));
            let text = export_trades_csv(&output.outcome.trades)?;
            fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))?;
            saved.trades = Some(path);
        }

        let group_master = dir.join(MASTER_FILE);
        append_rows(&group_master, std::slice::from_ref(&row))?;
        saved.masters.push(group_master.clone());
        let root_master = self.master_path();
        if root_master != group_master {
            append_rows(&root_master, std::slice::from_ref(&row))?;
            saved.masters.push(root_master);
        }

        tracing::info!(run = %stem, dir = %dir.display(), "saved results");
        Ok(saved)
    }
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Performance rows as CSV with a header.
pub fn export_performance_csv(rows: &[PerformanceRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for row in rows {
        wtr.serialize(row)?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// NAV series as `date,nav`.
pub fn export_nav_csv(nav: &[NavPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "nav"])?;
    for point in nav {
        wtr.write_record([point.date.to_string(), format!("{:.6}", point.nav)])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Trade log as `date,action,price,quantity,cash_after`.
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "action", "price", "quantity", "cash_after"])?;
    for t in trades {
        wtr.write_record([
            t.date.to_string(),
            t.action.as_str().to_string(),
            format!("{:.6}", t.price),
            t.quantity.to_string(),
            format!("{:.2}", t.cash_after),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Master table ───────────────────────────────────────────────────

/// Append rows to a results table, writing the header only when the file is new.
pub fn append_rows(path: &Path, rows: &[PerformanceRow]) -> Result<()> {
    let is_new = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(is_new)
        .from_writer(file);
    for row in rows {
        wtr.serialize(row)
            .with_context(|| format!("failed to append to {}", path.display()))?;
    }
    wtr.flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(())
}

/// Read a results table written by [`append_rows`].
pub fn read_master(path: &Path) -> Result<Vec<PerformanceRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open results table {}", path.display()))?;
    let mut rows = Vec::new();
    for (i, row) in reader.deserialize().enumerate() {
        let row: PerformanceRow =
            row.with_context(|| format!("{}: bad row {}", path.display(), i + 1))?;
        rows.push(row);
    }
    Ok(rows)
}

// ─── NAV Parquet ────────────────────────────────────────────────────

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

/// Write a NAV series as Parquet with a Date `date` and Float64 `nav` column.
pub fn write_nav_parquet(path: &Path, nav: &[NavPoint]) -> Result<()> {
    let days: Vec<i32> = nav.iter().map(|p| (p.date - epoch()).num_days() as i32).collect();
    let mut df = DataFrame::new(vec![
        Column::new("date".into(), days).cast(&DataType::Date)?,
        Column::new("nav".into(), nav.iter().map(|p| p.nav).collect::<Vec<f64>>()),
    ])?;
    let file =
        fs::File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    ParquetWriter::new(file)
        .finish(&mut df)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

pub fn read_nav_parquet(path: &Path) -> Result<Vec<NavPoint>> {
    let file = fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let df = ParquetReader::new(file)
        .finish()
        .with_context(|| format!("failed to read {}", path.display()))?;
    let dates = df.column("date")?.date()?;
    let values = df.column("nav")?.f64()?;

    let mut nav = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let (Some(days), Some(value)) = (dates.get(i), values.get(i)) else {
            bail!("{}: null value in row {}", path.display(), i + 1);
        };
        nav.push(NavPoint {
            date: epoch() + chrono::Duration::days(days as i64),
            nav: value,
        });
    }
    Ok(nav)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quanta_core::domain::{ParamId, ParameterSet, PriceSeries, RunDescriptor, TradeAction};
    use quanta_core::engine::BacktestConfig;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn output() -> RunOutput {
        let prices = PriceSeries::from_closes("SPY", d(1), &[100.0, 101.0, 99.0, 103.0]);
        let signals = vec![
            quanta_core::domain::SignalPoint::new(d(1), quanta_core::domain::Signal::Buy),
            quanta_core::domain::SignalPoint::new(d(3), quanta_core::domain::Signal::Sell),
        ];
        let descriptor = RunDescriptor::new(
            "SMA_CROSS",
            "SPY",
            ParamId::from_index(2),
            ParameterSet::new().with("short_period", 5.0),
        );
        crate::runner::run_single(&prices, &signals, &descriptor, &BacktestConfig::default())
            .unwrap()
    }

    #[test]
    fn row_flattens_params_to_json() {
        let row = PerformanceRow::from(&output().record);
        assert_eq!(row.param_id, "0002");
        assert_eq!(row.params, r#"{"short_period":5.0}"#);
    }

    #[test]
    fn performance_csv_column_order() {
        let row = PerformanceRow::from(&output().record);
        let text = export_performance_csv(&[row]).unwrap();
        assert_eq!(
            text.lines().next().unwrap(),
            "total_return,max_drawdown,run_id,strategy,symbol,param_id,params"
        );
    }

    #[test]
    fn save_writes_artifacts_and_both_masters() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultsStore::new(dir.path());
        let out = output();

        let saved = store.save("SMA_CROSS_SPY", &out, &ExportOptions::default()).unwrap();
        store.save("SMA_CROSS_SPY", &out, &ExportOptions::default()).unwrap();

        let group = dir.path().join("SMA_CROSS_SPY");
        assert_eq!(
            saved.performance.unwrap(),
            group.join("performance_SMA_CROSS_SPY_0002.csv")
        );
        assert_eq!(read_nav_parquet(&saved.nav.unwrap()).unwrap(), out.outcome.nav);
        assert_eq!(read_master(&group.join(MASTER_FILE)).unwrap().len(), 2);
        let root_rows = read_master(&store.master_path()).unwrap();
        assert_eq!(root_rows.len(), 2);
        assert_eq!(root_rows[0], PerformanceRow::from(&out.record));

        let master_text = std::fs::read_to_string(store.master_path()).unwrap();
        assert_eq!(master_text.matches("total_return").count(), 1);
    }

    #[test]
    fn nav_csv_option() {
        let dir = tempfile::tempdir().unwrap();
        let options = ExportOptions {
            performance: false,
            nav: Some(NavFormat::Csv),
            trades: false,
        };
        let saved = ResultsStore::new(dir.path())
            .save("", &output(), &options)
            .unwrap();
        assert!(saved.performance.is_none());
        let text = std::fs::read_to_string(saved.nav.unwrap()).unwrap();
        assert!(text.starts_with("date,nav\n2024-03-01,"));
        // group "" writes into the root; the row lands only once
        assert_eq!(saved.masters.len(), 1);
    }

    #[test]
    fn trades_csv_lists_actions() {
        let text = export_trades_csv(&output().outcome.trades).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "date,action,price,quantity,cash_after");
        assert!(lines[1].starts_with("2024-03-01,buy,100.000000,100,"));
        assert!(lines[2].starts_with("2024-03-03,sell,"));
        assert_eq!(TradeAction::Sell.as_str(), "sell");
    }

    #[test]
    fn nav_format_parse() {
        assert_eq!("CSV".parse::<NavFormat>().unwrap(), NavFormat::Csv);
        assert_eq!(
            "xlsx".parse::<NavFormat>(),
            Err(UnknownNavFormat("xlsx".into()))
        );
    }
}
