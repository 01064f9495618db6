//! Signal files: `date,signal` CSVs named `<STRATEGY>_<SYMBOL>_<param_id>.csv`.
//!
//! Signal files for one strategy/symbol pair live together in
//! `{signals_dir}/{STRATEGY}_{SYMBOL}/`, next to their parameter log. The
//! directory name is also used as the results sub-folder for their runs.

use crate::data_loader::parse_date;
use quanta_core::domain::{InvalidSignal, ParamId, RunDescriptor, Signal, SignalPoint};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Symbol recorded when a legacy file name has fewer than three parts.
pub const UNKNOWN_SYMBOL: &str = "UNKNOWN";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("json error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path}, row {row}: {source}")]
    InvalidSignal {
        path: PathBuf,
        row: usize,
        #[source]
        source: InvalidSignal,
    },

    #[error("{path}, row {row}: {reason}")]
    BadRow {
        path: PathBuf,
        row: usize,
        reason: String,
    },

    #[error("{path}: missing column '{column}'")]
    MissingColumn { path: PathBuf, column: String },

    #[error("cannot derive run identity from file name '{0}'")]
    BadFileName(String),
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn csv(path: &Path, source: csv::Error) -> Self {
        StoreError::Csv {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn json(path: &Path, source: serde_json::Error) -> Self {
        StoreError::Json {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// `{signals_dir}/{STRATEGY}_{SYMBOL}`
pub fn run_dir(signals_dir: &Path, strategy: &str, symbol: &str) -> PathBuf {
    signals_dir.join(format!("{strategy}_{symbol}"))
}

/// `<STRATEGY>_<SYMBOL>_<param_id>.csv`
pub fn signal_file_name(descriptor: &RunDescriptor) -> String {
    format!("{}.csv", descriptor.file_stem())
}

/// Identity recovered from a legacy signal file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalFileName {
    pub strategy: String,
    pub symbol: String,
    pub param_id: ParamId,
}

/// Parse `<STRATEGY...>_<SYMBOL>_<ID>[.csv]`.
///
/// The strategy may itself contain underscores; the last two parts are the
/// symbol and id. The id is zero-padded to four digits. Names with fewer
/// than three parts map to `(first part, UNKNOWN, 0001)`.
pub fn parse_signal_file_name(path: &Path) -> Result<SignalFileName, StoreError> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| StoreError::BadFileName(path.display().to_string()))?;
    let parts: Vec<&str> = stem.split('_').collect();

    if parts.len() < 3 {
        return Ok(SignalFileName {
            strategy: parts[0].to_string(),
            symbol: UNKNOWN_SYMBOL.to_string(),
            param_id: ParamId::from_index(1),
        });
    }

    let n = parts.len();
    let param_id =
        ParamId::parse(parts[n - 1]).ok_or_else(|| StoreError::BadFileName(stem.to_string()))?;
    Ok(SignalFileName {
        strategy: parts[..n - 2].join("_"),
        symbol: parts[n - 2].to_string(),
        param_id,
    })
}

pub fn write_signals(path: &Path, signals: &[SignalPoint]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    let mut wtr = csv::Writer::from_path(path).map_err(|e| StoreError::csv(path, e))?;
    wtr.write_record(["date", "signal"])
        .map_err(|e| StoreError::csv(path, e))?;
    for point in signals {
        wtr.write_record([point.date.to_string(), point.signal.as_i8().to_string()])
            .map_err(|e| StoreError::csv(path, e))?;
    }
    wtr.flush().map_err(|e| StoreError::io(path, e))?;
    Ok(())
}

/// Read a `date,signal` CSV. Integral floats such as `1.0` are accepted; any
/// value outside `{-1, 0, 1}` is an error.
pub fn read_signals(path: &Path) -> Result<Vec<SignalPoint>, StoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| StoreError::csv(path, e))?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| StoreError::csv(path, e))?
        .iter()
        .map(|h| h.to_ascii_lowercase())
        .collect();

    let date_col = headers
        .iter()
        .position(|h| h == "date")
        .or_else(|| headers.first().filter(|h| h.is_empty()).map(|_| 0))
        .ok_or_else(|| StoreError::MissingColumn {
            path: path.to_path_buf(),
            column: "date".into(),
        })?;
    let signal_col = headers
        .iter()
        .position(|h| h == "signal")
        .ok_or_else(|| StoreError::MissingColumn {
            path: path.to_path_buf(),
            column: "signal".into(),
        })?;

    let mut points = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let row = i + 1;
        let record = record.map_err(|e| StoreError::csv(path, e))?;
        let bad = |reason: String| StoreError::BadRow {
            path: path.to_path_buf(),
            row,
            reason,
        };

        let date_cell = record.get(date_col).unwrap_or_default();
        let date = parse_date(date_cell).ok_or_else(|| bad(format!("bad date '{date_cell}'")))?;
        let cell = record.get(signal_col).unwrap_or_default();
        let value = parse_signal_value(cell).ok_or_else(|| bad(format!("bad signal '{cell}'")))?;
        let signal = Signal::from_i64(value).map_err(|source| StoreError::InvalidSignal {
            path: path.to_path_buf(),
            row,
            source,
        })?;
        points.push(SignalPoint::new(date, signal));
    }
    Ok(points)
}

fn parse_signal_value(cell: &str) -> Option<i64> {
    if let Ok(v) = cell.parse::<i64>() {
        return Some(v);
    }
    let v = cell.parse::<f64>().ok()?;
    (v.is_finite() && v.fract() == 0.0).then_some(v as i64)
}
