//! Price series loading from local CSV or Parquet files.
//!
//! Lookup order for a symbol under `data_dir`:
//! 1. `{SYMBOL}.csv`
//! 2. `{SYMBOL}.parquet`
//!
//! Both formats carry a `date` column and at least `close`; `open`, `high`,
//! `low` and `volume` are optional. Rows must already be in ascending date
//! order. Unsorted files are rejected, never re-sorted.

use chrono::NaiveDate;
use polars::prelude::*;
use quanta_core::domain::{PriceBar, PriceSeries};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no price file for '{symbol}' in {dir} (looked for .csv and .parquet)")]
    NotFound { symbol: String, dir: PathBuf },

    #[error("failed to read {path}: {source}")]
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

    #[error("parquet error in {path}: {reason}")]
    Parquet { path: PathBuf, reason: String },

    #[error("{path}: missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: String },

    #[error("{path}, row {row}: {reason}")]
    BadRow {
        path: PathBuf,
        row: usize,
        reason: String,
    },

    #[error("price data for '{symbol}' is not in strictly increasing date order (row {row})")]
    Unsorted { symbol: String, row: usize },

    #[error("no price rows for '{symbol}' in the requested date range")]
    Empty { symbol: String },
}

/// Inclusive date window; either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }
}

/// Resolve and load the price file for `symbol`, filtered to `range`.
pub fn load_prices(data_dir: &Path, symbol: &str, range: DateRange) -> Result<PriceSeries, LoadError> {
    let csv_path = data_dir.join(format!("{symbol}.csv"));
    let parquet_path = data_dir.join(format!("{symbol}.parquet"));

    let series = if csv_path.exists() {
        read_price_csv(&csv_path, symbol)?
    } else if parquet_path.exists() {
        read_price_parquet(&parquet_path, symbol)?
    } else {
        return Err(LoadError::NotFound {
            symbol: symbol.to_string(),
            dir: data_dir.to_path_buf(),
        });
    };

    let filtered = series.between(range.start, range.end);
    if filtered.is_empty() {
        return Err(LoadError::Empty {
            symbol: symbol.to_string(),
        });
    }
    tracing::info!(
        symbol,
        bars = filtered.len(),
        first = %filtered.bars()[0].date,
        "loaded prices"
    );
    Ok(filtered)
}

/// Parse a date cell. Accepts `YYYY-MM-DD`, optionally followed by a time part.
pub(crate) fn parse_date(cell: &str) -> Option<NaiveDate> {
    let cell = cell.trim();
    let day = cell.get(..10).unwrap_or(cell);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Read a price CSV. Header names are matched case-insensitively; an unnamed
/// first column is taken as the date index.
pub fn read_price_csv(path: &Path, symbol: &str) -> Result<PriceSeries, LoadError> {
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.to_ascii_lowercase())
        .collect();
    let find = |name: &str| headers.iter().position(|h| h == name);

    let date_col = find("date")
        .or_else(|| headers.first().filter(|h| h.is_empty()).map(|_| 0))
        .ok_or_else(|| LoadError::MissingColumn {
            path: path.to_path_buf(),
            column: "date".into(),
        })?;
    let close_col = find("close").ok_or_else(|| LoadError::MissingColumn {
        path: path.to_path_buf(),
        column: "close".into(),
    })?;
    let (open_col, high_col, low_col, volume_col) =
        (find("open"), find("high"), find("low"), find("volume"));

    let mut bars = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let row = i + 1;
        let record = record.map_err(csv_err)?;
        let bad = |reason: String| LoadError::BadRow {
            path: path.to_path_buf(),
            row,
            reason,
        };

        let date_cell = record.get(date_col).unwrap_or_default();
        let date = parse_date(date_cell).ok_or_else(|| bad(format!("bad date '{date_cell}'")))?;
        let price = |col: Option<usize>| -> Result<Option<f64>, LoadError> {
            match col.and_then(|c| record.get(c)) {
                None => Ok(None),
                // blank cells are missing data, not errors
                Some("") => Ok(Some(f64::NAN)),
                Some(cell) => cell
                    .parse::<f64>()
                    .map(Some)
                    .map_err(|_| bad(format!("bad number '{cell}'"))),
            }
        };

        let close = price(Some(close_col))?.unwrap_or(f64::NAN);
        let volume = match volume_col.and_then(|c| record.get(c)) {
            None | Some("") => 0,
            Some(cell) => cell
                .parse::<f64>()
                .map(|v| v.max(0.0) as u64)
                .map_err(|_| bad(format!("bad volume '{cell}'")))?,
        };
        bars.push(PriceBar {
            date,
            open: price(open_col)?.unwrap_or(close),
            high: price(high_col)?.unwrap_or(close),
            low: price(low_col)?.unwrap_or(close),
            close,
            volume,
        });
    }

    checked_series(symbol, bars)
}

/// Read a price Parquet file written by [`write_price_parquet`] (or any file
/// with a Date `date` column and Float64 price columns).
pub fn read_price_parquet(path: &Path, symbol: &str) -> Result<PriceSeries, LoadError> {
    let pq_err = |e: PolarsError| LoadError::Parquet {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };
    let file = fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let df = ParquetReader::new(file).finish().map_err(pq_err)?;

    let required = |name: &str| {
        df.column(name).map_err(|_| LoadError::MissingColumn {
            path: path.to_path_buf(),
            column: name.to_string(),
        })
    };
    let date_ca = required("date")?.date().map_err(pq_err)?;
    let close_ca = required("close")?.f64().map_err(pq_err)?;
    let open_ca = optional_f64(&df, "open").map_err(pq_err)?;
    let high_ca = optional_f64(&df, "high").map_err(pq_err)?;
    let low_ca = optional_f64(&df, "low").map_err(pq_err)?;
    let volume_col = match df.column("volume") {
        Ok(c) => Some(c.cast(&DataType::UInt64).map_err(pq_err)?),
        Err(_) => None,
    };
    let volume_ca = match &volume_col {
        Some(c) => Some(c.u64().map_err(pq_err)?),
        None => None,
    };

    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    let mut bars = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let days = date_ca.get(i).ok_or_else(|| LoadError::BadRow {
            path: path.to_path_buf(),
            row: i + 1,
            reason: "null date".into(),
        })?;
        let close = close_ca.get(i).unwrap_or(f64::NAN);
        let pick = |ca: Option<&Float64Chunked>| ca.and_then(|c| c.get(i)).unwrap_or(close);
        bars.push(PriceBar {
            date: epoch + chrono::Duration::days(days as i64),
            open: pick(open_ca),
            high: pick(high_ca),
            low: pick(low_ca),
            close,
            volume: volume_ca.and_then(|c| c.get(i)).unwrap_or(0),
        });
    }

    checked_series(symbol, bars)
}

/// Write a price series as Parquet with the columns the loader reads back.
pub fn write_price_parquet(path: &Path, series: &PriceSeries) -> Result<(), LoadError> {
    let pq_err = |e: PolarsError| LoadError::Parquet {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };
    let bars = series.bars();
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    let dates: Vec<i32> = bars.iter().map(|b| (b.date - epoch).num_days() as i32).collect();

    let mut df = DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(pq_err)?,
        Column::new("open".into(), bars.iter().map(|b| b.open).collect::<Vec<f64>>()),
        Column::new("high".into(), bars.iter().map(|b| b.high).collect::<Vec<f64>>()),
        Column::new("low".into(), bars.iter().map(|b| b.low).collect::<Vec<f64>>()),
        Column::new("close".into(), bars.iter().map(|b| b.close).collect::<Vec<f64>>()),
        Column::new("volume".into(), bars.iter().map(|b| b.volume).collect::<Vec<u64>>()),
    ])
    .map_err(pq_err)?;

    let file = fs::File::create(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ParquetWriter::new(file).finish(&mut df).map_err(pq_err)?;
    Ok(())
}

fn optional_f64<'a>(df: &'a DataFrame, name: &str) -> PolarsResult<Option<&'a Float64Chunked>> {
    match df.column(name) {
        Ok(column) => column.f64().map(Some),
        Err(_) => Ok(None),
    }
}

fn checked_series(symbol: &str, bars: Vec<PriceBar>) -> Result<PriceSeries, LoadError> {
    if let Some(i) = bars.windows(2).position(|w| w[0].date >= w[1].date) {
        return Err(LoadError::Unsorted {
            symbol: symbol.to_string(),
            row: i + 2,
        });
    }
    let void = bars.iter().filter(|b| b.is_void()).count();
    if void > 0 {
        tracing::debug!(symbol, void, "price rows with missing close");
    }
    Ok(PriceSeries::new(symbol, bars))
}
