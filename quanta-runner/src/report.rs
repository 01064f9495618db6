//! Report generation over the accumulated results table.
//!
//! Pipeline: load `performance_master.csv` → keep one symbol → apply
//! condition filters → rank by a metric (descending) → keep the top N, the top
//! percent, or everything → write `{prefix}_{symbol}_{metric}.{csv|html}`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::results::{read_master, PerformanceRow};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to load results table {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("no symbol given; available symbols: {}", .available.join(", "))]
    NoSymbol { available: Vec<String> },

    #[error("symbol '{symbol}' not in results; available symbols: {}", .available.join(", "))]
    UnknownSymbol {
        symbol: String,
        available: Vec<String>,
    },

    #[error("unknown metric '{0}' (expected total_return or max_drawdown)")]
    UnknownMetric(String),

    #[error("bad condition '{0}' (expected e.g. total_return>=0.1)")]
    BadCondition(String),

    #[error("invalid selection: {0}")]
    BadSelection(String),

    #[error("unknown export format '{0}' (expected csv or html)")]
    UnknownFormat(String),
}

// ─── Request types ──────────────────────────────────────────────────

/// Numeric columns a report can rank or filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    TotalReturn,
    MaxDrawdown,
}

impl Metric {
    pub fn as_str(self) -> &'static str {
        match self {
            Metric::TotalReturn => "total_return",
            Metric::MaxDrawdown => "max_drawdown",
        }
    }

    pub fn value(self, row: &PerformanceRow) -> f64 {
        match self {
            Metric::TotalReturn => row.total_return,
            Metric::MaxDrawdown => row.max_drawdown,
        }
    }
}

impl FromStr for Metric {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "total_return" => Ok(Metric::TotalReturn),
            "max_drawdown" => Ok(Metric::MaxDrawdown),
            other => Err(ReportError::UnknownMetric(other.to_string())),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Ge,
    Le,
    Gt,
    Lt,
    Eq,
}

impl CompareOp {
    /// Operators in match order: two-character forms before their prefixes.
    const PARSE_ORDER: [(&'static str, CompareOp); 5] = [
        (">=", CompareOp::Ge),
        ("<=", CompareOp::Le),
        (">", CompareOp::Gt),
        ("<", CompareOp::Lt),
        ("==", CompareOp::Eq),
    ];

    pub fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            CompareOp::Ge => lhs >= rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Eq => lhs == rhs,
        }
    }
}

/// One filter such as `max_drawdown<=0.2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Condition {
    pub metric: Metric,
    pub op: CompareOp,
    pub value: f64,
}

impl Condition {
    pub fn matches(&self, row: &PerformanceRow) -> bool {
        self.op.holds(self.metric.value(row), self.value)
    }

    /// Parse a comma-separated list; blank items are ignored.
    pub fn parse_list(s: &str) -> Result<Vec<Condition>, ReportError> {
        s.split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl FromStr for Condition {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ReportError::BadCondition(s.to_string());
        let (lhs, rhs, op) = CompareOp::PARSE_ORDER
            .iter()
            .find_map(|&(token, op)| s.split_once(token).map(|(l, r)| (l, r, op)))
            .ok_or_else(bad)?;
        let metric = lhs.parse::<Metric>().map_err(|_| bad())?;
        let value = rhs.trim().parse::<f64>().map_err(|_| bad())?;
        Ok(Condition { metric, op, value })
    }
}

/// How many ranked rows to keep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Selection {
    All,
    TopN(usize),
    /// Percent of rows in `(0, 100]`; at least one row is kept.
    TopPercent(f64),
}

impl Selection {
    /// Build from the two optional CLI flags; giving both is an error.
    pub fn from_options(top_n: Option<usize>, top_percent: Option<f64>) -> Result<Self, ReportError> {
        match (top_n, top_percent) {
            (Some(_), Some(_)) => Err(ReportError::BadSelection(
                "give either a top count or a top percent, not both".into(),
            )),
            (Some(n), None) => Ok(Selection::TopN(n)),
            (None, Some(p)) if p > 0.0 && p <= 100.0 => Ok(Selection::TopPercent(p)),
            (None, Some(p)) => Err(ReportError::BadSelection(format!(
                "top percent {p} is outside (0, 100]"
            ))),
            (None, None) => Ok(Selection::All),
        }
    }

    /// Number of rows kept out of `len`.
    pub fn keep(self, len: usize) -> usize {
        match self {
            Selection::All => len,
            Selection::TopN(n) => n.min(len),
            Selection::TopPercent(p) => ((len as f64 * p / 100.0) as usize).max(1).min(len),
        }
    }

    /// File name prefix: `top10`, `top5` for 5.5%, or `all`.
    pub fn prefix(self) -> String {
        match self {
            Selection::All => "all".to_string(),
            Selection::TopN(n) => format!("top{n}"),
            Selection::TopPercent(p) => format!("top{}", p as u64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Html,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Html => "html",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "html" => Ok(ExportFormat::Html),
            other => Err(ReportError::UnknownFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub metric: Metric,
    pub selection: Selection,
    pub conditions: Vec<Condition>,
    pub format: ExportFormat,
    pub symbol: Option<String>,
}

/// A written report.
#[derive(Debug, Clone)]
pub struct Report {
    pub symbol: String,
    pub rows: Vec<PerformanceRow>,
    pub path: PathBuf,
}

// ─── Table operations ───────────────────────────────────────────────

/// Distinct symbols, sorted.
pub fn available_symbols(rows: &[PerformanceRow]) -> Vec<String> {
    let mut symbols: Vec<String> = rows.iter().map(|r| r.symbol.clone()).collect();
    symbols.sort();
    symbols.dedup();
    symbols
}

/// Match `requested` against the table's symbols, exactly or ignoring case.
pub fn resolve_symbol(rows: &[PerformanceRow], requested: Option<&str>) -> Result<String, ReportError> {
    let available = available_symbols(rows);
    let Some(requested) = requested.map(str::trim) else {
        return Err(ReportError::NoSymbol { available });
    };
    available
        .iter()
        .find(|s| s.as_str() == requested)
        .or_else(|| available.iter().find(|s| s.eq_ignore_ascii_case(requested)))
        .cloned()
        .ok_or_else(|| ReportError::UnknownSymbol {
            symbol: requested.to_string(),
            available: available.clone(),
        })
}

pub fn filter_by_symbol(rows: Vec<PerformanceRow>, symbol: &str) -> Vec<PerformanceRow> {
    rows.into_iter().filter(|r| r.symbol == symbol).collect()
}

/// Keep rows satisfying every condition.
pub fn apply_conditions(rows: Vec<PerformanceRow>, conditions: &[Condition]) -> Vec<PerformanceRow> {
    rows.into_iter()
        .filter(|row| conditions.iter().all(|c| c.matches(row)))
        .collect()
}

/// Sort descending by `metric` (stable, NaN last) and apply the selection.
pub fn filter_top(mut rows: Vec<PerformanceRow>, metric: Metric, selection: Selection) -> Vec<PerformanceRow> {
    rows.sort_by(|a, b| {
        let (x, y) = (metric.value(a), metric.value(b));
        match (x.is_nan(), y.is_nan()) {
            (true, true) => std::cmp::Ordering::Equal,
            (true, false) => std::cmp::Ordering::Greater,
            (false, true) => std::cmp::Ordering::Less,
            (false, false) => y.total_cmp(&x),
        }
    });
    rows.truncate(selection.keep(rows.len()));
    rows
}

// ─── Rendering ──────────────────────────────────────────────────────

/// Report column order.
pub const REPORT_COLUMNS: [&str; 7] = [
    "strategy",
    "symbol",
    "param_id",
    "params",
    "total_return",
    "max_drawdown",
    "run_id",
];

fn cells(row: &PerformanceRow) -> [String; 7] {
    [
        row.strategy.clone(),
        row.symbol.clone(),
        row.param_id.clone(),
        row.params.clone(),
        row.total_return.to_string(),
        row.max_drawdown.to_string(),
        row.run_id.clone(),
    ]
}

pub fn render_csv(rows: &[PerformanceRow]) -> Result<String, ReportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(REPORT_COLUMNS)?;
    for row in rows {
        wtr.write_record(cells(row))?;
    }
    let data = wtr
        .into_inner()
        .map_err(|e| ReportError::Csv(csv::Error::from(e.into_error())))?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// A plain `<table>` with a header row and one row per record.
pub fn render_html(rows: &[PerformanceRow]) -> String {
    let mut out = String::from("<table border=\"1\" class=\"dataframe\">\n  <thead>\n    <tr style=\"text-align: right;\">\n");
    for col in REPORT_COLUMNS {
        out.push_str(&format!("      <th>{col}</th>\n"));
    }
    out.push_str("    </tr>\n  </thead>\n  <tbody>\n");
    for row in rows {
        out.push_str("    <tr>\n");
        for cell in cells(row) {
            out.push_str(&format!("      <td>{}</td>\n", escape_html(&cell)));
        }
        out.push_str("    </tr>\n");
    }
    out.push_str("  </tbody>\n</table>\n");
    out
}

/// `{prefix}_{symbol}_{metric}.{ext}`
pub fn report_file_name(selection: Selection, symbol: &str, metric: Metric, format: ExportFormat) -> String {
    format!("{}_{symbol}_{metric}.{}", selection.prefix(), format.extension())
}

/// Run the whole pipeline over `summary_path` and write the report into `reports_dir`.
pub fn generate(summary_path: &Path, reports_dir: &Path, request: &ReportRequest) -> Result<Report, ReportError> {
    let rows = read_master(summary_path).map_err(|e| ReportError::Load {
        path: summary_path.to_path_buf(),
        reason: format!("{e:#}"),
    })?;
    let symbol = resolve_symbol(&rows, request.symbol.as_deref())?;

    let rows = filter_by_symbol(rows, &symbol);
    let rows = apply_conditions(rows, &request.conditions);
    let rows = filter_top(rows, request.metric, request.selection);

    let text = match request.format {
        ExportFormat::Csv => render_csv(&rows)?,
        ExportFormat::Html => render_html(&rows),
    };
    fs::create_dir_all(reports_dir).map_err(|source| ReportError::Io {
        path: reports_dir.to_path_buf(),
        source,
    })?;
    let path = reports_dir.join(report_file_name(
        request.selection,
        &symbol,
        request.metric,
        request.format,
    ));
    fs::write(&path, text).map_err(|source| ReportError::Io {
        path: path.clone(),
        source,
    })?;

    tracing::info!(path = %path.display(), symbol = %symbol, rows = rows.len(), "wrote report");
    Ok(Report { symbol, rows, path })
}
