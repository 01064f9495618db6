//! Performance analysis: summary metrics over a NAV series.
//!
//! Every metric is a pure function of the NAV values. `analyze` bundles them
//! with the run identity into a [`PerformanceRecord`].

use crate::domain::{nav_values, NavPoint, ParamId, ParameterSet, RunDescriptor};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PerformanceError {
    #[error("NAV series is empty")]
    EmptySeries,

    #[error("NAV series must start positive, got {0}")]
    NonPositiveStart(f64),

    #[error("NAV value at index {index} is not finite")]
    NonFinite { index: usize },
}

/// `nav[last] / nav[first] - 1`. Zero for fewer than two points or a
/// non-positive start.
pub fn total_return(nav: &[f64]) -> f64 {
    match (nav.first(), nav.last()) {
        (Some(&first), Some(&last)) if nav.len() >= 2 && first > 0.0 => last / first - 1.0,
        _ => 0.0,
    }
}

/// Largest peak-to-trough decline, as a positive fraction.
///
/// The numerator is the running-peak drawdown; the denominator is the global
/// maximum of the whole series, not the peak the decline started from. A
/// series that only rises has zero drawdown.
pub fn max_drawdown(nav: &[f64]) -> f64 {
    let global_max = nav.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(global_max.is_finite() && global_max > 0.0) {
        return 0.0;
    }

    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &value in nav {
        peak = peak.max(value);
        worst = worst.max(peak - value);
    }
    worst / global_max
}

/// Unique identifier of one analyzer invocation.
///
/// `YYYYmmdd_HHMMSS_<8 hex>`: a wall-clock stamp for human sorting plus a
/// BLAKE3 suffix over the run identity and the nanosecond clock, so parallel
/// runs finishing in the same second still get distinct ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn now(descriptor: &RunDescriptor) -> Self {
        Self::at(descriptor, Local::now())
    }

    /// Deterministic for a given descriptor and timestamp.
    pub fn at(descriptor: &RunDescriptor, timestamp: DateTime<Local>) -> Self {
        let canonical = format!(
            "{}|{}|{}|{}|{}",
            descriptor.strategy,
            descriptor.symbol,
            descriptor.param_id,
            descriptor.params.to_json(),
            timestamp.timestamp_nanos_opt().unwrap_or_default(),
        );
        let hash = blake3::hash(canonical.as_bytes()).to_hex();
        Self(format!(
            "{}_{}",
            timestamp.format("%Y%m%d_%H%M%S"),
            &hash.as_str()[..8]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Summary of one run, ready for the results table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub total_return: f64,
    pub max_drawdown: f64,
    pub run_id: RunId,
    pub strategy: String,
    pub symbol: String,
    pub param_id: ParamId,
    pub params: ParameterSet,
}

/// Analyze a NAV series, stamping a fresh [`RunId`].
pub fn analyze(
    nav: &[NavPoint],
    descriptor: &RunDescriptor,
) -> Result<PerformanceRecord, PerformanceError> {
    analyze_with_id(nav, descriptor, RunId::now(descriptor))
}

/// Analyze a NAV series under a caller-supplied [`RunId`].
pub fn analyze_with_id(
    nav: &[NavPoint],
    descriptor: &RunDescriptor,
    run_id: RunId,
) -> Result<PerformanceRecord, PerformanceError> {
    let values = nav_values(nav);
    let first = *values.first().ok_or(PerformanceError::EmptySeries)?;
    if let Some(index) = values.iter().position(|v| !v.is_finite()) {
        return Err(PerformanceError::NonFinite { index });
    }
    if first <= 0.0 {
        return Err(PerformanceError::NonPositiveStart(first));
    }

    let record = PerformanceRecord {
        total_return: total_return(&values),
        max_drawdown: max_drawdown(&values),
        run_id,
        strategy: descriptor.strategy.clone(),
        symbol: descriptor.symbol.clone(),
        param_id: descriptor.param_id.clone(),
        params: descriptor.params.clone(),
    };
    tracing::debug!(
        run_id = %record.run_id,
        total_return = record.total_return,
        max_drawdown = record.max_drawdown,
        "analyzed run"
    );
    Ok(record)
}
