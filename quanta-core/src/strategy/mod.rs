//! Strategy families and signal generation.
//!
//! A [`Strategy`] is a closed set of indicator families. Adding a family means
//! adding a variant, and every `match` below stops compiling until it is wired
//! through. Signals are derived from precomputed indicator series and aligned
//! 1:1 with the price dates; warm-up bars map to [`Signal::Flat`].

pub mod rsi_threshold;
pub mod sma_cross;

use crate::domain::{ParameterSet, PriceSeries, Signal, SignalPoint};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised before any simulation begins.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyError {
    #[error("unsupported strategy '{0}' (expected SMA_CROSS or RSI)")]
    Unsupported(String),

    #[error("strategy {strategy}: missing parameter '{param}'")]
    MissingParam { strategy: String, param: String },

    #[error("strategy {strategy}: invalid parameters: {reason}")]
    InvalidParams { strategy: String, reason: String },
}

/// Supported indicator families and their parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    /// Short SMA crossing the long SMA. Requires `short_period < long_period`.
    SmaCross {
        short_period: usize,
        long_period: usize,
    },

    /// Oscillator threshold. Requires `oversold < overbought`.
    Rsi {
        period: usize,
        overbought: f64,
        oversold: f64,
    },
}

impl Strategy {
    pub const SMA_CROSS: &'static str = "SMA_CROSS";
    pub const RSI: &'static str = "RSI";

    /// Canonical identifier used in file names, parameter logs, and result rows.
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::SmaCross { .. } => Self::SMA_CROSS,
            Strategy::Rsi { .. } => Self::RSI,
        }
    }

    /// Build and validate a strategy from its identifier and a parameter bag.
    pub fn from_params(name: &str, params: &ParameterSet) -> Result<Self, StrategyError> {
        let strategy = match name {
            Self::SMA_CROSS => Strategy::SmaCross {
                short_period: period_param(name, params, "short_period")?,
                long_period: period_param(name, params, "long_period")?,
            },
            Self::RSI => Strategy::Rsi {
                period: period_param(name, params, "period")?,
                overbought: required_param(name, params, "overbought")?,
                oversold: required_param(name, params, "oversold")?,
            },
            other => return Err(StrategyError::Unsupported(other.to_string())),
        };
        strategy.validate()?;
        Ok(strategy)
    }

    /// Parameters as a bag, the inverse of [`Strategy::from_params`].
    pub fn params(&self) -> ParameterSet {
        match *self {
            Strategy::SmaCross {
                short_period,
                long_period,
            } => ParameterSet::new()
                .with("short_period", short_period as f64)
                .with("long_period", long_period as f64),
            Strategy::Rsi {
                period,
                overbought,
                oversold,
            } => ParameterSet::new()
                .with("period", period as f64)
                .with("overbought", overbought)
                .with("oversold", oversold),
        }
    }

    /// Fail fast on parameter combinations the indicator math does not guard.
    pub fn validate(&self) -> Result<(), StrategyError> {
        let invalid = |reason: String| StrategyError::InvalidParams {
            strategy: self.name().to_string(),
            reason,
        };
        match *self {
            Strategy::SmaCross {
                short_period,
                long_period,
            } => {
                if short_period == 0 {
                    return Err(invalid("short_period must be >= 1".into()));
                }
                if short_period >= long_period {
                    return Err(invalid(format!(
                        "short_period ({short_period}) must be < long_period ({long_period})"
                    )));
                }
            }
            Strategy::Rsi {
                period,
                overbought,
                oversold,
            } => {
                if period == 0 {
                    return Err(invalid("period must be >= 1".into()));
                }
                if !overbought.is_finite() || !oversold.is_finite() {
                    return Err(invalid("thresholds must be finite".into()));
                }
                if oversold >= overbought {
                    return Err(invalid(format!(
                        "oversold ({oversold}) must be < overbought ({overbought})"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Leading bars that can never carry an actionable signal.
    pub fn warmup_bars(&self) -> usize {
        match *self {
            // Crossing compares against the previous bar, so both SMAs must be
            // defined one bar earlier.
            Strategy::SmaCross { long_period, .. } => long_period,
            Strategy::Rsi { period, .. } => period.saturating_sub(1),
        }
    }

    /// Raw signal column aligned with `prices`.
    pub fn signals(&self, prices: &PriceSeries) -> Vec<Signal> {
        match *self {
            Strategy::SmaCross {
                short_period,
                long_period,
            } => sma_cross::signals(prices.bars(), short_period, long_period),
            Strategy::Rsi {
                period,
                overbought,
                oversold,
            } => rsi_threshold::signals(prices.bars(), period, overbought, oversold),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Strategy::SmaCross {
                short_period,
                long_period,
            } => write!(f, "SMA_CROSS({short_period},{long_period})"),
            Strategy::Rsi {
                period,
                overbought,
                oversold,
            } => write!(f, "RSI({period},{overbought},{oversold})"),
        }
    }
}

/// Validate `strategy` and derive its dated signal series.
pub fn generate_signals(
    prices: &PriceSeries,
    strategy: &Strategy,
) -> Result<Vec<SignalPoint>, StrategyError> {
    strategy.validate()?;
    let signals = strategy.signals(prices);
    let points: Vec<SignalPoint> = prices
        .bars()
        .iter()
        .zip(signals)
        .map(|(bar, signal)| SignalPoint::new(bar.date, signal))
        .collect();

    tracing::debug!(
        symbol = prices.symbol(),
        strategy = %strategy,
        bars = points.len(),
        actionable = points.iter().filter(|p| p.signal.is_actionable()).count(),
        "generated signals"
    );
    Ok(points)
}

fn required_param(strategy: &str, params: &ParameterSet, key: &str) -> Result<f64, StrategyError> {
    params.get(key).ok_or_else(|| StrategyError::MissingParam {
        strategy: strategy.to_string(),
        param: key.to_string(),
    })
}

fn period_param(strategy: &str, params: &ParameterSet, key: &str) -> Result<usize, StrategyError> {
    let value = required_param(strategy, params, key)?;
    if !value.is_finite() || value < 1.0 || value.fract() != 0.0 {
        return Err(StrategyError::InvalidParams {
            strategy: strategy.to_string(),
            reason: format!("{key} must be a positive integer, got {value}"),
        });
    }
    Ok(value as usize)
}
