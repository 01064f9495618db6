//! Position sizing: how many whole shares a buy signal asks for.
//!
//! Sizers are portfolio-aware (they see cash) but signal-agnostic. Fractional
//! shares are never produced.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SizingError {
    #[error("unrecognized sizing policy '{0}' (expected fixed=N or percent=p)")]
    Unrecognized(String),

    #[error("invalid fixed quantity '{0}'")]
    InvalidQuantity(String),

    #[error("percent fraction must be in (0, 1], got '{0}'")]
    InvalidFraction(String),
}

/// Buy sizing policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SizingPolicy {
    /// Always buy `quantity` shares.
    Fixed { quantity: u64 },

    /// Spend up to `fraction` of current cash, cost multiplier included.
    Percent { fraction: f64 },
}

impl SizingPolicy {
    /// Candidate buy quantity for the given cash and close.
    ///
    /// `cost_multiplier` is `1 + fee_rate + slippage_rate`. Percent sizing rounds
    /// toward zero; degenerate prices yield zero.
    pub fn quantity(&self, cash: f64, close: f64, cost_multiplier: f64) -> u64 {
        match *self {
            SizingPolicy::Fixed { quantity } => quantity,
            SizingPolicy::Percent { fraction } => {
                let unit_cost = close * cost_multiplier;
                if unit_cost.is_nan() || unit_cost <= 0.0 || !cash.is_finite() || cash <= 0.0 {
                    return 0;
                }
                let shares = (cash * fraction / unit_cost).floor();
                if shares.is_finite() && shares > 0.0 {
                    shares as u64
                } else {
                    0
                }
            }
        }
    }
}

impl Default for SizingPolicy {
    fn default() -> Self {
        SizingPolicy::Fixed { quantity: 100 }
    }
}

/// Parses the textual forms `fixed=N` and `percent=p`.
impl FromStr for SizingPolicy {
    type Err = SizingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(raw) = s.strip_prefix("fixed=") {
            let quantity: u64 = raw
                .trim()
                .parse()
                .map_err(|_| SizingError::InvalidQuantity(raw.to_string()))?;
            if quantity == 0 {
                return Err(SizingError::InvalidQuantity(raw.to_string()));
            }
            return Ok(SizingPolicy::Fixed { quantity });
        }
        if let Some(raw) = s.strip_prefix("percent=") {
            let fraction: f64 = raw
                .trim()
                .parse()
                .map_err(|_| SizingError::InvalidFraction(raw.to_string()))?;
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(SizingError::InvalidFraction(raw.to_string()));
            }
            return Ok(SizingPolicy::Percent { fraction });
        }
        Err(SizingError::Unrecognized(s.to_string()))
    }
}

impl fmt::Display for SizingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizingPolicy::Fixed { quantity } => write!(f, "fixed={quantity}"),
            SizingPolicy::Percent { fraction } => write!(f, "percent={fraction}"),
        }
    }
}
