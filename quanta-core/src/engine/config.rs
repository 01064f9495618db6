//! Simulator configuration.

use super::sizing::SizingPolicy;
use super::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// When a signal is acted upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionTiming {
    /// Trade at the close of the bar the signal is dated on.
    #[default]
    SignalBar,
    /// Trade at the close of the next available price bar.
    NextBar,
}

impl FromStr for ExecutionTiming {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "signal_bar" | "close" => Ok(ExecutionTiming::SignalBar),
            "next_bar" => Ok(ExecutionTiming::NextBar),
            other => Err(EngineError::InvalidConfig(format!(
                "unknown trade timing '{other}' (expected signal_bar or next_bar)"
            ))),
        }
    }
}

impl fmt::Display for ExecutionTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionTiming::SignalBar => f.write_str("signal_bar"),
            ExecutionTiming::NextBar => f.write_str("next_bar"),
        }
    }
}

/// Configuration for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub initial_cash: f64,
    /// Commission as a fraction of notional, charged on both buys and sells.
    pub fee_rate: f64,
    /// Adverse execution cost as a fraction of notional, on both sides.
    pub slippage_rate: f64,
    pub sizing: SizingPolicy,
    #[serde(default)]
    pub timing: ExecutionTiming,
}

impl BacktestConfig {
    pub fn new(initial_cash: f64, fee_rate: f64, slippage_rate: f64, sizing: SizingPolicy) -> Self {
        Self {
            initial_cash,
            fee_rate,
            slippage_rate,
            sizing,
            timing: ExecutionTiming::SignalBar,
        }
    }

    /// Zero-cost configuration, mostly for tests and what-if comparisons.
    pub fn frictionless(initial_cash: f64, sizing: SizingPolicy) -> Self {
        Self::new(initial_cash, 0.0, 0.0, sizing)
    }

    pub fn with_timing(mut self, timing: ExecutionTiming) -> Self {
        self.timing = timing;
        self
    }

    /// `1 + fee + slippage`, applied to buy cost.
    pub fn buy_multiplier(&self) -> f64 {
        1.0 + self.fee_rate + self.slippage_rate
    }

    /// `1 - fee - slippage`, applied to sell revenue.
    pub fn sell_multiplier(&self) -> f64 {
        1.0 - self.fee_rate - self.slippage_rate
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.initial_cash.is_finite() && self.initial_cash > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "initial_cash must be positive, got {}",
                self.initial_cash
            )));
        }
        for (name, rate) in [("fee_rate", self.fee_rate), ("slippage_rate", self.slippage_rate)] {
            if !(rate.is_finite() && rate >= 0.0) {
                return Err(EngineError::InvalidConfig(format!(
                    "{name} must be >= 0, got {rate}"
                )));
            }
        }
        if self.fee_rate + self.slippage_rate >= 1.0 {
            return Err(EngineError::InvalidConfig(
                "fee_rate + slippage_rate must be < 1".into(),
            ));
        }
        if let SizingPolicy::Percent { fraction } = self.sizing {
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(EngineError::InvalidConfig(format!(
                    "percent sizing fraction must be in (0, 1], got {fraction}"
                )));
            }
        }
        if let SizingPolicy::Fixed { quantity: 0 } = self.sizing {
            return Err(EngineError::InvalidConfig(
                "fixed sizing quantity must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self::new(100_000.0, 0.001425, 0.0005, SizingPolicy::default())
    }
}
