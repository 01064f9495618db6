//! Parameter grids and their expansion into numbered strategy instances.
//!
//! A grid maps each parameter name to the values to try. Expansion takes the
//! cartesian product in key order, drops combinations the strategy rejects
//! (e.g. `short_period >= long_period`), and numbers the survivors `0001`,
//! `0002`, ... in order.

use quanta_core::domain::{ParamId, ParameterSet};
use quanta_core::strategy::{Strategy, StrategyError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum GridParseError {
    #[error("expected name=values, got '{0}'")]
    MissingEquals(String),

    #[error("bad value '{value}' for '{key}'")]
    BadValue { key: String, value: String },

    #[error("empty parameter grid")]
    Empty,
}

/// Values to sweep per parameter name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamGrid(BTreeMap<String, Vec<f64>>);

/// One numbered point of an expanded grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamEntry {
    pub param_id: ParamId,
    pub strategy: Strategy,
}

impl ParamEntry {
    pub fn params(&self) -> ParameterSet {
        self.strategy.params()
    }
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, values: Vec<f64>) -> Self {
        self.0.insert(key.into(), values);
        self
    }

    /// A small default sweep for a known strategy identifier.
    pub fn default_for(strategy: &str) -> Result<Self, StrategyError> {
        match strategy {
            Strategy::SMA_CROSS => Ok(Self::new()
                .with("short_period", vec![5.0, 10.0, 20.0])
                .with("long_period", vec![20.0, 50.0, 100.0])),
            Strategy::RSI => Ok(Self::new()
                .with("period", vec![14.0])
                .with("overbought", vec![70.0, 80.0])
                .with("oversold", vec![20.0, 30.0])),
            other => Err(StrategyError::Unsupported(other.to_string())),
        }
    }

    /// Number of raw combinations, before invalid ones are dropped.
    pub fn size(&self) -> usize {
        if self.0.is_empty() {
            return 0;
        }
        self.0.values().map(Vec::len).product()
    }

    /// Every combination as a parameter set, in lexicographic key order.
    pub fn combinations(&self) -> Vec<ParameterSet> {
        if self.0.is_empty() {
            return Vec::new();
        }
        let mut combos = vec![ParameterSet::new()];
        for (key, values) in &self.0 {
            combos = combos
                .into_iter()
                .flat_map(|base| values.iter().map(move |&v| base.clone().with(key.clone(), v)))
                .collect();
        }
        combos
    }

    /// Build and number the valid strategy instances of this grid.
    ///
    /// Combinations failing [`Strategy::validate`] are skipped. Any other
    /// error (unknown strategy, missing parameter) aborts the expansion.
    pub fn expand(&self, strategy: &str) -> Result<Vec<ParamEntry>, StrategyError> {
        let mut entries = Vec::new();
        for params in self.combinations() {
            match Strategy::from_params(strategy, &params) {
                Ok(built) => entries.push(ParamEntry {
                    param_id: ParamId::from_index(entries.len() + 1),
                    strategy: built,
                }),
                Err(StrategyError::InvalidParams { reason, .. }) => {
                    tracing::debug!(strategy, params = %params.to_json(), reason = %reason, "skipping combination");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(entries)
    }
}

/// Parses `name=v1,v2;name=v3`, e.g. `short_period=5,10;long_period=20,50`.
impl FromStr for ParamGrid {
    type Err = GridParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut grid = ParamGrid::new();
        for part in s.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, raw) = part
                .split_once('=')
                .ok_or_else(|| GridParseError::MissingEquals(part.to_string()))?;
            let key = key.trim();
            let values = raw
                .split(',')
                .map(|v| {
                    v.trim().parse::<f64>().map_err(|_| GridParseError::BadValue {
                        key: key.to_string(),
                        value: v.trim().to_string(),
                    })
                })
                .collect::<Result<Vec<f64>, _>>()?;
            grid.0.insert(key.to_string(), values);
        }
        if grid.0.is_empty() {
            return Err(GridParseError::Empty);
        }
        Ok(grid)
    }
}

impl fmt::Display for ParamGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(k, vs)| {
                let values: Vec<String> = vs.iter().map(|v| v.to_string()).collect();
                format!("{k}={}", values.join(","))
            })
            .collect();
        f.write_str(&parts.join(";"))
    }
}
