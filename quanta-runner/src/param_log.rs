//! Parameter logs: which parameters produced which signal file.
//!
//! Two JSON files are written next to the signal files of a strategy/symbol:
//! - `param_log_{STRATEGY}_{SYMBOL}.json`: `{ "0001": {strategy, symbol, params}, ... }`
//! - `signal_param_map_{STRATEGY}_{SYMBOL}.json`: `{ "0001": params, ... }`

use crate::param_space::ParamEntry;
use crate::signal_store::StoreError;
use quanta_core::domain::{ParamId, ParameterSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamLogEntry {
    pub strategy: String,
    pub symbol: String,
    pub params: ParameterSet,
}

/// Parameter log keyed by `param_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamLog(BTreeMap<ParamId, ParamLogEntry>);

pub fn param_log_file_name(strategy: &str, symbol: &str) -> String {
    format!("param_log_{strategy}_{symbol}.json")
}

pub fn signal_param_map_file_name(strategy: &str, symbol: &str) -> String {
    format!("signal_param_map_{strategy}_{symbol}.json")
}

impl ParamLog {
    /// Log for one strategy/symbol sweep.
    pub fn from_entries(symbol: &str, entries: &[ParamEntry]) -> Self {
        Self(
            entries
                .iter()
                .map(|e| {
                    (
                        e.param_id.clone(),
                        ParamLogEntry {
                            strategy: e.strategy.name().to_string(),
                            symbol: symbol.to_string(),
                            params: e.params(),
                        },
                    )
                })
                .collect(),
        )
    }

    pub fn get(&self, param_id: &ParamId) -> Option<&ParamLogEntry> {
        self.0.get(param_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `param_id -> params` view.
    pub fn signal_param_map(&self) -> BTreeMap<ParamId, ParameterSet> {
        self.0
            .iter()
            .map(|(id, entry)| (id.clone(), entry.params.clone()))
            .collect()
    }

    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let text = std::fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| StoreError::json(path, e))
    }

    /// Write the log and its signal-parameter map into `dir`.
    ///
    /// Returns the path of the parameter log.
    pub fn save(&self, dir: &Path, strategy: &str, symbol: &str) -> Result<PathBuf, StoreError> {
        std::fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

        let log_path = dir.join(param_log_file_name(strategy, symbol));
        write_json(&log_path, self)?;
        let map_path = dir.join(signal_param_map_file_name(strategy, symbol));
        write_json(&map_path, &self.signal_param_map())?;

        tracing::info!(path = %log_path.display(), entries = self.len(), "wrote parameter log");
        Ok(log_path)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| StoreError::json(path, e))?;
    std::fs::write(path, text).map_err(|e| StoreError::io(path, e))
}

/// Find the parameters behind a signal file.
///
/// Looks for the parameter log beside the signal file first, then in
/// `signals_root`. A missing log or id yields an empty set; an unreadable log
/// is an error.
pub fn lookup_params(
    signal_path: &Path,
    signals_root: &Path,
    strategy: &str,
    symbol: &str,
    param_id: &ParamId,
) -> Result<ParameterSet, StoreError> {
    let file_name = param_log_file_name(strategy, symbol);
    let beside = signal_path
        .parent()
        .map(|dir| dir.join(&file_name))
        .filter(|p| p.exists());
    let candidate = beside.or_else(|| Some(signals_root.join(&file_name)).filter(|p| p.exists()));

    let Some(path) = candidate else {
        tracing::debug!(strategy, symbol, "no parameter log found");
        return Ok(ParameterSet::new());
    };
    let log = ParamLog::load(&path)?;
    Ok(log
        .get(param_id)
        .map(|entry| entry.params.clone())
        .unwrap_or_default())
}
