//! Runner configuration loaded from TOML.
//!
//! ```toml
//! [paths]
//! data_dir = "data"
//! signals_dir = "signals"
//! results_dir = "results"
//! reports_dir = "reports"
//!
//! [backtest]
//! initial_cash = 100000.0
//! fee_rate = 0.001425
//! slippage_rate = 0.0005
//! position = "fixed=100"
//! trade_time = "signal_bar"
//! ```
//!
//! Every field is optional; missing ones take the defaults shown above.

use quanta_core::engine::{BacktestConfig, ExecutionTiming, SizingPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid [backtest] section: {0}")]
    Invalid(String),
}

/// Working directories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub signals_dir: PathBuf,
    pub results_dir: PathBuf,
    pub reports_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            signals_dir: PathBuf::from("signals"),
            results_dir: PathBuf::from("results"),
            reports_dir: PathBuf::from("reports"),
        }
    }
}

impl PathsConfig {
    /// Re-root every relative directory under `base`.
    pub fn rebased(&self, base: &Path) -> Self {
        let join = |p: &PathBuf| if p.is_absolute() { p.clone() } else { base.join(p) };
        Self {
            data_dir: join(&self.data_dir),
            signals_dir: join(&self.signals_dir),
            results_dir: join(&self.results_dir),
            reports_dir: join(&self.reports_dir),
        }
    }

    /// Create all four directories if missing.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [
            &self.data_dir,
            &self.signals_dir,
            &self.results_dir,
            &self.reports_dir,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Simulator settings in their textual config form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSection {
    pub initial_cash: f64,
    pub fee_rate: f64,
    pub slippage_rate: f64,
    /// `fixed=N` or `percent=p`.
    pub position: String,
    /// `signal_bar` or `next_bar`.
    pub trade_time: String,
}

impl Default for BacktestSection {
    fn default() -> Self {
        let core = BacktestConfig::default();
        Self {
            initial_cash: core.initial_cash,
            fee_rate: core.fee_rate,
            slippage_rate: core.slippage_rate,
            position: core.sizing.to_string(),
            trade_time: core.timing.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub paths: PathsConfig,
    pub backtest: BacktestSection,
}

impl RunnerConfig {
    /// Load a config from a TOML file. Relative paths inside it resolve
    /// against the file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&content)?;
        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            config.paths = config.paths.rebased(base);
        }
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Parse and validate the `[backtest]` section into the core config.
    pub fn backtest_config(&self) -> Result<BacktestConfig, ConfigError> {
        let b = &self.backtest;
        let sizing: SizingPolicy = b
            .position
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("position: {e}")))?;
        let timing: ExecutionTiming = b
            .trade_time
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("trade_time: {e}")))?;
        let config = BacktestConfig::new(b.initial_cash, b.fee_rate, b.slippage_rate, sizing)
            .with_timing(timing);
        config
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(config)
    }
}
