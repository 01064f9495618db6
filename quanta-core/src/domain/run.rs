//! RunDescriptor: explicit identity of one simulation run.

use super::params::{ParamId, ParameterSet};
use serde::{Deserialize, Serialize};

/// Who a run belongs to: strategy, symbol, and parameter set.
///
/// Passed alongside the price and signal series instead of being inferred from
/// file names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDescriptor {
    pub strategy: String,
    pub symbol: String,
    pub param_id: ParamId,
    pub params: ParameterSet,
}

impl RunDescriptor {
    pub fn new(
        strategy: impl Into<String>,
        symbol: impl Into<String>,
        param_id: ParamId,
        params: ParameterSet,
    ) -> Self {
        Self {
            strategy: strategy.into(),
            symbol: symbol.into(),
            param_id,
            params,
        }
    }

    /// `<STRATEGY>_<SYMBOL>_<param_id>`, the stem used for per-run artifacts.
    pub fn file_stem(&self) -> String {
        format!("{}_{}_{}", self.strategy, self.symbol, self.param_id)
    }
}
