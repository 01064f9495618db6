//! TradeRecord: one executed buy or sell in the simulator's trade log.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
}

impl TradeAction {
    pub fn as_str(self) -> &'static str {
        match self {
            TradeAction::Buy => "buy",
            TradeAction::Sell => "sell",
        }
    }
}

/// An executed trade. The log is append-only; records are never amended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub date: NaiveDate,
    pub action: TradeAction,
    /// Close price the trade executed at (before fee and slippage).
    pub price: f64,
    pub quantity: u64,
    /// Cash balance immediately after the trade settled.
    pub cash_after: f64,
}

impl TradeRecord {
    /// Gross notional: price times quantity, excluding costs.
    pub fn notional(&self) -> f64 {
        self.price * self.quantity as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notional_excludes_costs() {
        let trade = TradeRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            action: TradeAction::Buy,
            price: 100.0,
            quantity: 10,
            cash_after: 8_990.0,
        };
        assert_eq!(trade.notional(), 1_000.0);
    }

    #[test]
    fn action_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&TradeAction::Sell).unwrap(), r#""sell""#);
        assert_eq!(TradeAction::Buy.as_str(), "buy");
    }
}
