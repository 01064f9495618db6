//! Portfolio state and the pure per-bar transition function.

use super::config::BacktestConfig;
use crate::domain::{NavPoint, Signal, TradeAction, TradeRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Cash and holdings during a walk.
///
/// Invariant: `cash >= 0` after every transition. A buy that would break it is
/// skipped, never partially filled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    pub cash: f64,
    pub position_size: u64,
    /// Last observed signal value (acted on or not), for edge-triggering.
    pub last_signal: Signal,
}

/// Why a bar with a changed signal did not trade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkipReason {
    /// Buy cost exceeds available cash.
    InsufficientCash { required: f64, available: f64 },
    /// Sizing produced zero shares.
    ZeroQuantity,
    /// Sell signal while flat; there is no short selling.
    NoPosition,
}

/// Result of applying one bar to a state.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub state: PortfolioState,
    pub trade: Option<TradeRecord>,
    pub nav: NavPoint,
    pub skipped: Option<SkipReason>,
}

impl PortfolioState {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            cash: initial_cash,
            position_size: 0,
            last_signal: Signal::Flat,
        }
    }

    /// Mark-to-market value at `close`.
    pub fn nav(&self, close: f64) -> f64 {
        self.cash + self.position_size as f64 * close
    }

    /// Apply one bar: edge-trigger check, optional trade, NAV mark.
    ///
    /// `last_signal` is updated to `signal` whether or not a trade executed.
    pub fn step(
        self,
        date: NaiveDate,
        close: f64,
        signal: Signal,
        config: &BacktestConfig,
    ) -> StepOutcome {
        let mut next = self;
        let mut trade = None;
        let mut skipped = None;

        if signal != self.last_signal {
            match signal {
                Signal::Buy => {
                    let multiplier = config.buy_multiplier();
                    let quantity = config.sizing.quantity(self.cash, close, multiplier);
                    let cost = close * quantity as f64 * multiplier;
                    if quantity == 0 {
                        skipped = Some(SkipReason::ZeroQuantity);
                    } else if self.cash >= cost {
                        next.cash = self.cash - cost;
                        next.position_size = self.position_size + quantity;
                        trade = Some(TradeRecord {
                            date,
                            action: TradeAction::Buy,
                            price: close,
                            quantity,
                            cash_after: next.cash,
                        });
                    } else {
                        skipped = Some(SkipReason::InsufficientCash {
                            required: cost,
                            available: self.cash,
                        });
                    }
                }
                Signal::Sell => {
                    if self.position_size > 0 {
                        let revenue =
                            close * self.position_size as f64 * config.sell_multiplier();
                        next.cash = self.cash + revenue;
                        next.position_size = 0;
                        trade = Some(TradeRecord {
                            date,
                            action: TradeAction::Sell,
                            price: close,
                            quantity: self.position_size,
                            cash_after: next.cash,
                        });
                    } else {
                        skipped = Some(SkipReason::NoPosition);
                    }
                }
                Signal::Flat => {}
            }
        }

        next.last_signal = signal;
        StepOutcome {
            state: next,
            trade,
            nav: NavPoint {
                date,
                nav: next.nav(close),
            },
            skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SizingPolicy;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
    }

    fn fixed(quantity: u64) -> BacktestConfig {
        BacktestConfig::frictionless(1_000.0, SizingPolicy::Fixed { quantity })
    }

    #[test]
    fn buy_moves_cash_into_position() {
        let out = PortfolioState::new(1_000.0).step(date(), 100.0, Signal::Buy, &fixed(3));
        assert_eq!(out.state.cash, 700.0);
        assert_eq!(out.state.position_size, 3);
        assert_eq!(out.nav.nav, 1_000.0);
        let trade = out.trade.unwrap();
        assert_eq!(trade.action, TradeAction::Buy);
        assert_eq!(trade.quantity, 3);
        assert_eq!(trade.cash_after, 700.0);
    }

    #[test]
    fn repeated_signal_does_not_trade() {
        let mut state = PortfolioState::new(1_000.0);
        state.last_signal = Signal::Buy;
        let out = state.step(date(), 100.0, Signal::Buy, &fixed(3));
        assert!(out.trade.is_none());
        assert!(out.skipped.is_none());
        assert_eq!(out.state.cash, 1_000.0);
    }

    #[test]
    fn insufficient_cash_skips_buy_but_records_signal() {
        let out = PortfolioState::new(1_000.0).step(date(), 100.0, Signal::Buy, &fixed(11));
        assert!(out.trade.is_none());
        assert_eq!(out.state.cash, 1_000.0);
        assert_eq!(out.state.last_signal, Signal::Buy);
        assert!(matches!(out.skipped, Some(SkipReason::InsufficientCash { .. })));
    }

    #[test]
    fn exact_cash_buy_is_allowed() {
        let out = PortfolioState::new(1_000.0).step(date(), 100.0, Signal::Buy, &fixed(10));
        assert_eq!(out.state.cash, 0.0);
        assert_eq!(out.state.position_size, 10);
    }

    #[test]
    fn sell_liquidates_with_costs() {
        let config = BacktestConfig::new(0.0, 0.01, 0.01, SizingPolicy::Fixed { quantity: 1 });
        let state = PortfolioState {
            cash: 0.0,
            position_size: 10,
            last_signal: Signal::Buy,
        };
        let out = state.step(date(), 100.0, Signal::Sell, &config);
        assert_eq!(out.state.position_size, 0);
        assert!((out.state.cash - 980.0).abs() < 1e-9);
        assert_eq!(out.trade.unwrap().quantity, 10);
    }

    #[test]
    fn sell_while_flat_is_noop() {
        let out = PortfolioState::new(1_000.0).step(date(), 100.0, Signal::Sell, &fixed(1));
        assert!(out.trade.is_none());
        assert_eq!(out.skipped, Some(SkipReason::NoPosition));
        assert_eq!(out.state.last_signal, Signal::Sell);
    }

    #[test]
    fn buy_applies_cost_multiplier() {
        let config = BacktestConfig::new(1_000.0, 0.001, 0.002, SizingPolicy::Fixed { quantity: 2 });
        let out = PortfolioState::new(1_000.0).step(date(), 100.0, Signal::Buy, &config);
        assert!((out.state.cash - (1_000.0 - 200.0 * 1.003)).abs() < 1e-9);
    }

    #[test]
    fn flat_after_buy_keeps_position() {
        let state = PortfolioState {
            cash: 500.0,
            position_size: 5,
            last_signal: Signal::Buy,
        };
        let out = state.step(date(), 120.0, Signal::Flat, &fixed(5));
        assert!(out.trade.is_none());
        assert_eq!(out.state.position_size, 5);
        assert_eq!(out.nav.nav, 1_100.0);
        assert_eq!(out.state.last_signal, Signal::Flat);
    }
}
