//! The backtest walk: fold [`PortfolioState::step`] over the signal series.

use super::config::{BacktestConfig, ExecutionTiming};
use super::state::{PortfolioState, SkipReason};
use super::EngineError;
use crate::domain::{NavPoint, PriceSeries, SignalPoint, TradeRecord};
use serde::{Deserialize, Serialize};

/// Everything one walk produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestOutcome {
    pub final_state: PortfolioState,
    pub nav: Vec<NavPoint>,
    pub trades: Vec<TradeRecord>,
    /// Signal dates with no usable close in the price series.
    pub skipped_dates: usize,
}

struct Walk {
    state: PortfolioState,
    nav: Vec<NavPoint>,
    trades: Vec<TradeRecord>,
    skipped_dates: usize,
}

/// Run one simulation over immutable inputs.
///
/// Prices and signals must both be in strictly increasing date order; the
/// simulator rejects rather than reorders. Signal dates missing from the
/// price series (or carrying a non-finite close) are skipped.
pub fn run_backtest(
    prices: &PriceSeries,
    signals: &[SignalPoint],
    config: &BacktestConfig,
) -> Result<BacktestOutcome, EngineError> {
    config.validate()?;
    if !prices.is_sorted() {
        return Err(EngineError::UnsortedPrices);
    }
    if let Some(i) = signals.windows(2).position(|w| w[0].date >= w[1].date) {
        return Err(EngineError::UnsortedSignals { index: i + 1 });
    }

    let (schedule, dropped) = match config.timing {
        ExecutionTiming::SignalBar => (signals.to_vec(), 0),
        ExecutionTiming::NextBar => shift_to_next_bar(prices, signals),
    };

    let init = Walk {
        state: PortfolioState::new(config.initial_cash),
        nav: Vec::with_capacity(schedule.len()),
        trades: Vec::new(),
        skipped_dates: dropped,
    };

    let walk = schedule.iter().fold(init, |mut walk, point| {
        let close = match prices.close_on(point.date) {
            Some(close) if close.is_finite() => close,
            _ => {
                tracing::debug!(date = %point.date, "no close for signal date, skipping");
                walk.skipped_dates += 1;
                return walk;
            }
        };

        let outcome = walk.state.step(point.date, close, point.signal, config);
        match outcome.skipped {
            Some(SkipReason::InsufficientCash { required, available }) => {
                tracing::debug!(date = %point.date, required, available, "buy skipped: insufficient cash");
            }
            Some(SkipReason::ZeroQuantity) => {
                tracing::debug!(date = %point.date, close, "buy skipped: sizing produced zero shares");
            }
            Some(SkipReason::NoPosition) => {
                tracing::debug!(date = %point.date, "sell skipped: no position");
            }
            None => {}
        }

        walk.state = outcome.state;
        walk.trades.extend(outcome.trade);
        walk.nav.push(outcome.nav);
        walk
    });

    Ok(BacktestOutcome {
        final_state: walk.state,
        nav: walk.nav,
        trades: walk.trades,
        skipped_dates: walk.skipped_dates,
    })
}

/// Re-date each signal onto the price bar after the one it was observed on.
///
/// Returns the shifted schedule and the count of signals that could not be
/// placed (date absent from prices, or observed on the last bar).
fn shift_to_next_bar(prices: &PriceSeries, signals: &[SignalPoint]) -> (Vec<SignalPoint>, usize) {
    let bars = prices.bars();
    let mut shifted = Vec::with_capacity(signals.len());
    let mut dropped = 0;
    for point in signals {
        match prices.index_of(point.date) {
            Some(i) if i + 1 < bars.len() => {
                shifted.push(SignalPoint::new(bars[i + 1].date, point.signal));
            }
            _ => dropped += 1,
        }
    }
    (shifted, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PriceBar, Signal, TradeAction};
    use crate::engine::SizingPolicy;
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn points(start_day: u32, signals: &[i64]) -> Vec<SignalPoint> {
        signals
            .iter()
            .enumerate()
            .map(|(i, &s)| SignalPoint::new(d(start_day + i as u32), Signal::from_i64(s).unwrap()))
            .collect()
    }

    fn fixed(quantity: u64) -> BacktestConfig {
        BacktestConfig::frictionless(10_000.0, SizingPolicy::Fixed { quantity })
    }

    #[test]
    fn round_trip_on_flat_price() {
        let prices = PriceSeries::from_closes("T", d(1), &[100.0; 5]);
        let out = run_backtest(&prices, &points(1, &[0, 1, 0, 0, -1]), &fixed(10)).unwrap();

        assert_eq!(out.trades.len(), 2);
        assert_eq!(out.trades[0].date, d(2));
        assert_eq!(out.trades[0].action, TradeAction::Buy);
        assert_eq!(out.trades[1].date, d(5));
        assert_eq!(out.trades[1].action, TradeAction::Sell);
        assert!(out.nav.iter().all(|p| p.nav == 10_000.0));
        assert_eq!(out.final_state.cash, 10_000.0);
    }

    #[test]
    fn missing_price_dates_are_skipped() {
        let prices = PriceSeries::new(
            "T",
            vec![PriceBar::from_close(d(1), 100.0), PriceBar::from_close(d(3), 100.0)],
        );
        let out = run_backtest(&prices, &points(1, &[0, 1, 0]), &fixed(1)).unwrap();
        assert_eq!(out.nav.len(), 2);
        assert_eq!(out.skipped_dates, 1);
        assert!(out.trades.is_empty());
    }

    #[test]
    fn edge_trigger_tracks_skipped_signal() {
        // a skipped date never reaches the state machine, so day 3 is the first Buy seen
        let prices = PriceSeries::new(
            "T",
            vec![PriceBar::from_close(d(1), 100.0), PriceBar::from_close(d(3), 100.0)],
        );
        let out = run_backtest(&prices, &points(1, &[0, 1, 1]), &fixed(1)).unwrap();
        assert_eq!(out.trades.len(), 1);
        assert_eq!(out.trades[0].date, d(3));
    }

    #[test]
    fn nan_close_is_treated_as_missing() {
        let prices = PriceSeries::from_closes("T", d(1), &[100.0, f64::NAN, 100.0]);
        let out = run_backtest(&prices, &points(1, &[0, 1, 0]), &fixed(1)).unwrap();
        assert_eq!(out.nav.len(), 2);
        assert!(out.trades.is_empty());
    }

    #[test]
    fn rejects_unsorted_inputs() {
        let prices = PriceSeries::from_closes("T", d(1), &[100.0; 3]);
        let mut sigs = points(1, &[0, 1, 0]);
        sigs.swap(0, 2);
        assert!(matches!(
            run_backtest(&prices, &sigs, &fixed(1)),
            Err(EngineError::UnsortedSignals { index: 1 })
        ));

        let unsorted = PriceSeries::new(
            "T",
            vec![PriceBar::from_close(d(2), 1.0), PriceBar::from_close(d(1), 1.0)],
        );
        assert!(matches!(
            run_backtest(&unsorted, &[], &fixed(1)),
            Err(EngineError::UnsortedPrices)
        ));
    }

    #[test]
    fn next_bar_timing_trades_one_bar_later() {
        let prices = PriceSeries::from_closes("T", d(1), &[100.0, 110.0, 120.0, 130.0]);
        let config = fixed(1).with_timing(ExecutionTiming::NextBar);
        let out = run_backtest(&prices, &points(1, &[0, 1, 0, -1]), &config).unwrap();

        assert_eq!(out.trades.len(), 1);
        assert_eq!(out.trades[0].date, d(3));
        assert_eq!(out.trades[0].price, 120.0);
        // the sell observed on the last bar has nowhere to go
        assert_eq!(out.skipped_dates, 1);
        assert_eq!(out.nav.first().map(|p| p.date), Some(d(2)));
    }

    #[test]
    fn invalid_config_is_rejected_before_walking() {
        let prices = PriceSeries::from_closes("T", d(1), &[100.0]);
        let config = BacktestConfig::frictionless(-1.0, SizingPolicy::default());
        assert!(matches!(
            run_backtest(&prices, &points(1, &[0]), &config),
            Err(EngineError::InvalidConfig(_))
        ));
    }
}
