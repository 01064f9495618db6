//! Property tests for simulator and analyzer invariants.
//!
//! Uses proptest to verify:
//! 1. All-flat signals keep NAV constant and produce no trades
//! 2. Cash never goes negative, whatever the signal pattern
//! 3. Analyzer idempotence on the same NAV series
//! 4. total_return reconstructs the last NAV from the first
//! 5. Monotone prices with no sells give zero drawdown
//! 6. A flat stretch longer than the oscillator period reads neutral

use chrono::NaiveDate;
use proptest::prelude::*;
use quanta_core::domain::{
    nav_values, NavPoint, ParamId, ParameterSet, PriceSeries, RunDescriptor, Signal, SignalPoint,
};
use quanta_core::engine::{run_backtest, BacktestConfig, SizingPolicy};
use quanta_core::indicators::{Indicator, RollingRsi};
use quanta_core::strategy::{generate_signals, Strategy as TradingStrategy};
use quanta_core::performance::{analyze, max_drawdown, total_return};

// ── Generators ───────────────────────────────────────────────────────

fn arb_closes(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec((1.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0), 1..max_len)
}

fn arb_signal() -> impl Strategy<Value = Signal> {
    prop_oneof![Just(Signal::Sell), Just(Signal::Flat), Just(Signal::Buy)]
}

fn arb_sizing() -> impl Strategy<Value = SizingPolicy> {
    prop_oneof![
        (1u64..200).prop_map(|quantity| SizingPolicy::Fixed { quantity }),
        (0.01..=1.0_f64).prop_map(|fraction| SizingPolicy::Percent { fraction }),
    ]
}

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
}

fn dated(signals: &[Signal]) -> Vec<SignalPoint> {
    signals
        .iter()
        .enumerate()
        .map(|(i, &s)| SignalPoint::new(start() + chrono::Duration::days(i as i64), s))
        .collect()
}

fn descriptor() -> RunDescriptor {
    RunDescriptor::new("RSI", "SPY", ParamId::from_index(1), ParameterSet::new())
}

// ── 1. Flat signals ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn flat_signals_keep_nav_constant(closes in arb_closes(60), cash in 1.0..1e6_f64) {
        let prices = PriceSeries::from_closes("SPY", start(), &closes);
        let config = BacktestConfig::new(cash, 0.001425, 0.0005, SizingPolicy::default());
        let out = run_backtest(&prices, &dated(&vec![Signal::Flat; closes.len()]), &config).unwrap();

        prop_assert!(out.trades.is_empty());
        prop_assert_eq!(out.nav.len(), closes.len());
        for point in &out.nav {
            prop_assert_eq!(point.nav, cash);
        }
    }
}

// ── 2. Cash stays non-negative ───────────────────────────────────────

proptest! {
    #[test]
    fn cash_never_negative(
        (closes, signals) in arb_closes(80).prop_flat_map(|c| {
            let n = c.len();
            (Just(c), prop::collection::vec(arb_signal(), n))
        }),
        sizing in arb_sizing(),
        fee in 0.0..0.01_f64,
        slippage in 0.0..0.01_f64,
    ) {
        let prices = PriceSeries::from_closes("SPY", start(), &closes);
        let config = BacktestConfig::new(10_000.0, fee, slippage, sizing);
        let out = run_backtest(&prices, &dated(&signals), &config).unwrap();

        prop_assert!(out.final_state.cash >= 0.0);
        for trade in &out.trades {
            prop_assert!(trade.cash_after >= 0.0);
            prop_assert!(trade.quantity > 0);
        }
    }
}

// ── 3 & 4. Analyzer ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn analyzer_is_idempotent(values in prop::collection::vec(1.0..1e6_f64, 1..100)) {
        let nav: Vec<NavPoint> = values
            .iter()
            .enumerate()
            .map(|(i, &nav)| NavPoint { date: start() + chrono::Duration::days(i as i64), nav })
            .collect();
        let first = analyze(&nav, &descriptor()).unwrap();
        let second = analyze(&nav, &descriptor()).unwrap();
        prop_assert_eq!(first.total_return, second.total_return);
        prop_assert_eq!(first.max_drawdown, second.max_drawdown);
    }

    #[test]
    fn total_return_reconstructs_last_nav(values in prop::collection::vec(1.0..1e6_f64, 2..100)) {
        let first = values[0];
        let last = values[values.len() - 1];
        let rebuilt = first * (1.0 + total_return(&values));
        prop_assert!((rebuilt - last).abs() <= 1e-9 * last.max(1.0));
    }

    #[test]
    fn drawdown_is_a_fraction(values in prop::collection::vec(1.0..1e6_f64, 1..100)) {
        let dd = max_drawdown(&values);
        prop_assert!((0.0..1.0).contains(&dd));
    }
}

// ── 5. Monotone prices ───────────────────────────────────────────────

proptest! {
    #[test]
    fn rising_prices_without_sells_have_no_drawdown(
        steps in prop::collection::vec(0.01..5.0_f64, 2..60),
        buy_at in 0usize..10,
    ) {
        let closes: Vec<f64> = steps
            .iter()
            .scan(50.0, |price, step| {
                *price += step;
                Some(*price)
            })
            .collect();
        let signals: Vec<Signal> = (0..closes.len())
            .map(|i| if i == buy_at.min(closes.len() - 1) { Signal::Buy } else { Signal::Flat })
            .collect();
        let prices = PriceSeries::from_closes("SPY", start(), &closes);
        let config = BacktestConfig::frictionless(100_000.0, SizingPolicy::Fixed { quantity: 10 });
        let out = run_backtest(&prices, &dated(&signals), &config).unwrap();

        // cash + qty * close may round a hair below the pre-buy NAV
        prop_assert!(max_drawdown(&nav_values(&out.nav)) < 1e-12);
    }
}

// ── 6. Flat tail after movement ──────────────────────────────────────

proptest! {
    #[test]
    fn flat_tail_reads_neutral(
        moving in arb_closes(40),
        period in 2usize..15,
        extra in 0usize..10,
    ) {
        let flat = *moving.last().unwrap();
        let mut closes = moving.clone();
        closes.extend(std::iter::repeat(flat).take(period + extra));
        let prices = PriceSeries::from_closes("SPY", start(), &closes);

        let rsi = RollingRsi::new(period).compute(prices.bars());
        let strategy = TradingStrategy::Rsi { period, overbought: 70.0, oversold: 30.0 };
        let signals = generate_signals(&prices, &strategy).unwrap();

        // every window that lies wholly inside the flat run has only zero deltas
        let first_flat_window = moving.len() + period - 1;
        for i in first_flat_window..closes.len() {
            prop_assert_eq!(rsi[i], 50.0);
            prop_assert_eq!(signals[i].signal, Signal::Flat);
        }
    }
}
