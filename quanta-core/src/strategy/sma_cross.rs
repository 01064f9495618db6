//! Moving average crossover: golden cross and death cross detection.
//!
//! Buy on the bar where the short SMA goes from <= to > the long SMA,
//! Sell on the bar where it goes from >= to <. Edge-triggered: only the
//! current and immediately preceding bar are compared.

use crate::domain::{PriceBar, Signal};
use crate::indicators::{Indicator, Sma};

pub fn signals(bars: &[PriceBar], short_period: usize, long_period: usize) -> Vec<Signal> {
    let short = Sma::new(short_period).compute(bars);
    let long = Sma::new(long_period).compute(bars);
    crossings(&short, &long)
}

/// Crossing signals from two precomputed series of equal length.
///
/// Any NaN among the four compared values yields `Flat`.
pub fn crossings(short: &[f64], long: &[f64]) -> Vec<Signal> {
    let n = short.len().min(long.len());
    let mut out = vec![Signal::Flat; n];

    for i in 1..n {
        let (s_cur, l_cur) = (short[i], long[i]);
        let (s_prev, l_prev) = (short[i - 1], long[i - 1]);
        if s_cur.is_nan() || l_cur.is_nan() || s_prev.is_nan() || l_prev.is_nan() {
            continue;
        }

        if s_cur > l_cur && s_prev <= l_prev {
            out[i] = Signal::Buy;
        } else if s_cur < l_cur && s_prev >= l_prev {
            out[i] = Signal::Sell;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    #[test]
    fn fires_buy_on_golden_cross() {
        let short = [1.0, 1.0, 3.0, 4.0];
        let long = [2.0, 2.0, 2.0, 2.0];
        assert_eq!(
            crossings(&short, &long),
            vec![Signal::Flat, Signal::Flat, Signal::Buy, Signal::Flat]
        );
    }

    #[test]
    fn fires_sell_on_death_cross() {
        let short = [3.0, 3.0, 1.0, 1.0];
        let long = [2.0, 2.0, 2.0, 2.0];
        assert_eq!(crossings(&short, &long)[2], Signal::Sell);
    }

    #[test]
    fn touching_then_crossing_counts_as_cross() {
        // prev equal, current above → golden cross
        let short = [2.0, 3.0];
        let long = [2.0, 2.0];
        assert_eq!(crossings(&short, &long)[1], Signal::Buy);
    }

    #[test]
    fn no_fire_when_trend_continues() {
        let short = [5.0; 6];
        let long = [4.0; 6];
        assert!(crossings(&short, &long).iter().all(|s| *s == Signal::Flat));
    }

    #[test]
    fn warmup_bars_are_flat() {
        // short=2, long=4: long SMA defined from index 3, crossing needs index 4+
        let bars = make_bars(&[10.0, 9.0, 8.0, 7.0, 12.0, 14.0, 3.0, 2.0]);
        let out = signals(&bars, 2, 4);
        assert!(out[..4].iter().all(|s| *s == Signal::Flat));
        assert_eq!(out.len(), bars.len());
    }

    #[test]
    fn detects_cross_on_prices() {
        // short(1)=close, long(2)=mean of last two closes
        // idx1: 9 vs 9.5 (below), idx2: 12 vs 10.5 (above) → Buy at 2
        // idx3: 8 vs 10 (below) → Sell at 3
        let bars = make_bars(&[10.0, 9.0, 12.0, 8.0]);
        let out = signals(&bars, 1, 2);
        assert_eq!(out, vec![Signal::Flat, Signal::Flat, Signal::Buy, Signal::Sell]);
    }
}
