//! Rolling technical indicators.
//!
//! Indicators are pure functions: bar history in, numeric series out. Every
//! output has the same length as the input and carries `f64::NAN` until the
//! rolling window is fully populated. The signal layer maps those warm-up
//! values to `Signal::Flat`, so NaN never reaches the simulator.

pub mod rsi;
pub mod sma;

pub use rsi::{oscillator, RollingRsi};
pub use sma::Sma;

use crate::domain::PriceBar;

/// Trait for indicators.
///
/// # Look-ahead guard
/// No value at bar t may depend on data from bar t+1 or later.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_20", "rsi_14").
    fn name(&self) -> &str;

    /// Number of leading bars that are always NaN.
    fn lookback(&self) -> usize;

    /// Compute the indicator over the entire bar series.
    fn compute(&self, bars: &[PriceBar]) -> Vec<f64>;
}

/// Simple rolling mean over `window` values.
///
/// Output index `i` is the mean of `values[i+1-window..=i]`, NaN before the
/// window fills or while any NaN is inside the window. A window holding only
/// zeros yields exactly `0.0`, whatever rounding the running sum carries.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if window == 0 || n < window {
        return out;
    }

    let mut sum = 0.0;
    let mut nan_count = 0usize;
    let mut nonzero_count = 0usize;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            nan_count += 1;
        } else {
            sum += v;
            if v != 0.0 {
                nonzero_count += 1;
            }
        }

        if i >= window {
            let leaving = values[i - window];
            if leaving.is_nan() {
                nan_count -= 1;
            } else {
                sum -= leaving;
                if leaving != 0.0 {
                    nonzero_count -= 1;
                }
            }
        }

        if nonzero_count == 0 {
            sum = 0.0;
        }

        if i + 1 >= window && nan_count == 0 {
            out[i] = sum / window as f64;
        }
    }
    out
}

/// Create synthetic bars from close prices for testing.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<PriceBar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    crate::domain::PriceSeries::from_closes("TEST", base_date, closes)
        .bars()
        .to_vec()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_mean_basic() {
        let out = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 2);
        assert!(out[0].is_nan());
        assert_approx(out[1], 1.5, DEFAULT_EPSILON);
        assert_approx(out[2], 2.5, DEFAULT_EPSILON);
        assert_approx(out[3], 3.5, DEFAULT_EPSILON);
    }

    #[test]
    fn rolling_mean_nan_leaves_window() {
        let out = rolling_mean(&[1.0, f64::NAN, 3.0, 4.0, 5.0], 2);
        assert!(out[1].is_nan());
        assert!(out[2].is_nan());
        assert_approx(out[3], 3.5, DEFAULT_EPSILON);
        assert_approx(out[4], 4.5, DEFAULT_EPSILON);
    }

    #[test]
    fn rolling_mean_all_zero_window_is_exact() {
        let out = rolling_mean(&[1.48, 0.0, 3.47, 4.5, 0.0, 8.14, 1.42, 0.0, 0.0, 0.0], 3);
        assert!(out[8] > 0.0);
        assert_eq!(out[9], 0.0);
    }

    #[test]
    fn rolling_mean_short_input_or_zero_window() {
        assert!(rolling_mean(&[1.0], 3).iter().all(|v| v.is_nan()));
        assert!(rolling_mean(&[1.0, 2.0], 0).iter().all(|v| v.is_nan()));
        assert!(rolling_mean(&[], 3).is_empty());
    }
}
