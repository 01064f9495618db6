//! Relative Strength Index over simple rolling means.
//!
//! avg_gain / avg_loss are plain rolling means of the positive and negative
//! close-to-close deltas (no Wilder smoothing). The first bar has no prior
//! close and contributes a zero delta, so the first value lands at index
//! `period - 1`.
//!
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! Edge cases: avg_loss == 0 and avg_gain > 0 → 100; both zero → 50.

use super::{rolling_mean, Indicator};
use crate::domain::PriceBar;

#[derive(Debug, Clone)]
pub struct RollingRsi {
    period: usize,
    name: String,
}

impl RollingRsi {
    /// Callers validate `period >= 1` before construction (see `Strategy::validate`).
    pub fn new(period: usize) -> Self {
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for RollingRsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[PriceBar]) -> Vec<f64> {
        let n = bars.len();
        let mut gains = vec![0.0; n];
        let mut losses = vec![0.0; n];

        for i in 1..n {
            let delta = bars[i].close - bars[i - 1].close;
            if delta.is_nan() {
                gains[i] = f64::NAN;
                losses[i] = f64::NAN;
            } else if delta > 0.0 {
                gains[i] = delta;
            } else {
                losses[i] = -delta;
            }
        }

        let avg_gain = rolling_mean(&gains, self.period);
        let avg_loss = rolling_mean(&losses, self.period);

        avg_gain
            .iter()
            .zip(&avg_loss)
            .map(|(&g, &l)| oscillator(g, l))
            .collect()
    }
}

/// Oscillator value from average gain and loss, with explicit zero-division policy.
///
/// NaN inputs (warm-up) yield NaN.
pub fn oscillator(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_gain.is_nan() || avg_loss.is_nan() {
        f64::NAN
    } else if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}
