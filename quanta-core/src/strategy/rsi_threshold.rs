//! Oscillator threshold signal: Buy below `oversold`, Sell above `overbought`.

use crate::domain::{PriceBar, Signal};
use crate::indicators::{Indicator, RollingRsi};

pub fn signals(bars: &[PriceBar], period: usize, overbought: f64, oversold: f64) -> Vec<Signal> {
    RollingRsi::new(period)
        .compute(bars)
        .into_iter()
        .map(|value| classify(value, overbought, oversold))
        .collect()
}

/// Map one oscillator value to a signal. NaN (warm-up) is `Flat`.
pub fn classify(value: f64, overbought: f64, oversold: f64) -> Signal {
    if value < oversold {
        Signal::Buy
    } else if value > overbought {
        Signal::Sell
    } else {
        Signal::Flat
    }
}
