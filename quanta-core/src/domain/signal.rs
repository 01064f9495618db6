//! Discrete trade signals.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A discrete signal value. Serialized as the integers `-1`, `0`, `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Signal {
    Sell,
    #[default]
    Flat,
    Buy,
}

/// A signal value outside `{-1, 0, 1}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("signal value {0} is not one of -1, 0, 1")]
pub struct InvalidSignal(pub i64);

impl Signal {
    pub fn as_i8(self) -> i8 {
        match self {
            Signal::Sell => -1,
            Signal::Flat => 0,
            Signal::Buy => 1,
        }
    }

    pub fn from_i64(value: i64) -> Result<Self, InvalidSignal> {
        match value {
            -1 => Ok(Signal::Sell),
            0 => Ok(Signal::Flat),
            1 => Ok(Signal::Buy),
            other => Err(InvalidSignal(other)),
        }
    }

    pub fn is_actionable(self) -> bool {
        self != Signal::Flat
    }
}

impl From<Signal> for i8 {
    fn from(signal: Signal) -> Self {
        signal.as_i8()
    }
}

impl TryFrom<i8> for Signal {
    type Error = InvalidSignal;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        Signal::from_i64(value as i64)
    }
}

/// Signal observed on a single date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalPoint {
    pub date: NaiveDate,
    pub signal: Signal,
}

impl SignalPoint {
    pub fn new(date: NaiveDate, signal: Signal) -> Self {
        Self { date, signal }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_conversion() {
        assert_eq!(Signal::from_i64(-1), Ok(Signal::Sell));
        assert_eq!(Signal::from_i64(0), Ok(Signal::Flat));
        assert_eq!(Signal::from_i64(1), Ok(Signal::Buy));
        assert_eq!(Signal::from_i64(2), Err(InvalidSignal(2)));
        assert_eq!(i8::from(Signal::Sell), -1);
    }

    #[test]
    fn serializes_as_integer() {
        let point = SignalPoint::new(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), Signal::Sell);
        let json = serde_json::to_string(&point).unwrap();
        assert_eq!(json, r#"{"date":"2024-03-01","signal":-1}"#);
        let back: SignalPoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, point);
    }

    #[test]
    fn rejects_out_of_range_integer() {
        let err = serde_json::from_str::<Signal>("3");
        assert!(err.is_err());
    }

    #[test]
    fn flat_is_default_and_not_actionable() {
        assert_eq!(Signal::default(), Signal::Flat);
        assert!(!Signal::Flat.is_actionable());
        assert!(Signal::Buy.is_actionable());
    }
}
