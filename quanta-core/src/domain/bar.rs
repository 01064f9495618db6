//! PriceBar and PriceSeries: the market data the core consumes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar. Only `close` is used by the signal engine and simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl PriceBar {
    /// Bar where every price field equals `close` and volume is zero.
    pub fn from_close(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0,
        }
    }

    /// True when the close is missing (NaN) or non-finite.
    pub fn is_void(&self) -> bool {
        !self.close.is_finite()
    }
}

/// Date-indexed price history for one symbol.
///
/// Bars are expected in strictly increasing date order. The series never
/// re-sorts its input; use [`PriceSeries::is_sorted`] to check before use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<PriceBar>) -> Self {
        Self {
            symbol: symbol.into(),
            bars,
        }
    }

    /// Build a series of consecutive calendar days from close prices.
    pub fn from_closes(symbol: impl Into<String>, start: NaiveDate, closes: &[f64]) -> Self {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar::from_close(start + chrono::Duration::days(i as i64), close))
            .collect();
        Self::new(symbol, bars)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Whether dates are strictly increasing (no duplicates, no reordering).
    pub fn is_sorted(&self) -> bool {
        self.bars.windows(2).all(|w| w[0].date < w[1].date)
    }

    /// Position of `date` in the series. Requires sorted input.
    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.bars.binary_search_by_key(&date, |b| b.date).ok()
    }

    /// Close price on `date`, or `None` when the date is absent.
    pub fn close_on(&self, date: NaiveDate) -> Option<f64> {
        self.index_of(date).map(|i| self.bars[i].close)
    }

    /// Sub-series with dates inside `[start, end]`; either bound may be open.
    pub fn between(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        let bars = self
            .bars
            .iter()
            .filter(|b| start.map_or(true, |s| b.date >= s))
            .filter(|b| end.map_or(true, |e| b.date <= e))
            .cloned()
            .collect();
        Self::new(self.symbol.clone(), bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn from_closes_builds_consecutive_days() {
        let series = PriceSeries::from_closes("SPY", d(2), &[10.0, 11.0, 12.0]);
        assert_eq!(series.len(), 3);
        assert_eq!(series.bars()[2].date, d(4));
        assert_eq!(series.closes(), vec![10.0, 11.0, 12.0]);
        assert!(series.is_sorted());
    }

    #[test]
    fn close_lookup_by_date() {
        let series = PriceSeries::from_closes("SPY", d(2), &[10.0, 11.0, 12.0]);
        assert_eq!(series.close_on(d(3)), Some(11.0));
        assert_eq!(series.close_on(d(9)), None);
    }

    #[test]
    fn detects_unsorted_and_duplicate_dates() {
        let unsorted = PriceSeries::new(
            "SPY",
            vec![PriceBar::from_close(d(3), 1.0), PriceBar::from_close(d(2), 1.0)],
        );
        assert!(!unsorted.is_sorted());

        let duplicate = PriceSeries::new(
            "SPY",
            vec![PriceBar::from_close(d(2), 1.0), PriceBar::from_close(d(2), 1.0)],
        );
        assert!(!duplicate.is_sorted());
    }

    #[test]
    fn between_filters_inclusive_bounds() {
        let series = PriceSeries::from_closes("SPY", d(1), &[1.0, 2.0, 3.0, 4.0, 5.0]);
        let sub = series.between(Some(d(2)), Some(d(4)));
        assert_eq!(sub.closes(), vec![2.0, 3.0, 4.0]);
        assert_eq!(series.between(None, None).len(), 5);
    }

    #[test]
    fn void_bar_detection() {
        assert!(PriceBar::from_close(d(1), f64::NAN).is_void());
        assert!(!PriceBar::from_close(d(1), 100.0).is_void());
    }
}
