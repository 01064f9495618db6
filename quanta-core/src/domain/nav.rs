//! NavPoint: mark-to-market portfolio value on one date.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NavPoint {
    pub date: NaiveDate,
    pub nav: f64,
}

/// Bare NAV values in series order.
pub fn nav_values(points: &[NavPoint]) -> Vec<f64> {
    points.iter().map(|p| p.nav).collect()
}
