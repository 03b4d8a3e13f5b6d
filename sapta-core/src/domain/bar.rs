//! Bar: the fundamental market data unit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    /// Returns true if any price field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// OHLC sanity: finite, strictly positive prices with open and close
    /// inside [low, high].
    pub fn is_sane(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        if !prices.iter().all(|p| p.is_finite()) {
            return false;
        }
        self.low > 0.0
            && self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }

    /// High minus low.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Where the close sits inside the bar's range: 0.0 = low, 1.0 = high.
    ///
    /// `None` for a zero-range bar, where the position is undefined.
    pub fn close_position(&self) -> Option<f64> {
        let range = self.range();
        if range > 0.0 {
            Some((self.close - self.low) / range)
        } else {
            None
        }
    }

    /// Absolute candle body as a fraction of the range (0.0 for a zero-range bar).
    pub fn body_ratio(&self) -> f64 {
        let range = self.range();
        if range > 0.0 {
            (self.close - self.open).abs() / range
        } else {
            0.0
        }
    }

    pub fn volume_f64(&self) -> f64 {
        self.volume as f64
    }
}
