//! OHLCV series: one ticker's ordered daily history.

use serde::{Deserialize, Serialize};

use super::Bar;
use crate::error::SaptaError;

/// Bars required by the longest module lookback.
pub const MIN_HISTORY_BARS: usize = 120;

/// Immutable daily history for one ticker, dates strictly increasing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OhlcvSeries {
    ticker: String,
    bars: Vec<Bar>,
}

impl OhlcvSeries {
    /// Build a series, rejecting empty input, non-increasing dates and bars
    /// that fail [`Bar::is_sane`].
    pub fn new(ticker: impl Into<String>, bars: Vec<Bar>) -> Result<Self, SaptaError> {
        let ticker = ticker.into();
        if bars.is_empty() {
            return Err(SaptaError::EmptySeries { ticker });
        }
        if let Some(pos) = bars.windows(2).position(|w| w[1].date <= w[0].date) {
            return Err(SaptaError::InvalidSeries {
                reason: format!(
                    "dates not strictly increasing at index {}: {} after {}",
                    pos + 1,
                    bars[pos + 1].date,
                    bars[pos].date
                ),
                ticker,
            });
        }
        if let Some(bar) = bars.iter().find(|b| !b.is_sane()) {
            let reason = if bar.is_void() {
                format!("void bar on {}", bar.date)
            } else {
                format!(
                    "malformed bar on {}: o={} h={} l={} c={}",
                    bar.date, bar.open, bar.high, bar.low, bar.close
                )
            };
            return Err(SaptaError::InvalidSeries { reason, ticker });
        }
        Ok(Self { ticker, bars })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> &Bar {
        // Non-empty by construction.
        &self.bars[self.bars.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(day: u32, close: f64) -> Bar {
        Bar {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000,
        }
    }

    #[test]
    fn accepts_increasing_dates() {
        let s = OhlcvSeries::new("BBCA", vec![bar(2, 10.0), bar(3, 11.0)]).unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s.last().close, 11.0);
    }

    #[test]
    fn rejects_empty() {
        let err = OhlcvSeries::new("BBCA", vec![]).unwrap_err();
        assert!(matches!(err, SaptaError::EmptySeries { .. }));
    }

    #[test]
    fn rejects_duplicate_dates() {
        let err = OhlcvSeries::new("BBCA", vec![bar(2, 10.0), bar(2, 11.0)]).unwrap_err();
        assert!(matches!(err, SaptaError::InvalidSeries { .. }));
    }

    #[test]
    fn rejects_void_bar() {
        let mut b = bar(3, 11.0);
        b.close = f64::NAN;
        let err = OhlcvSeries::new("BBCA", vec![bar(2, 10.0), b]).unwrap_err();
        assert!(err.to_string().contains("void bar"));
    }

    #[test]
    fn rejects_infinite_price() {
        let mut b = bar(3, 11.0);
        b.high = f64::INFINITY;
        let err = OhlcvSeries::new("BBCA", vec![bar(2, 10.0), b]).unwrap_err();
        assert!(matches!(err, SaptaError::InvalidSeries { .. }));
        assert!(err.to_string().contains("malformed bar"));
    }

    #[test]
    fn rejects_non_positive_price() {
        let mut b = bar(3, 0.5);
        b.low = -0.5;
        let err = OhlcvSeries::new("BBCA", vec![bar(2, 10.0), b]).unwrap_err();
        assert!(err.to_string().contains("malformed bar"));
    }

    #[test]
    fn rejects_high_below_low() {
        let mut b = bar(3, 11.0);
        b.high = 9.0;
        b.low = 12.0;
        let err = OhlcvSeries::new("BBCA", vec![bar(2, 10.0), b]).unwrap_err();
        assert!(matches!(err, SaptaError::InvalidSeries { .. }));
    }
}
