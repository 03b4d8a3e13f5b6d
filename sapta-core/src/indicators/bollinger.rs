//! Bollinger Bands: moving average +/- standard deviation multiplier.
//!
//! - Middle: SMA(close, period)
//! - Upper/Lower: middle +/- mult * population stddev(close, period)
//! - Width: (upper - lower) / middle
//!
//! Lookback: period - 1. The `Indicator` impl yields the width series, which
//! is what squeeze detection consumes.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
    name: String,
}

/// All band series for one parameterization, index-aligned with the bars.
#[derive(Debug, Clone, Default)]
pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
    pub width: Vec<f64>,
}

impl BollingerBands {
    /// Position of `price` inside the bands at index `i`: 0.0 = lower, 1.0 = upper.
    pub fn position(&self, i: usize, price: f64) -> Option<f64> {
        let (u, l) = (*self.upper.get(i)?, *self.lower.get(i)?);
        let span = u - l;
        if span.is_finite() && span > 0.0 {
            Some((price - l) / span)
        } else {
            None
        }
    }
}

impl Bollinger {
    pub fn new(period: usize, multiplier: f64) -> Self {
        assert!(period >= 1, "Bollinger period must be >= 1");
        Self {
            period,
            multiplier,
            name: format!("bollinger_width_{period}_{multiplier}"),
        }
    }

    pub fn bands(&self, bars: &[Bar]) -> BollingerBands {
        let n = bars.len();
        let mut out = BollingerBands {
            upper: vec![f64::NAN; n],
            middle: vec![f64::NAN; n],
            lower: vec![f64::NAN; n],
            width: vec![f64::NAN; n],
        };
        if n < self.period {
            return out;
        }

        for i in (self.period - 1)..n {
            let window = &bars[i + 1 - self.period..=i];
            if window.iter().any(|b| b.close.is_nan()) {
                continue;
            }
            let mean = window.iter().map(|b| b.close).sum::<f64>() / self.period as f64;
            let variance = window
                .iter()
                .map(|b| (b.close - mean) * (b.close - mean))
                .sum::<f64>()
                / self.period as f64;
            let half = self.multiplier * variance.sqrt();

            out.middle[i] = mean;
            out.upper[i] = mean + half;
            out.lower[i] = mean - half;
            out.width[i] = if mean != 0.0 { 2.0 * half / mean } else { f64::NAN };
        }
        out
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        self.bands(bars).width
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn middle_is_sma() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let bands = Bollinger::new(3, 2.0).bands(&bars);
        assert!(bands.middle[1].is_nan());
        assert_approx(bands.middle[2], 11.0, DEFAULT_EPSILON);
        assert_approx(bands.middle[3], 12.0, DEFAULT_EPSILON);
    }

    #[test]
    fn bands_symmetric() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let b = Bollinger::new(3, 2.0).bands(&bars);
        for i in 2..5 {
            assert_approx(b.upper[i] - b.middle[i], b.middle[i] - b.lower[i], DEFAULT_EPSILON);
        }
    }

    #[test]
    fn constant_price_zero_width() {
        let bars = make_bars(&[100.0; 4]);
        let b = Bollinger::new(3, 2.0).bands(&bars);
        assert_approx(b.width[3], 0.0, DEFAULT_EPSILON);
        // Degenerate bands have no defined position.
        assert!(b.position(3, 100.0).is_none());
    }

    #[test]
    fn position_inside_bands() {
        let bars = make_bars(&[10.0, 11.0, 12.0]);
        let b = Bollinger::new(3, 2.0).bands(&bars);
        assert_approx(b.position(2, b.lower[2]).unwrap(), 0.0, DEFAULT_EPSILON);
        assert_approx(b.position(2, b.middle[2]).unwrap(), 0.5, DEFAULT_EPSILON);
    }

    #[test]
    fn lookback() {
        assert_eq!(Bollinger::new(20, 2.0).lookback(), 19);
    }
}
