//! Indicators used by the scoring modules.
//!
//! Indicators are pure functions: bar history in, numeric series out. The
//! output has the same length as the input and the first `lookback()` values
//! are `f64::NAN` (warmup). No value at bar t may depend on bar t+1 or later.

pub mod atr;
pub mod bollinger;
pub mod obv;
pub mod rsi;
pub mod sma;

pub use atr::{true_range, wilder_smooth, Atr};
pub use bollinger::{Bollinger, BollingerBands};
pub use obv::Obv;
pub use rsi::Rsi;
pub use sma::{rolling_mean, Sma};

use crate::domain::Bar;

/// Trait for indicators.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_20", "atr_14").
    fn name(&self) -> &str;

    /// Number of bars needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Arithmetic mean; NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; NaN for an empty slice.
pub fn std_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    if m.is_nan() {
        return f64::NAN;
    }
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Mean volume of `bars`, as f64.
pub fn mean_volume(bars: &[Bar]) -> f64 {
    if bars.is_empty() {
        return f64::NAN;
    }
    bars.iter().map(|b| b.volume_f64()).sum::<f64>() / bars.len() as f64
}

/// Mean high-low range of `bars`.
pub fn mean_range(bars: &[Bar]) -> f64 {
    if bars.is_empty() {
        return f64::NAN;
    }
    bars.iter().map(|b| b.range()).sum::<f64>() / bars.len() as f64
}

/// Create synthetic bars from close prices for testing.
///
/// open = prev_close (or close for the first bar), high = max(open,close) + 1.0,
/// low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                date: base_date + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000,
            }
        })
        .collect()
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

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_std() {
        assert_approx(mean(&[1.0, 2.0, 3.0]), 2.0, DEFAULT_EPSILON);
        assert_approx(std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 2.0, DEFAULT_EPSILON);
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn bar_averages() {
        let bars = make_bars(&[10.0, 11.0, 12.0]);
        assert_approx(mean_volume(&bars), 1000.0, DEFAULT_EPSILON);
        // ranges: 2, 3, 3
        assert_approx(mean_range(&bars), 8.0 / 3.0, DEFAULT_EPSILON);
    }
}
