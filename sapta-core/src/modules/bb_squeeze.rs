//! Bollinger Band squeeze.
//!
//! Bands are BB(20, 2); width is `(upper - lower) / middle`.
//! - width at or below its 20-bar rolling minimum: +8
//! - close in the bottom quarter of the bands: +4
//! - lower band tested as support in the last 10 bars and price back above
//!   it: +3

use super::{ratio, Detector, Scorecard};
use crate::domain::{Bar, ModuleId, ModuleScore};
use crate::indicators::Bollinger;

const MAX_SCORE: f64 = 15.0;
const LOOKBACK: usize = 40;

const SQUEEZE_POINTS: f64 = 8.0;
const LOWER_BAND_POINTS: f64 = 4.0;
const SUPPORT_POINTS: f64 = 3.0;

/// Tolerance when comparing the current width with the rolling minimum.
const WIDTH_EPS: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct BbSqueeze {
    pub period: usize,
    pub multiplier: f64,
    pub min_width_period: usize,
    pub near_lower_max: f64,
    pub support_lookback: usize,
    pub touch_tolerance: f64,
}

impl Default for BbSqueeze {
    fn default() -> Self {
        Self {
            period: 20,
            multiplier: 2.0,
            min_width_period: 20,
            near_lower_max: 0.25,
            support_lookback: 10,
            touch_tolerance: 0.005,
        }
    }
}

impl Detector for BbSqueeze {
    fn id(&self) -> ModuleId {
        ModuleId::BbSqueeze
    }

    fn max_score(&self) -> f64 {
        MAX_SCORE
    }

    fn lookback(&self) -> usize {
        LOOKBACK
    }

    fn score(&self, bars: &[Bar]) -> ModuleScore {
        let mut card = Scorecard::new();
        let n = bars.len();
        let last = n - 1;
        let bands = Bollinger::new(self.period, self.multiplier).bands(bars);

        let width = bands.width[last];
        let recent_widths: Vec<f64> = bands.width[n.saturating_sub(self.min_width_period)..]
            .iter()
            .copied()
            .filter(|w| w.is_finite())
            .collect();
        let min_width = recent_widths.iter().copied().fold(f64::INFINITY, f64::min);
        card.diag("width_current", width);
        card.diag("width_ratio_to_min", ratio(width, min_width));

        let valid_widths: Vec<f64> =
            bands.width.iter().copied().filter(|w| w.is_finite()).collect();
        let below = valid_widths.iter().filter(|&&w| w <= width).count();
        card.diag("width_percentile", ratio(below as f64, valid_widths.len() as f64));

        if width > 0.0 && width <= min_width + WIDTH_EPS {
            card.fire(
                SQUEEZE_POINTS,
                format!("band width {:.4} at its {}-bar minimum", width, self.min_width_period),
            );
        }

        // Bars in a row whose width sits within 10% of the window minimum.
        let squeeze_duration = bands
            .width
            .iter()
            .rev()
            .take_while(|w| w.is_finite() && min_width > 0.0 && **w <= min_width * 1.1)
            .count();
        card.diag("squeeze_duration", squeeze_duration as f64);

        let position = bands.position(last, bars[last].close);
        card.diag("price_position", position.unwrap_or(0.5));
        if let Some(p) = position.filter(|&p| p <= self.near_lower_max) {
            card.fire(
                LOWER_BAND_POINTS,
                format!("close at {:.0}% of band range", p * 100.0),
            );
        }

        let touches = (n.saturating_sub(self.support_lookback)..n)
            .filter(|&i| {
                let lower = bands.lower[i];
                lower.is_finite()
                    && bars[i].low <= lower * (1.0 + self.touch_tolerance)
                    && bars[i].close >= lower
            })
            .count();
        card.diag("support_touches", touches as f64);
        let lower_now = bands.lower[last];
        if touches > 0 && lower_now.is_finite() && bars[last].close > lower_now {
            card.fire(
                SUPPORT_POINTS,
                format!("lower band held as support ({touches} touch(es))"),
            );
        }

        card.finish(ModuleId::BbSqueeze, MAX_SCORE)
    }
}
