//! Volatility compression: the coil before the spring.
//!
//! - ATR(14) below half of its own 50-bar average: +10
//! - mean range of the last 5 bars below 80% of the 20-bar mean range: +6
//! - at least 5 consecutive bars with range below 60% of the 50-bar mean
//!   range: +4

use super::absorption::higher_lows_streak;
use super::{ratio, Detector, Scorecard};
use crate::domain::{Bar, ModuleId, ModuleScore};
use crate::indicators::{mean, mean_range, Atr, Indicator};

const MAX_SCORE: f64 = 20.0;
const LOOKBACK: usize = 64;

const ATR_POINTS: f64 = 10.0;
const RANGE_POINTS: f64 = 6.0;
const STREAK_POINTS: f64 = 4.0;

#[derive(Debug, Clone)]
pub struct Compression {
    pub atr_period: usize,
    pub atr_avg_period: usize,
    pub atr_ratio_max: f64,
    pub short_range_period: usize,
    pub long_range_period: usize,
    pub range_ratio_max: f64,
    pub low_vol_factor: f64,
    pub min_low_vol_days: usize,
}

impl Default for Compression {
    fn default() -> Self {
        Self {
            atr_period: 14,
            atr_avg_period: 50,
            atr_ratio_max: 0.5,
            short_range_period: 5,
            long_range_period: 20,
            range_ratio_max: 0.8,
            low_vol_factor: 0.6,
            min_low_vol_days: 5,
        }
    }
}

impl Detector for Compression {
    fn id(&self) -> ModuleId {
        ModuleId::Compression
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

        let atr = Atr::new(self.atr_period).compute(bars);
        let current_atr = atr[n - 1];
        let atr_tail: Vec<f64> = atr[n.saturating_sub(self.atr_avg_period)..]
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .collect();
        let atr_avg = mean(&atr_tail);
        let atr_ratio = ratio(current_atr, atr_avg);
        card.diag("atr_ratio", atr_ratio);
        let atr_prev = n.checked_sub(6).map_or(f64::NAN, |i| atr[i]);
        card.diag("atr_slope", ratio(current_atr - atr_prev, atr_prev));
        if atr_avg > 0.0 && current_atr < self.atr_ratio_max * atr_avg {
            card.fire(
                ATR_POINTS,
                format!(
                    "ATR at {:.0}% of its {}-bar average",
                    atr_ratio * 100.0,
                    self.atr_avg_period
                ),
            );
        }

        let short = mean_range(&bars[n - self.short_range_period.min(n)..]);
        let long = mean_range(&bars[n - self.long_range_period.min(n)..]);
        let contraction = ratio(short, long);
        card.diag("range_contraction", contraction);
        if long > 0.0 && short < self.range_ratio_max * long {
            card.fire(
                RANGE_POINTS,
                format!(
                    "{}-bar range at {:.0}% of {}-bar range",
                    self.short_range_period,
                    contraction * 100.0,
                    self.long_range_period
                ),
            );
        }

        let reference = mean_range(&bars[n.saturating_sub(self.atr_avg_period)..]);
        let streak = if reference > 0.0 {
            bars.iter()
                .rev()
                .take_while(|b| b.range() < self.low_vol_factor * reference)
                .count()
        } else {
            0
        };
        card.diag("low_vol_streak", streak as f64);
        if streak >= self.min_low_vol_days {
            card.fire(STREAK_POINTS, format!("{streak} consecutive low-volatility days"));
        }

        let recent = &bars[n.saturating_sub(10)..];
        card.diag("higher_lows", higher_lows_streak(recent) as f64);
        let lower_highs = recent
            .windows(2)
            .rev()
            .take_while(|w| w[1].high < w[0].high)
            .count();
        card.diag("lower_highs", lower_highs as f64);
        let bodies: Vec<f64> = recent.iter().map(|b| b.body_ratio()).collect();
        card.diag("avg_body_ratio", mean(&bodies));

        card.finish(ModuleId::Compression, MAX_SCORE)
    }
}
