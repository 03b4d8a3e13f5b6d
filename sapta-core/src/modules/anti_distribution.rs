//! Anti-distribution filter. Penalty only: the raw score is never positive.
//!
//! - heavy-volume weak close in the last 5 bars (volume >= 1.5x average,
//!   close in the lower third, close below the previous close): -8
//! - breakout above the prior 20-bar high in the last 10 bars that has since
//!   failed back below the breakout level: -5
//! - price up >= 3% over 10 bars while OBV falls: -4

use super::{prior_mean_volume, ratio, Detector, Scorecard};
use crate::domain::{Bar, ModuleId, ModuleScore};
use crate::indicators::{Indicator, Obv};

/// Penalty budget: the sum of all penalties.
const MAX_SCORE: f64 = 17.0;
const LOOKBACK: usize = 30;
const VOLUME_AVG_PERIOD: usize = 20;

const WEAK_CLOSE_PENALTY: f64 = -8.0;
const FAILED_BREAKOUT_PENALTY: f64 = -5.0;
const OBV_DIVERGENCE_PENALTY: f64 = -4.0;

#[derive(Debug, Clone)]
pub struct AntiDistribution {
    pub weak_close_lookback: usize,
    pub volume_ratio: f64,
    pub breakout_lookback: usize,
    pub breakout_period: usize,
    pub divergence_period: usize,
    pub divergence_min_gain: f64,
}

impl Default for AntiDistribution {
    fn default() -> Self {
        Self {
            weak_close_lookback: 5,
            volume_ratio: 1.5,
            breakout_lookback: 10,
            breakout_period: 20,
            divergence_period: 10,
            divergence_min_gain: 0.03,
        }
    }
}

impl Detector for AntiDistribution {
    fn id(&self) -> ModuleId {
        ModuleId::AntiDistribution
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
        let last = bars[n - 1];

        let mut worst_ratio = 0.0f64;
        let weak_closes = (n.saturating_sub(self.weak_close_lookback).max(1)..n)
            .filter(|&i| {
                let b = bars[i];
                let vr = prior_mean_volume(bars, i, VOLUME_AVG_PERIOD)
                    .map_or(0.0, |avg| ratio(b.volume_f64(), avg));
                let hit = vr >= self.volume_ratio
                    && b.close_position().map_or(false, |p| p <= 0.33)
                    && b.close < bars[i - 1].close;
                if hit {
                    worst_ratio = worst_ratio.max(vr);
                }
                hit
            })
            .count();
        card.diag("weak_close_volume_ratio", worst_ratio);
        if weak_closes > 0 {
            card.fire(
                WEAK_CLOSE_PENALTY,
                format!("heavy-volume weak close ({worst_ratio:.1}x volume)"),
            );
        }

        // Highest breakout level cleared in the lookback, if any.
        let mut breakout_level: Option<f64> = None;
        for i in n.saturating_sub(self.breakout_lookback)..n {
            let Some(start) = i.checked_sub(self.breakout_period) else {
                continue;
            };
            let prior_high = bars[start..i].iter().map(|b| b.high).fold(f64::MIN, f64::max);
            if bars[i].close > prior_high {
                breakout_level =
                    Some(breakout_level.map_or(prior_high, |l: f64| l.max(prior_high)));
            }
        }
        let failed = breakout_level.is_some_and(|level| last.close < level);
        card.flag("failed_breakout", failed);
        if let (true, Some(level)) = (failed, breakout_level) {
            card.fire(
                FAILED_BREAKOUT_PENALTY,
                format!("breakout above {level:.2} failed, close back at {:.2}", last.close),
            );
        }

        let obv = Obv.compute(bars);
        let back = n - 1 - self.divergence_period.min(n - 1);
        let price_change = ratio(last.close - bars[back].close, bars[back].close);
        let obv_change = obv[n - 1] - obv[back];
        card.diag("price_change_10", price_change);
        let divergence = price_change >= self.divergence_min_gain && obv_change < 0.0;
        card.flag("obv_divergence", divergence);
        if divergence {
            card.fire(
                OBV_DIVERGENCE_PENALTY,
                format!("price +{:.1}% while OBV fell", price_change * 100.0),
            );
        }

        let distribution_days = (n.saturating_sub(20).max(1)..n)
            .filter(|&i| {
                bars[i].close < bars[i - 1].close
                    && prior_mean_volume(bars, i, VOLUME_AVG_PERIOD)
                        .is_some_and(|avg| bars[i].volume_f64() > avg)
            })
            .count();
        card.diag("distribution_days", distribution_days as f64);

        card.finish(ModuleId::AntiDistribution, MAX_SCORE)
    }
}
