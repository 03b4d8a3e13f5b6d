//! Supply absorption: large volume met by a price that refuses to fall.
//!
//! Rules over the last `window` bars:
//! - volume spike >= `spike_ratio` x the prior 20-bar average, with every
//!   later close at or above the spike low and the last close within 2% of
//!   the spike close: +8
//! - rising lows for at least `min_higher_lows` consecutive bars at the end: +6
//! - at least 4 of the last 5 closes in the upper half of their range: +6
//! - distribution candle (heavy volume, close in the lower third, down
//!   candle): -4

use super::{prior_mean_volume, ratio, Detector, Scorecard};
use crate::domain::{Bar, ModuleId, ModuleScore};

const MAX_SCORE: f64 = 20.0;
const LOOKBACK: usize = 30;
const VOLUME_AVG_PERIOD: usize = 20;

const SPIKE_POINTS: f64 = 8.0;
const HIGHER_LOWS_POINTS: f64 = 6.0;
const CLOSE_STRENGTH_POINTS: f64 = 6.0;
const DISTRIBUTION_PENALTY: f64 = -4.0;

#[derive(Debug, Clone)]
pub struct Absorption {
    pub window: usize,
    pub spike_ratio: f64,
    /// Last close may sit at most this fraction below the spike close.
    pub hold_tolerance: f64,
    pub min_higher_lows: usize,
    pub strong_close_lookback: usize,
    pub min_strong_closes: usize,
    pub distribution_volume_ratio: f64,
}

impl Default for Absorption {
    fn default() -> Self {
        Self {
            window: 10,
            spike_ratio: 2.0,
            hold_tolerance: 0.02,
            min_higher_lows: 3,
            strong_close_lookback: 5,
            min_strong_closes: 4,
            distribution_volume_ratio: 1.5,
        }
    }
}

/// Consecutive bars at the end whose low exceeds the previous bar's low.
pub(crate) fn higher_lows_streak(bars: &[Bar]) -> usize {
    bars.windows(2)
        .rev()
        .take_while(|w| w[1].low > w[0].low)
        .count()
}

impl Detector for Absorption {
    fn id(&self) -> ModuleId {
        ModuleId::Absorption
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
        let start = n.saturating_sub(self.window).max(VOLUME_AVG_PERIOD);
        let last = bars[n - 1];

        // Strongest volume spike inside the window.
        let mut spike: Option<(usize, f64)> = None;
        for i in start..n {
            let Some(avg) = prior_mean_volume(bars, i, VOLUME_AVG_PERIOD) else {
                continue;
            };
            let r = ratio(bars[i].volume_f64(), avg);
            if spike.map_or(true, |(_, best)| r > best) {
                spike = Some((i, r));
            }
        }

        let mut price_held = false;
        if let Some((idx, spike_ratio)) = spike {
            card.diag("volume_spike_ratio", spike_ratio);
            card.diag("spike_age", (n - 1 - idx) as f64);
            let spike_bar = bars[idx];
            let after = &bars[idx + 1..];
            price_held = !after.is_empty()
                && after.iter().all(|b| b.close >= spike_bar.low)
                && last.close >= spike_bar.close * (1.0 - self.hold_tolerance);
            if spike_ratio >= self.spike_ratio && price_held {
                card.fire(
                    SPIKE_POINTS,
                    format!(
                        "volume spike {spike_ratio:.1}x absorbed, price held above {:.2}",
                        spike_bar.low
                    ),
                );
            }
        }
        card.flag("price_held", price_held);

        let streak = higher_lows_streak(bars);
        card.diag("higher_lows_count", streak as f64);
        if streak >= self.min_higher_lows {
            card.fire(HIGHER_LOWS_POINTS, format!("{streak} consecutive higher lows"));
        }

        let recent = &bars[n.saturating_sub(self.strong_close_lookback)..];
        let positions: Vec<f64> = recent.iter().filter_map(|b| b.close_position()).collect();
        let strong = positions.iter().filter(|&&p| p >= 0.5).count();
        let avg_strength = if positions.is_empty() {
            0.0
        } else {
            positions.iter().sum::<f64>() / positions.len() as f64
        };
        card.diag("avg_close_strength", avg_strength);
        if strong >= self.min_strong_closes {
            card.fire(
                CLOSE_STRENGTH_POINTS,
                format!("{strong}/{} closes in the upper half of range", recent.len()),
            );
        }

        let distribution = (start..n)
            .filter(|&i| {
                let b = bars[i];
                let heavy = prior_mean_volume(bars, i, VOLUME_AVG_PERIOD)
                    .map(|avg| ratio(b.volume_f64(), avg) >= self.distribution_volume_ratio)
                    .unwrap_or(false);
                let weak = b.close_position().map_or(false, |p| p <= 1.0 / 3.0);
                heavy && weak && b.close < b.open
            })
            .count();
        card.diag("distribution_candles", distribution as f64);
        if distribution > 0 {
            card.fire(
                DISTRIBUTION_PENALTY,
                format!("{distribution} distribution candle(s) in last {} bars", n - start),
            );
        }

        card.finish(ModuleId::Absorption, MAX_SCORE)
    }
}
