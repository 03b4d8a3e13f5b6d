//! Probability thresholds learned from validation predictions.
//!
//! Predictions are sorted descending and each tier takes the probability at
//! its rank: top 10% → PRE_MARKUP, top 25% → SIAP, top 50% → WATCHLIST.

use sapta_core::model::ProbabilityThresholds;

use crate::trainer::TrainError;

pub const PRE_MARKUP_RANK: f64 = 0.10;
pub const SIAP_RANK: f64 = 0.25;
pub const WATCHLIST_RANK: f64 = 0.50;

/// Probability at rank `ceil(fraction * n) - 1` of a descending sort.
fn at_rank(sorted_desc: &[f64], fraction: f64) -> f64 {
    let n = sorted_desc.len();
    let idx = ((fraction * n as f64).ceil() as usize).clamp(1, n) - 1;
    sorted_desc[idx]
}

pub fn learn_thresholds(probabilities: &[f64]) -> Result<ProbabilityThresholds, TrainError> {
    let mut sorted: Vec<f64> = probabilities
        .iter()
        .copied()
        .filter(|p| p.is_finite())
        .map(|p| p.clamp(0.0, 1.0))
        .collect();
    if sorted.is_empty() {
        return Err(TrainError::TrainingDataInsufficient {
            available: 0,
            required: 1,
        });
    }
    sorted.sort_by(|a, b| b.total_cmp(a));

    let thresholds = ProbabilityThresholds {
        pre_markup: at_rank(&sorted, PRE_MARKUP_RANK),
        siap: at_rank(&sorted, SIAP_RANK),
        watchlist: at_rank(&sorted, WATCHLIST_RANK),
    };
    thresholds.validate()?;
    Ok(thresholds)
}
