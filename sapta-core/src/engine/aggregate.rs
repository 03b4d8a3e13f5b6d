//! Weighted aggregation of module scores.
//!
//! `weighted = sum(raw * weight)`, normalised against `sum(max * weight)`
//! and clamped to [0, 100]. Module scores are never renormalised when a
//! module abstains.

use serde::{Deserialize, Serialize};

use crate::config::ModuleWeights;
use crate::domain::{ModuleId, ModuleScore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    /// Unweighted sum of raw scores.
    pub total_score: f64,
    pub weighted_score: f64,
    pub max_weighted_score: f64,
    /// Normalised score in [0, 100].
    pub final_score: f64,
    pub active_count: usize,
    /// Anti-distribution raw score (<= 0).
    pub penalty_score: f64,
}

pub fn aggregate(breakdown: &[ModuleScore], weights: &ModuleWeights) -> Aggregate {
    let mut agg = Aggregate::default();
    for m in breakdown {
        let w = weights.weight(m.module);
        agg.total_score += m.raw_score;
        agg.weighted_score += m.raw_score * w;
        agg.max_weighted_score += m.max_score * w;
        if m.active {
            agg.active_count += 1;
        }
        if m.module == ModuleId::AntiDistribution {
            agg.penalty_score += m.raw_score.min(0.0);
        }
    }
    agg.final_score = if agg.max_weighted_score > 0.0 {
        (agg.weighted_score / agg.max_weighted_score * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };
    agg
}
