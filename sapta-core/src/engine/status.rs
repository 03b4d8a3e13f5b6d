//! Status and confidence derivation.

use crate::config::RuleThresholds;
use crate::domain::{Confidence, Status, StatusBasis};
use crate::model::ProbabilityThresholds;

/// Rule-based status from the final score, or, when a calibrated
/// probability is available, status from the learned probability
/// thresholds. Calibration overrides, it does not blend.
pub fn classify(
    final_score: f64,
    rules: &RuleThresholds,
    calibrated: Option<(f64, &ProbabilityThresholds)>,
) -> (Status, StatusBasis) {
    match calibrated {
        Some((p, thresholds)) => (thresholds.classify(p), StatusBasis::Calibrated),
        None => (rules.classify(final_score), StatusBasis::RuleBased),
    }
}

/// HIGH with 5+ active modules or p >= 0.7; MEDIUM with 3+ or p >= 0.5.
pub fn confidence(active_modules: usize, probability: Option<f64>) -> Confidence {
    let p = probability.unwrap_or(0.0);
    if active_modules >= 5 || p >= 0.7 {
        Confidence::High
    } else if active_modules >= 3 || p >= 0.5 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_tiers() {
        assert_eq!(confidence(5, None), Confidence::High);
        assert_eq!(confidence(0, Some(0.7)), Confidence::High);
        assert_eq!(confidence(3, None), Confidence::Medium);
        assert_eq!(confidence(1, Some(0.55)), Confidence::Medium);
        assert_eq!(confidence(2, Some(0.49)), Confidence::Low);
        assert_eq!(confidence(0, None), Confidence::Low);
    }

    #[test]
    fn calibration_overrides_rules() {
        let rules = RuleThresholds::default();
        let learned = ProbabilityThresholds {
            pre_markup: 0.8,
            siap: 0.6,
            watchlist: 0.4,
        };
        assert_eq!(classify(10.0, &rules, None), (Status::Skip, StatusBasis::RuleBased));
        assert_eq!(
            classify(10.0, &rules, Some((0.85, &learned))),
            (Status::PreMarkup, StatusBasis::Calibrated)
        );
        assert_eq!(
            classify(95.0, &rules, Some((0.1, &learned))),
            (Status::Skip, StatusBasis::Calibrated)
        );
    }
}
