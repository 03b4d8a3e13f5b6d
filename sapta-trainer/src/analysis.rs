//! Inspection of a trained artifact: feature importance grouped by module,
//! threshold balance, and the training summary.

use serde::Serialize;
use std::collections::BTreeMap;

use sapta_core::features::{describe_feature, feature_module};
use sapta_core::model::{ModelArtifact, ProbabilityThresholds};

const TOP_N: usize = 15;
const LOW_IMPORTANCE: f64 = 0.01;
const HIGH_IMPORTANCE: f64 = 0.05;
const RULE: &str = "============================================================";
const THIN: &str = "------------------------------------------------------------";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportanceAnalysis {
    /// Highest-importance features, descending.
    pub top_features: Vec<FeatureImportance>,
    /// Features per group (module name, `aggregate` or `context`), descending.
    pub group_features: BTreeMap<String, Vec<FeatureImportance>>,
    /// Group totals, descending.
    pub group_totals: Vec<(String, f64)>,
    pub total_features: usize,
}

fn group_of(feature: &str) -> String {
    match feature_module(feature) {
        Some(module) => module.name().to_string(),
        None if feature.contains("score") || feature.starts_with("modules_") => {
            "aggregate".to_string()
        }
        None => "context".to_string(),
    }
}

pub fn analyze_feature_importance(artifact: &ModelArtifact) -> ImportanceAnalysis {
    let mut ranked: Vec<FeatureImportance> = artifact
        .feature_names
        .iter()
        .zip(artifact.classifier.feature_importances())
        .map(|(name, &importance)| FeatureImportance {
            feature: name.clone(),
            importance,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.importance
            .total_cmp(&a.importance)
            .then_with(|| a.feature.cmp(&b.feature))
    });

    let mut group_features: BTreeMap<String, Vec<FeatureImportance>> = BTreeMap::new();
    for f in &ranked {
        group_features
            .entry(group_of(&f.feature))
            .or_default()
            .push(f.clone());
    }
    let mut group_totals: Vec<(String, f64)> = group_features
        .iter()
        .map(|(g, fs)| (g.clone(), fs.iter().map(|f| f.importance).sum()))
        .collect();
    group_totals.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    ImportanceAnalysis {
        total_features: ranked.len(),
        top_features: ranked.into_iter().take(TOP_N).collect(),
        group_features,
        group_totals,
    }
}

pub fn format_importance_report(analysis: &ImportanceAnalysis) -> String {
    let mut out = String::with_capacity(2048);
    out.push_str(&format!("{RULE}\nSAPTA Feature Importance\n{RULE}\n\n"));

    out.push_str(&format!("TOP {} FEATURES\n{THIN}\n", analysis.top_features.len()));
    for (i, f) in analysis.top_features.iter().enumerate() {
        out.push_str(&format!("{:2}. {:<40} {:.4}\n", i + 1, f.feature, f.importance));
        if let Some(desc) = describe_feature(&f.feature) {
            let short: String = desc.chars().take(50).collect();
            out.push_str(&format!("    {short}\n"));
        }
    }

    out.push_str(&format!("\nIMPORTANCE BY MODULE\n{THIN}\n"));
    for (group, total) in &analysis.group_totals {
        out.push_str(&format!("{group:<25} {total:.4} ({:.1}%)\n", total * 100.0));
        if let Some(features) = analysis.group_features.get(group) {
            for f in features.iter().take(3) {
                out.push_str(&format!("  - {:<32} {:.4}\n", f.feature, f.importance));
            }
        }
    }

    let low: Vec<&FeatureImportance> = analysis
        .top_features
        .iter()
        .filter(|f| f.importance < LOW_IMPORTANCE)
        .take(5)
        .collect();
    let high: Vec<&FeatureImportance> = analysis
        .top_features
        .iter()
        .filter(|f| f.importance > HIGH_IMPORTANCE)
        .take(5)
        .collect();
    if !low.is_empty() || !high.is_empty() {
        out.push_str(&format!("\nRECOMMENDATIONS\n{THIN}\n"));
    }
    if !low.is_empty() {
        out.push_str("Low importance (candidates for removal):\n");
        for f in low {
            out.push_str(&format!("  - {} ({:.4})\n", f.feature, f.importance));
        }
    }
    if !high.is_empty() {
        out.push_str("High importance:\n");
        for f in high {
            out.push_str(&format!("  - {} ({:.4})\n", f.feature, f.importance));
        }
    }
    out.push_str(&format!("{RULE}\n"));
    out
}

/// Tier widths in percentage points plus balance warnings.
pub fn format_threshold_report(thresholds: &ProbabilityThresholds) -> String {
    let pm = thresholds.pre_markup * 100.0;
    let siap = thresholds.siap * 100.0;
    let wl = thresholds.watchlist * 100.0;
    let (pm_range, siap_range, wl_range) = (100.0 - pm, pm - siap, siap - wl);

    let mut out = String::with_capacity(1024);
    out.push_str(&format!("{RULE}\nSAPTA Threshold Analysis\n{RULE}\n\n"));
    out.push_str(&format!("THRESHOLDS (ML probability)\n{THIN}\n"));
    out.push_str(&format!("PRE-MARKUP  p >= {pm:.1}%\n"));
    out.push_str(&format!("SIAP        p >= {siap:.1}%\n"));
    out.push_str(&format!("WATCHLIST   p >= {wl:.1}%\n\n"));

    out.push_str(&format!("TIER RANGES\n{THIN}\n"));
    out.push_str(&format!("PRE-MARKUP  {pm:.1} - 100.0 ({pm_range:.1})\n"));
    out.push_str(&format!("SIAP        {siap:.1} - {pm:.1} ({siap_range:.1})\n"));
    out.push_str(&format!("WATCHLIST   {wl:.1} - {siap:.1} ({wl_range:.1})\n"));
    out.push_str(&format!("SKIP        0.0 - {wl:.1} ({wl:.1})\n\n"));

    let warnings = threshold_warnings(thresholds);
    out.push_str(&format!("BALANCE\n{THIN}\n"));
    if warnings.is_empty() {
        out.push_str("Tiers look balanced.\n");
    }
    for w in &warnings {
        out.push_str(&format!("! {w}\n"));
    }
    out.push_str(&format!("{RULE}\n"));
    out
}

/// Balance warnings for learned thresholds, on the 0-100 scale.
pub fn threshold_warnings(thresholds: &ProbabilityThresholds) -> Vec<String> {
    let pm = thresholds.pre_markup * 100.0;
    let siap = thresholds.siap * 100.0;
    let wl = thresholds.watchlist * 100.0;
    let (pm_range, siap_range, wl_range) = (100.0 - pm, pm - siap, siap - wl);

    let mut warnings = Vec::new();
    if pm_range < 10.0 {
        warnings.push(format!("PRE-MARKUP tier is very tight ({pm_range:.1} < 10)"));
    } else if pm_range > 30.0 {
        warnings.push(format!("PRE-MARKUP tier is wide ({pm_range:.1} > 30)"));
    }
    if wl_range > 30.0 {
        warnings.push(format!("WATCHLIST tier is very wide ({wl_range:.1} > 30)"));
    }
    if (siap_range - wl_range).abs() > 20.0 {
        warnings.push(format!(
            "SIAP ({siap_range:.1}) and WATCHLIST ({wl_range:.1}) tiers are unbalanced"
        ));
    }
    warnings
}

/// Training summary: provenance, pooled metrics and per-window results.
pub fn format_training_summary(artifact: &ModelArtifact) -> String {
    let m = &artifact.validation_metrics;
    let s = &artifact.summary;
    let mut out = String::with_capacity(1024);
    out.push_str(&format!("{RULE}\nSAPTA Model {}\n{RULE}\n", artifact.short_id()));
    out.push_str(&format!(
        "Trained:     {}\n",
        artifact.trained_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!(
        "Schema:      v{} ({} features)\n",
        artifact.feature_schema_version,
        artifact.feature_names.len()
    ));
    out.push_str(&format!(
        "Classifier:  {} ({} trees)\n",
        artifact.classifier.kind(),
        artifact.classifier.n_trees()
    ));
    out.push_str(&format!("Mode:        {}\n", s.mode));
    out.push_str(&format!(
        "Samples:     {} ({:.1}% positive), seed {}\n",
        s.n_samples,
        s.positive_rate * 100.0,
        s.seed
    ));
    out.push_str(&format!(
        "Validation:  acc {:.3}  prec {:.3}  rec {:.3}  f1 {:.3}  auc {:.3}  (n={})\n",
        m.accuracy, m.precision, m.recall, m.f1, m.auc, m.n_samples
    ));
    if s.windows.len() > 1 {
        out.push_str(&format!(
            "\n{:>3}  {:<23}  {:<23}  {:>6} {:>6} {:>6}\n",
            "#", "train", "test", "n", "f1", "auc"
        ));
        for w in &s.windows {
            out.push_str(&format!(
                "{:>3}  {} - {}  {} - {}  {:>6} {:>6.3} {:>6.3}\n",
                w.index,
                w.train_start,
                w.train_end,
                w.test_start,
                w.test_end,
                w.n_test,
                w.metrics.f1,
                w.metrics.auc
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups() {
        assert_eq!(group_of("absorption_volume_spike_ratio"), "absorption");
        assert_eq!(group_of("final_score"), "aggregate");
        assert_eq!(group_of("modules_active_count"), "aggregate");
        assert_eq!(group_of("volatility_20"), "context");
    }

    #[test]
    fn balanced_thresholds_have_no_warnings() {
        let t = ProbabilityThresholds {
            pre_markup: 0.8,
            siap: 0.65,
            watchlist: 0.5,
        };
        assert!(threshold_warnings(&t).is_empty());
        assert!(format_threshold_report(&t).contains("Tiers look balanced"));
    }

    #[test]
    fn threshold_report_lines() {
        let t = ProbabilityThresholds {
            pre_markup: 0.8,
            siap: 0.65,
            watchlist: 0.5,
        };
        let report = format_threshold_report(&t);
        let lines: Vec<&str> = report.lines().collect();
        assert!(lines.contains(&"PRE-MARKUP  p >= 80.0%"));
        assert!(lines.contains(&"SIAP        65.0 - 80.0 (15.0)"));
        assert!(lines.contains(&"SKIP        0.0 - 50.0 (50.0)"));
        assert!(report.ends_with(&format!("{RULE}\n")));
    }

    #[test]
    fn tight_and_wide_tiers_flagged() {
        let t = ProbabilityThresholds {
            pre_markup: 0.95,
            siap: 0.9,
            watchlist: 0.2,
        };
        let w = threshold_warnings(&t);
        assert!(w.iter().any(|s| s.contains("very tight")));
        assert!(w.iter().any(|s| s.contains("WATCHLIST tier is very wide")));
        assert!(w.iter().any(|s| s.contains("unbalanced")));
    }
}
