//! Plain-text rendering of evaluation results.

use crate::domain::{ModuleId, SaptaResult};
use crate::features::{describe_feature, feature_names};

const RULE: &str = "------------------------------------------------------------";

/// Render one result. `detailed` adds notes and diagnostics per module.
pub fn format_result(result: &SaptaResult, detailed: bool) -> String {
    let mut out = String::with_capacity(1024);

    out.push_str(&format!("SAPTA {} ({})\n", result.ticker, result.evaluated_date));
    out.push_str(RULE);
    out.push('\n');
    out.push_str(&format!(
        "Status:      {} [{}]\n",
        result.status,
        match result.status_basis {
            crate::domain::StatusBasis::RuleBased => "rule-based",
            crate::domain::StatusBasis::Calibrated => "calibrated",
        }
    ));
    out.push_str(&format!("Score:       {:.1}/100\n", result.final_score));
    out.push_str(&format!(
        "Weighted:    {:.1}/{:.1}\n",
        result.weighted_score, result.max_weighted_score
    ));
    out.push_str(&format!("Confidence:  {}\n", result.confidence));
    out.push_str(&format!(
        "Modules:     {}/{} active\n",
        result.active_module_count(),
        result.module_breakdown.len()
    ));
    if let Some(p) = result.ml_probability {
        out.push_str(&format!("ML prob:     {:.1}%\n", p * 100.0));
    }
    if let Some(ref id) = result.model_id {
        out.push_str(&format!("Model:       {}\n", &id[..id.len().min(12)]));
    }
    if let Some(ref wave) = result.wave_phase {
        out.push_str(&format!("Wave:        {wave}\n"));
    }
    if let Some(fib) = result.fib_retracement {
        out.push_str(&format!("Fib retr.:   {:.3}\n", fib));
    }
    if let Some(window) = result.projected_breakout_window {
        out.push_str(&format!("Breakout:    in {window}\n"));
    }

    out.push('\n');
    out.push_str(&format!("{:<20} {:>7} {:>6}  Active\n", "Module", "Score", "Max"));
    for m in &result.module_breakdown {
        out.push_str(&format!(
            "{:<20} {:>7.1} {:>6.0}  {}\n",
            m.module.name(),
            m.raw_score,
            m.max_score,
            if m.active { "yes" } else { "-" }
        ));
        if detailed {
            for note in &m.notes {
                out.push_str(&format!("    - {note}\n"));
            }
            for (key, value) in &m.diagnostics {
                out.push_str(&format!("      {key:<26} {value:.4}\n"));
            }
        }
    }
    out
}

/// Render a ranked scan as a table.
pub fn format_scan_results(results: &[SaptaResult]) -> String {
    if results.is_empty() {
        return "No stocks matched the criteria.\n".to_string();
    }
    let mut out = String::with_capacity(128 + results.len() * 80);
    out.push_str(&format!(
        "{:>3}  {:<10} {:>6}  {:<11} {:<7} {:<7} {:>6}\n",
        "#", "Ticker", "Score", "Status", "Conf", "Wave", "ML"
    ));
    out.push_str(RULE);
    out.push('\n');
    for (i, r) in results.iter().enumerate() {
        let ml = r
            .ml_probability
            .map(|p| format!("{:.0}%", p * 100.0))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:>3}  {:<10} {:>6.1}  {:<11} {:<7} {:<7} {:>6}\n",
            i + 1,
            r.ticker,
            r.final_score,
            r.status.label(),
            r.confidence.to_string(),
            r.wave_phase.as_deref().unwrap_or("-"),
            ml
        ));
    }
    out.push_str(RULE);
    out.push('\n');
    out.push_str(&format!("Total: {}\n", results.len()));
    out
}

/// The six modules with their descriptions, in canonical order.
pub fn module_descriptions() -> Vec<(&'static str, &'static str)> {
    ModuleId::ALL
        .iter()
        .map(|m| (m.name(), m.description()))
        .collect()
}

/// Every feature name with its description.
pub fn feature_descriptions() -> Vec<(&'static str, &'static str)> {
    feature_names()
        .iter()
        .map(|name| (name.as_str(), describe_feature(name).unwrap_or("")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OhlcvSeries;
    use crate::engine::SaptaEngine;
    use crate::modules::test_bars::accumulation_scenario;

    fn scenario_result(ticker: &str) -> SaptaResult {
        let series = OhlcvSeries::new(ticker, accumulation_scenario()).unwrap();
        SaptaEngine::with_defaults().evaluate(&series).unwrap()
    }

    #[test]
    fn empty_scan_message() {
        assert!(format_scan_results(&[]).contains("No stocks matched"));
    }

    #[test]
    fn scan_lists_and_totals() {
        let results = vec![scenario_result("AAA"), scenario_result("BBB")];
        let text = format_scan_results(&results);
        assert!(text.contains("AAA"));
        assert!(text.contains("BBB"));
        assert!(text.contains("Total: 2"));
    }

    #[test]
    fn detailed_result_includes_diagnostics() {
        let r = scenario_result("ACC");
        let brief = format_result(&r, false);
        let full = format_result(&r, true);
        assert!(brief.contains("ACC"));
        assert!(brief.contains(&format!("Modules:     {}/6 active", r.active_module_count())));
        assert!(brief.contains("absorption"));
        assert!(!brief.contains("volume_spike_ratio"));
        assert!(full.contains("volume_spike_ratio"));
    }

    #[test]
    fn description_tables_cover_everything() {
        assert_eq!(module_descriptions().len(), 6);
        let features = feature_descriptions();
        assert_eq!(features.len(), feature_names().len());
        assert!(features.iter().all(|(_, d)| !d.is_empty()));
    }
}
