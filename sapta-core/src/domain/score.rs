//! Scoring output types: per-module scores and the aggregated result.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identity of one of the six scoring modules.
///
/// Declaration order is the canonical order used by the engine, the weight
/// table and the feature schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleId {
    Absorption,
    Compression,
    BbSqueeze,
    Elliott,
    TimeProjection,
    AntiDistribution,
}

impl ModuleId {
    pub const ALL: [ModuleId; 6] = [
        ModuleId::Absorption,
        ModuleId::Compression,
        ModuleId::BbSqueeze,
        ModuleId::Elliott,
        ModuleId::TimeProjection,
        ModuleId::AntiDistribution,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ModuleId::Absorption => "absorption",
            ModuleId::Compression => "compression",
            ModuleId::BbSqueeze => "bb_squeeze",
            ModuleId::Elliott => "elliott",
            ModuleId::TimeProjection => "time_projection",
            ModuleId::AntiDistribution => "anti_distribution",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ModuleId::Absorption => "Supply Absorption - smart money accumulation detection",
            ModuleId::Compression => "Compression - volatility contraction analysis",
            ModuleId::BbSqueeze => "BB Squeeze - Bollinger Band squeeze detection",
            ModuleId::Elliott => "Elliott Wave - wave position and Fibonacci analysis",
            ModuleId::TimeProjection => "Time Projection - Fibonacci time windows",
            ModuleId::AntiDistribution => "Anti-Distribution - distribution pattern filtering",
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Output of one module for one evaluation.
///
/// `raw_score` is signed and never clamped here; only the engine's aggregate
/// is clamped. `diagnostics` carries the module internals the feature
/// extractor flattens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleScore {
    pub module: ModuleId,
    pub raw_score: f64,
    pub max_score: f64,
    pub active: bool,
    pub notes: Vec<String>,
    #[serde(default)]
    pub diagnostics: BTreeMap<String, f64>,
}

impl ModuleScore {
    /// An abstention: the module could not evaluate this window.
    pub fn abstain(module: ModuleId, max_score: f64, note: impl Into<String>) -> Self {
        Self {
            module,
            raw_score: 0.0,
            max_score,
            active: false,
            notes: vec![note.into()],
            diagnostics: BTreeMap::new(),
        }
    }

    /// Raw score as a fraction of the ceiling (negative for penalties).
    pub fn score_pct(&self) -> f64 {
        if self.max_score > 0.0 {
            self.raw_score / self.max_score
        } else {
            0.0
        }
    }

    pub fn diagnostic(&self, key: &str) -> Option<f64> {
        self.diagnostics.get(key).copied()
    }
}

/// Decision tier, ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Skip,
    Watchlist,
    Siap,
    PreMarkup,
}

impl Status {
    pub fn label(self) -> &'static str {
        match self {
            Status::Skip => "SKIP",
            Status::Watchlist => "WATCHLIST",
            Status::Siap => "SIAP",
            Status::PreMarkup => "PRE-MARKUP",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "SKIP" => Some(Status::Skip),
            "WATCHLIST" => Some(Status::Watchlist),
            "SIAP" => Some(Status::Siap),
            "PRE_MARKUP" | "PREMARKUP" => Some(Status::PreMarkup),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Confidence::Low => "LOW",
            Confidence::Medium => "MEDIUM",
            Confidence::High => "HIGH",
        })
    }
}

/// Which thresholds produced the status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusBasis {
    RuleBased,
    Calibrated,
}

/// Projected breakout window, in trading days after the evaluation date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakoutWindow {
    pub from_days: u32,
    pub to_days: u32,
}

impl fmt::Display for BreakoutWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{} days", self.from_days, self.to_days)
    }
}

/// Aggregated evaluation of one ticker on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaptaResult {
    pub ticker: String,
    pub evaluated_date: NaiveDate,
    pub final_score: f64,
    pub weighted_score: f64,
    pub max_weighted_score: f64,
    pub status: Status,
    pub status_basis: StatusBasis,
    pub confidence: Confidence,
    pub wave_phase: Option<String>,
    pub fib_retracement: Option<f64>,
    pub projected_breakout_window: Option<BreakoutWindow>,
    pub module_breakdown: Vec<ModuleScore>,
    pub ml_probability: Option<f64>,
    pub model_id: Option<String>,
}

impl SaptaResult {
    pub fn module(&self, id: ModuleId) -> Option<&ModuleScore> {
        self.module_breakdown.iter().find(|m| m.module == id)
    }

    pub fn active_module_count(&self) -> usize {
        self.module_breakdown.iter().filter(|m| m.active).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_ordering() {
        assert!(Status::Skip < Status::Watchlist);
        assert!(Status::Watchlist < Status::Siap);
        assert!(Status::Siap < Status::PreMarkup);
    }

    #[test]
    fn status_parse_accepts_labels() {
        assert_eq!(Status::parse("pre-markup"), Some(Status::PreMarkup));
        assert_eq!(Status::parse("PRE_MARKUP"), Some(Status::PreMarkup));
        assert_eq!(Status::parse("siap"), Some(Status::Siap));
        assert_eq!(Status::parse("bogus"), None);
    }

    #[test]
    fn module_names_roundtrip() {
        for id in ModuleId::ALL {
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, format!("\"{}\"", id.name()));
        }
        let json = serde_json::to_string(&ModuleId::BbSqueeze).unwrap();
        assert_eq!(json, "\"bb_squeeze\"");
    }

    #[test]
    fn abstention_is_inactive_with_note() {
        let s = ModuleScore::abstain(ModuleId::Elliott, 20.0, "not enough bars");
        assert!(!s.active);
        assert_eq!(s.raw_score, 0.0);
        assert_eq!(s.notes.len(), 1);
        assert_eq!(s.score_pct(), 0.0);
    }
}
