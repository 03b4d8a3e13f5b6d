//! Feature extraction shared by inference and training.
//!
//! The vector layout is fixed by [`feature_names`]: per-module score fields,
//! every module diagnostic, aggregate fields, then price/volume context.
//! Any change to the layout must bump [`FEATURE_SCHEMA_VERSION`]; artifacts
//! trained on another version are rejected, never remapped.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::domain::{Bar, ModuleId, ModuleScore};
use crate::engine::Aggregate;
use crate::error::SaptaError;
use crate::indicators::{mean_volume, std_dev, Indicator, Sma};

pub const FEATURE_SCHEMA_VERSION: u32 = 1;

/// Diagnostics each module contributes, with their descriptions.
pub const MODULE_DIAGNOSTICS: [(ModuleId, &[(&str, &str)]); 6] = [
    (
        ModuleId::Absorption,
        &[
            ("volume_spike_ratio", "Largest volume spike vs prior 20-day average"),
            ("price_held", "Price held above the spike bar low (1/0)"),
            ("higher_lows_count", "Consecutive higher lows at the end of the window"),
            ("avg_close_strength", "Mean close position within the bar range, last 5 bars"),
            ("distribution_candles", "Heavy-volume weak down candles in the window"),
            ("spike_age", "Bars since the volume spike"),
        ],
    ),
    (
        ModuleId::Compression,
        &[
            ("atr_ratio", "ATR(14) relative to its 50-day average"),
            ("atr_slope", "ATR change over the last 5 bars"),
            ("range_contraction", "5-day mean range vs 20-day mean range"),
            ("low_vol_streak", "Consecutive low-volatility days"),
            ("higher_lows", "Higher lows in the last 10 bars"),
            ("lower_highs", "Lower highs in the last 10 bars"),
            ("avg_body_ratio", "Mean candle body as a fraction of range"),
        ],
    ),
    (
        ModuleId::BbSqueeze,
        &[
            ("width_current", "Current Bollinger band width"),
            ("width_percentile", "Percentile of current width within the window"),
            ("squeeze_duration", "Bars the width has stayed near its minimum"),
            ("price_position", "Close position inside the bands (0 = lower)"),
            ("support_touches", "Lower band tests in the last 10 bars"),
            ("width_ratio_to_min", "Current width vs its 20-day minimum"),
        ],
    ),
    (
        ModuleId::Elliott,
        &[
            ("wave_code", "Wave label (0 none, 1 wave 3, 2 wave 5, 3 wave C)"),
            ("fib_retracement", "Retracement ratio of the last corrective leg"),
            ("trend_context", "SMA(50) slope over 10 bars"),
            ("abc_pattern", "ABC correction completed (1/0)"),
            ("rule_violations", "Failed rules of the closest wave candidate"),
            ("rsi_divergence", "Bullish RSI divergence at the last low (1/0)"),
        ],
    ),
    (
        ModuleId::TimeProjection,
        &[
            ("days_since_low", "Bars since the last significant low"),
            ("in_fib_window", "Inside a Fibonacci time window (1/0)"),
            ("days_to_next_target", "Bars until the next Fibonacci count"),
            ("cycle_length", "Length of the previous low-to-low cycle"),
            ("cycle_match", "Current leg matches the previous cycle (1/0)"),
        ],
    ),
    (
        ModuleId::AntiDistribution,
        &[
            ("weak_close_volume_ratio", "Volume ratio of the worst heavy weak close"),
            ("failed_breakout", "Recent breakout failed (1/0)"),
            ("price_change_10", "10-day price change"),
            ("obv_divergence", "Price up while OBV fell (1/0)"),
            ("distribution_days", "Down days on above-average volume, last 20 bars"),
        ],
    ),
];

const AGGREGATE_FEATURES: [(&str, &str); 5] = [
    ("total_score", "Sum of raw module scores"),
    ("weighted_score", "Weighted sum of raw module scores"),
    ("final_score", "Normalised 0-100 score"),
    ("modules_active_count", "Number of modules with a non-zero score"),
    ("penalty_score", "Anti-distribution penalty (<= 0)"),
];

const CONTEXT_FEATURES: [(&str, &str); 4] = [
    ("close_to_sma50", "Close relative to SMA(50)"),
    ("volatility_20", "Std-dev of daily returns over 20 bars"),
    ("return_20", "20-day return"),
    ("volume_ratio_20", "Last volume vs prior 20-day average"),
];

struct Schema {
    names: Vec<String>,
    descriptions: Vec<&'static str>,
    hash: String,
}

fn schema() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        let mut names = Vec::new();
        let mut descriptions = Vec::new();
        for id in ModuleId::ALL {
            names.push(format!("{id}_score"));
            descriptions.push(id.description());
            names.push(format!("{id}_score_pct"));
            descriptions.push("Raw score as a fraction of the module ceiling");
            names.push(format!("{id}_active"));
            descriptions.push("Module fired (1/0)");
        }
        for (id, diags) in MODULE_DIAGNOSTICS {
            for (key, desc) in diags {
                names.push(format!("{id}_{key}"));
                descriptions.push(*desc);
            }
        }
        for (key, desc) in AGGREGATE_FEATURES.iter().chain(CONTEXT_FEATURES.iter()) {
            names.push((*key).to_string());
            descriptions.push(*desc);
        }
        let hash = blake3::hash(names.join("\n").as_bytes()).to_hex().to_string();
        Schema {
            names,
            descriptions,
            hash,
        }
    })
}

/// Ordered feature names of the current schema.
pub fn feature_names() -> &'static [String] {
    &schema().names
}

pub fn feature_count() -> usize {
    schema().names.len()
}

/// BLAKE3 fingerprint of the ordered feature names.
pub fn feature_schema_hash() -> &'static str {
    &schema().hash
}

pub fn describe_feature(name: &str) -> Option<&'static str> {
    let s = schema();
    s.names.iter().position(|n| n == name).map(|i| s.descriptions[i])
}

/// Module a feature belongs to, if any.
pub fn feature_module(name: &str) -> Option<ModuleId> {
    ModuleId::ALL
        .into_iter()
        .find(|id| name.starts_with(id.name()) && name[id.name().len()..].starts_with('_'))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub schema_version: u32,
    pub values: Vec<f64>,
}

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        let idx = feature_names().iter().position(|n| n == name)?;
        self.values.get(idx).copied()
    }

    /// Reject a vector built under another schema version.
    pub fn ensure_schema(&self, version: u32) -> Result<(), SaptaError> {
        if self.schema_version == version {
            Ok(())
        } else {
            Err(SaptaError::SchemaMismatch {
                expected: version,
                found: self.schema_version,
            })
        }
    }
}

fn finite(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

fn context(bars: &[Bar]) -> [f64; 4] {
    let n = bars.len();
    let Some(last) = bars.last() else {
        return [0.0; 4];
    };

    let sma = Sma::new(50).compute(bars);
    let close_to_sma = if sma[n - 1] > 0.0 {
        last.close / sma[n - 1] - 1.0
    } else {
        0.0
    };

    let start = n.saturating_sub(21);
    let returns: Vec<f64> = bars[start..]
        .windows(2)
        .filter(|w| w[0].close > 0.0)
        .map(|w| w[1].close / w[0].close - 1.0)
        .collect();
    let volatility = if returns.is_empty() { 0.0 } else { std_dev(&returns) };

    let ret20 = n
        .checked_sub(21)
        .map(|i| bars[i].close)
        .filter(|&c| c > 0.0)
        .map_or(0.0, |c| last.close / c - 1.0);

    let prior = &bars[n.saturating_sub(21)..n - 1];
    let avg_vol = mean_volume(prior);
    let volume_ratio = if avg_vol > 0.0 {
        last.volume_f64() / avg_vol
    } else {
        0.0
    };

    [close_to_sma, volatility, ret20, volume_ratio].map(finite)
}

/// Flatten module outputs, aggregates and price context into the schema
/// order. Diagnostics missing from a module (e.g. an abstention) are 0.0.
pub fn extract(breakdown: &[ModuleScore], aggregate: &Aggregate, bars: &[Bar]) -> FeatureVector {
    let mut values = Vec::with_capacity(feature_count());
    let module = |id: ModuleId| breakdown.iter().find(|m| m.module == id);

    for id in ModuleId::ALL {
        match module(id) {
            Some(m) => {
                values.push(m.raw_score);
                values.push(m.score_pct());
                values.push(if m.active { 1.0 } else { 0.0 });
            }
            None => values.extend([0.0, 0.0, 0.0]),
        }
    }
    for (id, diags) in MODULE_DIAGNOSTICS {
        let m = module(id);
        for (key, _) in diags {
            values.push(m.and_then(|m| m.diagnostic(key)).map_or(0.0, finite));
        }
    }
    values.extend([
        aggregate.total_score,
        aggregate.weighted_score,
        aggregate.final_score,
        aggregate.active_count as f64,
        aggregate.penalty_score,
    ]);
    values.extend(context(bars));

    FeatureVector {
        schema_version: FEATURE_SCHEMA_VERSION,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_stable_and_unique() {
        let names = feature_names();
        assert_eq!(names.len(), 62);
        let mut sorted = names.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), names.len());
        assert_eq!(names[0], "absorption_score");
        assert_eq!(feature_schema_hash().len(), 64);
    }

    #[test]
    fn every_feature_described() {
        for name in feature_names() {
            assert!(describe_feature(name).is_some(), "{name}");
        }
    }

    #[test]
    fn module_lookup_by_prefix() {
        assert_eq!(feature_module("bb_squeeze_width_current"), Some(ModuleId::BbSqueeze));
        assert_eq!(feature_module("absorption_active"), Some(ModuleId::Absorption));
        assert_eq!(feature_module("total_score"), None);
    }

    #[test]
    fn abstaining_modules_contribute_zeros() {
        let breakdown: Vec<ModuleScore> = ModuleId::ALL
            .into_iter()
            .map(|id| ModuleScore::abstain(id, 10.0, "short"))
            .collect();
        let fv = extract(&breakdown, &Aggregate::default(), &[]);
        assert_eq!(fv.values.len(), feature_count());
        assert!(fv.values.iter().all(|&v| v == 0.0));
        assert_eq!(fv.get("elliott_wave_code"), Some(0.0));
    }

    #[test]
    fn schema_mismatch_rejected() {
        let fv = FeatureVector {
            schema_version: FEATURE_SCHEMA_VERSION,
            values: vec![],
        };
        assert!(fv.ensure_schema(FEATURE_SCHEMA_VERSION).is_ok());
        let err = fv.ensure_schema(FEATURE_SCHEMA_VERSION + 1).unwrap_err();
        assert!(matches!(err, SaptaError::SchemaMismatch { .. }));
    }
}
