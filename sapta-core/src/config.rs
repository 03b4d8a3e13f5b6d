//! Engine and labeling configuration.
//!
//! Stored as TOML with `[engine]` and `[labeling]` tables; the trainer crate
//! reads its own `[trainer]` table from the same file. Every field has a
//! default, so an empty file is a valid config.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::{ModuleId, Status, MIN_HISTORY_BARS};
use crate::error::SaptaError;

/// Per-module aggregation weights. Must sum to 100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleWeights {
    pub absorption: f64,
    pub compression: f64,
    pub bb_squeeze: f64,
    pub elliott: f64,
    pub time_projection: f64,
    pub anti_distribution: f64,
}

impl Default for ModuleWeights {
    fn default() -> Self {
        Self {
            absorption: 25.0,
            compression: 20.0,
            bb_squeeze: 15.0,
            elliott: 15.0,
            time_projection: 15.0,
            anti_distribution: 10.0,
        }
    }
}

impl ModuleWeights {
    pub fn weight(&self, module: ModuleId) -> f64 {
        match module {
            ModuleId::Absorption => self.absorption,
            ModuleId::Compression => self.compression,
            ModuleId::BbSqueeze => self.bb_squeeze,
            ModuleId::Elliott => self.elliott,
            ModuleId::TimeProjection => self.time_projection,
            ModuleId::AntiDistribution => self.anti_distribution,
        }
    }

    pub fn total(&self) -> f64 {
        ModuleId::ALL.iter().map(|&m| self.weight(m)).sum()
    }

    pub fn validate(&self) -> Result<(), SaptaError> {
        if let Some(m) = ModuleId::ALL.iter().find(|&&m| {
            let w = self.weight(m);
            !w.is_finite() || w < 0.0
        }) {
            return Err(SaptaError::Config(format!(
                "weight for {m} must be a non-negative number"
            )));
        }
        let total = self.total();
        if (total - 100.0).abs() > 1e-9 {
            return Err(SaptaError::Config(format!(
                "module weights must sum to 100, got {total}"
            )));
        }
        Ok(())
    }
}

/// Rule-based score cut-offs on the 0-100 scale.
///
/// `[pre_markup, 100]` → PRE_MARKUP, `[siap, pre_markup)` → SIAP,
/// `[watchlist, siap)` → WATCHLIST, below `watchlist` → SKIP.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleThresholds {
    pub pre_markup: f64,
    pub siap: f64,
    pub watchlist: f64,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            pre_markup: 80.0,
            siap: 65.0,
            watchlist: 50.0,
        }
    }
}

impl RuleThresholds {
    pub fn validate(&self) -> Result<(), SaptaError> {
        let ok = self.watchlist > 0.0
            && self.watchlist < self.siap
            && self.siap < self.pre_markup
            && self.pre_markup <= 100.0;
        if ok {
            Ok(())
        } else {
            Err(SaptaError::Config(format!(
                "rule thresholds must satisfy 0 < watchlist < siap < pre_markup <= 100, got {}/{}/{}",
                self.watchlist, self.siap, self.pre_markup
            )))
        }
    }

    /// Map a final score onto a status tier.
    pub fn classify(&self, final_score: f64) -> Status {
        if final_score >= self.pre_markup {
            Status::PreMarkup
        } else if final_score >= self.siap {
            Status::Siap
        } else if final_score >= self.watchlist {
            Status::Watchlist
        } else {
            Status::Skip
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub weights: ModuleWeights,
    pub thresholds: RuleThresholds,
    /// Trailing bars handed to the modules.
    pub analysis_window: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: ModuleWeights::default(),
            thresholds: RuleThresholds::default(),
            analysis_window: 250,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), SaptaError> {
        self.weights.validate()?;
        self.thresholds.validate()?;
        if self.analysis_window < MIN_HISTORY_BARS {
            return Err(SaptaError::Config(format!(
                "analysis_window must be at least {MIN_HISTORY_BARS}, got {}",
                self.analysis_window
            )));
        }
        Ok(())
    }
}

/// Forward-return labeling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelingConfig {
    /// Forward horizon in trading days.
    pub target_days: usize,
    /// Minimum max-forward gain, in percent, for a positive label.
    pub target_gain_pct: f64,
    /// Bars of history required before the first labeled date.
    pub min_history_bars: usize,
    /// Label every k-th eligible bar.
    pub stride: usize,
}

impl Default for LabelingConfig {
    fn default() -> Self {
        Self {
            target_days: 20,
            target_gain_pct: 10.0,
            min_history_bars: MIN_HISTORY_BARS,
            stride: 1,
        }
    }
}

impl LabelingConfig {
    pub fn validate(&self) -> Result<(), SaptaError> {
        if self.target_days == 0 {
            return Err(SaptaError::Config("target_days must be positive".into()));
        }
        if self.stride == 0 {
            return Err(SaptaError::Config("stride must be positive".into()));
        }
        if !(self.target_gain_pct.is_finite() && self.target_gain_pct > 0.0) {
            return Err(SaptaError::Config(format!(
                "target_gain_pct must be positive, got {}",
                self.target_gain_pct
            )));
        }
        Ok(())
    }

    /// Target gain as a fraction (10% → 0.10).
    pub fn target_gain(&self) -> f64 {
        self.target_gain_pct / 100.0
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaptaConfig {
    pub engine: EngineConfig,
    pub labeling: LabelingConfig,
}

impl SaptaConfig {
    /// Load and validate a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, SaptaError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SaptaError::Config(format!("read config file {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, SaptaError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| SaptaError::Config(format!("parse config TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, SaptaError> {
        toml::to_string_pretty(self)
            .map_err(|e| SaptaError::Config(format!("serialize config: {e}")))
    }

    pub fn validate(&self) -> Result<(), SaptaError> {
        self.engine.validate()?;
        self.labeling.validate()
    }
}
