//! Trainer configuration, read from the `[trainer]` table of the shared
//! TOML config file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use sapta_core::model::ClassifierParams;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid trainer config: {0}")]
    Invalid(String),
}

/// How to split samples into train and validation sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeSelection {
    /// Walk-forward once there are `auto_walk_forward_min` samples, else holdout.
    #[default]
    Auto,
    Holdout,
    WalkForward,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub seed: u64,
    pub mode: ModeSelection,
    pub auto_walk_forward_min: usize,
    /// Fewer samples than this is an error.
    pub min_samples: usize,
    pub train_months: u32,
    pub test_months: u32,
    /// Validation share in holdout mode.
    pub holdout_fraction: f64,
    /// Threads in the dataset-building pool.
    pub workers: usize,
    pub classifier: ClassifierParams,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            mode: ModeSelection::Auto,
            auto_walk_forward_min: 5000,
            min_samples: 100,
            train_months: 36,
            test_months: 6,
            holdout_fraction: 0.2,
            workers: 4,
            classifier: ClassifierParams::default(),
        }
    }
}

/// The slice of the config file the trainer cares about.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    trainer: TrainerConfig,
}

impl TrainerConfig {
    /// Load the `[trainer]` table; a file without one yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;
        file.trainer.validate()?;
        Ok(file.trainer)
    }

    /// Serialize as a `[trainer]` table.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        #[derive(Serialize)]
        struct Wrapper<'a> {
            trainer: &'a TrainerConfig,
        }
        Ok(toml::to_string_pretty(&Wrapper { trainer: self })?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.train_months == 0 || self.test_months == 0 {
            return Err(ConfigError::Invalid(
                "train_months and test_months must be positive".into(),
            ));
        }
        if !(self.holdout_fraction > 0.0 && self.holdout_fraction < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "holdout_fraction must be in (0, 1), got {}",
                self.holdout_fraction
            )));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.min_samples == 0 {
            return Err(ConfigError::Invalid("min_samples must be at least 1".into()));
        }
        self.classifier
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sapta_core::model::ClassifierKind;

    #[test]
    fn empty_file_is_defaults() {
        let cfg = TrainerConfig::from_toml("").unwrap();
        assert_eq!(cfg, TrainerConfig::default());
        assert_eq!(cfg.mode, ModeSelection::Auto);
    }

    #[test]
    fn reads_trainer_table_and_ignores_others() {
        let cfg = TrainerConfig::from_toml(
            r#"
            [engine]
            analysis_window = 300

            [trainer]
            seed = 7
            mode = "walk_forward"
            train_months = 24

            [trainer.classifier]
            kind = "bagged_trees"
            n_estimators = 50
            "#,
        )
        .unwrap();
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.mode, ModeSelection::WalkForward);
        assert_eq!(cfg.train_months, 24);
        assert_eq!(cfg.test_months, 6);
        assert_eq!(cfg.classifier.kind, ClassifierKind::BaggedTrees);
        assert_eq!(cfg.classifier.n_estimators, 50);
        assert_eq!(cfg.classifier.max_depth, 4);
    }

    #[test]
    fn toml_roundtrip() {
        let cfg = TrainerConfig {
            seed: 99,
            mode: ModeSelection::Holdout,
            ..TrainerConfig::default()
        };
        let text = cfg.to_toml().unwrap();
        assert_eq!(TrainerConfig::from_toml(&text).unwrap(), cfg);
    }

    #[test]
    fn rejects_bad_fraction() {
        let err = TrainerConfig::from_toml("[trainer]\nholdout_fraction = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
