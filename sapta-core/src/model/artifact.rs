//! Persisted model artifact: classifier, learned thresholds and the metrics
//! they were validated with.
//!
//! Written once by the trainer (temp file + rename, so readers never observe
//! a partial file) and read-only afterwards. Retraining produces a new
//! artifact with a new `model_id`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::{Classifier, ClassifierParams, ModelError};
use crate::domain::Status;
use crate::error::SaptaError;
use crate::features::{feature_count, feature_names, feature_schema_hash, FEATURE_SCHEMA_VERSION};

/// Probability cut-offs learned from validation predictions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityThresholds {
    pub pre_markup: f64,
    pub siap: f64,
    pub watchlist: f64,
}

impl ProbabilityThresholds {
    pub fn validate(&self) -> Result<(), ModelError> {
        let in_unit = [self.pre_markup, self.siap, self.watchlist]
            .iter()
            .all(|p| (0.0..=1.0).contains(p));
        if in_unit && self.pre_markup >= self.siap && self.siap >= self.watchlist {
            Ok(())
        } else {
            Err(ModelError::InvalidThresholds(format!(
                "expected 1 >= pre_markup >= siap >= watchlist >= 0, got {:.4}/{:.4}/{:.4}",
                self.pre_markup, self.siap, self.watchlist
            )))
        }
    }

    pub fn classify(&self, probability: f64) -> Status {
        if probability >= self.pre_markup {
            Status::PreMarkup
        } else if probability >= self.siap {
            Status::Siap
        } else if probability >= self.watchlist {
            Status::Watchlist
        } else {
            Status::Skip
        }
    }
}

/// Binary classification metrics on a held-out set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub auc: f64,
    pub n_samples: usize,
    pub positive_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingMode {
    Holdout,
    WalkForward,
}

impl std::fmt::Display for TrainingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TrainingMode::Holdout => "holdout",
            TrainingMode::WalkForward => "walk_forward",
        })
    }
}

/// One train/test window of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSummary {
    pub index: usize,
    pub train_start: NaiveDate,
    pub train_end: NaiveDate,
    pub test_start: NaiveDate,
    pub test_end: NaiveDate,
    pub n_train: usize,
    pub n_test: usize,
    pub metrics: ValidationMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub mode: TrainingMode,
    pub n_samples: usize,
    pub positive_rate: f64,
    pub seed: u64,
    pub params: ClassifierParams,
    pub windows: Vec<WindowSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// BLAKE3 of the serialized classifier.
    pub model_id: String,
    pub trained_at: DateTime<Utc>,
    pub feature_schema_version: u32,
    pub feature_schema_hash: String,
    pub feature_names: Vec<String>,
    pub classifier: Classifier,
    pub thresholds: ProbabilityThresholds,
    pub validation_metrics: ValidationMetrics,
    pub summary: TrainingSummary,
}

impl ModelArtifact {
    /// Assemble an artifact for the current feature schema.
    pub fn new(
        classifier: Classifier,
        thresholds: ProbabilityThresholds,
        validation_metrics: ValidationMetrics,
        summary: TrainingSummary,
        trained_at: DateTime<Utc>,
    ) -> Result<Self, ModelError> {
        thresholds.validate()?;
        if classifier.n_features() != feature_count() {
            return Err(ModelError::ShapeMismatch(format!(
                "classifier expects {} features, schema has {}",
                classifier.n_features(),
                feature_count()
            )));
        }
        let model_id = blake3::hash(&serde_json::to_vec(&classifier)?)
            .to_hex()
            .to_string();
        Ok(Self {
            model_id,
            trained_at,
            feature_schema_version: FEATURE_SCHEMA_VERSION,
            feature_schema_hash: feature_schema_hash().to_string(),
            feature_names: feature_names().to_vec(),
            classifier,
            thresholds,
            validation_metrics,
            summary,
        })
    }

    /// Short form of the model id for logs and reports.
    pub fn short_id(&self) -> &str {
        &self.model_id[..self.model_id.len().min(12)]
    }

    /// Whether this artifact can score vectors from the running extractor.
    pub fn check_schema(&self) -> Result<(), SaptaError> {
        if self.feature_schema_version != FEATURE_SCHEMA_VERSION
            || self.classifier.n_features() != feature_count()
        {
            return Err(SaptaError::SchemaMismatch {
                expected: FEATURE_SCHEMA_VERSION,
                found: self.feature_schema_version,
            });
        }
        if self.feature_schema_hash != feature_schema_hash() {
            return Err(SaptaError::SchemaHashMismatch {
                expected: feature_schema_hash().to_string(),
                found: self.feature_schema_hash.clone(),
            });
        }
        Ok(())
    }

    pub fn predict_proba(&self, features: &[f64]) -> f64 {
        self.classifier.predict_proba(features).clamp(0.0, 1.0)
    }

    /// Write atomically: serialize to `<path>.tmp`, then rename into place.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(self)?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            ModelError::Io(e)
        })?;
        tracing::info!(
            model_id = self.short_id(),
            path = %path.display(),
            "model artifact written"
        );
        Ok(())
    }

    /// Read an artifact. Schema compatibility is checked separately so that
    /// callers can report a mismatch distinctly from a broken file.
    pub fn load(path: &Path) -> Result<Self, SaptaError> {
        let model_load = |reason: String| SaptaError::ModelLoad {
            path: path.display().to_string(),
            reason,
        };
        let content = fs::read(path).map_err(|e| model_load(e.to_string()))?;
        let artifact: Self =
            serde_json::from_slice(&content).map_err(|e| model_load(e.to_string()))?;
        artifact
            .thresholds
            .validate()
            .map_err(|e| model_load(e.to_string()))?;
        Ok(artifact)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::ClassifierKind;

    /// A small but real artifact over the full feature schema.
    pub(crate) fn tiny_artifact() -> ModelArtifact {
        let n = feature_count();
        let x: Vec<Vec<f64>> = (0..60)
            .map(|i| {
                let mut row = vec![0.0; n];
                row[0] = i as f64;
                row
            })
            .collect();
        let y: Vec<u8> = (0..60).map(|i| u8::from(i >= 30)).collect();
        let params = ClassifierParams {
            kind: ClassifierKind::GradientBoosting,
            n_estimators: 10,
            max_depth: 2,
            min_samples_split: 4,
            min_samples_leaf: 2,
            ..ClassifierParams::default()
        };
        let classifier = Classifier::fit(&x, &y, &params, 1).unwrap();
        let summary = TrainingSummary {
            mode: TrainingMode::Holdout,
            n_samples: 60,
            positive_rate: 0.5,
            seed: 1,
            params,
            windows: vec![],
        };
        ModelArtifact::new(
            classifier,
            ProbabilityThresholds {
                pre_markup: 0.8,
                siap: 0.6,
                watchlist: 0.4,
            },
            ValidationMetrics::default(),
            summary,
            DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn probability_tiers() {
        let t = ProbabilityThresholds {
            pre_markup: 0.8,
            siap: 0.6,
            watchlist: 0.4,
        };
        assert_eq!(t.classify(0.9), Status::PreMarkup);
        assert_eq!(t.classify(0.6), Status::Siap);
        assert_eq!(t.classify(0.45), Status::Watchlist);
        assert_eq!(t.classify(0.1), Status::Skip);
    }

    #[test]
    fn inverted_thresholds_rejected() {
        let t = ProbabilityThresholds {
            pre_markup: 0.3,
            siap: 0.6,
            watchlist: 0.4,
        };
        assert!(t.validate().is_err());
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("sapta.json");
        let artifact = tiny_artifact();
        artifact.save(&path).unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = ModelArtifact::load(&path).unwrap();
        assert_eq!(loaded.model_id, artifact.model_id);
        assert_eq!(loaded.feature_names.len(), feature_count());
        assert!(loaded.check_schema().is_ok());
    }

    #[test]
    fn model_id_is_content_hash() {
        let a = tiny_artifact();
        let b = tiny_artifact();
        assert_eq!(a.model_id, b.model_id);
        assert_eq!(a.model_id.len(), 64);
        assert_eq!(a.short_id().len(), 12);
    }

    #[test]
    fn stale_schema_detected() {
        let mut a = tiny_artifact();
        a.feature_schema_version = FEATURE_SCHEMA_VERSION + 1;
        let err = a.check_schema().unwrap_err();
        assert!(matches!(err, SaptaError::SchemaMismatch { .. }));
    }

    #[test]
    fn tampered_schema_hash_detected() {
        let mut a = tiny_artifact();
        a.feature_schema_hash = "0".repeat(64);
        let err = a.check_schema().unwrap_err();
        assert!(matches!(err, SaptaError::SchemaHashMismatch { .. }));
        assert!(err.is_calibration_fallback());
    }

    #[test]
    fn corrupt_file_is_model_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, b"{not json").unwrap();
        let err = ModelArtifact::load(&path).unwrap_err();
        assert!(matches!(err, SaptaError::ModelLoad { .. }));
        let missing = ModelArtifact::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(missing.is_calibration_fallback());
    }
}
