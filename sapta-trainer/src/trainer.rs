//! Classifier training with holdout or walk-forward validation.
//!
//! Holdout: seeded shuffle and a single train/validation split.
//! Walk-forward: sequential rolling windows, a fresh classifier per window,
//! scored on that window's test span. The deployed model is the last usable
//! window's fit and its test predictions set the probability thresholds.
//! Validation metrics are pooled over every window's test predictions.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};

use sapta_core::model::{
    Classifier, ModelArtifact, ModelError, TrainingMode, TrainingSummary, ValidationMetrics,
    WindowSummary,
};
use sapta_core::rng::RngHierarchy;
use sapta_core::{LabelingConfig, OhlcvSeries, SaptaEngine, SaptaError, FEATURE_SCHEMA_VERSION};

use crate::config::{ModeSelection, TrainerConfig};
use crate::dataset::{build_dataset, Dataset};
use crate::metrics::validation_metrics;
use crate::thresholds::learn_thresholds;
use crate::walk_forward::{rolling_windows, split};

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("insufficient training data: {available} samples < required {required}")]
    TrainingDataInsufficient { available: usize, required: usize },

    #[error("training cancelled")]
    Cancelled,

    #[error("no walk-forward window had enough data to train")]
    NoUsableWindows,

    #[error("invalid trainer config: {0}")]
    InvalidConfig(String),

    #[error("invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error(transparent)]
    Engine(#[from] SaptaError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|f| f.load(Ordering::Relaxed))
}

/// Output of one fitted split before it is packaged.
struct Fitted {
    classifier: Classifier,
    validation_proba: Vec<f64>,
}

pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Result<Self, TrainError> {
        config
            .validate()
            .map_err(|e| TrainError::InvalidConfig(e.to_string()))?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Mode for a dataset of `n_samples`.
    pub fn resolve_mode(&self, n_samples: usize) -> TrainingMode {
        match self.config.mode {
            ModeSelection::Holdout => TrainingMode::Holdout,
            ModeSelection::WalkForward => TrainingMode::WalkForward,
            ModeSelection::Auto if n_samples < self.config.auto_walk_forward_min => {
                TrainingMode::Holdout
            }
            ModeSelection::Auto => TrainingMode::WalkForward,
        }
    }

    /// Label, featurize and train on a universe of series.
    pub fn train_universe(
        &self,
        engine: &SaptaEngine,
        universe: &[OhlcvSeries],
        labeling: &LabelingConfig,
        cancel: Option<&AtomicBool>,
    ) -> Result<ModelArtifact, TrainError> {
        let dataset = build_dataset(engine, universe, labeling, self.config.workers, cancel)?;
        self.train(&dataset, cancel)
    }

    pub fn train(
        &self,
        dataset: &Dataset,
        cancel: Option<&AtomicBool>,
    ) -> Result<ModelArtifact, TrainError> {
        self.train_at(dataset, cancel, Utc::now())
    }

    /// Train with an explicit timestamp for the artifact.
    pub fn train_at(
        &self,
        dataset: &Dataset,
        cancel: Option<&AtomicBool>,
        trained_at: DateTime<Utc>,
    ) -> Result<ModelArtifact, TrainError> {
        if dataset.schema_version != FEATURE_SCHEMA_VERSION {
            return Err(SaptaError::SchemaMismatch {
                expected: FEATURE_SCHEMA_VERSION,
                found: dataset.schema_version,
            }
            .into());
        }
        if dataset.len() < self.config.min_samples {
            return Err(TrainError::TrainingDataInsufficient {
                available: dataset.len(),
                required: self.config.min_samples,
            });
        }

        let mode = self.resolve_mode(dataset.len());
        info!(
            %mode,
            samples = dataset.len(),
            positive_rate = dataset.positive_rate(),
            seed = self.config.seed,
            "training started"
        );
        let rng = RngHierarchy::new(self.config.seed);
        let (fitted, metrics, windows) = match mode {
            TrainingMode::Holdout => self.holdout(dataset, &rng, cancel)?,
            TrainingMode::WalkForward => self.walk_forward(dataset, &rng, cancel)?,
        };

        let thresholds = learn_thresholds(&fitted.validation_proba)?;
        let summary = TrainingSummary {
            mode,
            n_samples: dataset.len(),
            positive_rate: dataset.positive_rate(),
            seed: self.config.seed,
            params: self.config.classifier.clone(),
            windows,
        };
        let artifact =
            ModelArtifact::new(fitted.classifier, thresholds, metrics, summary, trained_at)?;
        info!(
            model_id = artifact.short_id(),
            auc = metrics.auc,
            f1 = metrics.f1,
            pre_markup = thresholds.pre_markup,
            siap = thresholds.siap,
            watchlist = thresholds.watchlist,
            "training finished"
        );
        Ok(artifact)
    }

    fn holdout(
        &self,
        dataset: &Dataset,
        rng: &RngHierarchy,
        cancel: Option<&AtomicBool>,
    ) -> Result<(Fitted, ValidationMetrics, Vec<WindowSummary>), TrainError> {
        let n = dataset.len();
        if n < 2 {
            return Err(TrainError::TrainingDataInsufficient {
                available: n,
                required: 2,
            });
        }
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut rng.rng_for("holdout", 0));
        let n_test = ((n as f64 * self.config.holdout_fraction).round() as usize).clamp(1, n - 1);
        let (test, train) = order.split_at(n_test);
        let (mut train, mut test) = (train.to_vec(), test.to_vec());
        train.sort_unstable();
        test.sort_unstable();

        if is_cancelled(cancel) {
            info!("training cancelled");
            return Err(TrainError::Cancelled);
        }
        let classifier = Classifier::fit(
            &dataset.rows(&train),
            &dataset.labels(&train),
            &self.config.classifier,
            rng.sub_seed("fit", 0),
        )?;
        let proba = classifier.predict_proba_batch(&dataset.rows(&test));
        let metrics = validation_metrics(&dataset.labels(&test), &proba);

        let (first, last) = dataset
            .date_range()
            .ok_or(TrainError::TrainingDataInsufficient {
                available: 0,
                required: self.config.min_samples,
            })?;
        let summary = WindowSummary {
            index: 0,
            train_start: first,
            train_end: last,
            test_start: first,
            test_end: last,
            n_train: train.len(),
            n_test: test.len(),
            metrics,
        };
        Ok((
            Fitted {
                classifier,
                validation_proba: proba,
            },
            metrics,
            vec![summary],
        ))
    }

    fn walk_forward(
        &self,
        dataset: &Dataset,
        rng: &RngHierarchy,
        cancel: Option<&AtomicBool>,
    ) -> Result<(Fitted, ValidationMetrics, Vec<WindowSummary>), TrainError> {
        let (first, last) = dataset.date_range().ok_or(TrainError::NoUsableWindows)?;
        let windows =
            rolling_windows(first, last, self.config.train_months, self.config.test_months);
        debug!(windows = windows.len(), %first, %last, "walk-forward windows");

        let mut summaries = Vec::with_capacity(windows.len());
        let mut pooled_y = Vec::new();
        let mut pooled_p = Vec::new();
        let mut deployed = None;

        for window in &windows {
            if is_cancelled(cancel) {
                info!(window = window.index, "training cancelled");
                return Err(TrainError::Cancelled);
            }
            let (train, test) = split(dataset, window);
            let y_train = dataset.labels(&train);
            let positives = y_train.iter().filter(|&&y| y == 1).count();
            if train.len() < self.config.min_samples
                || test.is_empty()
                || positives == 0
                || positives == y_train.len()
            {
                warn!(
                    window = window.index,
                    n_train = train.len(),
                    n_test = test.len(),
                    positives,
                    "window skipped"
                );
                continue;
            }

            let classifier = Classifier::fit(
                &dataset.rows(&train),
                &y_train,
                &self.config.classifier,
                rng.sub_seed("window", window.index as u64),
            )?;
            let proba = classifier.predict_proba_batch(&dataset.rows(&test));
            let y_test = dataset.labels(&test);
            let metrics = validation_metrics(&y_test, &proba);
            info!(
                window = window.index,
                train_start = %window.train_start,
                test_end = %window.test_end,
                n_train = train.len(),
                n_test = test.len(),
                auc = metrics.auc,
                "window trained"
            );

            summaries.push(WindowSummary {
                index: window.index,
                train_start: window.train_start,
                train_end: window.train_end,
                test_start: window.test_start,
                test_end: window.test_end,
                n_train: train.len(),
                n_test: test.len(),
                metrics,
            });
            pooled_y.extend_from_slice(&y_test);
            pooled_p.extend_from_slice(&proba);
            deployed = Some(Fitted {
                classifier,
                validation_proba: proba,
            });
        }

        let fitted = deployed.ok_or(TrainError::NoUsableWindows)?;
        Ok((fitted, validation_metrics(&pooled_y, &pooled_p), summaries))
    }
}
