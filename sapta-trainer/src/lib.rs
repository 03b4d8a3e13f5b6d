//! SAPTA trainer: the offline path that turns price history into a model.
//!
//! This crate builds on `sapta-core` to provide:
//! - CSV loading of daily OHLCV series per ticker
//! - Forward-looking labeling and feature dataset construction
//! - Holdout and walk-forward training of the probability classifier
//! - Quantile threshold learning and artifact assembly
//! - Feature importance and threshold inspection reports

pub mod analysis;
pub mod config;
pub mod data_loader;
pub mod dataset;
pub mod labeler;
pub mod metrics;
pub mod thresholds;
pub mod trainer;
pub mod walk_forward;

pub use analysis::{
    analyze_feature_importance, format_importance_report, format_threshold_report,
    format_training_summary, threshold_warnings, FeatureImportance, ImportanceAnalysis,
};
pub use config::{ConfigError, ModeSelection, TrainerConfig};
pub use data_loader::{load_csv, load_dir, write_csv, LoadError};
pub use dataset::{build_dataset, samples_for_series, Dataset, LabeledSample};
pub use labeler::{label_at, label_series, labelable_indices, Label};
pub use metrics::{roc_auc, validation_metrics, Confusion};
pub use thresholds::learn_thresholds;
pub use trainer::{TrainError, Trainer};
pub use walk_forward::{rolling_windows, WindowSpec};
