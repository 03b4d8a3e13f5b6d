//! Learned calibration layer: classifiers and the persisted artifact.

pub mod artifact;
pub mod classifier;
pub mod tree;

pub use artifact::{
    ModelArtifact, ProbabilityThresholds, TrainingMode, TrainingSummary, ValidationMetrics,
    WindowSummary,
};
pub use classifier::{BaggedTrees, Classifier, ClassifierKind, ClassifierParams, GradientBoosting};
pub use tree::{TreeNode, TreeParams};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("invalid classifier parameters: {0}")]
    InvalidParams(String),

    #[error("boosting diverged: {0}")]
    Diverged(String),

    #[error("invalid thresholds: {0}")]
    InvalidThresholds(String),

    #[error("artifact I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
