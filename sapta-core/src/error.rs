//! Error taxonomy for the serving path.
//!
//! Propagation policy:
//! - `InsufficientData` never leaves a module: it becomes an abstention note.
//! - `SchemaMismatch`, `SchemaHashMismatch` and `ModelLoad` never interrupt
//!   scoring: the engine logs them and falls back to rule-based thresholds.
//! - `EmptySeries` / `InvalidSeries` reject malformed input up front.

use thiserror::Error;

use crate::domain::ModuleId;

#[derive(Debug, Error)]
pub enum SaptaError {
    #[error("insufficient data for {module}: {available} bars < required {required}")]
    InsufficientData {
        module: ModuleId,
        required: usize,
        available: usize,
    },

    #[error("feature schema mismatch: extractor v{expected}, artifact v{found}")]
    SchemaMismatch { expected: u32, found: u32 },

    /// Same schema version, different feature names or order.
    #[error("feature schema hash mismatch: extractor {expected}, artifact {found}")]
    SchemaHashMismatch { expected: String, found: String },

    #[error("failed to load model artifact '{path}': {reason}")]
    ModelLoad { path: String, reason: String },

    #[error("series '{ticker}' has no bars")]
    EmptySeries { ticker: String },

    #[error("invalid series '{ticker}': {reason}")]
    InvalidSeries { ticker: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SaptaError {
    /// Errors that only disable ML calibration; the rule-based path still runs.
    pub fn is_calibration_fallback(&self) -> bool {
        matches!(
            self,
            Self::SchemaMismatch { .. } | Self::SchemaHashMismatch { .. } | Self::ModelLoad { .. }
        )
    }
}
