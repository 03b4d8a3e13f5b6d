//! SAPTA Core: pre-markup accumulation scoring.
//!
//! This crate contains the serving path:
//! - Domain types (bars, series, module scores, results)
//! - Indicators and the six heuristic scoring modules
//! - Weighted aggregation, status and confidence derivation
//! - Versioned feature extraction
//! - Tree-ensemble classifier and the persisted model artifact
//! - The engine with a hot-swappable model handle

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod features;
pub mod indicators;
pub mod model;
pub mod modules;
pub mod report;
pub mod rng;
pub mod synthetic;

pub use config::{EngineConfig, LabelingConfig, ModuleWeights, RuleThresholds, SaptaConfig};
pub use domain::{
    Bar, BreakoutWindow, Confidence, ModuleId, ModuleScore, OhlcvSeries, SaptaResult, Status,
    StatusBasis, MIN_HISTORY_BARS,
};
pub use engine::SaptaEngine;
pub use error::SaptaError;
pub use features::{FeatureVector, FEATURE_SCHEMA_VERSION};
pub use model::ModelArtifact;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything shared across scan and training
    /// workers is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<Bar>();
        require_sync::<Bar>();
        require_send::<OhlcvSeries>();
        require_sync::<OhlcvSeries>();
        require_send::<ModuleScore>();
        require_sync::<ModuleScore>();
        require_send::<SaptaResult>();
        require_sync::<SaptaResult>();
        require_send::<FeatureVector>();
        require_sync::<FeatureVector>();

        require_send::<modules::ScoringModule>();
        require_sync::<modules::ScoringModule>();
        require_send::<ModelArtifact>();
        require_sync::<ModelArtifact>();
        require_send::<engine::ModelHandle>();
        require_sync::<engine::ModelHandle>();
        require_send::<SaptaEngine>();
        require_sync::<SaptaEngine>();
    }
}
