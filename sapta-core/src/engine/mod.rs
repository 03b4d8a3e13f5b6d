//! Scoring engine: runs the six modules over a series, aggregates, and
//! optionally calibrates the status with a loaded model artifact.
//!
//! Per evaluation: INIT → MODULES_RUN → AGGREGATED →
//! (ML_CALIBRATED | RULE_CLASSIFIED) → RESULT_EMITTED. No retries; module
//! problems degrade to abstentions and model problems to rule-based status.

pub mod aggregate;
pub mod handle;
pub mod status;

pub use aggregate::{aggregate, Aggregate};
pub use handle::ModelHandle;
pub use status::{classify, confidence};

use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::config::EngineConfig;
use crate::domain::{ModuleId, ModuleScore, OhlcvSeries, SaptaResult, Status};
use crate::error::SaptaError;
use crate::features::{extract, FeatureVector};
use crate::model::ModelArtifact;
use crate::modules::{time_projection, ScoringModule, WavePhase};

pub struct SaptaEngine {
    config: EngineConfig,
    modules: Vec<ScoringModule>,
    model: ModelHandle,
}

impl SaptaEngine {
    /// Build an engine from a validated config.
    pub fn new(config: EngineConfig) -> Result<Self, SaptaError> {
        config.validate()?;
        Ok(Self {
            config,
            modules: ScoringModule::all(),
            model: ModelHandle::new(),
        })
    }

    pub fn with_defaults() -> Self {
        Self {
            config: EngineConfig::default(),
            modules: ScoringModule::all(),
            model: ModelHandle::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn modules(&self) -> &[ScoringModule] {
        &self.modules
    }

    /// Evaluate the latest bar of a series.
    pub fn evaluate(&self, series: &OhlcvSeries) -> Result<SaptaResult, SaptaError> {
        if series.is_empty() {
            return Err(SaptaError::EmptySeries {
                ticker: series.ticker().to_string(),
            });
        }
        self.evaluate_at(series, series.len() - 1)
    }

    /// Evaluate as of bar `index`, seeing only bars `[..=index]`.
    pub fn evaluate_at(
        &self,
        series: &OhlcvSeries,
        index: usize,
    ) -> Result<SaptaResult, SaptaError> {
        self.evaluate_with_features(series, index).map(|(result, _)| result)
    }

    /// Evaluate as of bar `index` and return the feature vector alongside.
    pub fn evaluate_with_features(
        &self,
        series: &OhlcvSeries,
        index: usize,
    ) -> Result<(SaptaResult, FeatureVector), SaptaError> {
        let ticker = series.ticker();
        if index >= series.len() {
            return Err(SaptaError::InvalidSeries {
                ticker: ticker.to_string(),
                reason: format!("index {index} beyond {} bars", series.len()),
            });
        }
        let model = self.model.snapshot();
        trace!(ticker, index, stage = "init");

        let end = index + 1;
        let start = end.saturating_sub(self.config.analysis_window);
        let bars = &series.bars()[start..end];

        let breakdown: Vec<ModuleScore> = self.modules.iter().map(|m| m.analyze(bars)).collect();
        trace!(ticker, stage = "modules_run");

        let agg = aggregate(&breakdown, &self.config.weights);
        let features = extract(&breakdown, &agg, bars);
        trace!(ticker, final_score = agg.final_score, stage = "aggregated");

        let calibration = model.as_deref().and_then(|artifact| {
            match features
                .ensure_schema(artifact.feature_schema_version)
                .and_then(|_| artifact.check_schema())
            {
                Ok(()) => Some((artifact.predict_proba(features.as_slice()), artifact)),
                Err(e) => {
                    warn!(ticker, model_id = artifact.short_id(), "{e}; using rule-based status");
                    None
                }
            }
        });

        let (status, basis) = classify(
            agg.final_score,
            &self.config.thresholds,
            calibration.map(|(p, a)| (p, &a.thresholds)),
        );
        let probability = calibration.map(|(p, _)| p);
        trace!(
            ticker,
            stage = if probability.is_some() { "ml_calibrated" } else { "rule_classified" }
        );

        let result = SaptaResult {
            ticker: ticker.to_string(),
            evaluated_date: bars[bars.len() - 1].date,
            final_score: agg.final_score,
            weighted_score: agg.weighted_score,
            max_weighted_score: agg.max_weighted_score,
            status,
            status_basis: basis,
            confidence: confidence(agg.active_count, probability),
            wave_phase: wave_phase(&breakdown),
            fib_retracement: module_diag(&breakdown, ModuleId::Elliott, "fib_retracement"),
            projected_breakout_window: breakout_window(&breakdown),
            module_breakdown: breakdown,
            ml_probability: probability,
            model_id: calibration.map(|(_, a)| a.model_id.clone()),
        };
        trace!(ticker, status = %result.status, stage = "result_emitted");
        Ok((result, features))
    }

    /// Evaluate a universe in parallel, keeping results at or above
    /// `min_status`, best score first (ties by ticker).
    pub fn scan(&self, universe: &[OhlcvSeries], min_status: Status) -> Vec<SaptaResult> {
        let mut results: Vec<SaptaResult> = universe
            .par_iter()
            .filter_map(|series| match self.evaluate(series) {
                Ok(r) => Some(r),
                Err(e) => {
                    warn!(ticker = series.ticker(), "skipped in scan: {e}");
                    None
                }
            })
            .filter(|r| r.status >= min_status)
            .collect();
        results.sort_by(|a, b| {
            b.final_score
                .total_cmp(&a.final_score)
                .then_with(|| a.ticker.cmp(&b.ticker))
        });
        debug!(scanned = universe.len(), matched = results.len(), "scan complete");
        results
    }

    /// Load an artifact from disk and install it. A schema mismatch or an
    /// unreadable file leaves the current model untouched.
    pub fn load_model(&self, path: &Path) -> Result<u64, SaptaError> {
        let artifact = ModelArtifact::load(path).map_err(|e| {
            warn!("{e}; continuing with rule-based status");
            e
        })?;
        self.install_model(artifact)
    }

    /// Install an artifact after checking it matches the feature schema.
    pub fn install_model(&self, artifact: ModelArtifact) -> Result<u64, SaptaError> {
        if let Err(e) = artifact.check_schema() {
            warn!(model_id = artifact.short_id(), "{e}; model not installed");
            return Err(e);
        }
        let model_id = artifact.short_id().to_string();
        let generation = self.model.install(Arc::new(artifact));
        info!(model_id, generation, "model installed");
        Ok(generation)
    }

    pub fn clear_model(&self) {
        if let Some(previous) = self.model.clear() {
            info!(model_id = previous.short_id(), "model cleared");
        }
    }

    pub fn model_snapshot(&self) -> Option<Arc<ModelArtifact>> {
        self.model.snapshot()
    }

    pub fn model_generation(&self) -> u64 {
        self.model.generation()
    }
}

fn module_diag(breakdown: &[ModuleScore], id: ModuleId, key: &str) -> Option<f64> {
    breakdown
        .iter()
        .find(|m| m.module == id)
        .and_then(|m| m.diagnostic(key))
}

fn wave_phase(breakdown: &[ModuleScore]) -> Option<String> {
    module_diag(breakdown, ModuleId::Elliott, "wave_code")
        .and_then(WavePhase::from_code)
        .map(|p| p.to_string())
}

fn breakout_window(breakdown: &[ModuleScore]) -> Option<crate::domain::BreakoutWindow> {
    let tp = breakdown.iter().find(|m| m.module == ModuleId::TimeProjection)?;
    if !tp.active {
        return None;
    }
    tp.diagnostic("days_to_next_target")
        .map(|d| time_projection::breakout_window(d as u32))
}
