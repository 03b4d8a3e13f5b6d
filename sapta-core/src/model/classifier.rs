//! Probability classifiers over feature vectors.
//!
//! `GradientBoosting` fits shallow trees to the log-loss gradient with
//! Newton leaf values and seeded row subsampling. `BaggedTrees` averages
//! trees fitted to bootstrap resamples of the labels; it shares the same
//! hyperparameters and is the fallback when boosting diverges.

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::tree::{TreeBuilder, TreeNode, TreeParams};
use super::ModelError;

/// Probabilities are kept away from 0 and 1 for the log-odds prior.
const PROB_EPS: f64 = 1e-6;
/// Log-odds magnitude past which boosting is considered divergent.
const DIVERGENCE_LOGIT: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    GradientBoosting,
    BaggedTrees,
}

impl std::fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ClassifierKind::GradientBoosting => "gradient_boosting",
            ClassifierKind::BaggedTrees => "bagged_trees",
        })
    }
}

/// Hyperparameters shared by both classifier kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierParams {
    pub kind: ClassifierKind,
    /// Boosting rounds, or trees in the bag.
    pub n_estimators: usize,
    pub max_depth: usize,
    /// Shrinkage; ignored by the bagged fallback.
    pub learning_rate: f64,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Fraction of rows drawn per tree.
    pub subsample: f64,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            kind: ClassifierKind::GradientBoosting,
            n_estimators: 100,
            max_depth: 4,
            learning_rate: 0.1,
            min_samples_split: 20,
            min_samples_leaf: 10,
            subsample: 0.8,
        }
    }
}

impl ClassifierParams {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.n_estimators == 0 || self.max_depth == 0 {
            return Err(ModelError::InvalidParams(
                "n_estimators and max_depth must be positive".into(),
            ));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(ModelError::InvalidParams(format!(
                "subsample must be in (0, 1], got {}",
                self.subsample
            )));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(ModelError::InvalidParams(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
        }
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn normalise(mut importances: Vec<f64>) -> Vec<f64> {
    let total: f64 = importances.iter().sum();
    if total > 0.0 {
        importances.iter_mut().for_each(|v| *v /= total);
    }
    importances
}

fn check_training_set(x: &[Vec<f64>], y: &[u8]) -> Result<usize, ModelError> {
    if x.is_empty() {
        return Err(ModelError::EmptyTrainingSet);
    }
    if x.len() != y.len() {
        return Err(ModelError::ShapeMismatch(format!(
            "{} feature rows vs {} labels",
            x.len(),
            y.len()
        )));
    }
    let width = x[0].len();
    if let Some(row) = x.iter().position(|r| r.len() != width) {
        return Err(ModelError::ShapeMismatch(format!(
            "row {row} has {} features, expected {width}",
            x[row].len()
        )));
    }
    Ok(width)
}

/// Rows drawn without replacement, sorted for deterministic tree building.
fn subsample_rows(n: usize, fraction: f64, rng: &mut StdRng) -> Vec<usize> {
    let k = ((n as f64 * fraction).round() as usize).clamp(1, n);
    if k == n {
        return (0..n).collect();
    }
    let mut rows = sample(rng, n, k).into_vec();
    rows.sort_unstable();
    rows
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    pub n_features: usize,
    pub base_logit: f64,
    pub learning_rate: f64,
    pub trees: Vec<TreeNode>,
    pub importances: Vec<f64>,
}

impl GradientBoosting {
    pub fn fit(
        x: &[Vec<f64>],
        y: &[u8],
        params: &ClassifierParams,
        seed: u64,
    ) -> Result<Self, ModelError> {
        params.validate()?;
        let n_features = check_training_set(x, y)?;
        let n = x.len();
        let target: Vec<f64> = y.iter().map(|&v| f64::from(v.min(1))).collect();

        let base_rate = (target.iter().sum::<f64>() / n as f64).clamp(PROB_EPS, 1.0 - PROB_EPS);
        let base_logit = (base_rate / (1.0 - base_rate)).ln();
        let mut logits = vec![base_logit; n];
        let mut trees = Vec::with_capacity(params.n_estimators);
        let mut importances = vec![0.0; n_features];
        let mut rng = StdRng::seed_from_u64(seed);

        for round in 0..params.n_estimators {
            let mut g = vec![0.0; n];
            let mut h = vec![0.0; n];
            for i in 0..n {
                let p = sigmoid(logits[i]);
                g[i] = target[i] - p;
                h[i] = (p * (1.0 - p)).max(PROB_EPS);
            }
            let rows = subsample_rows(n, params.subsample, &mut rng);
            let mut builder = TreeBuilder::new(x, &g, &h, params.tree_params());
            let tree = builder.build(&rows);
            for (acc, v) in importances.iter_mut().zip(&builder.importances) {
                *acc += v;
            }

            for (i, row) in x.iter().enumerate() {
                logits[i] += params.learning_rate * tree.predict(row);
            }
            if logits.iter().any(|z| !z.is_finite() || z.abs() > DIVERGENCE_LOGIT) {
                return Err(ModelError::Diverged(format!(
                    "log-odds left the stable range at round {round}"
                )));
            }
            trees.push(tree);
        }

        Ok(Self {
            n_features,
            base_logit,
            learning_rate: params.learning_rate,
            trees,
            importances: normalise(importances),
        })
    }

    pub fn predict_proba(&self, x: &[f64]) -> f64 {
        let z = self.base_logit
            + self.learning_rate * self.trees.iter().map(|t| t.predict(x)).sum::<f64>();
        sigmoid(z)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaggedTrees {
    pub n_features: usize,
    pub trees: Vec<TreeNode>,
    pub importances: Vec<f64>,
}

impl BaggedTrees {
    pub fn fit(
        x: &[Vec<f64>],
        y: &[u8],
        params: &ClassifierParams,
        seed: u64,
    ) -> Result<Self, ModelError> {
        params.validate()?;
        let n_features = check_training_set(x, y)?;
        let n = x.len();
        let target: Vec<f64> = y.iter().map(|&v| f64::from(v.min(1))).collect();
        let ones = vec![1.0; n];
        let draw = ((n as f64 * params.subsample).round() as usize).clamp(1, n);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut trees = Vec::with_capacity(params.n_estimators);
        let mut importances = vec![0.0; n_features];

        for _ in 0..params.n_estimators {
            let mut rows: Vec<usize> = (0..draw).map(|_| rng.gen_range(0..n)).collect();
            rows.sort_unstable();
            let mut builder = TreeBuilder::new(x, &target, &ones, params.tree_params());
            trees.push(builder.build(&rows));
            for (acc, v) in importances.iter_mut().zip(&builder.importances) {
                *acc += v;
            }
        }

        Ok(Self {
            n_features,
            trees,
            importances: normalise(importances),
        })
    }

    pub fn predict_proba(&self, x: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.5;
        }
        let mean = self.trees.iter().map(|t| t.predict(x)).sum::<f64>() / self.trees.len() as f64;
        mean.clamp(0.0, 1.0)
    }
}

/// A fitted probability classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classifier {
    GradientBoosting(GradientBoosting),
    BaggedTrees(BaggedTrees),
}

impl Classifier {
    /// Fit the configured kind. A divergent boosting run falls back to
    /// bagged trees with the same hyperparameters.
    pub fn fit(
        x: &[Vec<f64>],
        y: &[u8],
        params: &ClassifierParams,
        seed: u64,
    ) -> Result<Self, ModelError> {
        match params.kind {
            ClassifierKind::BaggedTrees => {
                Ok(Self::BaggedTrees(BaggedTrees::fit(x, y, params, seed)?))
            }
            ClassifierKind::GradientBoosting => match GradientBoosting::fit(x, y, params, seed) {
                Ok(gb) => Ok(Self::GradientBoosting(gb)),
                Err(ModelError::Diverged(reason)) => {
                    tracing::warn!(
                        %reason,
                        "gradient boosting diverged, falling back to bagged trees"
                    );
                    Ok(Self::BaggedTrees(BaggedTrees::fit(x, y, params, seed)?))
                }
                Err(e) => Err(e),
            },
        }
    }

    pub fn kind(&self) -> ClassifierKind {
        match self {
            Self::GradientBoosting(_) => ClassifierKind::GradientBoosting,
            Self::BaggedTrees(_) => ClassifierKind::BaggedTrees,
        }
    }

    pub fn n_features(&self) -> usize {
        match self {
            Self::GradientBoosting(m) => m.n_features,
            Self::BaggedTrees(m) => m.n_features,
        }
    }

    /// Probability of the positive class, in [0, 1].
    pub fn predict_proba(&self, x: &[f64]) -> f64 {
        match self {
            Self::GradientBoosting(m) => m.predict_proba(x),
            Self::BaggedTrees(m) => m.predict_proba(x),
        }
    }

    pub fn predict_proba_batch(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|r| self.predict_proba(r)).collect()
    }

    /// Split-gain importances, normalised to sum to 1 (all zero for a
    /// model that never split).
    pub fn feature_importances(&self) -> &[f64] {
        match self {
            Self::GradientBoosting(m) => &m.importances,
            Self::BaggedTrees(m) => &m.importances,
        }
    }

    pub fn n_trees(&self) -> usize {
        match self {
            Self::GradientBoosting(m) => m.trees.len(),
            Self::BaggedTrees(m) => m.trees.len(),
        }
    }
}
