//! Classification metrics: pure functions, labels and probabilities in,
//! scalar out.

use sapta_core::model::ValidationMetrics;

/// Probability at or above which a prediction counts as positive.
pub const DECISION_CUTOFF: f64 = 0.5;

/// Compute every validation metric at the default cut-off.
pub fn validation_metrics(y_true: &[u8], proba: &[f64]) -> ValidationMetrics {
    let n = y_true.len().min(proba.len());
    let (y_true, proba) = (&y_true[..n], &proba[..n]);
    let c = Confusion::at(y_true, proba, DECISION_CUTOFF);
    ValidationMetrics {
        accuracy: c.accuracy(),
        precision: c.precision(),
        recall: c.recall(),
        f1: c.f1(),
        auc: roc_auc(y_true, proba),
        n_samples: n,
        positive_rate: if n == 0 {
            0.0
        } else {
            y_true.iter().filter(|&&y| y == 1).count() as f64 / n as f64
        },
    }
}

// ─── Confusion matrix ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Confusion {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_: usize,
}

impl Confusion {
    pub fn at(y_true: &[u8], proba: &[f64], cutoff: f64) -> Self {
        let mut c = Self::default();
        for (&y, &p) in y_true.iter().zip(proba) {
            match (y == 1, p >= cutoff) {
                (true, true) => c.tp += 1,
                (false, true) => c.fp += 1,
                (false, false) => c.tn += 1,
                (true, false) => c.fn_ += 1,
            }
        }
        c
    }

    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.total())
    }

    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r > 0.0 {
            2.0 * p * r / (p + r)
        } else {
            0.0
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

// ─── ROC AUC ────────────────────────────────────────────────────────

/// Area under the ROC curve via the rank-sum statistic, with tied scores
/// sharing their average rank. 0.5 when only one class is present.
pub fn roc_auc(y_true: &[u8], proba: &[f64]) -> f64 {
    let n = y_true.len().min(proba.len());
    let n_pos = y_true[..n].iter().filter(|&&y| y == 1).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| proba[a].total_cmp(&proba[b]));

    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && proba[order[j + 1]] == proba[order[i]] {
            j += 1;
        }
        // Ranks are 1-based; ties get the mean of i+1..=j+1.
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &k in &order[i..=j] {
            if y_true[k] == 1 {
                rank_sum_pos += avg_rank;
            }
        }
        i = j + 1;
    }

    let u = rank_sum_pos - (n_pos * (n_pos + 1)) as f64 / 2.0;
    u / (n_pos * n_neg) as f64
}
