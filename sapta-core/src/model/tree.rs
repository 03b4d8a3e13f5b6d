//! Regression tree fitted on first/second-order statistics.
//!
//! Each sample carries a gradient `g` and a hessian `h`. A leaf predicts
//! `sum(g) / (sum(h) + lambda)`; a split's gain is
//! `G_l^2/H_l + G_r^2/H_r - G^2/H`. With `h = 1` this is an ordinary
//! variance-reduction tree predicting the mean of `g`, which is how the
//! bagged fallback uses it.

use serde::{Deserialize, Serialize};

/// L2 regularisation on leaf values.
const LAMBDA: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    pub fn predict(&self, x: &[f64]) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let v = x.get(*feature).copied().unwrap_or(0.0);
                    node = if v <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    pub fn n_leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

struct Split {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Training view: row-major features plus per-sample statistics.
pub(crate) struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    g: &'a [f64],
    h: &'a [f64],
    params: TreeParams,
    /// Accumulated split gain per feature.
    pub(crate) importances: Vec<f64>,
}

impl<'a> TreeBuilder<'a> {
    pub(crate) fn new(x: &'a [Vec<f64>], g: &'a [f64], h: &'a [f64], params: TreeParams) -> Self {
        let n_features = x.first().map_or(0, |r| r.len());
        Self {
            x,
            g,
            h,
            params,
            importances: vec![0.0; n_features],
        }
    }

    pub(crate) fn build(&mut self, rows: &[usize]) -> TreeNode {
        self.grow(rows, 0)
    }

    fn leaf(&self, rows: &[usize]) -> TreeNode {
        let (g, h) = self.sums(rows);
        TreeNode::Leaf {
            value: g / (h + LAMBDA),
        }
    }

    fn sums(&self, rows: &[usize]) -> (f64, f64) {
        rows.iter()
            .fold((0.0, 0.0), |(g, h), &r| (g + self.g[r], h + self.h[r]))
    }

    fn grow(&mut self, rows: &[usize], depth: usize) -> TreeNode {
        if depth >= self.params.max_depth
            || rows.len() < self.params.min_samples_split
            || rows.len() < 2 * self.params.min_samples_leaf.max(1)
        {
            return self.leaf(rows);
        }
        let Some(split) = self.best_split(rows) else {
            return self.leaf(rows);
        };
        self.importances[split.feature] += split.gain;

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&r| self.x[r][split.feature] <= split.threshold);
        let left = self.grow(&left_rows, depth + 1);
        let right = self.grow(&right_rows, depth + 1);
        TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn best_split(&self, rows: &[usize]) -> Option<Split> {
        let (g_total, h_total) = self.sums(rows);
        let parent = g_total * g_total / (h_total + LAMBDA);
        let min_leaf = self.params.min_samples_leaf.max(1);
        let n_features = self.importances.len();

        let mut best: Option<Split> = None;
        let mut order: Vec<usize> = rows.to_vec();
        for feature in 0..n_features {
            order.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));
            let (mut g_left, mut h_left) = (0.0, 0.0);
            for pos in 0..order.len() - 1 {
                let r = order[pos];
                g_left += self.g[r];
                h_left += self.h[r];
                let n_left = pos + 1;
                if n_left < min_leaf || order.len() - n_left < min_leaf {
                    continue;
                }
                let (v, v_next) = (self.x[r][feature], self.x[order[pos + 1]][feature]);
                if v == v_next {
                    continue;
                }
                let (g_right, h_right) = (g_total - g_left, h_total - h_left);
                let gain = g_left * g_left / (h_left + LAMBDA)
                    + g_right * g_right / (h_right + LAMBDA)
                    - parent;
                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(Split {
                        feature,
                        threshold: (v + v_next) / 2.0,
                        gain,
                    });
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(depth: usize) -> TreeParams {
        TreeParams {
            max_depth: depth,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }

    #[test]
    fn separable_split_found() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![0.0, i as f64]).collect();
        let g: Vec<f64> = (0..10).map(|i| if i < 5 { 0.0 } else { 1.0 }).collect();
        let h = vec![1.0; 10];
        let mut b = TreeBuilder::new(&x, &g, &h, params(3));
        let rows: Vec<usize> = (0..10).collect();
        let tree = b.build(&rows);
        assert!((tree.predict(&[0.0, 2.0]) - 0.0).abs() < 1e-4);
        assert!((tree.predict(&[0.0, 8.0]) - 1.0).abs() < 1e-4);
        // All gain attributed to the informative feature.
        assert_eq!(b.importances[0], 0.0);
        assert!(b.importances[1] > 0.0);
        assert_eq!(tree.n_leaves(), 2);
    }

    #[test]
    fn depth_limit_respected() {
        let x: Vec<Vec<f64>> = (0..32).map(|i| vec![i as f64]).collect();
        let g: Vec<f64> = (0..32).map(|i| (i % 4) as f64).collect();
        let h = vec![1.0; 32];
        let rows: Vec<usize> = (0..32).collect();
        let tree = TreeBuilder::new(&x, &g, &h, params(2)).build(&rows);
        assert!(tree.depth() <= 3);
    }

    #[test]
    fn constant_target_is_single_leaf() {
        let x: Vec<Vec<f64>> = (0..8).map(|i| vec![i as f64]).collect();
        let g = vec![0.5; 8];
        let h = vec![1.0; 8];
        let rows: Vec<usize> = (0..8).collect();
        let tree = TreeBuilder::new(&x, &g, &h, params(4)).build(&rows);
        assert_eq!(tree.n_leaves(), 1);
    }
}
