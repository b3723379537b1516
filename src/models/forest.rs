//! Random forest regressor.
//!
//! Each tree is a CART regression tree grown on a bootstrap sample, choosing
//! at every node the split that minimizes the summed squared error of the two
//! children. Trees are independent, so they are grown in parallel; each tree
//! seeds its own RNG from the forest seed and its index, which keeps the result
//! identical regardless of how rayon schedules the work.

use nalgebra::DMatrix;
use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Minimum SSE reduction for a split to be accepted.
const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub tree_count: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub params: ForestParams,
    trees: Vec<RegressionTree>,
    /// Impurity-decrease importance per encoded column, summing to 1 (or all 0).
    importances: Vec<f64>,
}

impl RandomForest {
    pub fn fit(x: &DMatrix<f64>, y: &[f64], params: ForestParams) -> Result<Self, PipelineError> {
        if x.nrows() == 0 || x.nrows() != y.len() {
            return Err(PipelineError::Fit(format!(
                "design has {} rows but target has {}",
                x.nrows(),
                y.len()
            )));
        }
        if params.tree_count == 0 || params.max_depth == 0 {
            return Err(PipelineError::Fit("forest needs tree_count >= 1 and max_depth >= 1".into()));
        }

        let n = x.nrows();
        let p = x.ncols();
        let min_leaf = params.min_samples_leaf.max(1);

        let grown: Vec<(RegressionTree, Vec<f64>)> = (0..params.tree_count)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(t as u64));
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                let mut builder = TreeBuilder {
                    x,
                    y,
                    max_depth: params.max_depth,
                    min_leaf,
                    nodes: Vec::new(),
                    gains: vec![0.0; p],
                };
                builder.grow(sample, 0);
                (RegressionTree { nodes: builder.nodes }, builder.gains)
            })
            .collect();

        let mut importances = vec![0.0; p];
        let mut trees = Vec::with_capacity(grown.len());
        for (tree, gains) in grown {
            let total: f64 = gains.iter().sum();
            if total > 0.0 {
                for (acc, g) in importances.iter_mut().zip(&gains) {
                    *acc += g / total;
                }
            }
            trees.push(tree);
        }
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }

        Ok(Self {
            params,
            trees,
            importances,
        })
    }

    pub fn predict(&self, features: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.predict(features)).sum();
        sum / self.trees.len() as f64
    }

    pub fn importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// Check a deserialized forest against the encoder width.
    pub fn check_width(&self, width: usize) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".into());
        }
        if self.importances.len() != width {
            return Err(format!(
                "forest has {} importances for {width} encoded columns",
                self.importances.len()
            ));
        }
        for (t, tree) in self.trees.iter().enumerate() {
            tree.check_width(width).map_err(|e| format!("tree {t}: {e}"))?;
        }
        Ok(())
    }
}

impl RegressionTree {
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if features[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Every split must test an encoded column and point forward to an
    /// existing node, so prediction always reaches a leaf.
    fn check_width(&self, width: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".into());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if let Node::Split { feature, left, right, .. } = node {
                if *feature >= width {
                    return Err(format!("node {idx} splits on column {feature} of {width}"));
                }
                for child in [*left, *right] {
                    if child <= idx || child >= self.nodes.len() {
                        return Err(format!("node {idx} has invalid child {child}"));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

struct TreeBuilder<'a> {
    x: &'a DMatrix<f64>,
    y: &'a [f64],
    max_depth: usize,
    min_leaf: usize,
    nodes: Vec<Node>,
    gains: Vec<f64>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    sse: f64,
}

impl TreeBuilder<'_> {
    /// Grow the subtree for `sample` and return its node index.
    fn grow(&mut self, sample: Vec<usize>, depth: usize) -> usize {
        let (mean, sse) = mean_sse(sample.iter().map(|&i| self.y[i]));
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { value: mean });

        if depth >= self.max_depth || sample.len() < 2 * self.min_leaf || sse <= MIN_GAIN {
            return id;
        }
        let Some(best) = self.best_split(&sample) else {
            return id;
        };
        let gain = sse - best.sse;
        if gain <= MIN_GAIN {
            return id;
        }
        self.gains[best.feature] += gain;

        let (left, right): (Vec<usize>, Vec<usize>) = sample
            .into_iter()
            .partition(|&i| self.x[(i, best.feature)] <= best.threshold);
        let left = self.grow(left, depth + 1);
        let right = self.grow(right, depth + 1);
        self.nodes[id] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        id
    }

    fn best_split(&self, sample: &[usize]) -> Option<BestSplit> {
        let n = sample.len();
        let total_sum: f64 = sample.iter().map(|&i| self.y[i]).sum();
        let total_sq: f64 = sample.iter().map(|&i| self.y[i] * self.y[i]).sum();

        let mut best: Option<BestSplit> = None;
        let mut order = sample.to_vec();

        for feature in 0..self.x.ncols() {
            order.sort_by(|&a, &b| self.x[(a, feature)].total_cmp(&self.x[(b, feature)]));

            let mut sum_l = 0.0;
            let mut sq_l = 0.0;
            for k in 1..n {
                let yi = self.y[order[k - 1]];
                sum_l += yi;
                sq_l += yi * yi;

                if k < self.min_leaf || n - k < self.min_leaf {
                    continue;
                }
                let lo = self.x[(order[k - 1], feature)];
                let hi = self.x[(order[k], feature)];
                if lo == hi {
                    continue;
                }

                let n_l = k as f64;
                let n_r = (n - k) as f64;
                let sum_r = total_sum - sum_l;
                let sq_r = total_sq - sq_l;
                let sse = (sq_l - sum_l * sum_l / n_l) + (sq_r - sum_r * sum_r / n_r);

                if best.as_ref().is_none_or(|b| sse < b.sse) {
                    let mid = lo + (hi - lo) / 2.0;
                    let threshold = if mid < hi { mid } else { lo };
                    best = Some(BestSplit {
                        feature,
                        threshold,
                        sse,
                    });
                }
            }
        }

        best
    }
}

fn mean_sse(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let (n, sum) = values.clone().fold((0usize, 0.0), |(n, s), v| (n + 1, s + v));
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / n as f64;
    let sse = values.map(|v| (v - mean) * (v - mean)).sum();
    (mean, sse)
}
