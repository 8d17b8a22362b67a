//! Regression trees shared by the bagged and boosted ensembles
//!
//! Nodes are stored in a flat vector so deep trees serialize without nesting.

use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Tree node; children are indices into [`RegressionTree::nodes`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum TreeNode {
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

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features sampled per split; `None` considers all of them
    pub max_features: Option<usize>,
    /// L2 penalty on leaf values: leaf = Σy / (n + lambda)
    pub leaf_lambda: f64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            leaf_lambda: 0.0,
        }
    }
}

/// Fitted regression tree with squared-error splits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

struct PendingNode {
    slot: usize,
    rows: Vec<usize>,
    depth: usize,
}

impl RegressionTree {
    /// Grow a tree on the given rows (repeats allowed, as in a bootstrap sample).
    ///
    /// `features` restricts the columns the tree may split on.
    pub fn fit(
        x: &Array2<f64>,
        y: &[f64],
        rows: &[usize],
        features: &[usize],
        params: &TreeParams,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let mut nodes = vec![TreeNode::Leaf { value: 0.0 }];
        let mut stack = vec![PendingNode {
            slot: 0,
            rows: rows.to_vec(),
            depth: 0,
        }];
        let mut candidates: Vec<usize> = features.to_vec();

        while let Some(node) = stack.pop() {
            let n = node.rows.len();
            let sum: f64 = node.rows.iter().map(|&i| y[i]).sum();
            let leaf_value = if n == 0 {
                0.0
            } else {
                sum / (n as f64 + params.leaf_lambda)
            };

            let should_stop = n < params.min_samples_split
                || n < 2 * params.min_samples_leaf
                || params.max_depth.map_or(false, |d| node.depth >= d)
                || is_constant(y, &node.rows);

            let split = if should_stop {
                None
            } else {
                let n_try = params
                    .max_features
                    .unwrap_or(candidates.len())
                    .clamp(1, candidates.len().max(1));
                if n_try < candidates.len() {
                    candidates.shuffle(rng);
                }
                best_split(x, y, &node.rows, &candidates[..n_try.min(candidates.len())], params)
            };

            match split {
                None => nodes[node.slot] = TreeNode::Leaf { value: leaf_value },
                Some((feature, threshold)) => {
                    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = node
                        .rows
                        .iter()
                        .partition(|&&i| x[[i, feature]] <= threshold);

                    let left = nodes.len();
                    nodes.push(TreeNode::Leaf { value: 0.0 });
                    let right = nodes.len();
                    nodes.push(TreeNode::Leaf { value: 0.0 });
                    nodes[node.slot] = TreeNode::Split {
                        feature,
                        threshold,
                        left,
                        right,
                    };

                    stack.push(PendingNode {
                        slot: right,
                        rows: right_rows,
                        depth: node.depth + 1,
                    });
                    stack.push(PendingNode {
                        slot: left,
                        rows: left_rows,
                        depth: node.depth + 1,
                    });
                }
            }
        }

        Self { nodes }
    }

    pub fn predict_row(&self, row: &ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        x.outer_iter().map(|row| self.predict_row(&row)).collect()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], idx: usize) -> usize {
            match &nodes[idx] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
            }
        }
        walk(&self.nodes, 0)
    }
}

fn is_constant(y: &[f64], rows: &[usize]) -> bool {
    match rows.first() {
        None => true,
        Some(&first) => rows.iter().all(|&i| y[i] == y[first]),
    }
}

/// Best (feature, threshold) by penalized squared-error gain
/// `ΣL²/(nL+λ) + ΣR²/(nR+λ) - Σ²/(n+λ)`. Ties keep the earlier candidate.
fn best_split(
    x: &Array2<f64>,
    y: &[f64],
    rows: &[usize],
    features: &[usize],
    params: &TreeParams,
) -> Option<(usize, f64)> {
    let n = rows.len();
    let lambda = params.leaf_lambda;
    let total: f64 = rows.iter().map(|&i| y[i]).sum();
    let parent_score = total * total / (n as f64 + lambda);

    let mut best: Option<(usize, f64, f64)> = None;
    let mut order: Vec<usize> = rows.to_vec();

    for &feature in features {
        order.sort_by(|&a, &b| {
            x[[a, feature]]
                .partial_cmp(&x[[b, feature]])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut left_sum = 0.0;
        for pos in 0..n - 1 {
            left_sum += y[order[pos]];
            let left_n = pos + 1;
            let right_n = n - left_n;
            let current = x[[order[pos], feature]];
            let next = x[[order[pos + 1], feature]];
            if current == next || left_n < params.min_samples_leaf || right_n < params.min_samples_leaf {
                continue;
            }
            let right_sum = total - left_sum;
            let gain = left_sum * left_sum / (left_n as f64 + lambda)
                + right_sum * right_sum / (right_n as f64 + lambda)
                - parent_score;
            if gain > 1e-12 && best.map_or(true, |(_, _, g)| gain > g) {
                let mut threshold = (current + next) / 2.0;
                if threshold >= next {
                    threshold = current;
                }
                best = Some((feature, threshold, gain));
            }
        }
    }

    best.map(|(feature, threshold, _)| (feature, threshold))
}
