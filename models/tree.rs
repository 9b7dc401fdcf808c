//! Second-order CART regression tree shared by the forest and boosting families.
//!
//! A node holding gradient sum `G` and hessian sum `H` has the leaf value
//! `-G / (H + λ)`. A split into left/right children is scored by
//!
//! ```text
//! gain = G_L²/(H_L + λ) + G_R²/(H_R + λ) - G²/(H + λ)
//! ```
//!
//! With `g = -y`, `h = 1` and `λ = 0` this is plain squared-error CART: leaves
//! are target means and the gain is the reduction in the sum of squares.

use ndarray::ArrayView2;
use rand::Rng;
use rand::seq::index;

const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, Copy)]
pub(crate) struct TreeParams {
    /// `None` grows until the leaf constraints stop it.
    pub max_depth: Option<usize>,
    pub min_samples_leaf: usize,
    /// Minimum hessian sum in each child.
    pub min_child_weight: f64,
    /// L2 penalty on leaf values.
    pub lambda: f64,
    /// Number of candidate columns drawn per split. `None` uses all of them.
    pub max_features: Option<usize>,
}

#[derive(Debug, Clone)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone)]
struct Split {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Borrowed inputs of one tree fit.
struct Grower<'a, R: Rng + ?Sized> {
    features: ArrayView2<'a, f64>,
    grad: &'a [f64],
    hess: &'a [f64],
    columns: &'a [usize],
    params: &'a TreeParams,
    rng: &'a mut R,
    nodes: Vec<Node>,
}

#[derive(Debug, Clone)]
pub(crate) struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Fits a tree on `rows` (duplicates allowed) using only the given `columns`.
    pub fn fit<R: Rng + ?Sized>(
        features: ArrayView2<'_, f64>,
        grad: &[f64],
        hess: &[f64],
        rows: Vec<usize>,
        columns: &[usize],
        params: &TreeParams,
        rng: &mut R,
    ) -> Self {
        let mut grower = Grower {
            features: features.reborrow(),
            grad,
            hess,
            columns,
            params,
            rng,
            nodes: Vec::new(),
        };
        grower.grow(rows, 0);
        Self {
            nodes: grower.nodes,
        }
    }

    pub fn predict_row(&self, features: ArrayView2<'_, f64>, row: usize) -> f64 {
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
                    idx = if features[[row, *feature]] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    #[cfg(test)]
    pub fn num_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, Node::Leaf { .. }))
            .count()
    }
}

impl<R: Rng + ?Sized> Grower<'_, R> {
    fn sums(&self, rows: &[usize]) -> (f64, f64) {
        rows.iter()
            .fold((0.0, 0.0), |(g, h), &r| (g + self.grad[r], h + self.hess[r]))
    }

    fn leaf_value(&self, g: f64, h: f64) -> f64 {
        let denom = h + self.params.lambda;
        if denom > 0.0 { -g / denom } else { 0.0 }
    }

    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let (g, h) = self.sums(&rows);
        let value = self.leaf_value(g, h);
        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf { value });

        let depth_allows = self.params.max_depth.is_none_or(|max| depth < max);
        if !depth_allows || rows.len() < 2 * self.params.min_samples_leaf.max(1) {
            return idx;
        }

        let Some(split) = self.best_split(&rows, g, h) else {
            return idx;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| self.features[[r, split.feature]] <= split.threshold);

        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }

    fn candidate_columns(&mut self) -> Vec<usize> {
        match self.params.max_features {
            Some(count) if count < self.columns.len() => {
                index::sample(&mut *self.rng, self.columns.len(), count.max(1))
                    .into_iter()
                    .map(|i| self.columns[i])
                    .collect()
            }
            _ => self.columns.to_vec(),
        }
    }

    fn best_split(&mut self, rows: &[usize], g_total: f64, h_total: f64) -> Option<Split> {
        let lambda = self.params.lambda;
        let min_leaf = self.params.min_samples_leaf.max(1);
        let min_weight = self.params.min_child_weight;
        let parent_score = score(g_total, h_total, lambda);

        let mut best: Option<Split> = None;
        let mut order = rows.to_vec();
        for feature in self.candidate_columns() {
            let column = self.features.column(feature);
            order.sort_by(|&a, &b| column[a].total_cmp(&column[b]));

            let (mut g_left, mut h_left) = (0.0, 0.0);
            for i in 0..order.len() - 1 {
                let r = order[i];
                g_left += self.grad[r];
                h_left += self.hess[r];

                let here = column[r];
                let next = column[order[i + 1]];
                if here == next {
                    continue;
                }
                let n_left = i + 1;
                if n_left < min_leaf || order.len() - n_left < min_leaf {
                    continue;
                }
                let g_right = g_total - g_left;
                let h_right = h_total - h_left;
                if h_left < min_weight || h_right < min_weight {
                    continue;
                }

                let gain = score(g_left, h_left, lambda) + score(g_right, h_right, lambda)
                    - parent_score;
                if gain > MIN_GAIN && best.as_ref().is_none_or(|b| gain > b.gain) {
                    let mid = 0.5 * (here + next);
                    best = Some(Split {
                        feature,
                        threshold: if mid < next { mid } else { here },
                        gain,
                    });
                }
            }
        }
        best
    }
}

fn score(g: f64, h: f64, lambda: f64) -> f64 {
    let denom = h + lambda;
    if denom > 0.0 { g * g / denom } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn squared_error_params() -> TreeParams {
        TreeParams {
            max_depth: None,
            min_samples_leaf: 1,
            min_child_weight: 0.0,
            lambda: 0.0,
            max_features: None,
        }
    }

    #[test]
    fn squared_error_tree_fits_a_step() {
        let features = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let targets = [0.90, 0.90, 0.90, 0.95, 0.95, 0.95];
        let grad: Vec<f64> = targets.iter().map(|y| -y).collect();
        let hess = vec![1.0; targets.len()];
        let mut rng = StdRng::seed_from_u64(0);

        let tree = RegressionTree::fit(
            features.view(),
            &grad,
            &hess,
            (0..6).collect(),
            &[0],
            &squared_error_params(),
            &mut rng,
        );

        assert_eq!(tree.num_leaves(), 2);
        assert_abs_diff_eq!(tree.predict_row(features.view(), 0), 0.90, epsilon = 1e-12);
        assert_abs_diff_eq!(tree.predict_row(features.view(), 5), 0.95, epsilon = 1e-12);
        let probe = array![[6.4], [6.6]];
        assert_abs_diff_eq!(tree.predict_row(probe.view(), 0), 0.90, epsilon = 1e-12);
        assert_abs_diff_eq!(tree.predict_row(probe.view(), 1), 0.95, epsilon = 1e-12);
    }

    #[test]
    fn depth_zero_is_a_single_leaf() {
        let features = array![[1.0], [2.0]];
        let grad = [-1.0, -3.0];
        let hess = [1.0, 1.0];
        let params = TreeParams {
            max_depth: Some(0),
            ..squared_error_params()
        };
        let mut rng = StdRng::seed_from_u64(0);
        let tree = RegressionTree::fit(
            features.view(),
            &grad,
            &hess,
            vec![0, 1],
            &[0],
            &params,
            &mut rng,
        );
        assert_eq!(tree.num_leaves(), 1);
        assert_abs_diff_eq!(tree.predict_row(features.view(), 0), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn min_samples_leaf_blocks_small_children() {
        let features = array![[1.0], [2.0], [3.0]];
        let grad = [-1.0, -1.0, -5.0];
        let hess = [1.0; 3];
        let params = TreeParams {
            min_samples_leaf: 2,
            ..squared_error_params()
        };
        let mut rng = StdRng::seed_from_u64(0);
        let tree = RegressionTree::fit(
            features.view(),
            &grad,
            &hess,
            vec![0, 1, 2],
            &[0],
            &params,
            &mut rng,
        );
        assert_eq!(tree.num_leaves(), 1);
    }

    #[test]
    fn lambda_shrinks_leaf_values() {
        let features = array![[1.0], [1.0]];
        let grad = [-2.0, -2.0];
        let hess = [1.0, 1.0];
        let params = TreeParams {
            lambda: 2.0,
            ..squared_error_params()
        };
        let mut rng = StdRng::seed_from_u64(0);
        let tree = RegressionTree::fit(
            features.view(),
            &grad,
            &hess,
            vec![0, 1],
            &[0],
            &params,
            &mut rng,
        );
        // -G / (H + λ) = 4 / 4
        assert_abs_diff_eq!(tree.predict_row(features.view(), 0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn constant_feature_never_splits() {
        let features = array![[5.0, 1.0], [5.0, 2.0], [5.0, 3.0], [5.0, 4.0]];
        let grad = [-1.0, -1.0, -2.0, -2.0];
        let hess = [1.0; 4];
        let mut rng = StdRng::seed_from_u64(0);
        let only_constant = RegressionTree::fit(
            features.view(),
            &grad,
            &hess,
            (0..4).collect(),
            &[0],
            &squared_error_params(),
            &mut rng,
        );
        assert_eq!(only_constant.num_leaves(), 1);

        let both = RegressionTree::fit(
            features.view(),
            &grad,
            &hess,
            (0..4).collect(),
            &[0, 1],
            &squared_error_params(),
            &mut rng,
        );
        assert_eq!(both.num_leaves(), 2);
    }
}
