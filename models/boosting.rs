//! Gradient-boosted regression trees.
//!
//! Each boosting round computes the objective's gradient and hessian at the
//! current predictions, grows a second-order tree on a row subsample restricted
//! to a column subsample, and adds `learning_rate` times its output.
//!
//! Both the starting prediction (`BaseScore`) and the loss (`Objective`) are
//! explicit configuration. The asymmetric objective penalizes predictions that
//! fall below the observed ratio more heavily than those above it, which biases
//! estimates of a floor price upward.

use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

use super::tree::{RegressionTree, TreeParams};
use super::{ModelError, Regressor, check_feature_count, check_training_shape};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Objective {
    /// `grad = pred - y`, `hess = 1`.
    SquaredError,
    /// With `e = pred - y`: `grad = 2·k·e`, `hess = 2·k` when `e < 0`,
    /// otherwise `grad = 2·e`, `hess = 2`.
    AsymmetricSquared { under_penalty: f64 },
}

impl Default for Objective {
    fn default() -> Self {
        Self::SquaredError
    }
}

impl Objective {
    pub fn gradient(&self, prediction: f64, target: f64) -> (f64, f64) {
        let err = prediction - target;
        match *self {
            Self::SquaredError => (err, 1.0),
            Self::AsymmetricSquared { under_penalty } => {
                if err < 0.0 {
                    (2.0 * under_penalty * err, 2.0 * under_penalty)
                } else {
                    (2.0 * err, 2.0)
                }
            }
        }
    }
}

/// Starting prediction before the first tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BaseScore {
    /// Mean of the (resampled) training targets.
    TargetMean,
    Constant { value: f64 },
}

impl Default for BaseScore {
    fn default() -> Self {
        Self::TargetMean
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingConfig {
    pub n_rounds: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    /// Row fraction sampled without replacement per tree, in (0, 1].
    pub subsample: f64,
    /// Column fraction sampled per tree, in (0, 1].
    pub colsample: f64,
    pub lambda: f64,
    pub min_child_weight: f64,
    pub base_score: BaseScore,
    pub objective: Objective,
}

impl Default for BoostingConfig {
    fn default() -> Self {
        Self {
            n_rounds: 400,
            learning_rate: 0.05,
            max_depth: 5,
            subsample: 0.8,
            colsample: 0.8,
            lambda: 1.0,
            min_child_weight: 1.0,
            base_score: BaseScore::TargetMean,
            objective: Objective::SquaredError,
        }
    }
}

impl BoostingConfig {
    fn validate(&self) -> Result<(), ModelError> {
        let invalid = |name: &'static str, reason: String| {
            Err(ModelError::InvalidParameter { name, reason })
        };
        if self.n_rounds == 0 {
            return invalid("n_rounds", "at least one boosting round is required".to_string());
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return invalid(
                "learning_rate",
                format!("must be positive (got {})", self.learning_rate),
            );
        }
        for (name, fraction) in [("subsample", self.subsample), ("colsample", self.colsample)] {
            if !(fraction > 0.0 && fraction <= 1.0) {
                return invalid(name, format!("must lie in (0, 1] (got {fraction})"));
            }
        }
        if !(self.lambda.is_finite() && self.lambda >= 0.0) {
            return invalid("lambda", format!("must be non-negative (got {})", self.lambda));
        }
        if let Objective::AsymmetricSquared { under_penalty } = self.objective {
            if !(under_penalty.is_finite() && under_penalty > 0.0) {
                return invalid(
                    "under_penalty",
                    format!("must be positive (got {under_penalty})"),
                );
            }
        }
        if let BaseScore::Constant { value } = self.base_score {
            if !value.is_finite() {
                return invalid("base_score", format!("must be finite (got {value})"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct BoostedEnsemble {
    base: f64,
    trees: Vec<RegressionTree>,
    num_features: usize,
}

#[derive(Debug, Clone)]
pub struct BoostingRegressor {
    config: BoostingConfig,
    seed: u64,
    fitted: Option<BoostedEnsemble>,
}

impl BoostingRegressor {
    pub fn new(config: BoostingConfig, seed: u64) -> Self {
        Self {
            config,
            seed,
            fitted: None,
        }
    }

    pub fn base_score(&self) -> Option<f64> {
        self.fitted.as_ref().map(|ensemble| ensemble.base)
    }
}

fn fraction_of(total: usize, fraction: f64) -> usize {
    ((total as f64 * fraction).ceil() as usize).clamp(1, total)
}

impl Regressor for BoostingRegressor {
    fn fit(
        &mut self,
        features: ArrayView2<'_, f64>,
        targets: ArrayView1<'_, f64>,
    ) -> Result<(), ModelError> {
        check_training_shape(features, targets)?;
        self.config.validate()?;
        let config = &self.config;

        let (n, k) = features.dim();
        let base = match config.base_score {
            BaseScore::TargetMean => targets.mean().ok_or(ModelError::EmptyTrainingSet)?,
            BaseScore::Constant { value } => value,
        };
        let params = TreeParams {
            max_depth: Some(config.max_depth),
            min_samples_leaf: 1,
            min_child_weight: config.min_child_weight,
            lambda: config.lambda,
            max_features: None,
        };
        let rows_per_tree = fraction_of(n, config.subsample);
        let cols_per_tree = fraction_of(k.max(1), config.colsample).min(k);

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut current = vec![base; n];
        let mut grad = vec![0.0; n];
        let mut hess = vec![0.0; n];
        let mut trees = Vec::with_capacity(config.n_rounds);

        for _ in 0..config.n_rounds {
            for i in 0..n {
                let (g, h) = config.objective.gradient(current[i], targets[i]);
                grad[i] = g;
                hess[i] = h;
            }
            let rows = index::sample(&mut rng, n, rows_per_tree).into_vec();
            let mut columns = index::sample(&mut rng, k, cols_per_tree).into_vec();
            columns.sort_unstable();

            let tree =
                RegressionTree::fit(features, &grad, &hess, rows, &columns, &params, &mut rng);
            for (i, value) in current.iter_mut().enumerate() {
                *value += config.learning_rate * tree.predict_row(features, i);
            }
            trees.push(tree);
        }

        log::trace!(
            "Boosted {} trees from base score {:.4} on {} rows",
            trees.len(),
            base,
            n
        );
        self.fitted = Some(BoostedEnsemble {
            base,
            trees,
            num_features: k,
        });
        Ok(())
    }

    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Array1<f64>, ModelError> {
        let ensemble = self.fitted.as_ref().ok_or(ModelError::NotFitted)?;
        check_feature_count(ensemble.num_features, features.ncols())?;
        let rate = self.config.learning_rate;
        Ok(Array1::from_shape_fn(features.nrows(), |row| {
            ensemble.base
                + rate
                    * ensemble
                        .trees
                        .iter()
                        .map(|tree| tree.predict_row(features, row))
                        .sum::<f64>()
        }))
    }
}
