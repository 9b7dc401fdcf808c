//! Random forest regression: squared-error trees, each grown on its own
//! bootstrap sample of the training rows, averaged at prediction time.

use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::tree::{RegressionTree, TreeParams};
use super::{ModelError, Regressor, check_feature_count, check_training_shape};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_estimators: usize,
    /// `None` grows each tree until `min_samples_leaf` stops it.
    pub max_depth: Option<usize>,
    pub min_samples_leaf: usize,
    /// Fraction of the feature columns considered at each split, in (0, 1].
    pub max_features: f64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 400,
            max_depth: None,
            min_samples_leaf: 2,
            max_features: 1.0,
        }
    }
}

impl ForestConfig {
    fn validate(&self) -> Result<(), ModelError> {
        if self.n_estimators == 0 {
            return Err(ModelError::InvalidParameter {
                name: "n_estimators",
                reason: "at least one tree is required".to_string(),
            });
        }
        if self.min_samples_leaf == 0 {
            return Err(ModelError::InvalidParameter {
                name: "min_samples_leaf",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.max_features > 0.0 && self.max_features <= 1.0) {
            return Err(ModelError::InvalidParameter {
                name: "max_features",
                reason: format!("must lie in (0, 1] (got {})", self.max_features),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ForestRegressor {
    config: ForestConfig,
    seed: u64,
    trees: Vec<RegressionTree>,
    num_features: usize,
}

impl ForestRegressor {
    pub fn new(config: ForestConfig, seed: u64) -> Self {
        Self {
            config,
            seed,
            trees: Vec::new(),
            num_features: 0,
        }
    }
}

impl Regressor for ForestRegressor {
    fn fit(
        &mut self,
        features: ArrayView2<'_, f64>,
        targets: ArrayView1<'_, f64>,
    ) -> Result<(), ModelError> {
        check_training_shape(features, targets)?;
        self.config.validate()?;

        let (n, k) = features.dim();
        let grad: Vec<f64> = targets.iter().map(|&y| -y).collect();
        let hess = vec![1.0; n];
        let columns: Vec<usize> = (0..k).collect();
        let per_split = ((k as f64 * self.config.max_features).ceil() as usize).clamp(1, k.max(1));
        let params = TreeParams {
            max_depth: self.config.max_depth,
            min_samples_leaf: self.config.min_samples_leaf,
            min_child_weight: 0.0,
            lambda: 0.0,
            max_features: (per_split < k).then_some(per_split),
        };

        let mut rng = StdRng::seed_from_u64(self.seed);
        self.trees = (0..self.config.n_estimators)
            .map(|_| {
                let rows: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit(features, &grad, &hess, rows, &columns, &params, &mut rng)
            })
            .collect();
        self.num_features = k;
        Ok(())
    }

    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Array1<f64>, ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }
        check_feature_count(self.num_features, features.ncols())?;
        let scale = 1.0 / self.trees.len() as f64;
        Ok(Array1::from_shape_fn(features.nrows(), |row| {
            self.trees
                .iter()
                .map(|tree| tree.predict_row(features, row))
                .sum::<f64>()
                * scale
        }))
    }
}
