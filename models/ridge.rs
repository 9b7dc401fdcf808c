//! Ridge regression with an unpenalized intercept.
//!
//! Features and targets are centered before solving, so the penalty only acts
//! on the slope coefficients:
//!
//! ```text
//! (Xcᵀ Xc + α I) w = Xcᵀ yc,    intercept = ȳ - x̄ · w
//! ```

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use ndarray_linalg::Solve;
use serde::{Deserialize, Serialize};

use super::{ModelError, Regressor, check_feature_count, check_training_shape};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RidgeConfig {
    /// L2 penalty strength. Zero gives ordinary least squares.
    pub alpha: f64,
}

impl Default for RidgeConfig {
    fn default() -> Self {
        Self { alpha: 1.0 }
    }
}

#[derive(Debug, Clone)]
struct RidgeFit {
    coefficients: Array1<f64>,
    intercept: f64,
}

#[derive(Debug, Clone)]
pub struct RidgeRegressor {
    config: RidgeConfig,
    fitted: Option<RidgeFit>,
}

impl RidgeRegressor {
    pub fn new(config: RidgeConfig) -> Self {
        Self {
            config,
            fitted: None,
        }
    }

    pub fn coefficients(&self) -> Option<(ArrayView1<'_, f64>, f64)> {
        self.fitted
            .as_ref()
            .map(|fit| (fit.coefficients.view(), fit.intercept))
    }
}

impl Regressor for RidgeRegressor {
    fn fit(
        &mut self,
        features: ArrayView2<'_, f64>,
        targets: ArrayView1<'_, f64>,
    ) -> Result<(), ModelError> {
        check_training_shape(features, targets)?;
        let alpha = self.config.alpha;
        if !alpha.is_finite() || alpha < 0.0 {
            return Err(ModelError::InvalidParameter {
                name: "alpha",
                reason: format!("must be a finite, non-negative number (got {alpha})"),
            });
        }

        let x_mean = features
            .mean_axis(Axis(0))
            .ok_or(ModelError::EmptyTrainingSet)?;
        let y_mean = targets.mean().ok_or(ModelError::EmptyTrainingSet)?;

        let coefficients = if features.ncols() == 0 {
            Array1::zeros(0)
        } else {
            let centered = &features - &x_mean;
            let centered_targets = targets.mapv(|y| y - y_mean);
            let mut gram = centered.t().dot(&centered);
            for i in 0..gram.nrows() {
                gram[[i, i]] += alpha;
            }
            let rhs = centered.t().dot(&centered_targets);
            gram.solve_into(rhs)?
        };

        let intercept = y_mean - x_mean.dot(&coefficients);
        log::trace!(
            "Ridge fit on {} rows: intercept {:.6}, alpha {}",
            features.nrows(),
            intercept,
            alpha
        );
        self.fitted = Some(RidgeFit {
            coefficients,
            intercept,
        });
        Ok(())
    }

    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Array1<f64>, ModelError> {
        let fit = self.fitted.as_ref().ok_or(ModelError::NotFitted)?;
        check_feature_count(fit.coefficients.len(), features.ncols())?;
        Ok(features.dot(&fit.coefficients).mapv(|v| v + fit.intercept))
    }
}
