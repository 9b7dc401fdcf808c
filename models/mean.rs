use ndarray::{Array1, ArrayView1, ArrayView2};

use super::{ModelError, Regressor, check_training_shape};

/// Ignores the features and predicts the mean of the fitted targets.
#[derive(Debug, Clone, Default)]
pub struct MeanRegressor {
    mean: Option<f64>,
}

impl MeanRegressor {
    pub fn fitted_mean(&self) -> Option<f64> {
        self.mean
    }
}

impl Regressor for MeanRegressor {
    fn fit(
        &mut self,
        features: ArrayView2<'_, f64>,
        targets: ArrayView1<'_, f64>,
    ) -> Result<(), ModelError> {
        check_training_shape(features, targets)?;
        self.mean = targets.mean();
        Ok(())
    }

    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Array1<f64>, ModelError> {
        let mean = self.mean.ok_or(ModelError::NotFitted)?;
        Ok(Array1::from_elem(features.nrows(), mean))
    }
}
