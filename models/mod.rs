//! # Regression Model Families
//!
//! Every bootstrap round fits one fresh regressor. This module defines the
//! capability the estimator relies on (`Regressor`), the construction seam
//! (`ModelFactory`), and the concrete families used for floor-ratio prediction:
//!
//! - `MeanRegressor`: predicts the mean of its fitted targets (baseline).
//! - `RidgeRegressor`: L2-penalized least squares with an unpenalized intercept.
//! - `ForestRegressor`: bagged CART regression trees.
//! - `BoostingRegressor`: second-order gradient-boosted trees with a
//!   selectable objective and base-score policy.
//!
//! `ModelSpec` ties the families to the TOML run configuration and is itself a
//! `ModelFactory`, so a configured family can be handed straight to the estimator.

use ndarray::{Array1, ArrayView1, ArrayView2};
use ndarray_linalg::error::LinalgError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::seeding::{MODEL_STREAM, stream_seed};

pub mod boosting;
pub mod forest;
pub mod mean;
pub mod ridge;
mod tree;

pub use boosting::{BaseScore, BoostingConfig, BoostingRegressor, Objective};
pub use forest::{ForestConfig, ForestRegressor};
pub use mean::MeanRegressor;
pub use ridge::{RidgeConfig, RidgeRegressor};

/// Failures raised by a model's `fit` or `predict` call.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Cannot fit a model on an empty training set.")]
    EmptyTrainingSet,

    #[error("The feature matrix has {rows} rows, but {targets} targets were supplied.")]
    ShapeMismatch { rows: usize, targets: usize },

    #[error("The model was fitted on {expected} features, but the prediction data has {found}.")]
    FeatureCountMismatch { expected: usize, found: usize },

    #[error("predict() was called on a model that has not been fitted.")]
    NotFitted,

    #[error("Invalid model parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("A linear system solve failed. The ridge system may be singular. Error: {0}")]
    LinearSystemSolveFailed(#[from] LinalgError),

    #[error("The model returned {found} predictions for {expected} evaluation rows.")]
    PredictionLength { expected: usize, found: usize },

    #[error("The model produced a non-finite prediction ({value}) for evaluation row {row}.")]
    NonFinitePrediction { row: usize, value: f64 },

    #[error("{0}")]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// A regressor that can be fitted once and then queried.
pub trait Regressor {
    fn fit(
        &mut self,
        features: ArrayView2<'_, f64>,
        targets: ArrayView1<'_, f64>,
    ) -> Result<(), ModelError>;

    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Array1<f64>, ModelError>;
}

impl<R: Regressor + ?Sized> Regressor for Box<R> {
    fn fit(
        &mut self,
        features: ArrayView2<'_, f64>,
        targets: ArrayView1<'_, f64>,
    ) -> Result<(), ModelError> {
        (**self).fit(features, targets)
    }

    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Array1<f64>, ModelError> {
        (**self).predict(features)
    }
}

/// Identifies the bootstrap round a model is being built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoundContext {
    /// Zero-based round index.
    pub round: usize,
    /// The seed that drove this round's resample.
    pub seed: u64,
}

impl RoundContext {
    /// Seed for the model's own randomness, on a stream independent of the resample draw.
    pub fn model_seed(&self) -> u64 {
        stream_seed(self.seed, MODEL_STREAM)
    }
}

/// Produces one untrained regressor per bootstrap round.
///
/// Implemented for any `Fn() -> M` closure. Closures that need the round's seed
/// go through [`PerRound`].
pub trait ModelFactory: Sync {
    type Model: Regressor;

    fn build(&self, ctx: RoundContext) -> Self::Model;
}

impl<F, M> ModelFactory for F
where
    F: Fn() -> M + Sync,
    M: Regressor,
{
    type Model = M;

    fn build(&self, _ctx: RoundContext) -> M {
        self()
    }
}

/// Adapts a closure that receives the round context.
pub struct PerRound<F>(pub F);

impl<F, M> ModelFactory for PerRound<F>
where
    F: Fn(RoundContext) -> M + Sync,
    M: Regressor,
{
    type Model = M;

    fn build(&self, ctx: RoundContext) -> M {
        (self.0)(ctx)
    }
}

/// The model family selected by a run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ModelSpec {
    Mean,
    Ridge(RidgeConfig),
    Forest(ForestConfig),
    Boosting(BoostingConfig),
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self::Ridge(RidgeConfig::default())
    }
}

impl ModelSpec {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Mean => "target mean",
            Self::Ridge(_) => "ridge regression",
            Self::Forest(_) => "random forest",
            Self::Boosting(_) => "gradient-boosted trees",
        }
    }
}

impl ModelFactory for ModelSpec {
    type Model = Box<dyn Regressor>;

    fn build(&self, ctx: RoundContext) -> Self::Model {
        match self {
            Self::Mean => Box::new(MeanRegressor::default()),
            Self::Ridge(config) => Box::new(RidgeRegressor::new(config.clone())),
            Self::Forest(config) => {
                Box::new(ForestRegressor::new(config.clone(), ctx.model_seed()))
            }
            Self::Boosting(config) => {
                Box::new(BoostingRegressor::new(config.clone(), ctx.model_seed()))
            }
        }
    }
}

/// Shared shape checks for `fit`.
pub(crate) fn check_training_shape(
    features: ArrayView2<'_, f64>,
    targets: ArrayView1<'_, f64>,
) -> Result<(), ModelError> {
    if features.nrows() == 0 || targets.is_empty() {
        return Err(ModelError::EmptyTrainingSet);
    }
    if features.nrows() != targets.len() {
        return Err(ModelError::ShapeMismatch {
            rows: features.nrows(),
            targets: targets.len(),
        });
    }
    Ok(())
}

/// Shared width check for `predict`.
pub(crate) fn check_feature_count(expected: usize, found: usize) -> Result<(), ModelError> {
    if expected != found {
        return Err(ModelError::FeatureCountMismatch { expected, found });
    }
    Ok(())
}
