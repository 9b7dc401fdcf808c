// bootstrap/estimate.rs

//! # Bootstrap Interval Estimation
//!
//! Produces a point estimate and a two-sided confidence interval for every
//! evaluation row without assuming a parametric noise model. Resample-to-resample
//! variability of a freshly fitted model stands in for estimator uncertainty:
//!
//! 1.  **Validation:** shapes, round count, confidence level, target floor and
//!     finiteness are checked before the model factory is touched.
//! 2.  **Rounds:** each round draws N row indices with replacement from its own
//!     seeded RNG, gathers the resampled training set, fits a new model from the
//!     factory, and predicts the full evaluation set into its own row of a
//!     pre-sized `rounds x M` prediction matrix.
//! 3.  **Summary:** column-wise mean plus lower/upper percentile bounds.
//!
//! Rounds share only read-only inputs, so `Execution::Parallel` fans them out over
//! rayon without changing any result: round seeds depend on the round index alone.
//! A failing round aborts the call; no partial summary is ever returned.

use ndarray::parallel::prelude::*;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{ModelError, ModelFactory, Regressor, RoundContext};
use crate::percentile::PercentileMethod;
use crate::progress::{BootstrapProgressObserver, NoopProgress};
use crate::seeding::SeedSchedule;

/// Precondition violations, raised before any round runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidInputError {
    #[error("The training set is empty; at least one row is required.")]
    EmptyTrainingSet,

    #[error("The training features have no columns; at least one feature is required.")]
    NoFeatures,

    #[error("The training features have {rows} rows, but {targets} targets were supplied.")]
    TargetLengthMismatch { rows: usize, targets: usize },

    #[error(
        "The training features have {train} columns, but the evaluation features have {eval}."
    )]
    FeatureWidthMismatch { train: usize, eval: usize },

    #[error("The number of bootstrap rounds must be at least 1.")]
    ZeroRounds,

    #[error("The confidence level must lie strictly between 0 and 1 (got {0}).")]
    ConfidenceLevelOutOfRange(f64),

    #[error("The target floor must be a finite number (got {0}).")]
    NonFiniteTargetFloor(f64),

    #[error("Non-finite value found in {input} at row {row}.")]
    NonFiniteValue { input: &'static str, row: usize },

    #[error("{seeds} explicit seeds were supplied for {rounds} bootstrap rounds.")]
    SeedCountMismatch { seeds: usize, rounds: usize },
}

/// The error type of [`estimate`].
#[derive(Error, Debug)]
pub enum EstimationError {
    #[error("Invalid bootstrap input: {0}")]
    InvalidInput(#[from] InvalidInputError),

    #[error("Model fit failed on bootstrap round {round}: {source}")]
    ModelFit {
        round: usize,
        #[source]
        source: ModelError,
    },
}

/// How rounds are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Execution {
    /// Rounds run on the current rayon thread pool.
    #[default]
    Parallel,
    /// Rounds run in order on the calling thread, stopping at the first failure.
    Sequential,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapConfig {
    pub rounds: usize,
    /// Two-sided interval coverage, e.g. 0.90 leaves 5% in each tail.
    pub confidence_level: f64,
    /// Training targets below this value are raised to it before any fit.
    pub target_floor: Option<f64>,
    pub percentile: PercentileMethod,
    pub seeds: SeedSchedule,
    pub execution: Execution,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            rounds: 100,
            confidence_level: 0.95,
            target_floor: None,
            percentile: PercentileMethod::NearestRank,
            seeds: SeedSchedule::Entropy,
            execution: Execution::Parallel,
        }
    }
}

impl BootstrapConfig {
    pub fn new(rounds: usize, confidence_level: f64) -> Self {
        Self {
            rounds,
            confidence_level,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seeds = SeedSchedule::Fixed(seed);
        self
    }
}

/// Per-row point estimate and interval, aligned with the evaluation rows.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalSummary {
    pub mean: Array1<f64>,
    pub lower: Array1<f64>,
    pub upper: Array1<f64>,
    pub rounds: usize,
    pub confidence_level: f64,
    pub percentile: PercentileMethod,
}

impl IntervalSummary {
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    /// `upper - lower` per row.
    pub fn widths(&self) -> Array1<f64> {
        &self.upper - &self.lower
    }
}

/// Estimates bootstrap intervals for `eval_features`. See the module docs.
pub fn estimate<F: ModelFactory>(
    train_features: ArrayView2<'_, f64>,
    train_targets: ArrayView1<'_, f64>,
    eval_features: ArrayView2<'_, f64>,
    factory: &F,
    config: &BootstrapConfig,
) -> Result<IntervalSummary, EstimationError> {
    estimate_with_progress(
        train_features,
        train_targets,
        eval_features,
        factory,
        config,
        &NoopProgress,
    )
}

/// [`estimate`] with progress callbacks.
pub fn estimate_with_progress<F, P>(
    train_features: ArrayView2<'_, f64>,
    train_targets: ArrayView1<'_, f64>,
    eval_features: ArrayView2<'_, f64>,
    factory: &F,
    config: &BootstrapConfig,
    observer: &P,
) -> Result<IntervalSummary, EstimationError>
where
    F: ModelFactory,
    P: BootstrapProgressObserver + ?Sized,
{
    internal::validate(train_features, train_targets, eval_features, config)?;
    let seeds = config.seeds.resolve(config.rounds)?;
    let targets = internal::floored_targets(train_targets, config.target_floor);

    let (n, k) = train_features.dim();
    let m = eval_features.nrows();
    log::info!(
        "Starting bootstrap: {} rounds, {} training rows x {} features, {} evaluation rows, level {}.",
        config.rounds,
        n,
        k,
        m,
        config.confidence_level
    );

    let job = internal::RoundJob {
        train_features: train_features.reborrow(),
        train_targets: targets.view(),
        eval_features: eval_features.reborrow(),
        factory,
        observer,
    };

    let mut predictions = Array2::<f64>::zeros((config.rounds, m));
    observer.on_start(config.rounds);
    match config.execution {
        Execution::Sequential => {
            for (round, slot) in predictions.axis_iter_mut(Axis(0)).enumerate() {
                job.run(round, seeds[round], slot)?;
            }
        }
        Execution::Parallel => {
            predictions
                .axis_iter_mut(Axis(0))
                .into_par_iter()
                .enumerate()
                .try_for_each(|(round, slot)| job.run(round, seeds[round], slot))?;
        }
    }
    observer.on_finish();

    let summary = internal::summarize(predictions.view(), config);
    log::info!("Bootstrap finished: {} rounds summarized.", config.rounds);
    Ok(summary)
}

mod internal {
    use super::*;

    pub(super) fn validate(
        train_features: ArrayView2<'_, f64>,
        train_targets: ArrayView1<'_, f64>,
        eval_features: ArrayView2<'_, f64>,
        config: &BootstrapConfig,
    ) -> Result<(), InvalidInputError> {
        let (n, k) = train_features.dim();
        if n == 0 {
            return Err(InvalidInputError::EmptyTrainingSet);
        }
        if k == 0 {
            return Err(InvalidInputError::NoFeatures);
        }
        if train_targets.len() != n {
            return Err(InvalidInputError::TargetLengthMismatch {
                rows: n,
                targets: train_targets.len(),
            });
        }
        if eval_features.ncols() != k {
            return Err(InvalidInputError::FeatureWidthMismatch {
                train: k,
                eval: eval_features.ncols(),
            });
        }
        if config.rounds == 0 {
            return Err(InvalidInputError::ZeroRounds);
        }
        let level = config.confidence_level;
        if !(level > 0.0 && level < 1.0) {
            return Err(InvalidInputError::ConfidenceLevelOutOfRange(level));
        }
        if let Some(floor) = config.target_floor {
            if !floor.is_finite() {
                return Err(InvalidInputError::NonFiniteTargetFloor(floor));
            }
        }

        first_non_finite_row(train_features, "the training features")?;
        if let Some(row) = train_targets.iter().position(|v| !v.is_finite()) {
            return Err(InvalidInputError::NonFiniteValue {
                input: "the training targets",
                row,
            });
        }
        first_non_finite_row(eval_features, "the evaluation features")?;
        Ok(())
    }

    fn first_non_finite_row(
        matrix: ArrayView2<'_, f64>,
        input: &'static str,
    ) -> Result<(), InvalidInputError> {
        match matrix
            .axis_iter(Axis(0))
            .position(|row| row.iter().any(|v| !v.is_finite()))
        {
            Some(row) => Err(InvalidInputError::NonFiniteValue { input, row }),
            None => Ok(()),
        }
    }

    /// Copy of the targets with the floor applied.
    pub(super) fn floored_targets(targets: ArrayView1<'_, f64>, floor: Option<f64>) -> Array1<f64> {
        let Some(floor) = floor else {
            return targets.to_owned();
        };
        let raised = targets.iter().filter(|&&y| y < floor).count();
        if raised > 0 {
            log::info!(
                "Raised {} of {} training targets to the floor {}.",
                raised,
                targets.len(),
                floor
            );
        }
        targets.mapv(|y| y.max(floor))
    }

    fn fit_failure(round: usize) -> impl FnOnce(ModelError) -> EstimationError {
        move |source| {
            log::error!("Bootstrap round {round} failed: {source}");
            EstimationError::ModelFit { round, source }
        }
    }

    /// Read-only state shared by every round.
    pub(super) struct RoundJob<'a, F: ?Sized, P: ?Sized> {
        pub train_features: ArrayView2<'a, f64>,
        pub train_targets: ArrayView1<'a, f64>,
        pub eval_features: ArrayView2<'a, f64>,
        pub factory: &'a F,
        pub observer: &'a P,
    }

    impl<F, P> RoundJob<'_, F, P>
    where
        F: ModelFactory,
        P: BootstrapProgressObserver + ?Sized,
    {
        pub(super) fn run(
            &self,
            round: usize,
            seed: u64,
            mut slot: ArrayViewMut1<'_, f64>,
        ) -> Result<(), EstimationError> {
            let n = self.train_features.nrows();
            let mut rng = StdRng::seed_from_u64(seed);
            let indices: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let features = self.train_features.select(Axis(0), &indices);
            let targets = self.train_targets.select(Axis(0), &indices);

            let mut model = self.factory.build(RoundContext { round, seed });
            model
                .fit(features.view(), targets.view())
                .map_err(fit_failure(round))?;
            let predicted = model
                .predict(self.eval_features)
                .map_err(fit_failure(round))?;

            let expected = self.eval_features.nrows();
            if predicted.len() != expected {
                return Err(fit_failure(round)(ModelError::PredictionLength {
                    expected,
                    found: predicted.len(),
                }));
            }
            if let Some(row) = predicted.iter().position(|v| !v.is_finite()) {
                return Err(fit_failure(round)(ModelError::NonFinitePrediction {
                    row,
                    value: predicted[row],
                }));
            }

            slot.assign(&predicted);
            log::debug!("Bootstrap round {round} complete.");
            self.observer.on_round_finish(round);
            Ok(())
        }
    }

    pub(super) fn summarize(
        predictions: ArrayView2<'_, f64>,
        config: &BootstrapConfig,
    ) -> IntervalSummary {
        let m = predictions.ncols();
        let mut mean = Array1::zeros(m);
        let mut lower = Array1::zeros(m);
        let mut upper = Array1::zeros(m);
        let mut sorted = Vec::with_capacity(predictions.nrows());

        for (col, column) in predictions.axis_iter(Axis(1)).enumerate() {
            sorted.clear();
            sorted.extend(column.iter().copied());
            sorted.sort_by(f64::total_cmp);

            let (lo, hi) = config.percentile.bounds(&sorted, config.confidence_level);
            let min = sorted[0];
            let max = sorted[sorted.len() - 1];
            // Summation rounding can push the mean of near-equal values past the extremes.
            let avg = column.sum() / sorted.len() as f64;
            mean[col] = avg.clamp(min, max);
            lower[col] = lo;
            upper[col] = hi;
        }

        IntervalSummary {
            mean,
            lower,
            upper,
            rounds: predictions.nrows(),
            confidence_level: config.confidence_level,
            percentile: config.percentile,
        }
    }
}
