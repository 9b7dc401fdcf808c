#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod estimate;
pub mod percentile;
pub mod progress;
pub mod seeding;

#[path = "../models/mod.rs"]
pub mod models;

#[path = "../data/mod.rs"]
pub mod data;

#[path = "../config/mod.rs"]
pub mod config;

pub use estimate::{
    BootstrapConfig, EstimationError, Execution, IntervalSummary, InvalidInputError, estimate,
    estimate_with_progress,
};
pub use models::{ModelError, ModelFactory, ModelSpec, PerRound, Regressor, RoundContext};
pub use percentile::PercentileMethod;
pub use progress::{BootstrapProgressObserver, NoopProgress};
pub use seeding::SeedSchedule;
