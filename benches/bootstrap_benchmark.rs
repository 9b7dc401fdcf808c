// ========================================================================================
//
//                 BIDFLOOR BOOTSTRAP ROUND THROUGHPUT BENCHMARK
//
// ========================================================================================
//
// Measures a full `estimate` call for each model family, and the parallel fan-out
// against sequential execution for the ridge family.
//
// ========================================================================================

use bidfloor::models::{BoostingConfig, ForestConfig, RidgeConfig};
use bidfloor::{BootstrapConfig, Execution, ModelSpec, estimate};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal, Uniform};

/// Training rows in the simulated auction history.
const NUM_TRAIN: usize = 2_000;
/// Evaluation rows predicted every round.
const NUM_EVAL: usize = 500;
const NUM_FEATURES: usize = 6;
const ROUNDS: usize = 32;

fn simulated_auctions(rows: usize, seed: u64) -> (Array2<f64>, Array1<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let feature = Uniform::new(0.0, 1.0);
    let noise = Normal::new(0.0, 0.01).unwrap();
    let features = Array2::from_shape_fn((rows, NUM_FEATURES), |_| feature.sample(&mut rng));
    let targets = Array1::from_shape_fn(rows, |i| {
        0.88 + 0.05 * features[[i, 0]] - 0.02 * features[[i, 1]] + noise.sample(&mut rng)
    });
    (features, targets)
}

fn bench_families(c: &mut Criterion) {
    let (train, targets) = simulated_auctions(NUM_TRAIN, 1);
    let (eval, _) = simulated_auctions(NUM_EVAL, 2);
    let config = BootstrapConfig::new(ROUNDS, 0.9).with_seed(3);

    let families = [
        ("ridge", ModelSpec::Ridge(RidgeConfig::default())),
        (
            "forest",
            ModelSpec::Forest(ForestConfig {
                n_estimators: 20,
                max_depth: Some(8),
                ..ForestConfig::default()
            }),
        ),
        (
            "boosting",
            ModelSpec::Boosting(BoostingConfig {
                n_rounds: 50,
                ..BoostingConfig::default()
            }),
        ),
    ];

    let mut group = c.benchmark_group("bootstrap_family");
    group.sample_size(10);
    group.throughput(Throughput::Elements(ROUNDS as u64));
    for (name, spec) in &families {
        group.bench_with_input(BenchmarkId::from_parameter(name), spec, |b, spec| {
            b.iter(|| {
                black_box(
                    estimate(train.view(), targets.view(), eval.view(), spec, &config).unwrap(),
                )
            })
        });
    }
    group.finish();
}

fn bench_execution(c: &mut Criterion) {
    let (train, targets) = simulated_auctions(NUM_TRAIN, 4);
    let (eval, _) = simulated_auctions(NUM_EVAL, 5);
    let spec = ModelSpec::Ridge(RidgeConfig::default());

    let mut group = c.benchmark_group("bootstrap_execution");
    for execution in [Execution::Sequential, Execution::Parallel] {
        let config = BootstrapConfig {
            execution,
            ..BootstrapConfig::new(ROUNDS, 0.9).with_seed(6)
        };
        group.bench_function(BenchmarkId::from_parameter(format!("{execution:?}")), |b| {
            b.iter(|| {
                black_box(
                    estimate(train.view(), targets.view(), eval.view(), &spec, &config).unwrap(),
                )
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_families, bench_execution);
criterion_main!(benches);
