use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use popbox::{
    DVector, ObjectiveFunction, OptimizerOptions, Optimizer, Strategy, TerminationReport, Weights,
};

use std::time::Duration;

// N-dimensional Rosenbrock function
fn rosenbrock(x: &DVector<f64>) -> f64 {
    assert!(x.len() >= 2);
    (0..x.len() - 1)
        .map(|i| 100.0 * (x[i + 1] - x[i].powi(2)).powi(2) + (1.0 - x[i]).powi(2))
        .sum::<f64>()
}

// Builds an `Optimizer` with a random initial mean and advances it some number of generations to
// avoid benchmarking based on the trivial initial state
fn get_optimizer(
    dim: usize,
    strategy: Strategy,
    weights: Weights,
) -> Optimizer<Box<dyn ObjectiveFunction>> {
    let initial_mean = (0..dim)
        .map(|_| 3.0 * rand::random::<f64>())
        .collect::<Vec<_>>();
    let options = OptimizerOptions::new(dim)
        .initial_mean(initial_mean)
        .initial_step_size(1.0)
        .strategy(strategy)
        .weights(weights);

    let mut optimizer = options.build(Box::new(rosenbrock) as _).unwrap();

    for _ in 0..100 {
        let _ = optimizer.next();
    }

    optimizer
}

fn single_generation(
    optimizer: &mut Optimizer<Box<dyn ObjectiveFunction>>,
) -> Option<TerminationReport> {
    optimizer.next()
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut run_bench = |name, dim, strategy, weights| {
        c.bench_function(name, |b| {
            b.iter_batched_ref(
                || get_optimizer(dim, strategy, weights),
                |mut optimizer| single_generation(&mut optimizer),
                BatchSize::SmallInput,
            )
        });
    };

    run_bench(
        "single generation active CMA n=3",
        3,
        Strategy::Cma,
        Weights::Negative,
    );
    run_bench(
        "single generation active CMA n=10",
        10,
        Strategy::Cma,
        Weights::Negative,
    );
    run_bench(
        "single generation CMA n=10",
        10,
        Strategy::Cma,
        Weights::Positive,
    );
    run_bench(
        "single generation self-adaptive step size n=10",
        10,
        Strategy::SelfAdaptiveSigma,
        Weights::Negative,
    );
    run_bench(
        "single generation success rule n=10",
        10,
        Strategy::SuccessRule,
        Weights::Negative,
    );
    run_bench(
        "single generation active CMA n=30",
        30,
        Strategy::Cma,
        Weights::Negative,
    );
}

criterion_group!(
    name = benches;
    config = Criterion::default().measurement_time(Duration::from_secs(15)).with_plots();
    targets = criterion_benchmark,
);
criterion_main!(benches);
