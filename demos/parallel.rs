//! An example of using `popbox` with parallel objective function execution.

use popbox::{DVector, OptimizerOptions};

use std::thread;
use std::time::Duration;

fn main() {
    let function = |x: &DVector<f64>| {
        // Expensive computations
        thread::sleep(Duration::from_millis(100));
        x.magnitude()
    };

    // Customize parameters for the problem
    let dim = 10;
    let mut optimizer = OptimizerOptions::new(dim)
        .initial_mean(vec![0.1; dim])
        .initial_step_size(0.1)
        .max_generations(50)
        // Dedicate four worker threads to the objective function (the default is one
        // worker per logical CPU)
        .parallel_workers(4)
        .enable_printing(200)
        .build(function)
        .unwrap();

    // Find a solution
    let use_threads = true;
    let report = if use_threads {
        optimizer.run_parallel()
    } else {
        optimizer.run()
    };
    let overall_best = report.overall_best.unwrap();

    println!(
        "Solution individual has value {:e} and point {}",
        overall_best.value, overall_best.point,
    );
}
