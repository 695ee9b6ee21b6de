//! An example of using `popbox` to minimize various simple functions.

#![allow(dead_code)]

use popbox::{DVector, OptimizerOptions, Weights};

use std::f64::consts::PI;

fn main() {
    let function = rosenbrock;

    // Customize parameters for the problem
    let dim = 10;
    let mut optimizer = OptimizerOptions::new(dim)
        .weights(Weights::Positive)
        .tol_fun(1e-6)
        .tol_x(1e-13)
        .initial_step_size(0.1)
        .initial_mean(vec![0.1; dim])
        .max_generations(20_000)
        // Enable printing info during the run
        .enable_printing(200)
        .build(function)
        .unwrap();

    // Find a solution
    let report = optimizer.run();

    println!("Final mean has value {:e}", function(&report.final_mean));
    if let Some(best) = report.overall_best {
        println!(
            "Solution individual has value {:e} and point {}",
            best.value, best.point,
        );
    }
}

// A random function (completely independent of input)
fn random(_: &DVector<f64>) -> f64 {
    rand::random()
}

// N-dimensional sphere function
fn sphere(x: &DVector<f64>) -> f64 {
    assert!(x.len() >= 1);
    x.iter().map(|xi| xi.powi(2)).sum::<f64>()
}

// N-dimensional ellipsoid function
fn ellipsoid(x: &DVector<f64>) -> f64 {
    assert!(x.len() >= 1);
    (0..x.len())
        .map(|i| 1e6f64.powf(i as f64 / x.len() as f64) * x[i].powi(2))
        .sum::<f64>()
}

// N-dimensional Rosenbrock function
fn rosenbrock(x: &DVector<f64>) -> f64 {
    assert!(x.len() >= 2);
    (0..x.len() - 1)
        .map(|i| 100.0 * (x[i + 1] - x[i].powi(2)).powi(2) + (1.0 - x[i]).powi(2))
        .sum::<f64>()
}

// N-dimensional Rastrigin function
fn rastrigin(x: &DVector<f64>) -> f64 {
    assert!(x.len() >= 2);
    10.0 * x.len() as f64
        + x.iter()
            .map(|xi| xi.powi(2) - 10.0 * (2.0 * PI * xi).cos())
            .sum::<f64>()
}

// N-dimensional cigar function
fn cigar(x: &DVector<f64>) -> f64 {
    assert!(x.len() >= 1);
    x[0].powi(2) + 1e6 * x.iter().skip(1).map(|xi| xi.powi(2)).sum::<f64>()
}
