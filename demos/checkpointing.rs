//! An example of checkpointing a `popbox` run to disk and resuming it later with a
//! larger budget.

use popbox::{Checkpoint, DVector, OptimizerOptions, StopReason};

use std::fs::File;

fn main() {
    let function = rosenbrock;
    let dim = 10;
    let options = || {
        OptimizerOptions::new(dim)
            .initial_mean(vec![0.1; dim])
            .initial_step_size(0.1)
            .seed(42)
    };
    let path = std::env::temp_dir().join("popbox_run.json");

    // Run until a small initial budget is used up
    let mut optimizer = options()
        .max_evaluations(2_000)
        .build(function)
        .unwrap();
    let report = optimizer.run();
    assert_eq!(StopReason::BudgetExhausted, report.reason);
    println!(
        "After {} evaluations the mean has value {:e}",
        report.evaluations,
        function(&report.final_mean),
    );

    // Save the full state of the run to disk. The snapshot carries the search
    // distribution, the evaluation count, and the RNG mid-sequence.
    optimizer
        .checkpoint()
        .write_to(File::create(&path).unwrap())
        .unwrap();

    // Later (possibly in another process): load the snapshot and continue the same
    // trajectory with a larger budget. The resumed run starts from the saved
    // evaluation count, so this grants 18,000 more evaluations.
    let checkpoint = Checkpoint::read_from(File::open(&path).unwrap()).unwrap();
    let mut resumed = options()
        .max_evaluations(20_000)
        .tol_fun(1e-10)
        .resume(function, checkpoint)
        .unwrap();
    let report = resumed.run();

    println!(
        "Resumed run stopped with reason `{}` after {} total evaluations",
        report.reason, report.evaluations,
    );
    if let Some(best) = report.overall_best {
        println!(
            "Solution individual has value {:e} and point {}",
            best.value, best.point,
        );
    }
}

// N-dimensional Rosenbrock function
fn rosenbrock(x: &DVector<f64>) -> f64 {
    assert!(x.len() >= 2);
    (0..x.len() - 1)
        .map(|i| 100.0 * (x[i + 1] - x[i].powi(2)).powi(2) + (1.0 - x[i]).powi(2))
        .sum::<f64>()
}
