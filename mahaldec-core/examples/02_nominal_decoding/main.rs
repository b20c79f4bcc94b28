//! Example 02: Nominal Decoding
//!
//! Decodes one of three stimulus categories whose channel patterns only
//! differ in the second half of the trial. Shows per-time-point accuracy
//! and mean distance difference for the Mahalanobis and Euclidean metrics.

use mahaldec_core::simulation::simulate_nominal;
use mahaldec_core::{
    decode_nominal, DecodeInput, DecodingResult, DistanceMetric, NominalConfig, Tensor3,
};
use tracing_subscriber::EnvFilter;

fn main() -> DecodingResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    println!("=== Example 02: Nominal Decoding ===\n");

    let n_times = 6;
    let means = Tensor3::from_fn([3, 10, n_times], |class, ch, t| {
        if t >= n_times / 2 && ch % 3 == class {
            0.9
        } else {
            0.0
        }
    });
    let sim = simulate_nominal(&means, 24, 1.0, Some(11))?;
    let names = ["face", "house", "tool"];
    let labels: Vec<&str> = sim.labels.iter().map(|&c| names[c]).collect();
    println!("  Trials: {}, classes: {:?}", labels.len(), names);

    for metric in [DistanceMetric::Mahalanobis, DistanceMetric::Euclidean] {
        let mut config = NominalConfig::default();
        config.base.dist_metric = metric;
        config.base.n_reps = 5;
        config.base.seed = Some(2);

        println!("\n--- {metric:?} ---");
        let out = decode_nominal(DecodeInput::new(&sim.data, &labels), &config)?;
        let accuracy = out.accuracy();
        for (t, acc) in accuracy.iter().enumerate() {
            let diff = out.distance_difference.column(t);
            let mean_diff = diff.iter().sum::<f64>() / diff.len() as f64;
            println!("  t = {t}: accuracy = {acc:>5.3}, distance difference = {mean_diff:>8.4}");
        }
        println!(
            "  trial 0 ({}) predicted as {} at the last time point",
            labels[0],
            out.predicted_label(0, n_times - 1)
        );
    }

    println!("\n=== Done ===");
    Ok(())
}
