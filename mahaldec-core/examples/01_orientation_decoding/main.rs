//! Example 01: Orientation Decoding
//!
//! Simulates cosine-tuned channels responding to one of 16 orientations
//! and decodes the orientation with cross-validated Mahalanobis distances.
//! Compares the decoding statistic against a label-shuffled control and
//! prints the average tuning profile of the reordered distances.
//!
//! Run with `RUST_LOG=mahaldec_core=debug` to see pipeline logs.

use mahaldec_core::circular::default_angspace;
use mahaldec_core::simulation::{shuffle_labels, simulate_circular};
use mahaldec_core::{decode_circular, CircularConfig, DecodeInput, DecodingResult};
use tracing_subscriber::EnvFilter;

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn main() -> DecodingResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    println!("=== Example 01: Orientation Decoding ===\n");

    let angles = default_angspace();
    let sim = simulate_circular(12, &angles, 16, &[0.8, 0.8, 0.8], 1.0, Some(42))?;
    let [n_trials, n_chans, n_times] = sim.data.dims();
    println!("  Trials: {n_trials}, channels: {n_chans}, time points: {n_times}");

    let mut config = CircularConfig::default();
    config.base.n_reps = 5;
    config.base.seed = Some(1);

    // --- Section 1: decoding with true labels ---
    println!("\n--- Decoding with true orientations ---");
    let real = decode_circular(DecodeInput::new(&sim.data, &sim.angles), &config)?;
    for t in 0..n_times {
        println!("  t = {t}: mean dec_cos = {:>8.4}", mean(real.dec_cos.column(t)));
    }

    // --- Section 2: shuffled control ---
    println!("\n--- Decoding with shuffled orientations ---");
    let shuffled = shuffle_labels(&sim.angles, Some(7));
    let null = decode_circular(DecodeInput::new(&sim.data, &shuffled), &config)?;
    for t in 0..n_times {
        println!("  t = {t}: mean dec_cos = {:>8.4}", mean(null.dec_cos.column(t)));
    }

    // --- Section 3: tuning profile around the true orientation ---
    // Reordered distances put each trial's own orientation at center_index;
    // distances should rise with angular distance from it.
    println!("\n--- Average reordered distance (t = 0) ---");
    let k = real.angspace_full.len();
    for j in 0..k {
        let avg = (0..n_trials).map(|i| real.ordered[(j, i, 0)]).sum::<f64>() / n_trials as f64;
        let marker = if j == real.center_index { " <- own orientation" } else { "" };
        println!(
            "  {:>7.3} rad: {avg:>8.4}{marker}",
            real.angspace_full[j] - real.angspace_full[real.center_index]
        );
    }

    println!("\n=== Done ===");
    Ok(())
}
