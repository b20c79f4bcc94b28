//! Synthetic decoding datasets.
//!
//! Trials are generated in interleaved label order (trial `i` carries the
//! `i % n_labels`-th label) so every prefix of the trial axis is close to
//! balanced. All generators take an optional seed; `None` draws from
//! system entropy.

use crate::error::{DecodingError, DecodingResult};
use crate::matrix::Tensor3;
use rand::prelude::*;
use rand_distr::Normal;
use std::f64::consts::PI;

/// Observations with one angle per trial.
#[derive(Clone, Debug)]
pub struct CircularSimulation {
    /// trials × channels × time
    pub data: Tensor3,
    /// Angle of each trial in radians
    pub angles: Vec<f64>,
}

/// Observations with one class index per trial.
#[derive(Clone, Debug)]
pub struct NominalSimulation {
    /// trials × channels × time
    pub data: Tensor3,
    /// Class index of each trial
    pub labels: Vec<usize>,
}

fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

fn noise(sd: f64) -> DecodingResult<Normal<f64>> {
    Normal::new(0.0, sd).map_err(|_| DecodingError::Configuration {
        parameter: "noise_sd",
        reason: format!("standard deviation must be finite and non-negative, got {sd}"),
    })
}

/// Preferred angle of channel `c` out of `n_channels`.
pub fn preferred_angle(c: usize, n_channels: usize) -> f64 {
    -PI + 2.0 * PI * c as f64 / n_channels as f64
}

// =============================================================================
// Generators
// =============================================================================

/// Simulate cosine-tuned channels responding to an angle.
///
/// Channel `c` responds with `gain[t] * cos(angle - preferred_angle(c))`
/// plus independent N(0, noise_sd²) noise.
///
/// # Arguments
/// * `n_per_angle` - Trials per distinct angle
/// * `angles` - Distinct angles in radians
/// * `n_channels` - Number of channels
/// * `gains` - Tuning amplitude per time point; its length sets the
///   number of time points
/// * `noise_sd` - Noise standard deviation
/// * `seed` - Optional random seed
pub fn simulate_circular(
    n_per_angle: usize,
    angles: &[f64],
    n_channels: usize,
    gains: &[f64],
    noise_sd: f64,
    seed: Option<u64>,
) -> DecodingResult<CircularSimulation> {
    let normal = noise(noise_sd)?;
    let mut rng = rng_from(seed);

    let trial_angles: Vec<f64> = (0..n_per_angle * angles.len())
        .map(|i| angles[i % angles.len()])
        .collect();
    let n = trial_angles.len();

    let mut data = Tensor3::zeros([n, n_channels, gains.len()]);
    for (t, &gain) in gains.iter().enumerate() {
        for c in 0..n_channels {
            let pref = preferred_angle(c, n_channels);
            for (i, &a) in trial_angles.iter().enumerate() {
                data[(i, c, t)] = gain * (a - pref).cos() + rng.sample::<f64, _>(normal);
            }
        }
    }

    Ok(CircularSimulation {
        data,
        angles: trial_angles,
    })
}

/// Simulate class-specific mean patterns plus Gaussian noise.
///
/// # Arguments
/// * `class_means` - classes × channels × time mean patterns
/// * `n_per_class` - Trials per class
/// * `noise_sd` - Noise standard deviation
/// * `seed` - Optional random seed
pub fn simulate_nominal(
    class_means: &Tensor3,
    n_per_class: usize,
    noise_sd: f64,
    seed: Option<u64>,
) -> DecodingResult<NominalSimulation> {
    let normal = noise(noise_sd)?;
    let mut rng = rng_from(seed);

    let [n_classes, n_channels, n_times] = class_means.dims();
    let labels: Vec<usize> = (0..n_per_class * n_classes).map(|i| i % n_classes).collect();

    let mut data = Tensor3::zeros([labels.len(), n_channels, n_times]);
    for t in 0..n_times {
        for c in 0..n_channels {
            for (i, &class) in labels.iter().enumerate() {
                data[(i, c, t)] = class_means[(class, c, t)] + rng.sample::<f64, _>(normal);
            }
        }
    }

    Ok(NominalSimulation { data, labels })
}

/// Randomly permute labels, breaking any relation to the observations.
pub fn shuffle_labels<L: Clone>(labels: &[L], seed: Option<u64>) -> Vec<L> {
    let mut rng = rng_from(seed);
    let mut shuffled = labels.to_vec();
    shuffled.shuffle(&mut rng);
    shuffled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_dimensions_and_order() {
        let angles = [0.0, PI / 2.0, PI];
        let sim = simulate_circular(4, &angles, 5, &[1.0, 0.0], 0.1, Some(1)).unwrap();
        assert_eq!(sim.data.dims(), [12, 5, 2]);
        assert_eq!(sim.angles[4], angles[1]);
    }

    #[test]
    fn test_circular_noise_free_tuning() {
        let sim = simulate_circular(1, &[0.3], 4, &[2.0], 0.0, Some(1)).unwrap();
        for c in 0..4 {
            let expected = 2.0 * (0.3 - preferred_angle(c, 4)).cos();
            assert!((sim.data[(0, c, 0)] - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_nominal_means() {
        let means = Tensor3::from_fn([2, 3, 1], |class, c, _| (class * 3 + c) as f64);
        let sim = simulate_nominal(&means, 50, 0.01, Some(2)).unwrap();
        assert_eq!(sim.data.dims(), [100, 3, 1]);
        let avg: f64 = (0..100)
            .filter(|&i| sim.labels[i] == 1)
            .map(|i| sim.data[(i, 2, 0)])
            .sum::<f64>()
            / 50.0;
        assert!((avg - 5.0).abs() < 0.01);
    }

    #[test]
    fn test_seed_reproducibility() {
        let a = simulate_circular(3, &[0.0, 1.0], 3, &[1.0], 1.0, Some(9)).unwrap();
        let b = simulate_circular(3, &[0.0, 1.0], 3, &[1.0], 1.0, Some(9)).unwrap();
        assert_eq!(a.data, b.data);
        let labels: Vec<usize> = (0..20).collect();
        assert_eq!(shuffle_labels(&labels, Some(4)), shuffle_labels(&labels, Some(4)));
        let mut sorted = shuffle_labels(&labels, Some(4));
        sorted.sort_unstable();
        assert_eq!(sorted, labels);
    }

    #[test]
    fn test_invalid_noise_rejected() {
        assert!(simulate_circular(1, &[0.0], 2, &[1.0], -1.0, None).is_err());
        let means = Tensor3::zeros([2, 2, 1]);
        assert!(simulate_nominal(&means, 2, f64::NAN, None).is_err());
    }
}
