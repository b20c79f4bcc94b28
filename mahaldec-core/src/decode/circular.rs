//! Decoding of circular (angular) variables.
//!
//! Labels are binned into an angular space which is rotated `ang_steps`
//! times by a fraction of the bin width. Each rotation is decoded
//! independently and the rotations are interleaved into one finer combined
//! axis, from which the cosine-weighted statistic is computed.

use super::{
    check_inputs, squeeze_columns, DecodeInput, ProgressCounter, Shapes, Smoothing, Sweep,
    TimeMode,
};
use crate::circular::{assign_bins, circ_dist, nearest_bin};
use crate::config::CircularConfig;
use crate::error::{DecodingError, DecodingResult};
use crate::folds::SeededSampler;
use crate::matrix::{FdMatrix, Tensor3, Tensor4};
use tracing::debug;

/// Rotated copies of a base angular space.
#[derive(Clone, Debug, PartialEq)]
pub struct AngularGrid {
    offsets: Vec<Vec<f64>>,
}

impl AngularGrid {
    /// `ang_steps` copies of `base`, the `s`-th shifted by
    /// `s * bin_width / ang_steps` where `bin_width = base[1] - base[0]`.
    pub fn new(base: &[f64], ang_steps: usize) -> Self {
        let bin_width = if base.len() > 1 { base[1] - base[0] } else { 0.0 };
        let offsets = (0..ang_steps)
            .map(|s| {
                let shift = s as f64 * bin_width / ang_steps as f64;
                base.iter().map(|&a| a + shift).collect()
            })
            .collect();
        Self { offsets }
    }

    pub fn n_offsets(&self) -> usize {
        self.offsets.len()
    }

    pub fn n_bins(&self) -> usize {
        self.offsets.first().map_or(0, Vec::len)
    }

    /// Bin centers of offset `s`.
    pub fn offset(&self, s: usize) -> &[f64] {
        &self.offsets[s]
    }

    /// All offsets, offset-major.
    pub fn offsets(&self) -> &[Vec<f64>] {
        &self.offsets
    }

    /// Position of (offset, bin) on the combined axis.
    pub fn combined_index(&self, offset: usize, bin: usize) -> usize {
        bin * self.n_offsets() + offset
    }

    /// Combined axis: bin-major, offsets interleaved within each bin.
    pub fn combined(&self) -> Vec<f64> {
        let mut full = vec![0.0; self.n_bins() * self.n_offsets()];
        for (s, centers) in self.offsets.iter().enumerate() {
            for (b, &angle) in centers.iter().enumerate() {
                full[self.combined_index(s, b)] = angle;
            }
        }
        full
    }
}

/// Same-time circular decoding output.
#[derive(Clone, Debug)]
pub struct CircularDecoding {
    /// Cosine-weighted decoding statistic, trials × time
    pub dec_cos: FdMatrix,
    /// Centered distances per offset, each bins × trials × time
    pub distances: Vec<Tensor3>,
    /// Distances on the combined axis, combined bins × trials × time
    pub combined: Tensor3,
    /// Combined distances rolled so each trial's own bin lands on
    /// `center_index`
    pub ordered: Tensor3,
    /// Bin centers of every offset
    pub angspaces: Vec<Vec<f64>>,
    /// Combined-axis bin centers
    pub angspace_full: Vec<f64>,
    /// Combined-axis position of the bin closest to zero
    pub center_index: usize,
}

/// Cross-temporal circular decoding output.
///
/// Time axes are (training time, test time).
#[derive(Clone, Debug)]
pub struct CircularCrossTemporalDecoding {
    /// trials × training time × test time
    pub dec_cos: Tensor3,
    /// Per offset, bins × trials × training time × test time
    pub distances: Vec<Tensor4>,
    /// combined bins × trials × training time × test time
    pub combined: Tensor4,
    pub ordered: Tensor4,
    pub angspaces: Vec<Vec<f64>>,
    pub angspace_full: Vec<f64>,
    pub center_index: usize,
}

/// Intermediate shared by both circular entry points; the trailing axes
/// are (training time, test column).
struct CircularParts {
    distances: Vec<Tensor4>,
    combined: Tensor4,
    ordered: Tensor4,
    dec_cos: Vec<f64>,
    grid: AngularGrid,
    center_index: usize,
}

/// Decode a circular variable at matching time points.
///
/// # Arguments
/// * `input` - Observations (trials × channels × time) and one angle in
///   radians per trial
/// * `config` - Decoding options
///
/// # Returns
/// Cosine-weighted statistic and distance tensors
///
/// # Example
/// ```
/// use mahaldec_core::{decode_circular, CircularConfig, DecodeInput};
/// use mahaldec_core::simulation::simulate_circular;
/// use mahaldec_core::circular::default_angspace;
///
/// let sim = simulate_circular(8, &default_angspace(), 6, &[1.0], 0.5, Some(3)).unwrap();
/// let mut config = CircularConfig::default();
/// config.base.n_reps = 2;
/// config.base.seed = Some(1);
/// let out = decode_circular(DecodeInput::new(&sim.data, &sim.angles), &config).unwrap();
/// assert_eq!(out.dec_cos.shape(), (128, 1));
/// ```
pub fn decode_circular(
    input: DecodeInput<'_, f64>,
    config: &CircularConfig,
) -> DecodingResult<CircularDecoding> {
    let parts = run(&input, config, TimeMode::SameTime)?;
    let [_, n_trials, n_times, _] = parts.combined.dims();

    Ok(CircularDecoding {
        dec_cos: FdMatrix::from_column_major(parts.dec_cos, n_trials, n_times)?,
        distances: parts
            .distances
            .into_iter()
            .map(squeeze_columns)
            .collect::<DecodingResult<_>>()?,
        combined: squeeze_columns(parts.combined)?,
        ordered: squeeze_columns(parts.ordered)?,
        angspace_full: parts.grid.combined(),
        angspaces: parts.grid.offsets().to_vec(),
        center_index: parts.center_index,
    })
}

/// Decode a circular variable for every pair of training and test time
/// points.
///
/// The training set may come from `input.data_trn`, which must match the
/// test data in trials and channels but may have a different number of
/// time points.
pub fn decode_circular_cross_temporal(
    input: DecodeInput<'_, f64>,
    config: &CircularConfig,
) -> DecodingResult<CircularCrossTemporalDecoding> {
    let parts = run(&input, config, TimeMode::CrossTemporal)?;
    let [_, n_trials, n_train, n_test] = parts.combined.dims();

    Ok(CircularCrossTemporalDecoding {
        dec_cos: Tensor3::from_column_major(parts.dec_cos, [n_trials, n_train, n_test])?,
        distances: parts.distances,
        combined: parts.combined,
        ordered: parts.ordered,
        angspace_full: parts.grid.combined(),
        angspaces: parts.grid.offsets().to_vec(),
        center_index: parts.center_index,
    })
}

/// True when `base` lists exactly the distinct label values.
fn matches_unique_labels(base: &[f64], theta: &[f64]) -> bool {
    let mut unique = theta.to_vec();
    unique.sort_by(f64::total_cmp);
    unique.dedup();
    unique == base
}

fn run(
    input: &DecodeInput<'_, f64>,
    config: &CircularConfig,
    mode: TimeMode,
) -> DecodingResult<CircularParts> {
    config.validate()?;
    let shapes: Shapes = check_inputs(input, mode)?;
    let theta = input.labels;
    if let Some(i) = theta.iter().position(|a| !a.is_finite()) {
        return Err(DecodingError::InvalidShape {
            reason: format!("angle of trial {i} is not finite"),
        });
    }

    let base = config.angspace.centers()?;
    let ang_steps = if matches_unique_labels(&base, theta) {
        1
    } else {
        config.ang_steps
    };
    let grid = AngularGrid::new(&base, ang_steps);
    let n_bins = grid.n_bins();

    debug!(
        n_trials = shapes.n_trials,
        n_train_times = shapes.n_train_times,
        n_test_times = shapes.n_test_times,
        n_bins,
        ang_steps,
        ?mode,
        metric = ?config.base.dist_metric,
        "starting circular decoding"
    );

    let sweep = Sweep::new(input, shapes, mode, &config.base);
    let mut counter = ProgressCounter::new(sweep.units() * ang_steps);
    let mut sampler = SeededSampler::new(config.base.seed);

    let mut distances = Vec::with_capacity(ang_steps);
    for s in 0..ang_steps {
        let centers = grid.offset(s);
        let classes = assign_bins(centers, theta);
        let smoothing = config.basis_set.then_some(Smoothing {
            centers,
            smoothness: config.basis_smoothness,
        });
        debug!(offset = s, first_center = centers[0], "decoding angular offset");
        distances.push(sweep.distances(&classes, n_bins, s, smoothing, &mut sampler, &mut counter)?);
    }

    let n_trials = shapes.n_trials;
    let [_, _, n_train, n_cols] = distances[0].dims();
    let n_full = n_bins * ang_steps;
    let n_slices = n_trials * n_train * n_cols;

    // Interleave offsets; each offset is already centered over its bins.
    let mut combined = vec![0.0; n_full * n_slices];
    for (s, d) in distances.iter().enumerate() {
        let per_offset = d.as_slice();
        for slice in 0..n_slices {
            for b in 0..n_bins {
                combined[grid.combined_index(s, b) + n_full * slice] =
                    per_offset[b + n_bins * slice];
            }
        }
    }

    let full = grid.combined();
    let mut dec_cos = vec![0.0; n_slices];
    for trial in 0..n_trials {
        let weights: Vec<f64> = full.iter().map(|&a| circ_dist(a, theta[trial]).cos()).collect();
        for r in 0..n_train * n_cols {
            let slice = trial + n_trials * r;
            let block = &combined[n_full * slice..n_full * (slice + 1)];
            let weighted: f64 = weights.iter().zip(block).map(|(w, d)| w * d).sum();
            dec_cos[slice] = -weighted / n_full as f64;
        }
    }

    // Roll each trial's own bin onto the bin nearest zero.
    let center_index = nearest_bin(&full, 0.0);
    let mut ordered = vec![0.0; combined.len()];
    for trial in 0..n_trials {
        let own = nearest_bin(&full, theta[trial]);
        let shift = (center_index + n_full - own) % n_full;
        for r in 0..n_train * n_cols {
            let slice = trial + n_trials * r;
            let base = n_full * slice;
            for k in 0..n_full {
                ordered[base + (k + shift) % n_full] = combined[base + k];
            }
        }
    }

    debug!(
        n_offsets = ang_steps,
        mean_dec_cos = dec_cos.iter().sum::<f64>() / dec_cos.len() as f64,
        "circular decoding finished"
    );

    let dims = [n_full, n_trials, n_train, n_cols];
    Ok(CircularParts {
        distances,
        combined: Tensor4::from_column_major(combined, dims)?,
        ordered: Tensor4::from_column_major(ordered, dims)?,
        dec_cos,
        grid,
        center_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circular::{angspace_with_bins, default_angspace};
    use crate::config::AngularSpace;
    use std::f64::consts::PI;

    fn tuned_data(angles: &[f64], n_chans: usize, n_times: usize) -> Tensor3 {
        let prefs: Vec<f64> = (0..n_chans)
            .map(|c| -PI + 2.0 * PI * c as f64 / n_chans as f64)
            .collect();
        Tensor3::from_fn([angles.len(), n_chans, n_times], |i, c, t| {
            let jitter = 0.05 * (((i * 31 + c * 17 + t * 7) % 11) as f64 - 5.0);
            (angles[i] - prefs[c]).cos() * 2.0 + jitter
        })
    }

    fn quick_config() -> CircularConfig {
        let mut config = CircularConfig::default();
        config.base.n_folds = 4;
        config.base.n_reps = 2;
        config.base.seed = Some(11);
        config
    }

    #[test]
    fn test_grid_interleaves_offsets() {
        let base = angspace_with_bins(4);
        let grid = AngularGrid::new(&base, 2);
        let full = grid.combined();
        assert_eq!(full.len(), 8);
        for w in full.windows(2) {
            assert!((w[1] - w[0] - PI / 4.0).abs() < 1e-12);
        }
        assert_eq!(grid.combined_index(1, 2), 5);
    }

    #[test]
    fn test_steps_collapse_on_matching_labels() {
        let base = default_angspace();
        let theta: Vec<f64> = (0..64).map(|i| base[i % 16]).collect();
        assert!(matches_unique_labels(&base, &theta));
        assert!(!matches_unique_labels(&base, &theta[..8]));

        let data = tuned_data(&theta, 6, 1);
        let out = decode_circular(DecodeInput::new(&data, &theta), &quick_config()).unwrap();
        assert_eq!(out.angspaces.len(), 1);
        assert_eq!(out.combined.dims(), [16, 64, 1]);
    }

    #[test]
    fn test_ordered_puts_own_bin_at_center() {
        let theta: Vec<f64> = (0..48).map(|i| -PI + 2.0 * PI * (i as f64 + 0.3) / 48.0).collect();
        let data = tuned_data(&theta, 6, 2);
        let mut config = quick_config();
        config.angspace = AngularSpace::Custom(angspace_with_bins(6));
        config.ang_steps = 3;
        let out = decode_circular(DecodeInput::new(&data, &theta), &config).unwrap();

        let k = out.angspace_full.len();
        assert_eq!(k, 18);
        for trial in 0..48 {
            let own = nearest_bin(&out.angspace_full, theta[trial]);
            for t in 0..2 {
                assert_eq!(
                    out.ordered[(out.center_index, trial, t)],
                    out.combined[(own, trial, t)]
                );
                let shift = (out.center_index + k - own) % k;
                for j in 0..k {
                    assert_eq!(
                        out.ordered[((j + shift) % k, trial, t)],
                        out.combined[(j, trial, t)]
                    );
                }
            }
        }
    }

    #[test]
    fn test_tuned_signal_gives_positive_statistic() {
        let base = default_angspace();
        let theta: Vec<f64> = (0..96).map(|i| base[i % 16] + 0.05).collect();
        let data = tuned_data(&theta, 8, 1);
        let out = decode_circular(DecodeInput::new(&data, &theta), &quick_config()).unwrap();
        assert_eq!(out.angspaces.len(), 4);
        let mean = out.dec_cos.as_slice().iter().sum::<f64>() / 96.0;
        assert!(mean > 0.0, "mean dec_cos = {mean}");
        // combined distances stay centered per trial
        for trial in 0..96 {
            let total: f64 = (0..64).map(|k| out.combined[(k, trial, 0)]).sum();
            assert!(total.abs() < 1e-8);
        }
    }

    #[test]
    fn test_cross_temporal_shapes() {
        let theta: Vec<f64> = (0..40).map(|i| -PI + 2.0 * PI * i as f64 / 40.0).collect();
        let test = tuned_data(&theta, 5, 3);
        let train = tuned_data(&theta, 5, 2);
        let mut config = quick_config();
        config.angspace = AngularSpace::Custom(angspace_with_bins(8));
        config.ang_steps = 2;
        let input = DecodeInput::new(&test, &theta).with_training_data(&train);
        let out = decode_circular_cross_temporal(input, &config).unwrap();
        assert_eq!(out.dec_cos.dims(), [40, 2, 3]);
        assert_eq!(out.combined.dims(), [16, 40, 2, 3]);
        assert_eq!(out.distances.len(), 2);
        assert_eq!(out.distances[0].dims(), [8, 40, 2, 3]);

        // same-time decoding rejects mismatched time axes
        let input = DecodeInput::new(&test, &theta).with_training_data(&train);
        assert!(decode_circular(input, &config).is_err());
    }

    #[test]
    fn test_non_finite_angle_rejected() {
        let mut theta = vec![0.0; 16];
        theta[3] = f64::NAN;
        let data = Tensor3::zeros([16, 2, 1]);
        let err = decode_circular(DecodeInput::new(&data, &theta), &quick_config()).unwrap_err();
        assert!(matches!(err, DecodingError::InvalidShape { .. }));
    }
}
