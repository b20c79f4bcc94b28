//! Angular distance arithmetic on the unit circle.
//!
//! Angles are in radians. Distances are signed and wrapped to (−π, π].

use crate::error::{DecodingError, DecodingResult};
use crate::matrix::FdMatrix;
use std::f64::consts::PI;

/// Number of bins in the default angular space.
pub const DEFAULT_N_BINS: usize = 16;

/// Signed circular distance `angle(exp(i·a) / exp(i·b))`.
///
/// The result lies in (−π, π], is zero for `a == b` and flips sign when the
/// arguments are swapped.
#[inline]
pub fn circ_dist(a: f64, b: f64) -> f64 {
    let d = a - b;
    let wrapped = d.sin().atan2(d.cos());
    // atan2 can round onto −π; the half-open range keeps +π instead
    if wrapped <= -PI {
        PI
    } else {
        wrapped
    }
}

/// Element-wise circular distance.
///
/// Either side may have length 1, in which case it is broadcast against the
/// other. Any other length mismatch is rejected.
pub fn circ_dist_elementwise(a: &[f64], b: &[f64]) -> DecodingResult<Vec<f64>> {
    match (a.len(), b.len()) {
        (n, m) if n == m => Ok(a.iter().zip(b).map(|(&x, &y)| circ_dist(x, y)).collect()),
        (1, _) => Ok(b.iter().map(|&y| circ_dist(a[0], y)).collect()),
        (_, 1) => Ok(a.iter().map(|&x| circ_dist(x, b[0])).collect()),
        (n, m) => Err(DecodingError::InvalidShape {
            reason: format!("cannot broadcast angle sequences of length {n} and {m}"),
        }),
    }
}

/// All-pairs circular distance.
///
/// # Returns
/// A `len(a) × len(b)` matrix whose `(i, j)` entry is `circ_dist(a[i], b[j])`.
pub fn circ_dist_all_pairs(a: &[f64], b: &[f64]) -> FdMatrix {
    FdMatrix::from_fn(a.len(), b.len(), |i, j| circ_dist(a[i], b[j]))
}

/// Index of the bin center closest to `angle` (first index on ties).
pub fn nearest_bin(bins: &[f64], angle: f64) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, &center) in bins.iter().enumerate() {
        let d = circ_dist(center, angle).abs();
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

/// Assign every angle to its nearest bin.
pub fn assign_bins(bins: &[f64], angles: &[f64]) -> Vec<usize> {
    angles.iter().map(|&a| nearest_bin(bins, a)).collect()
}

/// `n_bins` evenly spaced bin centers over [−π, π).
pub fn angspace_with_bins(n_bins: usize) -> Vec<f64> {
    let step = 2.0 * PI / n_bins as f64;
    (0..n_bins).map(|k| -PI + k as f64 * step).collect()
}

/// The default 16-bin angular space, `−π + k·π/8`.
pub fn default_angspace() -> Vec<f64> {
    angspace_with_bins(DEFAULT_N_BINS)
}
