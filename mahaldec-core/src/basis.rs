//! Raised-cosine basis smoothing of per-bin templates.
//!
//! Each bin template is replaced by a weighted average of all bin templates,
//! with weights given by a raised-cosine kernel centered on the bin. This
//! borrows strength from circularly adjacent bins when few training trials
//! fall into any single bin.

use crate::matrix::Tensor3;

/// Raised-cosine kernel `(0.5 + 0.5·cos(θ − μ))^smoothness`.
#[inline]
pub fn raised_cosine(theta: f64, mu: f64, smoothness: f64) -> f64 {
    (0.5 + 0.5 * (theta - mu).cos()).powf(smoothness)
}

/// Normalized kernel weights of every bin center for bin `c`.
pub fn basis_weights(centers: &[f64], c: usize, smoothness: f64) -> Vec<f64> {
    let raw: Vec<f64> = centers
        .iter()
        .map(|&theta| raised_cosine(theta, centers[c], smoothness))
        .collect();
    let total: f64 = raw.iter().sum();
    raw.into_iter().map(|w| w / total).collect()
}

/// Smooth bin templates with the raised-cosine basis.
///
/// # Arguments
/// * `templates` - bins × channels × time templates
/// * `centers` - Bin centers in radians, one per template
/// * `smoothness` - Kernel exponent; `None` uses `n_bins - 1`
///
/// # Returns
/// Smoothed templates with the same shape as the input
pub fn smooth_templates(templates: &Tensor3, centers: &[f64], smoothness: Option<f64>) -> Tensor3 {
    let [n_bins, n_chans, n_times] = templates.dims();
    debug_assert_eq!(n_bins, centers.len());
    if n_bins == 0 {
        return templates.clone();
    }
    let s = smoothness.unwrap_or((n_bins - 1) as f64);

    let weights: Vec<Vec<f64>> = (0..n_bins).map(|c| basis_weights(centers, c, s)).collect();

    let mut smoothed = Tensor3::zeros([n_bins, n_chans, n_times]);
    for t in 0..n_times {
        for ch in 0..n_chans {
            for (c, w) in weights.iter().enumerate() {
                let mut acc = 0.0;
                for (k, &wk) in w.iter().enumerate() {
                    acc += wk * templates[(k, ch, t)];
                }
                smoothed[(c, ch, t)] = acc;
            }
        }
    }
    smoothed
}
