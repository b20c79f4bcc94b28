//! Shrinkage covariance estimation.
//!
//! Implements the Ledoit–Wolf estimator with a diagonal target: the sample
//! covariance is blended with its own diagonal using a closed-form
//! intensity. This keeps the estimate well conditioned when there are few
//! trials relative to channels.

use crate::matrix::FdMatrix;
use nalgebra::DMatrix;

/// Result of shrinkage covariance estimation.
#[derive(Clone, Debug)]
pub struct ShrinkageEstimate {
    /// Shrunk covariance, N x N
    pub covariance: DMatrix<f64>,
    /// Column means that were removed before estimation
    pub mean: Vec<f64>,
    /// Shrinkage intensity in [0, 1]; 1 means the diagonal prior was returned
    pub shrinkage: f64,
}

/// Estimate a covariance matrix shrunk toward its diagonal.
///
/// # Arguments
/// * `observations` - T observations (rows) of N variables (columns)
///
/// With `d = ‖S − diag(S)‖²_F / N` and `Y` the element-wise squared centered
/// data, the intensity is `r2 / d` clipped to [0, 1] where
/// `r2 = Σ(YᵀY) / (N·T²) − Σ(S²) / (N·T)`. A zero `d` (a single observation
/// or an already diagonal sample covariance) yields the prior.
pub fn shrinkage_covariance(observations: &FdMatrix) -> ShrinkageEstimate {
    let (t, n) = observations.shape();
    if t == 0 || n == 0 {
        return ShrinkageEstimate {
            covariance: DMatrix::zeros(n, n),
            mean: vec![0.0; n],
            shrinkage: 1.0,
        };
    }

    let mean = observations.column_means();
    let tf = t as f64;
    let nf = n as f64;

    // Centered columns
    let x: Vec<Vec<f64>> = (0..n)
        .map(|j| observations.column(j).iter().map(|&v| v - mean[j]).collect())
        .collect();
    let y: Vec<Vec<f64>> = x
        .iter()
        .map(|col| col.iter().map(|&v| v * v).collect())
        .collect();

    // Biased sample covariance
    let mut sample = DMatrix::zeros(n, n);
    for a in 0..n {
        for b in a..n {
            let s = x[a].iter().zip(&x[b]).map(|(&p, &q)| p * q).sum::<f64>() / tf;
            sample[(a, b)] = s;
            sample[(b, a)] = s;
        }
    }

    let mut off_diag_sq = 0.0;
    let mut sample_sq = 0.0;
    let mut y_gram = 0.0;
    for a in 0..n {
        for b in 0..n {
            let s = sample[(a, b)];
            sample_sq += s * s;
            if a != b {
                off_diag_sq += s * s;
            }
        }
    }
    for a in 0..n {
        for b in a..n {
            let g = y[a].iter().zip(&y[b]).map(|(&p, &q)| p * q).sum::<f64>();
            y_gram += if a == b { g } else { 2.0 * g };
        }
    }

    let d = off_diag_sq / nf;
    let r2 = y_gram / nf / (tf * tf) - sample_sq / nf / tf;
    let shrinkage = if d > 0.0 { (r2 / d).clamp(0.0, 1.0) } else { 1.0 };

    // α·prior + (1−α)·sample: the diagonal is kept, off-diagonals scaled
    let mut covariance = sample * (1.0 - shrinkage);
    for a in 0..n {
        covariance[(a, a)] = y[a].iter().sum::<f64>() / tf;
    }

    ShrinkageEstimate {
        covariance,
        mean,
        shrinkage,
    }
}
