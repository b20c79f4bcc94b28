//! Distances between class templates and test observations.
//!
//! Mahalanobis distance is computed by default as a Euclidean distance in
//! a whitened principal-component space: the shrunk covariance is
//! eigendecomposed, both sides are projected onto the eigenvectors and
//! divided by the square root of the eigenvalues. This equals
//! `sqrt((m − x)ᵀ Σ⁻¹ (m − x))` without forming the inverse. The
//! direct-inverse path is kept for parity checks.

use crate::covariance::shrinkage_covariance;
use crate::error::{DecodingError, DecodingResult};
use crate::matrix::{FdMatrix, Tensor3};
use nalgebra::{DMatrix, SymmetricEigen};

/// Eigenvalues are floored at this fraction of the largest one before
/// whitening.
const EIGENVALUE_RTOL: f64 = 1e-14;

/// Distance between templates and test observations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DistanceMetric {
    /// Mahalanobis distance under the fold's shrinkage covariance
    #[default]
    Mahalanobis,
    /// Plain Euclidean distance
    Euclidean,
}

/// How the Mahalanobis distance is evaluated. Both paths give the same
/// distances up to floating-point error.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MahalanobisPath {
    /// Euclidean distance after PCA whitening
    #[default]
    Whitened,
    /// Explicit covariance inverse
    DirectInverse,
}

/// Pairwise Euclidean distances between the rows of `a` and `b`.
///
/// # Returns
/// `a.nrows() × b.nrows()` matrix
pub fn euclidean_cross(a: &FdMatrix, b: &FdMatrix) -> FdMatrix {
    let n_vars = a.ncols();
    debug_assert_eq!(n_vars, b.ncols());
    FdMatrix::from_fn(a.nrows(), b.nrows(), |i, j| {
        let mut dist_sq = 0.0;
        for k in 0..n_vars {
            let diff = a[(i, k)] - b[(j, k)];
            dist_sq += diff * diff;
        }
        dist_sq.sqrt()
    })
}

/// PCA whitening fitted to a covariance matrix.
#[derive(Clone, Debug)]
pub struct WhiteningTransform {
    center: Vec<f64>,
    /// Eigenvectors as columns, sorted by descending eigenvalue
    basis: DMatrix<f64>,
    eigenvalues: Vec<f64>,
    inv_sqrt: Vec<f64>,
}

impl WhiteningTransform {
    /// Whitening for a given covariance, centering observations on `center`.
    pub fn from_covariance(covariance: &DMatrix<f64>, center: Vec<f64>) -> Self {
        let n = covariance.nrows();
        let eig = SymmetricEigen::new(covariance.clone());

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));

        let eigenvalues: Vec<f64> = order.iter().map(|&k| eig.eigenvalues[k]).collect();
        let basis = DMatrix::from_fn(n, n, |i, j| eig.eigenvectors[(i, order[j])]);

        let largest = eigenvalues.first().copied().unwrap_or(0.0).max(0.0);
        let floor = (largest * EIGENVALUE_RTOL).max(f64::MIN_POSITIVE.sqrt());
        let inv_sqrt = eigenvalues.iter().map(|&ev| 1.0 / ev.max(floor).sqrt()).collect();

        Self {
            center,
            basis,
            eigenvalues,
            inv_sqrt,
        }
    }

    /// Fit to the shrinkage covariance of `observations` (rows are trials).
    pub fn fit(observations: &FdMatrix) -> Self {
        let est = shrinkage_covariance(observations);
        Self::from_covariance(&est.covariance, est.mean)
    }

    /// Eigenvalues in descending order.
    pub fn eigenvalues(&self) -> &[f64] {
        &self.eigenvalues
    }

    /// Center, project and scale the rows of `x`.
    pub fn transform(&self, x: &FdMatrix) -> FdMatrix {
        let (rows, cols) = x.shape();
        let centered = DMatrix::from_fn(rows, cols, |i, j| x[(i, j)] - self.center[j]);
        let mut projected = centered * &self.basis;
        for (k, mut column) in projected.column_iter_mut().enumerate() {
            column *= self.inv_sqrt[k];
        }
        FdMatrix::from_dmatrix(&projected)
    }
}

/// Mahalanobis distances with an explicit inverse covariance.
///
/// # Returns
/// `templates.nrows() × test.nrows()` matrix
pub fn mahalanobis_direct(templates: &FdMatrix, test: &FdMatrix, inv_cov: &DMatrix<f64>) -> FdMatrix {
    let n_vars = templates.ncols();
    let mut diff = vec![0.0; n_vars];
    let mut out = FdMatrix::zeros(templates.nrows(), test.nrows());
    for j in 0..test.nrows() {
        for i in 0..templates.nrows() {
            for k in 0..n_vars {
                diff[k] = templates[(i, k)] - test[(j, k)];
            }
            let mut q = 0.0;
            for a in 0..n_vars {
                let mut row = 0.0;
                for b in 0..n_vars {
                    row += inv_cov[(a, b)] * diff[b];
                }
                q += diff[a] * row;
            }
            out[(i, j)] = q.max(0.0).sqrt();
        }
    }
    out
}

/// Distances from every class template to every test observation.
///
/// # Arguments
/// * `templates` - classes × channels
/// * `test` - test rows × channels
/// * `cov_data` - trials × channels used for the shrinkage covariance
///   (ignored for the Euclidean metric)
/// * `metric` - Distance metric
/// * `path` - Mahalanobis evaluation strategy
///
/// # Returns
/// classes × test rows
pub fn class_distances(
    templates: &FdMatrix,
    test: &FdMatrix,
    cov_data: &FdMatrix,
    metric: DistanceMetric,
    path: MahalanobisPath,
) -> DecodingResult<FdMatrix> {
    if templates.ncols() != test.ncols() {
        return Err(DecodingError::InvalidShape {
            reason: format!(
                "templates have {} channels, test data has {}",
                templates.ncols(),
                test.ncols()
            ),
        });
    }

    match (metric, path) {
        (DistanceMetric::Euclidean, _) => Ok(euclidean_cross(templates, test)),
        (DistanceMetric::Mahalanobis, MahalanobisPath::Whitened) => {
            let whitening = WhiteningTransform::fit(cov_data);
            Ok(euclidean_cross(
                &whitening.transform(templates),
                &whitening.transform(test),
            ))
        }
        (DistanceMetric::Mahalanobis, MahalanobisPath::DirectInverse) => {
            let est = shrinkage_covariance(cov_data);
            let inv_cov = est
                .covariance
                .try_inverse()
                .filter(|inv| inv.iter().all(|v| v.is_finite()))
                .ok_or(DecodingError::SingularCovariance { location: None })?;
            Ok(mahalanobis_direct(templates, test, &inv_cov))
        }
    }
}

/// Stack every (trial, time) pair of a trials × channels × time tensor as a
/// row, so a template fixed at one time point can be compared against all
/// test time points in one call.
///
/// # Returns
/// `(trials · times) × channels`, row `trial + trials · time`
pub fn stack_time_points(x: &Tensor3) -> FdMatrix {
    let [n, n_chans, n_times] = x.dims();
    FdMatrix::from_fn(n * n_times, n_chans, |row, ch| x[(row % n, ch, row / n)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;
    use rand_distr::Normal;

    fn random_matrix(rows: usize, cols: usize, seed: u64) -> FdMatrix {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, 1.0).unwrap();
        let mut m = FdMatrix::zeros(rows, cols);
        for i in 0..rows {
            let shared: f64 = rng.sample(normal);
            for j in 0..cols {
                m[(i, j)] = rng.sample(normal) + shared * (1.0 + j as f64 * 0.3);
            }
        }
        m
    }

    #[test]
    fn test_euclidean_cross() {
        let a = FdMatrix::from_rows(&[vec![0.0, 0.0], vec![1.0, 1.0]]).unwrap();
        let b = FdMatrix::from_rows(&[vec![3.0, 4.0]]).unwrap();
        let d = euclidean_cross(&a, &b);
        assert_eq!(d.shape(), (2, 1));
        assert!((d[(0, 0)] - 5.0).abs() < 1e-12);
        assert!((d[(1, 0)] - 13.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_whitened_matches_direct_inverse() {
        let cov_data = random_matrix(60, 6, 1);
        let templates = random_matrix(4, 6, 2);
        let test = random_matrix(9, 6, 3);

        let whitened = class_distances(
            &templates,
            &test,
            &cov_data,
            DistanceMetric::Mahalanobis,
            MahalanobisPath::Whitened,
        )
        .unwrap();
        let direct = class_distances(
            &templates,
            &test,
            &cov_data,
            DistanceMetric::Mahalanobis,
            MahalanobisPath::DirectInverse,
        )
        .unwrap();

        for (w, d) in whitened.as_slice().iter().zip(direct.as_slice()) {
            assert!((w - d).abs() <= 1e-9 * d.abs().max(1.0), "{w} vs {d}");
        }
    }

    #[test]
    fn test_whitening_maps_covariance_to_identity() {
        let data = random_matrix(200, 4, 4);
        let est = shrinkage_covariance(&data);
        let whitening = WhiteningTransform::from_covariance(&est.covariance, est.mean.clone());
        let transformed_cov = {
            let basis = &whitening.basis;
            let scale = DMatrix::from_diagonal(&nalgebra::DVector::from_vec(
                whitening.inv_sqrt.clone(),
            ));
            &scale * basis.transpose() * &est.covariance * basis * &scale
        };
        for a in 0..4 {
            for b in 0..4 {
                let expected = if a == b { 1.0 } else { 0.0 };
                assert!((transformed_cov[(a, b)] - expected).abs() < 1e-9);
            }
        }
        let ev = whitening.eigenvalues();
        assert!(ev.windows(2).all(|p| p[0] >= p[1]));
    }

    #[test]
    fn test_mahalanobis_reduces_to_euclidean_for_identity() {
        let templates = random_matrix(3, 5, 5);
        let test = random_matrix(4, 5, 6);
        let inv = DMatrix::identity(5, 5);
        let d1 = mahalanobis_direct(&templates, &test, &inv);
        let d2 = euclidean_cross(&templates, &test);
        for (a, b) in d1.as_slice().iter().zip(d2.as_slice()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_zero_covariance_is_singular_on_direct_path() {
        // A single covariance trial leaves a zero covariance
        let cov_data = FdMatrix::from_rows(&[vec![1.0, 2.0]]).unwrap();
        let templates = FdMatrix::from_rows(&[vec![0.0, 0.0]]).unwrap();
        let test = FdMatrix::from_rows(&[vec![1.0, 1.0]]).unwrap();
        let err = class_distances(
            &templates,
            &test,
            &cov_data,
            DistanceMetric::Mahalanobis,
            MahalanobisPath::DirectInverse,
        )
        .unwrap_err();
        assert_eq!(err, DecodingError::SingularCovariance { location: None });

        // the whitened path stays finite
        let d = class_distances(
            &templates,
            &test,
            &cov_data,
            DistanceMetric::Mahalanobis,
            MahalanobisPath::Whitened,
        )
        .unwrap();
        assert!(d.as_slice().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_stack_time_points_layout() {
        let x = Tensor3::from_fn([2, 3, 4], |i, ch, t| (i + 10 * ch + 100 * t) as f64);
        let stacked = stack_time_points(&x);
        assert_eq!(stacked.shape(), (8, 3));
        // row = trial + 2 * time
        assert_eq!(stacked[(1 + 2 * 3, 2)], 321.0);
        assert_eq!(stacked[(0, 1)], 10.0);
    }

    #[test]
    fn test_channel_mismatch_rejected() {
        let a = FdMatrix::zeros(2, 3);
        let b = FdMatrix::zeros(2, 4);
        assert!(class_distances(
            &a,
            &b,
            &b,
            DistanceMetric::Euclidean,
            MahalanobisPath::Whitened
        )
        .is_err());
    }
}
