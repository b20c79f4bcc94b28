//! Column-major containers for trial data.
//!
//! All containers store their values in a flat `Vec<f64>` with the first
//! axis varying fastest, so for a trials × channels matrix `data[i + j * n]`
//! is trial `i` on channel `j`. Higher-rank tensors extend the same rule:
//! in a trials × channels × time tensor, element `(i, j, k)` lives at
//! `i + j * n0 + k * n0 * n1`.

use crate::error::{DecodingError, DecodingResult};
use nalgebra::DMatrix;
use std::ops::{Index, IndexMut};

/// Dense column-major matrix (rows are observations, columns are variables).
#[derive(Clone, Debug, PartialEq)]
pub struct FdMatrix {
    data: Vec<f64>,
    nrows: usize,
    ncols: usize,
}

impl FdMatrix {
    /// Wrap a column-major buffer.
    ///
    /// Fails when `data.len() != nrows * ncols`.
    pub fn from_column_major(data: Vec<f64>, nrows: usize, ncols: usize) -> DecodingResult<Self> {
        if data.len() != nrows * ncols {
            return Err(DecodingError::InvalidShape {
                reason: format!(
                    "buffer of length {} cannot hold a {nrows} x {ncols} matrix",
                    data.len()
                ),
            });
        }
        Ok(Self { data, nrows, ncols })
    }

    /// Build from row slices, all of equal length.
    pub fn from_rows(rows: &[Vec<f64>]) -> DecodingResult<Self> {
        let nrows = rows.len();
        let ncols = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().position(|r| r.len() != ncols) {
            return Err(DecodingError::InvalidShape {
                reason: format!("row {bad} has {} values, expected {ncols}", rows[bad].len()),
            });
        }
        Ok(Self::from_fn(nrows, ncols, |i, j| rows[i][j]))
    }

    /// All-zero matrix.
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            data: vec![0.0; nrows * ncols],
            nrows,
            ncols,
        }
    }

    /// Build element-wise from `f(row, col)`.
    pub fn from_fn(nrows: usize, ncols: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut data = Vec::with_capacity(nrows * ncols);
        for j in 0..ncols {
            for i in 0..nrows {
                data.push(f(i, j));
            }
        }
        Self { data, nrows, ncols }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    /// Contiguous view of column `j`.
    pub fn column(&self, j: usize) -> &[f64] {
        &self.data[j * self.nrows..(j + 1) * self.nrows]
    }

    /// Mean of every column.
    pub fn column_means(&self) -> Vec<f64> {
        if self.nrows == 0 {
            return vec![0.0; self.ncols];
        }
        (0..self.ncols)
            .map(|j| self.column(j).iter().sum::<f64>() / self.nrows as f64)
            .collect()
    }

    /// Copy into an nalgebra matrix (both are column-major).
    pub fn to_dmatrix(&self) -> DMatrix<f64> {
        DMatrix::from_column_slice(self.nrows, self.ncols, &self.data)
    }

    /// Copy out of an nalgebra matrix.
    pub fn from_dmatrix(matrix: &DMatrix<f64>) -> Self {
        Self {
            data: matrix.as_slice().to_vec(),
            nrows: matrix.nrows(),
            ncols: matrix.ncols(),
        }
    }
}

impl Index<(usize, usize)> for FdMatrix {
    type Output = f64;

    #[inline]
    fn index(&self, (i, j): (usize, usize)) -> &f64 {
        &self.data[i + j * self.nrows]
    }
}

impl IndexMut<(usize, usize)> for FdMatrix {
    #[inline]
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut f64 {
        &mut self.data[i + j * self.nrows]
    }
}

/// Rank-3 column-major tensor, used for trials × channels × time data and
/// for class × trial × time distance tensors.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor3 {
    data: Vec<f64>,
    dims: [usize; 3],
}

impl Tensor3 {
    /// Wrap a column-major buffer with the given dimensions.
    pub fn from_column_major(data: Vec<f64>, dims: [usize; 3]) -> DecodingResult<Self> {
        if data.len() != dims.iter().product::<usize>() {
            return Err(DecodingError::InvalidShape {
                reason: format!(
                    "buffer of length {} cannot hold a {:?} tensor",
                    data.len(),
                    dims
                ),
            });
        }
        Ok(Self { data, dims })
    }

    /// Wrap a buffer whose shape is only known at runtime.
    ///
    /// Rank-2 shapes (trials × channels) are promoted to rank 3 with a
    /// singleton time axis. Any other rank is rejected.
    pub fn from_shape_vec(shape: &[usize], data: Vec<f64>) -> DecodingResult<Self> {
        match *shape {
            [n0, n1] => Self::from_column_major(data, [n0, n1, 1]),
            [n0, n1, n2] => Self::from_column_major(data, [n0, n1, n2]),
            _ => Err(DecodingError::InvalidShape {
                reason: format!(
                    "observations must have rank 2 or 3, got rank {} ({:?})",
                    shape.len(),
                    shape
                ),
            }),
        }
    }

    pub fn zeros(dims: [usize; 3]) -> Self {
        Self {
            data: vec![0.0; dims.iter().product()],
            dims,
        }
    }

    /// Build element-wise from `f(i, j, k)`.
    pub fn from_fn(dims: [usize; 3], mut f: impl FnMut(usize, usize, usize) -> f64) -> Self {
        let mut data = Vec::with_capacity(dims.iter().product());
        for k in 0..dims[2] {
            for j in 0..dims[1] {
                for i in 0..dims[0] {
                    data.push(f(i, j, k));
                }
            }
        }
        Self { data, dims }
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    /// The `dims[0] × dims[1]` matrix at index `k` of the last axis.
    pub fn slice_last(&self, k: usize) -> FdMatrix {
        let plane = self.dims[0] * self.dims[1];
        FdMatrix {
            data: self.data[k * plane..(k + 1) * plane].to_vec(),
            nrows: self.dims[0],
            ncols: self.dims[1],
        }
    }

    /// Gather a subset of the first axis, in the given order.
    pub fn select_first(&self, indices: &[usize]) -> Tensor3 {
        let [n0, n1, n2] = self.dims;
        let m = indices.len();
        let mut data = Vec::with_capacity(m * n1 * n2);
        for k in 0..n2 {
            for j in 0..n1 {
                let base = j * n0 + k * n0 * n1;
                data.extend(indices.iter().map(|&i| self.data[base + i]));
            }
        }
        Tensor3 {
            data,
            dims: [m, n1, n2],
        }
    }
}

impl From<FdMatrix> for Tensor3 {
    fn from(matrix: FdMatrix) -> Self {
        let dims = [matrix.nrows, matrix.ncols, 1];
        Tensor3 {
            data: matrix.data,
            dims,
        }
    }
}

impl Index<(usize, usize, usize)> for Tensor3 {
    type Output = f64;

    #[inline]
    fn index(&self, (i, j, k): (usize, usize, usize)) -> &f64 {
        &self.data[i + self.dims[0] * (j + self.dims[1] * k)]
    }
}

impl IndexMut<(usize, usize, usize)> for Tensor3 {
    #[inline]
    fn index_mut(&mut self, (i, j, k): (usize, usize, usize)) -> &mut f64 {
        &mut self.data[i + self.dims[0] * (j + self.dims[1] * k)]
    }
}

/// Rank-4 column-major tensor, used for class × trial × train-time ×
/// test-time distance tensors.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor4 {
    data: Vec<f64>,
    dims: [usize; 4],
}

impl Tensor4 {
    pub fn from_column_major(data: Vec<f64>, dims: [usize; 4]) -> DecodingResult<Self> {
        if data.len() != dims.iter().product::<usize>() {
            return Err(DecodingError::InvalidShape {
                reason: format!(
                    "buffer of length {} cannot hold a {:?} tensor",
                    data.len(),
                    dims
                ),
            });
        }
        Ok(Self { data, dims })
    }

    pub fn zeros(dims: [usize; 4]) -> Self {
        Self {
            data: vec![0.0; dims.iter().product()],
            dims,
        }
    }

    pub fn dims(&self) -> [usize; 4] {
        self.dims
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }
}

impl Index<(usize, usize, usize, usize)> for Tensor4 {
    type Output = f64;

    #[inline]
    fn index(&self, (i, j, k, l): (usize, usize, usize, usize)) -> &f64 {
        let [n0, n1, n2, _] = self.dims;
        &self.data[i + n0 * (j + n1 * (k + n2 * l))]
    }
}

impl IndexMut<(usize, usize, usize, usize)> for Tensor4 {
    #[inline]
    fn index_mut(&mut self, (i, j, k, l): (usize, usize, usize, usize)) -> &mut f64 {
        let [n0, n1, n2, _] = self.dims;
        &mut self.data[i + n0 * (j + n1 * (k + n2 * l))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fdmatrix_column_major_indexing() {
        let m = FdMatrix::from_column_major(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3).unwrap();
        assert_eq!(m[(0, 0)], 1.0);
        assert_eq!(m[(1, 0)], 2.0);
        assert_eq!(m[(0, 2)], 5.0);
        assert_eq!(m.column(1), &[3.0, 4.0]);
    }

    #[test]
    fn test_fdmatrix_rejects_bad_length() {
        assert!(FdMatrix::from_column_major(vec![1.0; 5], 2, 3).is_err());
        assert!(FdMatrix::from_rows(&[vec![1.0, 2.0], vec![3.0]]).is_err());
    }

    #[test]
    fn test_column_means() {
        let m = FdMatrix::from_rows(&[vec![1.0, 10.0], vec![3.0, 20.0]]).unwrap();
        assert_eq!(m.column_means(), vec![2.0, 15.0]);
    }

    #[test]
    fn test_rank2_promotion() {
        let t = Tensor3::from_shape_vec(&[3, 2], vec![0.0; 6]).unwrap();
        assert_eq!(t.dims(), [3, 2, 1]);
        assert!(Tensor3::from_shape_vec(&[6], vec![0.0; 6]).is_err());
        assert!(Tensor3::from_shape_vec(&[1, 2, 3, 1], vec![0.0; 6]).is_err());
    }

    #[test]
    fn test_tensor3_slice_and_select() {
        let t = Tensor3::from_fn([3, 2, 2], |i, j, k| (100 * k + 10 * j + i) as f64);
        let s = t.slice_last(1);
        assert_eq!(s[(2, 1)], 112.0);

        let sub = t.select_first(&[2, 0]);
        assert_eq!(sub.dims(), [2, 2, 2]);
        assert_eq!(sub[(0, 1, 1)], 112.0);
        assert_eq!(sub[(1, 1, 1)], 110.0);
    }

    #[test]
    fn test_tensor4_indexing() {
        let mut t = Tensor4::zeros([2, 3, 4, 5]);
        t[(1, 2, 3, 4)] = 7.0;
        assert_eq!(*t.as_slice().last().unwrap(), 7.0);
    }
}
