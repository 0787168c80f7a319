#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use nalgebra::{DMatrix, DVector};
use std::fmt;
use std::ops::{Index, IndexMut};

/// Gradient of an `n x n` covariance matrix with respect to each of `m`
/// hyperparameters, stored as one `n x n` slice per hyperparameter.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct CovGrad {
    n: usize,
    slices: Vec<DMatrix<f64>>,
}

impl fmt::Display for CovGrad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.slices.iter().try_for_each(|s| write!(f, "{s}"))
    }
}

impl CovGrad {
    /// Create a new cov-grad with given slices
    pub fn new(slices: &[DMatrix<f64>]) -> Result<Self, CovGradError> {
        let first = slices.first().ok_or(CovGradError::Empty)?;
        let n = first.nrows();

        if slices.iter().all(|s| s.shape() == (n, n)) {
            Ok(Self {
                n,
                slices: slices.to_vec(),
            })
        } else {
            Err(CovGradError::ShapeMismatch(
                slices.iter().map(|s| s.shape()).collect(),
            ))
        }
    }

    /// Create a new `CovGrad` without checking shapes
    #[must_use]
    pub fn new_unchecked(slices: &[DMatrix<f64>]) -> Self {
        let n = slices.first().map_or(0, |s| s.nrows());
        Self {
            n,
            slices: slices.to_vec(),
        }
    }

    /// `m` slices of `n x n` zeros. `m` may be zero.
    #[must_use]
    pub fn zeros(n: usize, m: usize) -> Self {
        Self {
            n,
            slices: (0..m).map(|_| DMatrix::zeros(n, n)).collect(),
        }
    }

    /// Side length of each slice
    #[must_use]
    pub fn size(&self) -> usize {
        self.n
    }

    /// Number of hyperparameters
    #[must_use]
    pub fn n_parameters(&self) -> usize {
        self.slices.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DMatrix<f64>> {
        self.slices.iter()
    }

    fn check_square(&self, other: &DMatrix<f64>) -> Result<(), CovGradError> {
        if other.shape() == (self.n, self.n) {
            Ok(())
        } else {
            Err(CovGradError::ShapeMismatch(vec![
                (self.n, self.n),
                other.shape(),
            ]))
        }
    }

    /// Component wise multiplication of every slice
    pub fn component_mul(
        &self,
        other: &DMatrix<f64>,
    ) -> Result<Self, CovGradError> {
        self.check_square(other)?;
        Ok(Self {
            n: self.n,
            slices: self.slices.iter().map(|s| s.component_mul(other)).collect(),
        })
    }

    /// Multiply every slice by a scalar
    #[must_use]
    pub fn scale(&self, factor: f64) -> Self {
        Self {
            n: self.n,
            slices: self.slices.iter().map(|s| s * factor).collect(),
        }
    }

    /// Add `diag(d)` to slice `k`
    pub fn add_diagonal(
        &mut self,
        k: usize,
        d: &DVector<f64>,
    ) -> Result<(), CovGradError> {
        if d.len() != self.n || k >= self.slices.len() {
            return Err(CovGradError::ShapeMismatch(vec![
                (self.n, self.slices.len()),
                (d.len(), k),
            ]));
        }
        let slice = &mut self.slices[k];
        for (i, v) in d.iter().enumerate() {
            slice[(i, i)] += v;
        }
        Ok(())
    }

    /// Concatenate the hyperparameters of another `CovGrad` after these
    pub fn concat(&self, other: &Self) -> Result<Self, CovGradError> {
        if other.n == self.n {
            let slices = [self.slices.clone(), other.slices.clone()].concat();
            Ok(Self { n: self.n, slices })
        } else {
            Err(CovGradError::ShapeMismatch(vec![
                (self.n, self.n),
                (other.n, other.n),
            ]))
        }
    }

    /// `[sum_jk w_jk * dK_i_jk]_i`, which equals `tr(w dK_i)` for symmetric
    /// `w` and slices.
    pub fn trace_dot(&self, w: &DMatrix<f64>) -> Result<DVector<f64>, CovGradError> {
        self.check_square(w)?;
        Ok(DVector::from_iterator(
            self.slices.len(),
            self.slices.iter().map(|s| s.dot(w)),
        ))
    }

    /// Check if this is relatively eq to another `CovGrad`
    #[must_use]
    pub fn relative_eq(&self, other: &CovGrad, rel: f64, abs: f64) -> bool {
        self.n == other.n
            && self.slices.len() == other.slices.len()
            && self
                .slices
                .iter()
                .zip(other.slices.iter())
                .all(|(a, b)| a.relative_eq(b, rel, abs))
    }

    /// Create a new `CovGrad` from a sequence of column slices
    pub fn from_column_slices(
        n: usize,
        m: usize,
        slice: &[f64],
    ) -> Result<Self, CovGradError> {
        if n == 0 && slice.is_empty() {
            Ok(Self::zeros(0, m))
        } else if n * n * m == slice.len() {
            let slices = slice
                .chunks_exact(n * n)
                .map(|c| DMatrix::from_column_slice(n, n, c))
                .collect();
            Ok(Self { n, slices })
        } else {
            Err(CovGradError::ImproperSize(n * n * m, slice.len()))
        }
    }

    /// Create a new `CovGrad` from a sequence of row slices
    pub fn from_row_slices(
        n: usize,
        m: usize,
        slice: &[f64],
    ) -> Result<Self, CovGradError> {
        if n == 0 && slice.is_empty() {
            Ok(Self::zeros(0, m))
        } else if n * n * m == slice.len() {
            let slices = slice
                .chunks_exact(n * n)
                .map(|c| DMatrix::from_row_slice(n, n, c))
                .collect();
            Ok(Self { n, slices })
        } else {
            Err(CovGradError::ImproperSize(n * n * m, slice.len()))
        }
    }
}

impl Index<usize> for CovGrad {
    type Output = DMatrix<f64>;

    fn index(&self, k: usize) -> &Self::Output {
        &self.slices[k]
    }
}

impl IndexMut<usize> for CovGrad {
    fn index_mut(&mut self, k: usize) -> &mut Self::Output {
        &mut self.slices[k]
    }
}

impl Index<(usize, usize, usize)> for CovGrad {
    type Output = f64;

    fn index(&self, (i, j, k): (usize, usize, usize)) -> &Self::Output {
        &self.slices[k][(i, j)]
    }
}

impl IndexMut<(usize, usize, usize)> for CovGrad {
    fn index_mut(
        &mut self,
        (i, j, k): (usize, usize, usize),
    ) -> &mut Self::Output {
        &mut self.slices[k][(i, j)]
    }
}

/// Error from constructing a `CovGrad`
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub enum CovGradError {
    /// The shapes of the slices do not match
    ShapeMismatch(Vec<(usize, usize)>),
    /// A `CovGrad` cannot be empty
    Empty,
    /// Improper number of points to construct a `CovGrad`
    ImproperSize(usize, usize),
}

impl std::error::Error for CovGradError {}

impl std::fmt::Display for CovGradError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CovGradError::ShapeMismatch(shapes) => write!(f, "Cannot create Covariance Gradient: Shape Mismatch: Shapes {shapes:?}"),
            CovGradError::Empty => write!(f, "Cannot create an empty CovGrad"),
            CovGradError::ImproperSize(expected, given) => write!(f, "Cannot create Covariance Gradient with given shapes. Given: {given}, Expected: {expected}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_empty_and_ragged() {
        assert_eq!(CovGrad::new(&[]).unwrap_err(), CovGradError::Empty);
        let err = CovGrad::new(&[DMatrix::zeros(2, 2), DMatrix::zeros(3, 3)])
            .unwrap_err();
        assert_eq!(err, CovGradError::ShapeMismatch(vec![(2, 2), (3, 3)]));
    }

    #[test]
    fn concat_allows_empty_sides() {
        let a = CovGrad::zeros(3, 0);
        let b = CovGrad::from_row_slices(
            3,
            1,
            &[1.0, 2.0, 3.0, 2.0, 1.0, 2.0, 3.0, 2.0, 1.0],
        )
        .unwrap();
        let c = a.concat(&b).unwrap().concat(&CovGrad::zeros(3, 2)).unwrap();
        assert_eq!(c.n_parameters(), 3);
        assert_eq!(c[(0, 2, 0)], 3.0);
        assert_eq!(c[2], DMatrix::zeros(3, 3));

        assert!(CovGrad::zeros(2, 1).concat(&b).is_err());
    }

    #[test]
    fn trace_dot_matches_trace_of_product() {
        let g = CovGrad::from_row_slices(
            2,
            2,
            &[1.0, 2.0, 2.0, 3.0, 0.5, 0.0, 0.0, 0.5],
        )
        .unwrap();
        let w = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 2.0]);
        let t = g.trace_dot(&w).unwrap();
        assert::close((&w * &g[0]).trace(), t[0], 1E-12);
        assert::close((&w * &g[1]).trace(), t[1], 1E-12);
        assert::close(t[1], 3.0, 1E-12);
    }

    #[test]
    fn add_diagonal_and_scale() {
        let mut g = CovGrad::zeros(2, 2);
        g.add_diagonal(1, &DVector::from_column_slice(&[1.0, 2.0]))
            .unwrap();
        let g = g.scale(2.0);
        assert_eq!(g[(1, 1, 1)], 4.0);
        assert_eq!(g[(0, 1, 1)], 0.0);
        assert_eq!(g[0], DMatrix::zeros(2, 2));

        let mut g = CovGrad::zeros(2, 1);
        assert!(g
            .add_diagonal(1, &DVector::from_column_slice(&[1.0, 2.0]))
            .is_err());
    }

    #[test]
    fn improper_size() {
        let err = CovGrad::from_column_slices(2, 2, &[0.0; 7]).unwrap_err();
        assert_eq!(err, CovGradError::ImproperSize(8, 7));
    }
}
