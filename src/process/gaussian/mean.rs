//! Prior mean functions

use nalgebra::{DMatrix, DVector};

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use crate::result::{Error, ErrorKind, Result};

/// Prior mean of a Gaussian process
pub trait MeanFunction: std::fmt::Debug + Clone + PartialEq {
    /// Number of raw hyperparameters
    fn n_parameters(&self) -> usize;

    /// Mean at each row of `x`
    fn mean(&self, x: &DMatrix<f64>) -> DVector<f64>;

    /// Mean at each row of `x` and its `n x p` Jacobian with respect to the
    /// raw parameters
    fn mean_with_gradient(&self, x: &DMatrix<f64>) -> (DVector<f64>, DMatrix<f64>);

    /// Raw parameters
    fn parameters(&self) -> DVector<f64>;

    /// Named hyperparameters on their natural scale
    fn hyperparameters(&self) -> Vec<(&'static str, f64)>;

    /// Same mean function with new raw parameters
    fn reparameterize(&self, params: &[f64]) -> Result<Self>;
}

fn check_count(expected: usize, params: &[f64]) -> Result<()> {
    if params.len() == expected {
        Ok(())
    } else {
        Err(Error::new(
            ErrorKind::InvalidParameter,
            &format!(
                "mean function takes {} parameters, given {}",
                expected,
                params.len()
            ),
        ))
    }
}

/// The zero function
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct ZeroMean;

impl MeanFunction for ZeroMean {
    fn n_parameters(&self) -> usize {
        0
    }

    fn mean(&self, x: &DMatrix<f64>) -> DVector<f64> {
        DVector::zeros(x.nrows())
    }

    fn mean_with_gradient(&self, x: &DMatrix<f64>) -> (DVector<f64>, DMatrix<f64>) {
        (self.mean(x), DMatrix::zeros(x.nrows(), 0))
    }

    fn parameters(&self) -> DVector<f64> {
        DVector::zeros(0)
    }

    fn hyperparameters(&self) -> Vec<(&'static str, f64)> {
        Vec::new()
    }

    fn reparameterize(&self, params: &[f64]) -> Result<Self> {
        check_count(0, params).map(|_| ZeroMean)
    }
}

/// A learned constant. The raw parameter is the constant itself since it is
/// unconstrained.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct ConstantMean {
    constant: f64,
}

impl ConstantMean {
    pub fn new(constant: f64) -> Result<Self> {
        if constant.is_finite() {
            Ok(Self { constant })
        } else {
            Err(Error::new(
                ErrorKind::InvalidParameter,
                &format!("mean constant must be finite, given {constant}"),
            ))
        }
    }

    #[must_use]
    pub fn constant(&self) -> f64 {
        self.constant
    }
}

impl MeanFunction for ConstantMean {
    fn n_parameters(&self) -> usize {
        1
    }

    fn mean(&self, x: &DMatrix<f64>) -> DVector<f64> {
        DVector::from_element(x.nrows(), self.constant)
    }

    fn mean_with_gradient(&self, x: &DMatrix<f64>) -> (DVector<f64>, DMatrix<f64>) {
        (self.mean(x), DMatrix::from_element(x.nrows(), 1, 1.0))
    }

    fn parameters(&self) -> DVector<f64> {
        DVector::from_element(1, self.constant)
    }

    fn hyperparameters(&self) -> Vec<(&'static str, f64)> {
        vec![("mean_constant", self.constant)]
    }

    fn reparameterize(&self, params: &[f64]) -> Result<Self> {
        check_count(1, params)?;
        Self::new(params[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_mean_has_no_parameters() {
        let x = DMatrix::from_column_slice(3, 1, &[0.0, 1.0, 2.0]);
        let (m, j) = ZeroMean.mean_with_gradient(&x);
        assert_eq!(m, DVector::zeros(3));
        assert_eq!(j.shape(), (3, 0));
        assert!(ZeroMean.reparameterize(&[1.0]).is_err());
        assert_eq!(ZeroMean.reparameterize(&[]).unwrap(), ZeroMean);
    }

    #[test]
    fn constant_mean_jacobian_is_ones() {
        let x = DMatrix::from_column_slice(2, 1, &[0.0, 1.0]);
        let mean = ConstantMean::new(-0.5).unwrap();
        let (m, j) = mean.mean_with_gradient(&x);
        assert_eq!(m, DVector::from_element(2, -0.5));
        assert_eq!(j, DMatrix::from_element(2, 1, 1.0));

        let moved = mean.reparameterize(&[2.0]).unwrap();
        assert_eq!(moved.constant(), 2.0);
        assert_eq!(moved.hyperparameters(), vec![("mean_constant", 2.0)]);
        assert!(ConstantMean::new(f64::INFINITY).is_err());
    }
}
