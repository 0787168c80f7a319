//! Covariance functions for Gaussian processes
//!
//! Every kernel exposes its hyperparameters on a log scale so that an
//! unconstrained optimizer can move them freely while the natural values stay
//! positive. [`Kernel::covariance_with_gradient`] returns the derivative of
//! the covariance matrix with respect to those log-scale parameters.

use nalgebra::base::constraint::{SameNumberOfColumns, ShapeConstraint};
use nalgebra::base::storage::Storage;
use nalgebra::{DMatrix, DVector, Dim, Matrix};
use std::f64;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

mod covgrad;
pub use covgrad::*;

mod misc;
pub use self::misc::*;

mod ops;
pub use self::ops::*;

mod rbf;
pub use self::rbf::*;
mod scale_kernel;
pub use self::scale_kernel::*;
mod white_kernel;
pub use self::white_kernel::*;

/// Kernel Function
pub trait Kernel: std::fmt::Debug + Clone + PartialEq {
    /// Number of log-scale hyperparameters
    fn n_parameters(&self) -> usize;

    /// Returns the covariance matrix between the rows of `x1` and `x2`
    fn covariance<R1, R2, C1, C2, S1, S2>(
        &self,
        x1: &Matrix<f64, R1, C1, S1>,
        x2: &Matrix<f64, R2, C2, S2>,
    ) -> DMatrix<f64>
    where
        R1: Dim,
        R2: Dim,
        C1: Dim,
        C2: Dim,
        S1: Storage<f64, R1, C1>,
        S2: Storage<f64, R2, C2>,
        ShapeConstraint: SameNumberOfColumns<C1, C2>;

    /// Reports if the given kernel function is stationary.
    fn is_stationary(&self) -> bool;

    /// Returns the diagonal of the kernel(x, x)
    fn diag<R, C, S>(&self, x: &Matrix<f64, R, C, S>) -> DVector<f64>
    where
        R: Dim,
        C: Dim,
        S: Storage<f64, R, C>;

    /// Covariance of the rows of `x` with themselves. Unlike
    /// `covariance(x, x)` this keeps terms that only live on the diagonal,
    /// such as white noise, and matches `covariance_with_gradient`.
    fn gram<R, C, S>(&self, x: &Matrix<f64, R, C, S>) -> DMatrix<f64>
    where
        R: Dim,
        C: Dim,
        S: Storage<f64, R, C>,
    {
        self.covariance(x, x)
    }

    /// Return the corresponding parameter vector
    /// The parameters here are in a log-scale
    fn parameters(&self) -> DVector<f64>;

    /// Named hyperparameters on their natural scale, in parameter order
    fn hyperparameters(&self) -> Vec<(&'static str, f64)>;

    /// Create a new kernel of the same shape from the provided parameters.
    /// The parameters here are in a log-scale
    fn reparameterize(&self, params: &[f64]) -> Result<Self, KernelError>;

    /// Takes a sequence of parameters and consumes only the ones it needs
    /// to create itself.
    fn consume_parameters<'p>(
        &self,
        params: &'p [f64],
    ) -> Result<(Self, &'p [f64]), KernelError> {
        let n = self.n_parameters();
        if params.len() < n {
            Err(KernelError::MissingParameters(n - params.len()))
        } else {
            let (cur, next) = params.split_at(n);
            let kernel = self.reparameterize(cur)?;
            Ok((kernel, next))
        }
    }

    /// Covariance and Gradient with the log-scaled hyper-parameters
    fn covariance_with_gradient<R, C, S>(
        &self,
        x: &Matrix<f64, R, C, S>,
    ) -> Result<(DMatrix<f64>, CovGrad), CovGradError>
    where
        R: Dim,
        C: Dim,
        S: Storage<f64, R, C>;
}

/// Check that exactly one log-scale parameter was given
pub(crate) fn single_parameter(params: &[f64]) -> Result<f64, KernelError> {
    match params {
        [] => Err(KernelError::MissingParameters(1)),
        [value] => Ok(*value),
        _ => Err(KernelError::ExtraneousParameters(params.len() - 1)),
    }
}

/// Errors from Kernel construction
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub enum KernelError {
    /// Parameter Out of Bounds
    ParameterOutOfBounds {
        /// Name of parameter
        name: String,
        /// Value given
        given: f64,
        /// Lower and upper bounds on value
        bounds: (f64, f64),
    },
    /// Too many parameters provided
    ExtraneousParameters(usize),
    /// Too few parameters provided
    MissingParameters(usize),
    /// An error in computing cov-grad
    CovGrad(CovGradError),
}

impl KernelError {
    pub(crate) fn positive(name: &str, given: f64) -> Self {
        Self::ParameterOutOfBounds {
            name: name.to_string(),
            given,
            bounds: (0.0, f64::INFINITY),
        }
    }
}

impl std::error::Error for KernelError {}

impl std::fmt::Display for KernelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ParameterOutOfBounds {
                name,
                given,
                bounds,
            } => write!(
                f,
                "Parameter {} is out of bounds ({}, {}), given: {}",
                name, bounds.0, bounds.1, given
            ),
            Self::ExtraneousParameters(n) => {
                write!(f, "{} extra parameters provided to kernel", n)
            }
            Self::MissingParameters(n) => {
                write!(f, "Missing {} parameters", n)
            }
            Self::CovGrad(e) => {
                write!(f, "Covariance Gradient couldn't be computed: {}", e)
            }
        }
    }
}

impl From<CovGradError> for KernelError {
    fn from(e: CovGradError) -> Self {
        Self::CovGrad(e)
    }
}

macro_rules! impl_mul_add {
    ($type: ty) => {
        impl<B> std::ops::Mul<B> for $type
        where
            B: Kernel,
        {
            type Output = ProductKernel<$type, B>;

            fn mul(self, rhs: B) -> Self::Output {
                ProductKernel::new(self, rhs)
            }
        }

        impl<B> std::ops::Add<B> for $type
        where
            B: Kernel,
        {
            type Output = AddKernel<$type, B>;

            fn add(self, rhs: B) -> Self::Output {
                AddKernel::new(self, rhs)
            }
        }
    };
}

impl_mul_add!(RBFKernel);
impl_mul_add!(WhiteKernel);

impl<K, B> std::ops::Add<B> for ScaleKernel<K>
where
    K: Kernel,
    B: Kernel,
{
    type Output = AddKernel<ScaleKernel<K>, B>;

    fn add(self, rhs: B) -> Self::Output {
        AddKernel::new(self, rhs)
    }
}
