//! Sums and products of kernels
//!
//! Both combinators lay their log-scale parameters out as `[left | right]`.
use super::{CovGrad, CovGradError, Kernel, KernelError};
use nalgebra::base::constraint::{SameNumberOfColumns, ShapeConstraint};
use nalgebra::base::storage::Storage;
use nalgebra::{DMatrix, DVector, Dim, Matrix};

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// Rebuild the left and right kernels from the front of `params`, returning
/// whatever the pair did not use
fn rebuild_pair<'p, A, B>(
    a: &A,
    b: &B,
    params: &'p [f64],
) -> Result<(A, B, &'p [f64]), KernelError>
where
    A: Kernel,
    B: Kernel,
{
    let (a, rest) = a.consume_parameters(params)?;
    let (b, rest) = b.consume_parameters(rest)?;
    Ok((a, b, rest))
}

fn exactly<T>((kernel, left): (T, &[f64])) -> Result<T, KernelError> {
    if left.is_empty() {
        Ok(kernel)
    } else {
        Err(KernelError::ExtraneousParameters(left.len()))
    }
}

fn pair_parameters<A: Kernel, B: Kernel>(a: &A, b: &B) -> DVector<f64> {
    let (pa, pb) = (a.parameters(), b.parameters());
    DVector::from_iterator(pa.len() + pb.len(), pa.iter().chain(pb.iter()).copied())
}

macro_rules! impl_composite_ops {
    ($name: ident) => {
        impl<A, B, C> std::ops::Add<C> for $name<A, B>
        where
            A: Kernel,
            B: Kernel,
            C: Kernel,
        {
            type Output = AddKernel<Self, C>;

            fn add(self, rhs: C) -> Self::Output {
                AddKernel::new(self, rhs)
            }
        }

        impl<A, B, C> std::ops::Mul<C> for $name<A, B>
        where
            A: Kernel,
            B: Kernel,
            C: Kernel,
        {
            type Output = ProductKernel<Self, C>;

            fn mul(self, rhs: C) -> Self::Output {
                ProductKernel::new(self, rhs)
            }
        }

        impl<A, B> $name<A, B>
        where
            A: Kernel,
            B: Kernel,
        {
            pub fn new(left: A, right: B) -> Self {
                Self { left, right }
            }

            pub fn left(&self) -> &A {
                &self.left
            }

            pub fn right(&self) -> &B {
                &self.right
            }
        }
    };
}

/// `k(x, x') = left(x, x') + right(x, x')`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct AddKernel<A, B>
where
    A: Kernel,
    B: Kernel,
{
    left: A,
    right: B,
}

/// `k(x, x') = left(x, x') * right(x, x')`
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct ProductKernel<A, B>
where
    A: Kernel,
    B: Kernel,
{
    left: A,
    right: B,
}

impl_composite_ops!(AddKernel);
impl_composite_ops!(ProductKernel);

impl<A, B> Kernel for AddKernel<A, B>
where
    A: Kernel,
    B: Kernel,
{
    fn n_parameters(&self) -> usize {
        self.left.n_parameters() + self.right.n_parameters()
    }

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
        ShapeConstraint: SameNumberOfColumns<C1, C2>,
    {
        let mut cov = self.left.covariance(x1, x2);
        cov += self.right.covariance(x1, x2);
        cov
    }

    fn is_stationary(&self) -> bool {
        self.left.is_stationary() && self.right.is_stationary()
    }

    fn diag<R, C, S>(&self, x: &Matrix<f64, R, C, S>) -> DVector<f64>
    where
        R: Dim,
        C: Dim,
        S: Storage<f64, R, C>,
    {
        self.left.diag(x) + self.right.diag(x)
    }

    fn gram<R, C, S>(&self, x: &Matrix<f64, R, C, S>) -> DMatrix<f64>
    where
        R: Dim,
        C: Dim,
        S: Storage<f64, R, C>,
    {
        self.left.gram(x) + self.right.gram(x)
    }

    fn parameters(&self) -> DVector<f64> {
        pair_parameters(&self.left, &self.right)
    }

    fn hyperparameters(&self) -> Vec<(&'static str, f64)> {
        let mut hp = self.left.hyperparameters();
        hp.extend(self.right.hyperparameters());
        hp
    }

    fn reparameterize(&self, params: &[f64]) -> Result<Self, KernelError> {
        exactly(self.consume_parameters(params)?)
    }

    fn consume_parameters<'p>(
        &self,
        params: &'p [f64],
    ) -> Result<(Self, &'p [f64]), KernelError> {
        let (left, right, rest) = rebuild_pair(&self.left, &self.right, params)?;
        Ok((Self::new(left, right), rest))
    }

    fn covariance_with_gradient<R, C, S>(
        &self,
        x: &Matrix<f64, R, C, S>,
    ) -> Result<(DMatrix<f64>, CovGrad), CovGradError>
    where
        R: Dim,
        C: Dim,
        S: Storage<f64, R, C>,
    {
        let (k_left, d_left) = self.left.covariance_with_gradient(x)?;
        let (k_right, d_right) = self.right.covariance_with_gradient(x)?;
        Ok((k_left + k_right, d_left.concat(&d_right)?))
    }
}

impl<A, B> Kernel for ProductKernel<A, B>
where
    A: Kernel,
    B: Kernel,
{
    fn n_parameters(&self) -> usize {
        self.left.n_parameters() + self.right.n_parameters()
    }

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
        ShapeConstraint: SameNumberOfColumns<C1, C2>,
    {
        let mut cov = self.left.covariance(x1, x2);
        cov.component_mul_assign(&self.right.covariance(x1, x2));
        cov
    }

    fn is_stationary(&self) -> bool {
        self.left.is_stationary() && self.right.is_stationary()
    }

    fn diag<R, C, S>(&self, x: &Matrix<f64, R, C, S>) -> DVector<f64>
    where
        R: Dim,
        C: Dim,
        S: Storage<f64, R, C>,
    {
        self.left.diag(x).component_mul(&self.right.diag(x))
    }

    fn gram<R, C, S>(&self, x: &Matrix<f64, R, C, S>) -> DMatrix<f64>
    where
        R: Dim,
        C: Dim,
        S: Storage<f64, R, C>,
    {
        self.left.gram(x).component_mul(&self.right.gram(x))
    }

    fn parameters(&self) -> DVector<f64> {
        pair_parameters(&self.left, &self.right)
    }

    fn hyperparameters(&self) -> Vec<(&'static str, f64)> {
        let mut hp = self.left.hyperparameters();
        hp.extend(self.right.hyperparameters());
        hp
    }

    fn reparameterize(&self, params: &[f64]) -> Result<Self, KernelError> {
        exactly(self.consume_parameters(params)?)
    }

    fn consume_parameters<'p>(
        &self,
        params: &'p [f64],
    ) -> Result<(Self, &'p [f64]), KernelError> {
        let (left, right, rest) = rebuild_pair(&self.left, &self.right, params)?;
        Ok((Self::new(left, right), rest))
    }

    fn covariance_with_gradient<R, C, S>(
        &self,
        x: &Matrix<f64, R, C, S>,
    ) -> Result<(DMatrix<f64>, CovGrad), CovGradError>
    where
        R: Dim,
        C: Dim,
        S: Storage<f64, R, C>,
    {
        let (k_left, d_left) = self.left.covariance_with_gradient(x)?;
        let (k_right, d_right) = self.right.covariance_with_gradient(x)?;

        // product rule: each side's slices are weighted by the other side
        let grad = d_left
            .component_mul(&k_right)?
            .concat(&d_right.component_mul(&k_left)?)?;
        Ok((k_left.component_mul(&k_right), grad))
    }
}
