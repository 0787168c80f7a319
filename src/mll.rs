//! Exact marginal log likelihood as a training objective
//!
//! For a marginal `y ~ N(m, K)` with hyperparameters `θ`:
//!
//! ```math
//!     \ln p(y) = -\frac{1}{2} r^T K^{-1} r - \frac{1}{2} \ln |K| - \frac{n}{2} \ln 2\pi,
//!     \quad r = y - m
//! ```
//!
//! and, with `α = K⁻¹ r` (GPML eq. 5.9 plus the mean term),
//!
//! ```math
//!     \frac{\partial \ln p(y)}{\partial \theta_i}
//!         = \frac{1}{2} \mathrm{tr}\left((\alpha \alpha^T - K^{-1}) \frac{\partial K}{\partial \theta_i}\right)
//!         + \alpha^T \frac{\partial m}{\partial \theta_i}
//! ```
use nalgebra::DVector;

use crate::consts::HALF_LN_2PI;
use crate::misc::{outer_product_self, psd_safe_cholesky};
use crate::process::gaussian::GpOutput;
use crate::process::Parameterized;
use crate::result::{Error, ErrorKind, Result};

/// Exact marginal log likelihood of a Gaussian process's training targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExactMarginalLogLikelihood {
    /// Divide the value and gradient by the number of data points
    normalize: bool,
}

impl Default for ExactMarginalLogLikelihood {
    fn default() -> Self {
        Self { normalize: true }
    }
}

impl ExactMarginalLogLikelihood {
    /// Per-datum marginal log likelihood, the usual training objective
    pub fn new() -> Self {
        Self::default()
    }

    /// Total marginal log likelihood, not divided by the number of points
    pub fn unnormalized() -> Self {
        Self { normalize: false }
    }

    pub fn is_normalized(&self) -> bool {
        self.normalize
    }

    /// Value and gradient of the marginal log likelihood of `y` under
    /// `output`, with respect to the raw parameters `output` carries.
    pub fn evaluate(
        &self,
        output: &GpOutput,
        y: &DVector<f64>,
    ) -> Result<(f64, DVector<f64>)> {
        let n = output.len();
        if y.len() != n {
            return Err(Error::new(
                ErrorKind::ShapeMismatch,
                &format!("{} targets for a distribution over {} points", y.len(), n),
            ));
        }
        if n == 0 {
            return Err(Error::new(
                ErrorKind::InvalidParameter,
                "marginal likelihood of zero points",
            ));
        }

        let k_chol = psd_safe_cholesky(output.covariance())?;
        let resid = y - output.mean();
        let alpha = k_chol.solve(&resid);

        let dlog_sum: f64 = k_chol.l_dirty().diagonal().map(|x| x.ln()).sum();
        let n_f = n as f64;
        let ln_m = -0.5 * resid.dot(&alpha) - dlog_sum - n_f * HALF_LN_2PI;

        let aat_kinv = outer_product_self(&alpha) - k_chol.inverse();
        let grad = output.cov_grad().trace_dot(&aat_kinv)? * 0.5
            + output.mean_grad().tr_mul(&alpha);

        if !ln_m.is_finite() || grad.iter().any(|g| !g.is_finite()) {
            return Err(Error::new(
                ErrorKind::NumericalDivergence,
                &format!("marginal log likelihood is not finite ({ln_m})"),
            ));
        }

        if self.normalize {
            Ok((ln_m / n_f, grad / n_f))
        } else {
            Ok((ln_m, grad))
        }
    }

    /// The negated marginal log likelihood as a loss to minimize
    pub fn loss(&self, output: &GpOutput, y: &DVector<f64>) -> Result<Loss> {
        let (value, grad) = self.evaluate(output, y)?;
        Ok(Loss {
            value: -value,
            grad: -grad,
        })
    }
}

/// A scalar loss together with its gradient with respect to the raw
/// parameters of the model that produced it
#[derive(Clone, Debug, PartialEq)]
pub struct Loss {
    value: f64,
    grad: DVector<f64>,
}

impl Loss {
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn grad(&self) -> &DVector<f64> {
        &self.grad
    }

    /// Accumulate this loss's gradient into the parameters' gradient buffer
    pub fn backward<P: Parameterized + ?Sized>(&self, params: &mut P) -> Result<()> {
        params.accumulate_grad(&self.grad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::gaussian::kernel::CovGrad;
    use crate::process::tests::Quadratic;
    use nalgebra::DMatrix;

    /// One point, `y ~ N(0, s)` with `s = exp(θ)`
    fn single_point(s: f64) -> GpOutput {
        GpOutput::new(
            DVector::zeros(1),
            DMatrix::from_element(1, 1, s),
            DMatrix::zeros(1, 1),
            CovGrad::new_unchecked(&[DMatrix::from_element(1, 1, s)]),
        )
        .unwrap()
    }

    #[test]
    fn univariate_gaussian() {
        let mll = ExactMarginalLogLikelihood::unnormalized();
        let y = DVector::from_element(1, 1.5);
        let (value, grad) = mll.evaluate(&single_point(2.0), &y).unwrap();

        let expected = -0.5 * 1.5 * 1.5 / 2.0 - 0.5 * 2.0_f64.ln() - HALF_LN_2PI;
        assert::close(value, expected, 1E-12);
        // d/dθ with s = exp(θ): 0.5 * (y^2 / s - 1)
        assert::close(grad[0], 0.5 * (1.5 * 1.5 / 2.0 - 1.0), 1E-12);
    }

    #[test]
    fn mean_gradient_term() {
        // y ~ N(c, 1), gradient wrt c is (y - c)
        let output = GpOutput::new(
            DVector::from_element(1, 0.25),
            DMatrix::identity(1, 1),
            DMatrix::from_element(1, 1, 1.0),
            CovGrad::zeros(1, 1),
        )
        .unwrap();
        let y = DVector::from_element(1, 1.0);
        let (_, grad) = ExactMarginalLogLikelihood::unnormalized()
            .evaluate(&output, &y)
            .unwrap();
        assert::close(grad[0], 0.75, 1E-12);
    }

    #[test]
    fn normalized_divides_by_n() {
        let output = GpOutput::new(
            DVector::zeros(2),
            DMatrix::identity(2, 2),
            DMatrix::zeros(2, 1),
            CovGrad::new_unchecked(&[DMatrix::identity(2, 2)]),
        )
        .unwrap();
        let y = DVector::from_column_slice(&[1.0, -2.0]);
        let (total, total_grad) = ExactMarginalLogLikelihood::unnormalized()
            .evaluate(&output, &y)
            .unwrap();
        let (per, per_grad) =
            ExactMarginalLogLikelihood::new().evaluate(&output, &y).unwrap();
        assert::close(per * 2.0, total, 1E-12);
        assert::close(per_grad[0] * 2.0, total_grad[0], 1E-12);
    }

    #[test]
    fn loss_is_negated_and_backward_accumulates() {
        let mll = ExactMarginalLogLikelihood::unnormalized();
        let y = DVector::from_element(1, 1.5);
        let output = single_point(2.0);
        let (value, grad) = mll.evaluate(&output, &y).unwrap();
        let loss = mll.loss(&output, &y).unwrap();
        assert_eq!(loss.value(), -value);
        assert_eq!(loss.grad()[0], -grad[0]);

        let mut q = Quadratic::new(&[0.0], &[0.0]);
        loss.backward(&mut q).unwrap();
        loss.backward(&mut q).unwrap();
        assert::close(q.grad.as_ref().unwrap()[0], -2.0 * grad[0], 1E-12);
    }

    #[test]
    fn target_size_mismatch() {
        let y = DVector::zeros(3);
        let err = ExactMarginalLogLikelihood::new()
            .evaluate(&single_point(1.0), &y)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
    }
}
