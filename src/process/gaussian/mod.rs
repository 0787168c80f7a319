//! Gaussian Processes

use log::debug;
use nalgebra::linalg::Cholesky;
use nalgebra::{DMatrix, DVector, Dyn};
use once_cell::unsync::OnceCell;

use crate::consts::HALF_LN_2PI;
use crate::misc::psd_safe_cholesky;
use crate::mll::ExactMarginalLogLikelihood;
use crate::process::Parameterized;
use crate::result::{Error, ErrorKind, Result};

pub mod kernel;
pub mod likelihood;
pub mod mean;
mod posterior;

use kernel::{CovGrad, Kernel};
use likelihood::Likelihood;
use mean::MeanFunction;
pub use posterior::Posterior;

/// A Gaussian over a finite set of points together with the derivatives of
/// its mean and covariance with respect to every raw hyperparameter of the
/// model that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct GpOutput {
    mean: DVector<f64>,
    covariance: DMatrix<f64>,
    mean_grad: DMatrix<f64>,
    cov_grad: CovGrad,
}

impl GpOutput {
    /// Create a new output, checking that every piece describes the same
    /// number of points and parameters
    pub fn new(
        mean: DVector<f64>,
        covariance: DMatrix<f64>,
        mean_grad: DMatrix<f64>,
        cov_grad: CovGrad,
    ) -> Result<Self> {
        let n = mean.len();
        let p = cov_grad.n_parameters();
        if covariance.shape() != (n, n)
            || mean_grad.shape() != (n, p)
            || cov_grad.size() != n
        {
            return Err(Error::new(
                ErrorKind::ShapeMismatch,
                &format!(
                    "mean {}, covariance {:?}, mean gradient {:?}, covariance gradient {}x{}x{}",
                    n,
                    covariance.shape(),
                    mean_grad.shape(),
                    cov_grad.size(),
                    cov_grad.size(),
                    p,
                ),
            ));
        }
        Ok(Self {
            mean,
            covariance,
            mean_grad,
            cov_grad,
        })
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    /// Number of raw hyperparameters the gradients are taken against
    pub fn n_parameters(&self) -> usize {
        self.cov_grad.n_parameters()
    }

    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    /// `n x p` Jacobian of the mean
    pub fn mean_grad(&self) -> &DMatrix<f64> {
        &self.mean_grad
    }

    pub fn cov_grad(&self) -> &CovGrad {
        &self.cov_grad
    }
}

#[derive(Clone, Debug)]
struct TrainingFit {
    /// Cholesky Decomposition of K + noise
    chol: Cholesky<f64, Dyn>,
    /// Dual coefficients of training data in kernel space.
    alpha: DVector<f64>,
}

/// Exact Gaussian process regression model.
///
/// Raw parameters are laid out as `[mean | kernel | likelihood]`.
#[derive(Clone, Debug)]
pub struct ExactGp<M, K, L>
where
    M: MeanFunction,
    K: Kernel,
    L: Likelihood,
{
    mean: M,
    kernel: K,
    likelihood: L,
    /// x values used in training, one row per point
    x_train: DMatrix<f64>,
    /// y values used in training
    y_train: DVector<f64>,
    /// Accumulated gradient of the raw parameters
    grad: Option<DVector<f64>>,
    fit: OnceCell<TrainingFit>,
}

impl<M, K, L> ExactGp<M, K, L>
where
    M: MeanFunction,
    K: Kernel,
    L: Likelihood,
{
    /// Build a model over the given training data
    ///
    /// # Arguments
    /// * `mean` - Prior mean function
    /// * `kernel` - Kernel to use to determine covariance
    /// * `likelihood` - Observation noise model
    /// * `x_train` - Inputs, one row per point
    /// * `y_train` - Known values for `f(x)`
    pub fn new(
        mean: M,
        kernel: K,
        likelihood: L,
        x_train: DMatrix<f64>,
        y_train: DVector<f64>,
    ) -> Result<Self> {
        if x_train.nrows() != y_train.len() {
            return Err(Error::new(
                ErrorKind::ShapeMismatch,
                &format!(
                    "x_train has {} rows but y_train has {} entries",
                    x_train.nrows(),
                    y_train.len()
                ),
            ));
        }
        if y_train.is_empty() || x_train.ncols() == 0 {
            return Err(Error::new(
                ErrorKind::InvalidParameter,
                "training data must contain at least one point",
            ));
        }
        if x_train.iter().chain(y_train.iter()).any(|v| !v.is_finite()) {
            return Err(Error::new(
                ErrorKind::InvalidParameter,
                "training data must be finite",
            ));
        }

        Ok(Self {
            mean,
            kernel,
            likelihood,
            x_train,
            y_train,
            grad: None,
            fit: OnceCell::new(),
        })
    }

    pub fn mean(&self) -> &M {
        &self.mean
    }

    /// Return the kernel being used in this GP
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn likelihood(&self) -> &L {
        &self.likelihood
    }

    pub fn x_train(&self) -> &DMatrix<f64> {
        &self.x_train
    }

    pub fn y_train(&self) -> &DVector<f64> {
        &self.y_train
    }

    /// Every hyperparameter on its natural scale, in raw parameter order
    pub fn named_hyperparameters(&self) -> Vec<(&'static str, f64)> {
        let mut hp = self.mean.hyperparameters();
        hp.extend(self.kernel.hyperparameters());
        hp.extend(self.likelihood.hyperparameters());
        hp
    }

    fn check_inputs(&self, x: &DMatrix<f64>) -> Result<()> {
        if x.ncols() == self.x_train.ncols() {
            Ok(())
        } else {
            Err(Error::new(
                ErrorKind::ShapeMismatch,
                &format!(
                    "inputs have {} columns, the model was trained on {}",
                    x.ncols(),
                    self.x_train.ncols()
                ),
            ))
        }
    }

    /// Prior over the latent function at `x`, with derivatives for every raw
    /// parameter. The likelihood's slots in the gradient are zero.
    pub fn forward(&self, x: &DMatrix<f64>) -> Result<GpOutput> {
        self.check_inputs(x)?;
        let n = x.nrows();
        let n_mean = self.mean.n_parameters();
        let n_lik = self.likelihood.n_parameters();

        let (mean, mean_jac) = self.mean.mean_with_gradient(x);
        let (cov, kernel_grad) = self.kernel.covariance_with_gradient(x)?;

        let cov_grad = CovGrad::zeros(n, n_mean)
            .concat(&kernel_grad)?
            .concat(&CovGrad::zeros(n, n_lik))?;

        let mut mean_grad = DMatrix::zeros(n, cov_grad.n_parameters());
        mean_grad.columns_mut(0, n_mean).copy_from(&mean_jac);

        GpOutput::new(mean, cov, mean_grad, cov_grad)
    }

    /// Marginal distribution of the training targets
    pub fn forward_train(&self) -> Result<GpOutput> {
        let prior = self.forward(&self.x_train)?;
        self.likelihood.marginal(prior)
    }

    fn fit(&self) -> Result<&TrainingFit> {
        self.fit.get_or_try_init(|| -> Result<TrainingFit> {
            let n = self.y_train.len();
            let mut k = self.kernel.gram(&self.x_train);
            for (i, v) in self.likelihood.noise(n)?.iter().enumerate() {
                k[(i, i)] += v;
            }
            let chol = psd_safe_cholesky(&k)?;
            let resid = &self.y_train - self.mean.mean(&self.x_train);
            let alpha = chol.solve(&resid);
            debug!("factored {n}x{n} training covariance");
            Ok(TrainingFit { chol, alpha })
        })
    }

    /// Return the log marginal likelihood of the training data
    pub fn ln_m(&self) -> Result<f64> {
        let fit = self.fit()?;
        let resid = &self.y_train - self.mean.mean(&self.x_train);
        let dlog_sum: f64 = fit.chol.l_dirty().diagonal().map(|x| x.ln()).sum();
        let n = self.y_train.len() as f64;
        Ok(-0.5 * resid.dot(&fit.alpha) - dlog_sum - n * HALF_LN_2PI)
    }

    /// Log marginal likelihood and its gradient at other raw parameters,
    /// leaving this model untouched
    pub fn ln_m_with_parameters(
        &self,
        raw: &[f64],
    ) -> Result<(f64, DVector<f64>)> {
        let mut model = self.clone();
        model.set_raw_parameters(raw)?;
        let output = model.forward_train()?;
        ExactMarginalLogLikelihood::unnormalized()
            .evaluate(&output, &model.y_train)
    }

    /// Posterior over the latent function at `xs`
    pub fn posterior(&self, xs: &DMatrix<f64>) -> Result<Posterior> {
        self.check_inputs(xs)?;
        let fit = self.fit()?;

        let k_trans = self.kernel.covariance(xs, &self.x_train);
        let mean = self.mean.mean(xs) + &k_trans * &fit.alpha;

        let v = fit.chol.solve(&k_trans.transpose());
        let cov = self.kernel.gram(xs) - &k_trans * v;
        let cov = (&cov + cov.transpose()) * 0.5;

        Posterior::new(mean, cov)
    }

    /// Posterior predictive distribution of new observations at `xs`.
    ///
    /// Fails for likelihoods that only know the noise at the training
    /// inputs; use [`Posterior::with_added_noise`] on [`Self::posterior`]
    /// with the new points' noise instead.
    pub fn predictive(&self, xs: &DMatrix<f64>) -> Result<Posterior> {
        let noise = self.likelihood.predictive_noise(xs.nrows())?;
        let latent = self.posterior(xs)?;
        latent.with_added_noise(&noise)
    }
}

impl<M, K, L> Parameterized for ExactGp<M, K, L>
where
    M: MeanFunction,
    K: Kernel,
    L: Likelihood,
{
    fn n_parameters(&self) -> usize {
        self.mean.n_parameters()
            + self.kernel.n_parameters()
            + self.likelihood.n_parameters()
    }

    fn raw_parameters(&self) -> DVector<f64> {
        let parts = [
            self.mean.parameters(),
            self.kernel.parameters(),
            self.likelihood.parameters(),
        ];
        DVector::from_iterator(
            self.n_parameters(),
            parts.iter().flat_map(|p| p.iter().copied()),
        )
    }

    fn set_raw_parameters(&mut self, raw: &[f64]) -> Result<()> {
        if raw.len() != self.n_parameters() {
            return Err(Error::new(
                ErrorKind::ShapeMismatch,
                &format!(
                    "expected {} raw parameters, given {}",
                    self.n_parameters(),
                    raw.len()
                ),
            ));
        }
        if raw.iter().any(|v| !v.is_finite()) {
            return Err(Error::new(
                ErrorKind::NumericalDivergence,
                &format!("raw parameters must be finite, given {raw:?}"),
            ));
        }

        let (mean_raw, rest) = raw.split_at(self.mean.n_parameters());
        let (kernel_raw, lik_raw) = rest.split_at(self.kernel.n_parameters());

        // The count is already checked, so a finite raw value can only be
        // rejected once exp() has overflowed or underflowed.
        let diverged = |e: Error| {
            Error::new(
                ErrorKind::NumericalDivergence,
                &format!("raw parameters {raw:?} leave the valid range: {e}"),
            )
        };
        let mean = self.mean.reparameterize(mean_raw).map_err(diverged)?;
        let kernel = self
            .kernel
            .reparameterize(kernel_raw)
            .map_err(|e| diverged(e.into()))?;
        let likelihood =
            self.likelihood.reparameterize(lik_raw).map_err(diverged)?;

        self.mean = mean;
        self.kernel = kernel;
        self.likelihood = likelihood;
        self.fit = OnceCell::new();
        Ok(())
    }

    fn grad(&self) -> Option<&DVector<f64>> {
        self.grad.as_ref()
    }

    fn grad_mut(&mut self) -> &mut Option<DVector<f64>> {
        &mut self.grad
    }
}
