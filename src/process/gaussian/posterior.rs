use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::misc::psd_safe_cholesky;
use crate::result::{Error, ErrorKind, Result};

/// Multivariate Gaussian over a finite set of prediction points
#[derive(Clone, Debug, PartialEq)]
pub struct Posterior {
    mean: DVector<f64>,
    covariance: DMatrix<f64>,
}

impl Posterior {
    pub fn new(mean: DVector<f64>, covariance: DMatrix<f64>) -> Result<Self> {
        let n = mean.len();
        if covariance.shape() == (n, n) {
            Ok(Self { mean, covariance })
        } else {
            Err(Error::new(
                ErrorKind::ShapeMismatch,
                &format!(
                    "mean has {} entries but covariance is {:?}",
                    n,
                    covariance.shape()
                ),
            ))
        }
    }

    /// Return the mean of the posterior
    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    /// Return the covariance of the posterior
    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    /// Marginal variances. Round-off can leave tiny negative values on the
    /// diagonal; those are clamped to zero.
    pub fn variance(&self) -> DVector<f64> {
        self.covariance.diagonal().map(|v| v.max(0.0))
    }

    /// Return the standard deviation of posterior.
    pub fn std(&self) -> DVector<f64> {
        self.variance().map(f64::sqrt)
    }

    /// `(lower, upper)` two standard deviations either side of the mean
    pub fn confidence_region(&self) -> (DVector<f64>, DVector<f64>) {
        let two_std = self.std() * 2.0;
        (&self.mean - &two_std, &self.mean + &two_std)
    }

    /// Same distribution with independent noise variances added
    pub fn with_added_noise(&self, noise: &DVector<f64>) -> Result<Self> {
        if noise.len() != self.mean.len() {
            return Err(Error::new(
                ErrorKind::ShapeMismatch,
                &format!(
                    "noise has {} entries, expected {}",
                    noise.len(),
                    self.mean.len()
                ),
            ));
        }
        let mut covariance = self.covariance.clone();
        for (i, v) in noise.iter().enumerate() {
            covariance[(i, i)] += v;
        }
        Ok(Self {
            mean: self.mean.clone(),
            covariance,
        })
    }

    /// Draw a single function sample at the prediction points
    pub fn draw<R: Rng>(&self, rng: &mut R) -> Result<DVector<f64>> {
        let chol = psd_safe_cholesky(&self.covariance)?;
        Ok(self.draw_with(&chol.l(), rng))
    }

    /// Return a number of samples from the posterior
    pub fn sample<R: Rng>(
        &self,
        size: usize,
        rng: &mut R,
    ) -> Result<Vec<DVector<f64>>> {
        let chol = psd_safe_cholesky(&self.covariance)?;
        let l = chol.l();
        Ok((0..size).map(|_| self.draw_with(&l, &mut *rng)).collect())
    }

    fn draw_with<R: Rng>(&self, l: &DMatrix<f64>, rng: &mut R) -> DVector<f64> {
        let z: DVector<f64> =
            DVector::from_fn(self.mean.len(), |_, _| rng.sample(StandardNormal));
        &self.mean + l * z
    }
}
