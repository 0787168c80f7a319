//! Observation noise models

use nalgebra::DVector;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use super::GpOutput;
use crate::result::{Error, ErrorKind, Result};

/// Default lower bound on a learned noise variance
pub const DEFAULT_NOISE_FLOOR: f64 = 1E-4;

/// Maps a latent Gaussian process onto the observations
pub trait Likelihood: std::fmt::Debug + Clone + PartialEq {
    /// Number of raw hyperparameters
    fn n_parameters(&self) -> usize;

    /// Raw parameters
    fn parameters(&self) -> DVector<f64>;

    /// Named hyperparameters on their natural scale
    fn hyperparameters(&self) -> Vec<(&'static str, f64)>;

    /// Same likelihood with new raw parameters
    fn reparameterize(&self, params: &[f64]) -> Result<Self>;

    /// Noise variance for each of `n` observations
    fn noise(&self, n: usize) -> Result<DVector<f64>>;

    /// Derivative of the noise variances with respect to each raw parameter
    fn noise_gradient(&self, n: usize) -> Result<Vec<DVector<f64>>>;

    /// Noise variance of `n` new observations away from the training inputs
    fn predictive_noise(&self, n: usize) -> Result<DVector<f64>> {
        self.noise(n)
    }

    /// Marginal distribution of the observations given the latent `prior`.
    ///
    /// The likelihood's parameters must be the trailing parameters of
    /// `prior`'s gradient.
    fn marginal(&self, prior: GpOutput) -> Result<GpOutput> {
        let n = prior.len();
        let noise = self.noise(n)?;
        let noise_grad = self.noise_gradient(n)?;

        let total = prior.n_parameters();
        let offset = total.checked_sub(noise_grad.len()).ok_or_else(|| {
            Error::new(
                ErrorKind::ShapeMismatch,
                &format!(
                    "prior carries {} parameters, likelihood needs {}",
                    total,
                    noise_grad.len()
                ),
            )
        })?;

        let GpOutput {
            mean,
            mut covariance,
            mean_grad,
            mut cov_grad,
        } = prior;

        for (i, v) in noise.iter().enumerate() {
            covariance[(i, i)] += v;
        }
        for (k, d) in noise_grad.iter().enumerate() {
            cov_grad.add_diagonal(offset + k, d)?;
        }

        Ok(GpOutput {
            mean,
            covariance,
            mean_grad,
            cov_grad,
        })
    }
}

/// Homoskedastic Gaussian noise with a learned variance.
///
/// The variance is kept above `noise_floor`; the raw parameter is
/// `ln(noise - noise_floor)`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct GaussianLikelihood {
    noise: f64,
    noise_floor: f64,
}

impl GaussianLikelihood {
    /// Create a likelihood with the given noise variance and the default
    /// floor
    pub fn new(noise: f64) -> Result<Self> {
        Self::with_floor(noise, DEFAULT_NOISE_FLOOR)
    }

    /// Create a likelihood with the given noise variance and floor
    pub fn with_floor(noise: f64, noise_floor: f64) -> Result<Self> {
        if !(noise_floor >= 0.0 && noise_floor.is_finite()) {
            Err(Error::new(
                ErrorKind::InvalidParameter,
                &format!("noise floor must be non-negative, given {noise_floor}"),
            ))
        } else if !(noise > noise_floor && noise.is_finite()) {
            Err(Error::new(
                ErrorKind::InvalidParameter,
                &format!(
                    "noise must be finite and above the floor {noise_floor}, given {noise}"
                ),
            ))
        } else {
            Ok(Self { noise, noise_floor })
        }
    }

    /// Noise variance
    #[must_use]
    pub fn noise_variance(&self) -> f64 {
        self.noise
    }

    #[must_use]
    pub fn noise_floor(&self) -> f64 {
        self.noise_floor
    }
}

impl Likelihood for GaussianLikelihood {
    fn n_parameters(&self) -> usize {
        1
    }

    fn parameters(&self) -> DVector<f64> {
        DVector::from_element(1, (self.noise - self.noise_floor).ln())
    }

    fn hyperparameters(&self) -> Vec<(&'static str, f64)> {
        vec![("noise", self.noise)]
    }

    fn reparameterize(&self, params: &[f64]) -> Result<Self> {
        match params {
            [raw] => Self::with_floor(self.noise_floor + raw.exp(), self.noise_floor),
            _ => Err(Error::new(
                ErrorKind::InvalidParameter,
                &format!("likelihood takes 1 parameter, given {}", params.len()),
            )),
        }
    }

    fn noise(&self, n: usize) -> Result<DVector<f64>> {
        Ok(DVector::from_element(n, self.noise))
    }

    fn noise_gradient(&self, n: usize) -> Result<Vec<DVector<f64>>> {
        Ok(vec![DVector::from_element(n, self.noise - self.noise_floor)])
    }
}

/// Known, per-observation noise variances. Nothing is learned.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct FixedNoiseGaussianLikelihood {
    noise: DVector<f64>,
}

impl FixedNoiseGaussianLikelihood {
    pub fn new(noise: DVector<f64>) -> Result<Self> {
        if noise.iter().all(|v| *v >= 0.0 && v.is_finite()) {
            Ok(Self { noise })
        } else {
            Err(Error::new(
                ErrorKind::InvalidParameter,
                "per point noise variances must be finite and non-negative",
            ))
        }
    }
}

impl Likelihood for FixedNoiseGaussianLikelihood {
    fn n_parameters(&self) -> usize {
        0
    }

    fn parameters(&self) -> DVector<f64> {
        DVector::zeros(0)
    }

    fn hyperparameters(&self) -> Vec<(&'static str, f64)> {
        Vec::new()
    }

    fn reparameterize(&self, params: &[f64]) -> Result<Self> {
        if params.is_empty() {
            Ok(self.clone())
        } else {
            Err(Error::new(
                ErrorKind::InvalidParameter,
                &format!("fixed noise takes no parameters, given {}", params.len()),
            ))
        }
    }

    fn noise(&self, n: usize) -> Result<DVector<f64>> {
        if n == self.noise.len() {
            Ok(self.noise.clone())
        } else {
            Err(Error::new(
                ErrorKind::ShapeMismatch,
                &format!(
                    "Per point noise must be the same size as the data (expected: {}, got: {})",
                    n,
                    self.noise.len()
                ),
            ))
        }
    }

    fn noise_gradient(&self, _n: usize) -> Result<Vec<DVector<f64>>> {
        Ok(Vec::new())
    }

    fn predictive_noise(&self, n: usize) -> Result<DVector<f64>> {
        Err(Error::new(
            ErrorKind::InvalidParameter,
            &format!(
                "per point noise is only known at the training inputs; \
                 add the noise of the {n} new points to the posterior with \
                 Posterior::with_added_noise"
            ),
        ))
    }
}
