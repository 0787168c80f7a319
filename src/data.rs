//! Synthetic training data
use std::f64::consts::PI;

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

use crate::misc::{as_column, linspace};
use crate::result::{Error, ErrorKind, Result};

/// Settings for [`noisy_sine`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SineConfig {
    /// Number of training points
    pub n_points: usize,
    pub x_min: f64,
    pub x_max: f64,
    /// Standard deviation of the additive Gaussian noise
    pub noise_std: f64,
}

impl Default for SineConfig {
    fn default() -> Self {
        Self {
            n_points: 15,
            x_min: 0.0,
            x_max: 1.0,
            noise_std: 0.2,
        }
    }
}

impl SineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_points == 0 {
            Err(Error::new(
                ErrorKind::InvalidConfig,
                "need at least one training point",
            ))
        } else if !(self.x_min.is_finite() && self.x_max.is_finite())
            || self.x_min >= self.x_max
        {
            Err(Error::new(
                ErrorKind::InvalidConfig,
                &format!(
                    "x range must be finite with x_min < x_max, given [{}, {}]",
                    self.x_min, self.x_max
                ),
            ))
        } else if !(self.noise_std >= 0.0 && self.noise_std.is_finite()) {
            Err(Error::new(
                ErrorKind::InvalidConfig,
                &format!(
                    "noise_std must be finite and non-negative, given {}",
                    self.noise_std
                ),
            ))
        } else {
            Ok(())
        }
    }
}

/// Training inputs and targets
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    /// Inputs, one row per point
    pub x: DMatrix<f64>,
    pub y: DVector<f64>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// Inputs of a one-dimensional dataset as a flat vector
    pub fn x_values(&self) -> DVector<f64> {
        self.x.column(0).into_owned()
    }
}

/// `y = sin(2πx) + ε`, `ε ~ N(0, noise_std²)` at `n_points` evenly spaced
/// inputs spanning `[x_min, x_max]`
pub fn noisy_sine<R: Rng>(config: &SineConfig, rng: &mut R) -> Result<Dataset> {
    config.validate()?;
    let x = linspace(config.x_min, config.x_max, config.n_points);

    let y = if config.noise_std > 0.0 {
        let noise = Normal::new(0.0, config.noise_std).map_err(|err| {
            Error::new(ErrorKind::InvalidParameter, &err.to_string())
        })?;
        x.map(|xi| (2.0 * PI * xi).sin() + rng.sample(noise))
    } else {
        x.map(|xi| (2.0 * PI * xi).sin())
    };

    Ok(Dataset {
        x: as_column(&x),
        y,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn default_layout() {
        let mut rng = SmallRng::seed_from_u64(0);
        let data = noisy_sine(&SineConfig::default(), &mut rng).unwrap();
        assert_eq!(data.len(), 15);
        assert_eq!(data.x.shape(), (15, 1));
        assert_eq!(data.x[(0, 0)], 0.0);
        assert_eq!(data.x[(14, 0)], 1.0);
        assert::close(data.x[(1, 0)], 1.0 / 14.0, 1E-12);
    }

    #[test]
    fn noiseless_is_exact_sine() {
        let config = SineConfig {
            noise_std: 0.0,
            n_points: 5,
            ..Default::default()
        };
        let data = noisy_sine(&config, &mut SmallRng::seed_from_u64(1)).unwrap();
        let expected = [0.0, 1.0, 0.0, -1.0, 0.0];
        for (y, e) in data.y.iter().zip(expected.iter()) {
            assert::close(*y, *e, 1E-12);
        }
    }

    #[test]
    fn seeded_draws_repeat() {
        let config = SineConfig::default();
        let a = noisy_sine(&config, &mut SmallRng::seed_from_u64(7)).unwrap();
        let b = noisy_sine(&config, &mut SmallRng::seed_from_u64(7)).unwrap();
        let c = noisy_sine(&config, &mut SmallRng::seed_from_u64(8)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.y, c.y);
    }

    #[test]
    fn noise_has_roughly_the_right_scale() {
        let config = SineConfig {
            n_points: 4000,
            ..Default::default()
        };
        let data = noisy_sine(&config, &mut SmallRng::seed_from_u64(3)).unwrap();
        let resid: Vec<f64> = data
            .x_values()
            .iter()
            .zip(data.y.iter())
            .map(|(x, y)| y - (2.0 * PI * x).sin())
            .collect();
        let var = resid.iter().map(|r| r * r).sum::<f64>() / resid.len() as f64;
        assert::close(var.sqrt(), 0.2, 0.02);
    }

    #[test]
    fn invalid_configs() {
        let mut rng = SmallRng::seed_from_u64(0);
        for config in [
            SineConfig {
                n_points: 0,
                ..Default::default()
            },
            SineConfig {
                x_min: 1.0,
                x_max: 0.0,
                ..Default::default()
            },
            SineConfig {
                noise_std: -0.1,
                ..Default::default()
            },
            SineConfig {
                noise_std: f64::NAN,
                ..Default::default()
            },
        ] {
            let err = noisy_sine(&config, &mut rng).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        }
    }
}
