//! Run configuration for the sine fitting pipeline
use std::path::{Path, PathBuf};

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::consts::SOFTPLUS_ZERO;
use crate::data::{Dataset, SineConfig};
use crate::misc::{as_column, linspace};
use crate::optim::{Adam, AdamParams, Optimizer, Sgd};
use crate::process::gaussian::kernel::{RBFKernel, ScaleKernel};
use crate::process::gaussian::likelihood::{
    GaussianLikelihood, DEFAULT_NOISE_FLOOR,
};
use crate::process::gaussian::mean::ConstantMean;
use crate::process::gaussian::ExactGp;
use crate::result::{Error, ErrorKind, Result};
use crate::train::DEFAULT_REPORTED;

/// The model fit by the pipeline: constant mean, scaled RBF kernel and
/// learned Gaussian noise
pub type SineModel =
    ExactGp<ConstantMean, ScaleKernel<RBFKernel>, GaussianLikelihood>;

fn invalid(msg: &str) -> Error {
    Error::new(ErrorKind::InvalidConfig, msg)
}

/// Everything needed to run the pipeline end to end
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FitConfig {
    /// Seed for the data noise
    pub seed: u64,
    pub data: SineConfig,
    pub model: ModelConfig,
    pub training: TrainingConfig,
    pub prediction: PredictionConfig,
    pub output: OutputConfig,
}

impl FitConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        self.data.validate()?;
        self.model.validate()?;
        self.training.validate()?;
        self.prediction.validate()
    }
}

/// Initial hyperparameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    pub mean_constant: f64,
    pub outputscale: f64,
    pub lengthscale: f64,
    /// Observation noise variance
    pub noise: f64,
    /// Lower bound on the learned noise variance
    pub noise_floor: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            mean_constant: 0.0,
            outputscale: SOFTPLUS_ZERO,
            lengthscale: SOFTPLUS_ZERO,
            noise: SOFTPLUS_ZERO,
            noise_floor: DEFAULT_NOISE_FLOOR,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("outputscale", self.outputscale),
            ("lengthscale", self.lengthscale),
        ];
        for (name, value) in positive {
            if !(value > 0.0 && value.is_finite()) {
                return Err(invalid(&format!(
                    "initial {name} must be positive and finite, given {value}"
                )));
            }
        }
        if !self.mean_constant.is_finite() {
            return Err(invalid("initial mean constant must be finite"));
        }
        if !(self.noise_floor >= 0.0 && self.noise > self.noise_floor) {
            return Err(invalid(&format!(
                "initial noise {} must exceed the noise floor {}",
                self.noise, self.noise_floor
            )));
        }
        Ok(())
    }

    /// Build the model over a training set
    pub fn build(&self, data: &Dataset) -> Result<SineModel> {
        self.validate()?;
        let kernel = ScaleKernel::new(
            self.outputscale,
            RBFKernel::new(self.lengthscale)?,
        )?;
        ExactGp::new(
            ConstantMean::new(self.mean_constant)?,
            kernel,
            GaussianLikelihood::with_floor(self.noise, self.noise_floor)?,
            data.x.clone(),
            data.y.clone(),
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingConfig {
    /// Number of gradient steps
    pub n_iter: usize,
    pub optimizer: OptimizerConfig,
    /// Divide the marginal log likelihood by the number of points
    pub normalize_loss: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            n_iter: 100,
            optimizer: OptimizerConfig::default(),
            normalize_loss: true,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_iter == 0 {
            return Err(invalid("n_iter must be at least 1"));
        }
        self.optimizer.build().map(|_| ())
    }
}

fn default_lr() -> f64 {
    0.1
}

fn default_beta1() -> f64 {
    AdamParams::default().beta1
}

fn default_beta2() -> f64 {
    AdamParams::default().beta2
}

fn default_eps() -> f64 {
    AdamParams::default().eps
}

/// Which optimizer to use, tagged by `kind`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptimizerConfig {
    Sgd {
        #[serde(default = "default_lr")]
        lr: f64,
        #[serde(default)]
        momentum: f64,
    },
    Adam {
        #[serde(default = "default_lr")]
        lr: f64,
        #[serde(default = "default_beta1")]
        beta1: f64,
        #[serde(default = "default_beta2")]
        beta2: f64,
        #[serde(default = "default_eps")]
        eps: f64,
    },
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::Adam {
            lr: default_lr(),
            beta1: default_beta1(),
            beta2: default_beta2(),
            eps: default_eps(),
        }
    }
}

impl OptimizerConfig {
    pub fn build(&self) -> Result<Box<dyn Optimizer>> {
        let optimizer: Box<dyn Optimizer> = match *self {
            Self::Sgd { lr, momentum } => {
                Box::new(Sgd::with_momentum(lr, momentum)?)
            }
            Self::Adam {
                lr,
                beta1,
                beta2,
                eps,
            } => Box::new(Adam::with_params(AdamParams {
                lr,
                beta1,
                beta2,
                eps,
            })?),
        };
        Ok(optimizer)
    }
}

/// Where the posterior is evaluated after training
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PredictionConfig {
    pub n_points: usize,
    pub x_min: f64,
    pub x_max: f64,
    /// Plot the predictive distribution of new observations instead of the
    /// latent function
    pub include_noise: bool,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            n_points: 51,
            x_min: 0.0,
            x_max: 1.0,
            include_noise: false,
        }
    }
}

impl PredictionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_points == 0 {
            Err(invalid("need at least one prediction point"))
        } else if !(self.x_min.is_finite() && self.x_max.is_finite())
            || self.x_min > self.x_max
        {
            Err(invalid(&format!(
                "invalid prediction range [{}, {}]",
                self.x_min, self.x_max
            )))
        } else {
            Ok(())
        }
    }

    /// Prediction inputs, one row per point
    pub fn inputs(&self) -> DMatrix<f64> {
        as_column(&linspace(self.x_min, self.x_max, self.n_points))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub plot_path: PathBuf,
    /// Hyperparameters printed on each iteration line
    pub report: Vec<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            plot_path: PathBuf::from("gp_posterior.svg"),
            report: DEFAULT_REPORTED.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn empty_yaml_is_default() {
        let config = FitConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, FitConfig::default());
        assert_eq!(config.training.n_iter, 100);
        assert_eq!(config.data.n_points, 15);
        assert_eq!(config.prediction.n_points, 51);
        assert_eq!(config.output.plot_path, PathBuf::from("gp_posterior.svg"));
        assert_eq!(config.training.optimizer.build().unwrap().learning_rate(), 0.1);
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let config = FitConfig::from_yaml_str(indoc! {"
            seed: 42
            data:
              noise_std: 0.1
            training:
              n_iter: 25
              optimizer:
                kind: sgd
                lr: 0.05
                momentum: 0.9
        "})
        .unwrap();

        assert_eq!(config.seed, 42);
        assert_eq!(config.data.noise_std, 0.1);
        assert_eq!(config.data.n_points, 15);
        assert_eq!(config.training.n_iter, 25);
        assert_eq!(
            config.training.optimizer,
            OptimizerConfig::Sgd {
                lr: 0.05,
                momentum: 0.9
            }
        );
        assert!(config.training.normalize_loss);
    }

    #[test]
    fn adam_fields_default_individually() {
        let config = FitConfig::from_yaml_str(indoc! {"
            training:
              optimizer:
                kind: adam
                lr: 0.01
        "})
        .unwrap();
        match config.training.optimizer {
            OptimizerConfig::Adam { lr, beta1, beta2, .. } => {
                assert_eq!(lr, 0.01);
                assert_eq!(beta1, 0.9);
                assert_eq!(beta2, 0.999);
            }
            other => panic!("expected adam, got {other:?}"),
        }
    }

    #[test]
    fn rejects_invalid_values() {
        let cases = [
            "training:\n  n_iter: 0\n",
            "prediction:\n  n_points: 0\n",
            "model:\n  lengthscale: -1.0\n",
            "model:\n  noise: 0.00001\n",
            "training:\n  optimizer:\n    kind: adam\n    lr: 0.0\n",
            "data:\n  x_min: 2.0\n",
        ];
        for yaml in cases {
            let err = FitConfig::from_yaml_str(yaml).unwrap_err();
            assert!(
                matches!(
                    err.kind(),
                    ErrorKind::InvalidConfig | ErrorKind::InvalidParameter
                ),
                "{yaml}: {err}"
            );
        }
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = FitConfig::from_yaml_str("trainig:\n  n_iter: 3\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);

        let err = FitConfig::from_yaml_str(indoc! {"
            training:
              optimizer:
                kind: lbfgs
        "})
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn model_config_builds_the_model() {
        use crate::data::noisy_sine;
        use crate::process::Parameterized;
        use rand::rngs::SmallRng;
        use rand::SeedableRng;

        let data = noisy_sine(
            &SineConfig::default(),
            &mut SmallRng::seed_from_u64(0),
        )
        .unwrap();
        let gp = ModelConfig::default().build(&data).unwrap();
        assert_eq!(gp.n_parameters(), 4);
        assert::close(gp.kernel().base().lengthscale(), SOFTPLUS_ZERO, 1E-12);
        assert::close(gp.likelihood().noise_variance(), SOFTPLUS_ZERO, 1E-12);
    }

    #[test]
    fn prediction_inputs_span_the_range() {
        let x = PredictionConfig::default().inputs();
        assert_eq!(x.shape(), (51, 1));
        assert_eq!(x[(0, 0)], 0.0);
        assert_eq!(x[(50, 0)], 1.0);
    }

    #[test]
    fn json_round_trip_of_optimizer_tag() {
        let json = serde_json::to_string(&OptimizerConfig::Sgd {
            lr: 0.5,
            momentum: 0.0,
        })
        .unwrap();
        assert_eq!(json, r#"{"kind":"sgd","lr":0.5,"momentum":0.0}"#);
    }
}
