use log::debug;
use nalgebra::DVector;

use super::{
    check_finite, check_len, check_learning_rate, OptimizeError, Optimizer,
};
use crate::process::Parameterized;

/// Parameters for the Adam optimizer
#[derive(Clone, Debug, PartialEq)]
pub struct AdamParams {
    /// Step size
    pub lr: f64,
    /// Decay rate of the first moment estimate
    pub beta1: f64,
    /// Decay rate of the second moment estimate
    pub beta2: f64,
    /// Added to the denominator
    pub eps: f64,
}

impl Default for AdamParams {
    fn default() -> Self {
        Self {
            lr: 1E-3,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1E-8,
        }
    }
}

impl AdamParams {
    pub fn with_lr(self, lr: f64) -> Self {
        Self { lr, ..self }
    }

    pub fn with_betas(self, beta1: f64, beta2: f64) -> Self {
        Self {
            beta1,
            beta2,
            ..self
        }
    }

    pub fn with_eps(self, eps: f64) -> Self {
        Self { eps, ..self }
    }
}

/// Adam: adaptive moment estimation (Kingma & Ba, 2015) with bias
/// correction
#[derive(Clone, Debug, PartialEq)]
pub struct Adam {
    params: AdamParams,
    m: Option<DVector<f64>>,
    v: Option<DVector<f64>>,
    n_steps: usize,
}

impl Adam {
    /// Adam with the default betas and epsilon
    pub fn new(lr: f64) -> Result<Self, OptimizeError> {
        Self::with_params(AdamParams::default().with_lr(lr))
    }

    pub fn with_params(params: AdamParams) -> Result<Self, OptimizeError> {
        check_learning_rate(params.lr)?;
        for (name, beta) in [("beta1", params.beta1), ("beta2", params.beta2)] {
            if !(0.0..1.0).contains(&beta) {
                return Err(OptimizeError::InvalidHyperparameter {
                    name,
                    given: beta,
                });
            }
        }
        if !(params.eps > 0.0 && params.eps.is_finite()) {
            return Err(OptimizeError::InvalidHyperparameter {
                name: "eps",
                given: params.eps,
            });
        }
        Ok(Self {
            params,
            m: None,
            v: None,
            n_steps: 0,
        })
    }

    pub fn params(&self) -> &AdamParams {
        &self.params
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut dyn Parameterized) -> crate::Result<()> {
        let grad = match params.grad() {
            Some(g) => g.clone(),
            None => return Ok(()),
        };
        let t = self.n_steps + 1;
        check_finite(t, &grad)?;
        check_len(&self.m, grad.len())?;

        let AdamParams {
            lr,
            beta1,
            beta2,
            eps,
        } = self.params;

        let g2 = grad.component_mul(&grad);
        let m = match self.m.take() {
            Some(m) => m * beta1 + &grad * (1.0 - beta1),
            None => &grad * (1.0 - beta1),
        };
        let v = match self.v.take() {
            Some(v) => v * beta2 + &g2 * (1.0 - beta2),
            None => g2 * (1.0 - beta2),
        };

        let m_hat = &m / (1.0 - beta1.powi(t as i32));
        let v_hat = &v / (1.0 - beta2.powi(t as i32));
        let delta = m_hat.zip_map(&v_hat, |m, v| lr * m / (v.sqrt() + eps));

        let updated = params.raw_parameters() - &delta;
        check_finite(t, &updated)?;
        debug!("adam: t = {}, delta = {}, params = {}", t, delta, updated);

        params.set_raw_parameters(updated.as_slice())?;
        self.m = Some(m);
        self.v = Some(v);
        self.n_steps = t;
        Ok(())
    }

    fn learning_rate(&self) -> f64 {
        self.params.lr
    }

    fn n_steps(&self) -> usize {
        self.n_steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::tests::Quadratic;

    #[test]
    fn first_step_has_magnitude_lr() {
        // bias correction makes the first step lr * sign(g)
        let mut q = Quadratic::new(&[5.0, -5.0], &[0.0, 0.0]);
        q.backward();
        let mut adam = Adam::new(0.1).unwrap();
        adam.step(&mut q).unwrap();
        assert::close(q.params[0], 4.9, 1E-6);
        assert::close(q.params[1], -4.9, 1E-6);
    }

    #[test]
    fn builder_sets_fields() {
        let params = AdamParams::default()
            .with_lr(0.2)
            .with_betas(0.8, 0.99)
            .with_eps(1E-6);
        let adam = Adam::with_params(params).unwrap();
        assert_eq!(adam.learning_rate(), 0.2);
        assert_eq!(adam.params().beta1, 0.8);
        assert_eq!(adam.params().beta2, 0.99);
        assert_eq!(adam.params().eps, 1E-6);
    }

    #[test]
    fn rejects_bad_settings() {
        assert!(Adam::new(-0.1).is_err());
        let bad_beta = AdamParams::default().with_lr(0.1).with_betas(1.0, 0.9);
        assert!(Adam::with_params(bad_beta).is_err());
        let bad_eps = AdamParams::default().with_lr(0.1).with_eps(0.0);
        assert!(Adam::with_params(bad_eps).is_err());
    }
}
