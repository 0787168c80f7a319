use log::debug;
use nalgebra::DVector;

use super::{
    check_finite, check_len, check_learning_rate, OptimizeError, Optimizer,
};
use crate::process::Parameterized;

/// Stochastic gradient descent with optional heavy-ball momentum
///
/// ```math
///     v \leftarrow \mu v + g, \quad \theta \leftarrow \theta - \eta v
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Sgd {
    lr: f64,
    momentum: f64,
    velocity: Option<DVector<f64>>,
    n_steps: usize,
}

impl Sgd {
    /// Plain gradient descent
    pub fn new(lr: f64) -> Result<Self, OptimizeError> {
        Self::with_momentum(lr, 0.0)
    }

    pub fn with_momentum(lr: f64, momentum: f64) -> Result<Self, OptimizeError> {
        let lr = check_learning_rate(lr)?;
        if !(0.0..1.0).contains(&momentum) {
            return Err(OptimizeError::InvalidHyperparameter {
                name: "momentum",
                given: momentum,
            });
        }
        Ok(Self {
            lr,
            momentum,
            velocity: None,
            n_steps: 0,
        })
    }

    pub fn momentum(&self) -> f64 {
        self.momentum
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, params: &mut dyn Parameterized) -> crate::Result<()> {
        let grad = match params.grad() {
            Some(g) => g.clone(),
            None => return Ok(()),
        };
        let step = self.n_steps + 1;
        check_finite(step, &grad)?;
        check_len(&self.velocity, grad.len())?;

        let velocity = match self.velocity.take() {
            Some(v) if self.momentum > 0.0 => v * self.momentum + &grad,
            _ => grad,
        };

        let updated = params.raw_parameters() - &velocity * self.lr;
        check_finite(step, &updated)?;
        debug!("sgd: step = {}, velocity = {}, params = {}", step, velocity, updated);

        params.set_raw_parameters(updated.as_slice())?;
        self.velocity = Some(velocity);
        self.n_steps = step;
        Ok(())
    }

    fn learning_rate(&self) -> f64 {
        self.lr
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
    fn single_step_moves_against_gradient() {
        let mut q = Quadratic::new(&[2.0, -1.0], &[0.0, 0.0]);
        q.backward();
        let mut sgd = Sgd::new(0.5).unwrap();
        sgd.step(&mut q).unwrap();
        assert_eq!(q.params.as_slice(), &[1.0, -0.5]);
    }

    #[test]
    fn momentum_accumulates_velocity() {
        let mut q = Quadratic::new(&[1.0], &[1.0]);
        let mut sgd = Sgd::with_momentum(1.0, 0.5).unwrap();

        // constant gradient of 1 for two steps: v = 1, then v = 1.5
        q.grad = Some(DVector::from_element(1, 1.0));
        sgd.step(&mut q).unwrap();
        assert::close(q.params[0], 0.0, 1E-12);
        sgd.step(&mut q).unwrap();
        assert::close(q.params[0], -1.5, 1E-12);
    }

    #[test]
    fn rejects_bad_settings() {
        assert!(Sgd::new(0.0).is_err());
        assert!(Sgd::new(f64::INFINITY).is_err());
        assert!(Sgd::with_momentum(0.1, 1.0).is_err());
        assert!(Sgd::with_momentum(0.1, -0.1).is_err());
    }
}
