//! Gradient-descent optimizers over a flat vector of raw parameters

use std::fmt;

use nalgebra::DVector;

use crate::process::Parameterized;

mod adam;
mod sgd;

pub use adam::{Adam, AdamParams};
pub use sgd::Sgd;

#[derive(Clone, Debug, PartialEq)]
pub enum OptimizeError {
    /// A gradient or an updated parameter was NaN or infinite
    NumericalDivergence {
        /// Step on which the divergence was detected
        step: usize,
        /// Offending values
        values: Vec<f64>,
    },
    /// The number of parameters changed between steps
    ShapeMismatch {
        /// Size the optimizer state was built for
        expected: usize,
        /// Size given
        given: usize,
    },
    /// An optimizer setting is out of range
    InvalidHyperparameter {
        name: &'static str,
        given: f64,
    },
}

impl fmt::Display for OptimizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NumericalDivergence { step, values } => write!(
                f,
                "non-finite values at step {step}: {values:?}"
            ),
            Self::ShapeMismatch { expected, given } => write!(
                f,
                "optimizer state holds {expected} parameters, given {given}"
            ),
            Self::InvalidHyperparameter { name, given } => {
                write!(f, "invalid optimizer setting {name} = {given}")
            }
        }
    }
}

impl std::error::Error for OptimizeError {}

/// Updates a [`Parameterized`] from its accumulated gradient.
///
/// A training step is `zero_grad`, a loss's backward pass, then `step`.
pub trait Optimizer {
    /// Clear the parameters' gradient buffer
    fn zero_grad(&self, params: &mut dyn Parameterized) {
        params.zero_grad();
    }

    /// Move the parameters against their accumulated gradient. Does nothing
    /// if no gradient has been accumulated.
    fn step(&mut self, params: &mut dyn Parameterized) -> crate::Result<()>;

    fn learning_rate(&self) -> f64;

    /// Number of steps taken that changed the parameters
    fn n_steps(&self) -> usize;
}

pub(crate) fn check_learning_rate(lr: f64) -> Result<f64, OptimizeError> {
    if lr > 0.0 && lr.is_finite() {
        Ok(lr)
    } else {
        Err(OptimizeError::InvalidHyperparameter {
            name: "lr",
            given: lr,
        })
    }
}

/// Error if any value in `xs` is not finite
pub(crate) fn check_finite(
    step: usize,
    xs: &DVector<f64>,
) -> Result<(), OptimizeError> {
    if xs.iter().all(|x| x.is_finite()) {
        Ok(())
    } else {
        Err(OptimizeError::NumericalDivergence {
            step,
            values: xs.iter().copied().collect(),
        })
    }
}

/// Error unless an optimizer buffer and the parameters agree in length
pub(crate) fn check_len(
    buffer: &Option<DVector<f64>>,
    given: usize,
) -> Result<(), OptimizeError> {
    match buffer {
        Some(b) if b.len() != given => Err(OptimizeError::ShapeMismatch {
            expected: b.len(),
            given,
        }),
        _ => Ok(()),
    }
}
