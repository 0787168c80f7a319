use nalgebra::DVector;

use crate::result::{Error, ErrorKind, Result};

pub mod gaussian;

#[cfg(feature = "mle")]
mod mle;
#[cfg(feature = "mle")]
pub use mle::*;

/// Something with a flat vector of unconstrained ("raw") hyperparameters and
/// a gradient buffer for them.
///
/// The buffer follows the zero / accumulate / consume cycle of a training
/// step: [`Parameterized::zero_grad`] clears it, a loss's backward pass
/// accumulates into it, and an optimizer step reads it.
pub trait Parameterized {
    /// Length of the raw parameter vector
    fn n_parameters(&self) -> usize;

    /// The raw parameter vector
    fn raw_parameters(&self) -> DVector<f64>;

    /// Replace every hyperparameter from a raw parameter vector
    fn set_raw_parameters(&mut self, raw: &[f64]) -> Result<()>;

    /// The accumulated gradient, if any
    fn grad(&self) -> Option<&DVector<f64>>;

    /// Mutable access to the gradient buffer
    fn grad_mut(&mut self) -> &mut Option<DVector<f64>>;

    /// Clear the gradient buffer
    fn zero_grad(&mut self) {
        *self.grad_mut() = None;
    }

    /// Add `g` to the gradient buffer
    fn accumulate_grad(&mut self, g: &DVector<f64>) -> Result<()> {
        let n = self.n_parameters();
        if g.len() != n {
            return Err(Error::new(
                ErrorKind::ShapeMismatch,
                &format!("gradient has {} entries, expected {}", g.len(), n),
            ));
        }

        let slot = self.grad_mut();
        let updated = match slot.take() {
            Some(acc) => acc + g,
            None => g.clone(),
        };
        *slot = Some(updated);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// `f(p) = 0.5 |p - target|^2`
    #[derive(Clone, Debug)]
    pub(crate) struct Quadratic {
        pub params: DVector<f64>,
        pub target: DVector<f64>,
        pub grad: Option<DVector<f64>>,
    }

    impl Quadratic {
        pub(crate) fn new(start: &[f64], target: &[f64]) -> Self {
            Self {
                params: DVector::from_column_slice(start),
                target: DVector::from_column_slice(target),
                grad: None,
            }
        }

        pub(crate) fn loss(&self) -> f64 {
            0.5 * (&self.params - &self.target).norm_squared()
        }

        pub(crate) fn backward(&mut self) {
            let g = &self.params - &self.target;
            self.accumulate_grad(&g).unwrap();
        }
    }

    impl Parameterized for Quadratic {
        fn n_parameters(&self) -> usize {
            self.params.len()
        }

        fn raw_parameters(&self) -> DVector<f64> {
            self.params.clone()
        }

        fn set_raw_parameters(&mut self, raw: &[f64]) -> Result<()> {
            self.params = DVector::from_column_slice(raw);
            Ok(())
        }

        fn grad(&self) -> Option<&DVector<f64>> {
            self.grad.as_ref()
        }

        fn grad_mut(&mut self) -> &mut Option<DVector<f64>> {
            &mut self.grad
        }
    }

    #[test]
    fn gradients_accumulate_until_zeroed() {
        let mut q = Quadratic::new(&[1.0, 2.0], &[0.0, 0.0]);
        assert!(q.grad().is_none());

        q.backward();
        q.backward();
        assert_eq!(q.grad().unwrap().as_slice(), &[2.0, 4.0]);

        q.zero_grad();
        assert!(q.grad().is_none());
    }

    #[test]
    fn accumulate_rejects_wrong_length() {
        let mut q = Quadratic::new(&[1.0, 2.0], &[0.0, 0.0]);
        let err = q
            .accumulate_grad(&DVector::from_column_slice(&[1.0]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
        assert!(q.grad().is_none());
    }
}
