//! Maximum likelihood fit with a library optimizer (feature `mle`)
use argmin::core::{CostFunction, Error as ArgminError, Executor, Gradient, State};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use log::info;
use nalgebra::DVector;

use super::gaussian::kernel::Kernel;
use super::gaussian::likelihood::Likelihood;
use super::gaussian::mean::MeanFunction;
use super::gaussian::ExactGp;
use super::Parameterized;

/// Number of correction pairs kept by L-BFGS
const LBFGS_MEMORY: usize = 7;

/// Negative log marginal likelihood as an argmin problem
struct NegLnM<'a, M, K, L>
where
    M: MeanFunction,
    K: Kernel,
    L: Likelihood,
{
    model: &'a ExactGp<M, K, L>,
}

impl<M, K, L> CostFunction for NegLnM<'_, M, K, L>
where
    M: MeanFunction,
    K: Kernel,
    L: Likelihood,
{
    type Param = DVector<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, ArgminError> {
        let (ln_m, _) = self.model.ln_m_with_parameters(param.as_slice())?;
        Ok(-ln_m)
    }
}

impl<M, K, L> Gradient for NegLnM<'_, M, K, L>
where
    M: MeanFunction,
    K: Kernel,
    L: Likelihood,
{
    type Param = DVector<f64>;
    type Gradient = DVector<f64>;

    fn gradient(
        &self,
        param: &Self::Param,
    ) -> Result<Self::Gradient, ArgminError> {
        let (_, grad) = self.model.ln_m_with_parameters(param.as_slice())?;
        Ok(-grad)
    }
}

impl<M, K, L> ExactGp<M, K, L>
where
    M: MeanFunction,
    K: Kernel,
    L: Likelihood,
{
    /// Maximize the log marginal likelihood with L-BFGS and a More-Thuente
    /// line search, starting from the current hyperparameters
    pub fn optimize_mle(mut self, max_iters: u64) -> Result<Self, ArgminError> {
        let init = self.raw_parameters();
        let linesearch = MoreThuenteLineSearch::new();
        let solver = LBFGS::new(linesearch, LBFGS_MEMORY);

        let best = {
            let problem = NegLnM { model: &self };
            let res = Executor::new(problem, solver)
                .configure(|state| state.param(init).max_iters(max_iters))
                .run()?;
            info!(
                "L-BFGS stopped after {} iterations: {:?}",
                res.state().get_iter(),
                res.state().get_termination_status()
            );
            res.state().get_best_param().cloned()
        };

        if let Some(best) = best {
            self.set_raw_parameters(best.as_slice())?;
        }
        self.zero_grad();
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ModelConfig;
    use crate::data::{noisy_sine, SineConfig};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn lbfgs_increases_the_marginal_likelihood() {
        let mut rng = SmallRng::seed_from_u64(11);
        let data = noisy_sine(&SineConfig::default(), &mut rng).unwrap();
        let gp = ModelConfig::default().build(&data).unwrap();
        let before = gp.ln_m().unwrap();

        let fitted = gp.optimize_mle(50).unwrap();
        let after = fitted.ln_m().unwrap();
        assert!(after > before, "{after} <= {before}");
    }
}
