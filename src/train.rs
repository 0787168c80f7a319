//! The explicit training loop
use std::fmt;

use log::{debug, info};

use crate::mll::ExactMarginalLogLikelihood;
use crate::optim::Optimizer;
use crate::process::gaussian::kernel::Kernel;
use crate::process::gaussian::likelihood::Likelihood;
use crate::process::gaussian::mean::MeanFunction;
use crate::process::gaussian::ExactGp;
use crate::process::Parameterized;
use crate::result::Result;

/// Hyperparameters shown in an iteration report unless others are chosen
pub const DEFAULT_REPORTED: [&str; 2] = ["lengthscale", "noise"];

/// State of the model at one training iteration, taken after the backward
/// pass and before the optimizer step
#[derive(Clone, Debug, PartialEq)]
pub struct IterationReport {
    /// 1-based iteration number
    pub iteration: usize,
    pub n_iter: usize,
    pub loss: f64,
    /// Every named hyperparameter on its natural scale
    pub hyperparameters: Vec<(&'static str, f64)>,
}

impl IterationReport {
    /// Value of a named hyperparameter, if the model has one
    pub fn hyperparameter(&self, name: &str) -> Option<f64> {
        self.hyperparameters
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }

    /// Render the report with the chosen hyperparameters, skipping any the
    /// model does not have
    pub fn display_with<'a>(&'a self, names: &'a [&'a str]) -> ReportLine<'a> {
        ReportLine {
            report: self,
            names,
        }
    }
}

impl fmt::Display for IterationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.display_with(&DEFAULT_REPORTED).fmt(f)
    }
}

/// One console line of training progress
pub struct ReportLine<'a> {
    report: &'a IterationReport,
    names: &'a [&'a str],
}

impl fmt::Display for ReportLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Iter {}/{} - Loss: {:.3}",
            self.report.iteration, self.report.n_iter, self.report.loss
        )?;
        for name in self.names {
            if let Some(value) = self.report.hyperparameter(name) {
                write!(f, "   {name}: {value:.3}")?;
            }
        }
        Ok(())
    }
}

/// Every iteration report of a training run, in order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainingHistory {
    reports: Vec<IterationReport>,
}

impl TrainingHistory {
    pub fn reports(&self) -> &[IterationReport] {
        &self.reports
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn losses(&self) -> Vec<f64> {
        self.reports.iter().map(|r| r.loss).collect()
    }

    pub fn initial_loss(&self) -> Option<f64> {
        self.reports.first().map(|r| r.loss)
    }

    pub fn final_loss(&self) -> Option<f64> {
        self.reports.last().map(|r| r.loss)
    }
}

/// Fit the model's hyperparameters by running exactly `n_iter` steps of
/// gradient descent on the negative marginal log likelihood.
///
/// Each iteration clears the gradient, evaluates the marginal distribution
/// of the training targets, computes the loss, accumulates its gradient,
/// hands a report to `on_iter`, and steps the optimizer.
pub fn train<M, K, L, F>(
    model: &mut ExactGp<M, K, L>,
    mll: &ExactMarginalLogLikelihood,
    optimizer: &mut dyn Optimizer,
    n_iter: usize,
    mut on_iter: F,
) -> Result<TrainingHistory>
where
    M: MeanFunction,
    K: Kernel,
    L: Likelihood,
    F: FnMut(&IterationReport),
{
    info!(
        "training {} raw parameters for {} iterations (lr = {})",
        model.n_parameters(),
        n_iter,
        optimizer.learning_rate()
    );

    let mut history = TrainingHistory {
        reports: Vec::with_capacity(n_iter),
    };
    for iteration in 1..=n_iter {
        optimizer.zero_grad(model);
        let output = model.forward_train()?;
        let loss = mll.loss(&output, model.y_train())?;
        loss.backward(model)?;

        let report = IterationReport {
            iteration,
            n_iter,
            loss: loss.value(),
            hyperparameters: model.named_hyperparameters(),
        };
        debug!("iteration {iteration}: grad = {:?}", loss.grad().as_slice());
        on_iter(&report);
        history.reports.push(report);

        optimizer.step(model)?;
    }

    if let (Some(first), Some(last)) =
        (history.initial_loss(), history.final_loss())
    {
        info!("loss went from {first:.3} to {last:.3}");
    }
    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SOFTPLUS_ZERO;
    use crate::data::{noisy_sine, SineConfig};
    use crate::optim::{Adam, Sgd};
    use crate::process::gaussian::kernel::{RBFKernel, ScaleKernel};
    use crate::process::gaussian::likelihood::GaussianLikelihood;
    use crate::process::gaussian::mean::ConstantMean;
    use crate::result::ErrorKind;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    type SineGp = ExactGp<ConstantMean, ScaleKernel<RBFKernel>, GaussianLikelihood>;

    fn sine_gp(seed: u64) -> SineGp {
        let mut rng = SmallRng::seed_from_u64(seed);
        let data = noisy_sine(&SineConfig::default(), &mut rng).unwrap();
        let kernel = ScaleKernel::new(
            SOFTPLUS_ZERO,
            RBFKernel::new(SOFTPLUS_ZERO).unwrap(),
        )
        .unwrap();
        ExactGp::new(
            ConstantMean::default(),
            kernel,
            GaussianLikelihood::new(SOFTPLUS_ZERO).unwrap(),
            data.x,
            data.y,
        )
        .unwrap()
    }

    fn report() -> IterationReport {
        IterationReport {
            iteration: 1,
            n_iter: 100,
            loss: 0.93412,
            hyperparameters: vec![
                ("mean_constant", 0.0),
                ("outputscale", 0.6931),
                ("lengthscale", 0.6931),
                ("noise", 0.6932),
            ],
        }
    }

    #[test]
    fn report_line_format() {
        assert_eq!(
            report().to_string(),
            "Iter 1/100 - Loss: 0.934   lengthscale: 0.693   noise: 0.693"
        );
    }

    #[test]
    fn report_line_skips_unknown_names() {
        let r = report();
        let line = r.display_with(&["outputscale", "period"]).to_string();
        assert_eq!(line, "Iter 1/100 - Loss: 0.934   outputscale: 0.693");
    }

    #[test]
    fn adam_reduces_the_loss_on_sine_data() {
        let mut gp = sine_gp(0x5EED);
        let mut adam = Adam::new(0.1).unwrap();
        let mut seen = Vec::new();
        let history = train(
            &mut gp,
            &ExactMarginalLogLikelihood::new(),
            &mut adam,
            100,
            |r| seen.push(r.iteration),
        )
        .unwrap();

        assert_eq!(history.len(), 100);
        assert_eq!(seen, (1..=100).collect::<Vec<_>>());
        assert_eq!(adam.n_steps(), 100);
        assert!(history.final_loss().unwrap() < history.initial_loss().unwrap());

        // the fitted noise should be far below its initial value
        assert!(gp.likelihood().noise_variance() < 0.3);
        assert!(history.reports().iter().all(|r| r.loss.is_finite()));
    }

    #[test]
    fn first_report_precedes_the_first_step() {
        let mut gp = sine_gp(1);
        let initial = gp.named_hyperparameters();
        let history = train(
            &mut gp,
            &ExactMarginalLogLikelihood::new(),
            &mut Sgd::new(0.01).unwrap(),
            3,
            |_| {},
        )
        .unwrap();
        assert_eq!(history.reports()[0].hyperparameters, initial);
        assert_ne!(history.reports()[2].hyperparameters, initial);
    }

    #[test]
    fn zero_iterations_is_empty() {
        let mut gp = sine_gp(2);
        let before = gp.raw_parameters();
        let history = train(
            &mut gp,
            &ExactMarginalLogLikelihood::new(),
            &mut Adam::new(0.1).unwrap(),
            0,
            |_| {},
        )
        .unwrap();
        assert!(history.is_empty());
        assert_eq!(history.initial_loss(), None);
        assert_eq!(gp.raw_parameters(), before);
    }

    #[test]
    fn oversized_steps_stop_with_divergence() {
        let mut gp = sine_gp(3);
        let before = gp.raw_parameters();
        let mut reports = 0;
        let err = train(
            &mut gp,
            &ExactMarginalLogLikelihood::new(),
            &mut Sgd::new(1E6).unwrap(),
            100,
            |_| reports += 1,
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NumericalDivergence);
        assert_eq!(reports, 1);
        assert_eq!(gp.raw_parameters(), before);
    }
}
