//! Fit a Gaussian process to noisy samples of a sine wave with 100 steps of
//! Adam, printing the loss and hyperparameters on every iteration.
//!
//! Usage: `fit-sine [config.yaml]`
use std::process::ExitCode;

use log::{error, info};
use rand::rngs::SmallRng;
use rand::SeedableRng;

use gp_descent::config::FitConfig;
use gp_descent::data::noisy_sine;
use gp_descent::misc::format_floats;
use gp_descent::mll::ExactMarginalLogLikelihood;
use gp_descent::process::Parameterized;
use gp_descent::train::train;
use gp_descent::Result;

fn load_config() -> Result<FitConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            info!("reading configuration from {path}");
            FitConfig::from_path(path)
        }
        None => Ok(FitConfig::default()),
    }
}

fn run() -> Result<()> {
    let config = load_config()?;
    config.validate()?;

    let mut rng = SmallRng::seed_from_u64(config.seed);
    let data = noisy_sine(&config.data, &mut rng)?;
    info!("generated {} training points", data.len());

    let mut model = config.model.build(&data)?;
    let mll = if config.training.normalize_loss {
        ExactMarginalLogLikelihood::new()
    } else {
        ExactMarginalLogLikelihood::unnormalized()
    };
    let mut optimizer = config.training.optimizer.build()?;

    let names: Vec<&str> = config.output.report.iter().map(String::as_str).collect();
    train(
        &mut model,
        &mll,
        optimizer.as_mut(),
        config.training.n_iter,
        |report| println!("{}", report.display_with(&names)),
    )?;

    for (name, value) in model.named_hyperparameters() {
        println!("{name}: {value:.3}");
    }
    info!(
        "raw parameters: {}",
        format_floats(model.raw_parameters().as_slice(), 3)
    );

    let x_test = config.prediction.inputs();
    let posterior = if config.prediction.include_noise {
        model.predictive(&x_test)?
    } else {
        model.posterior(&x_test)?
    };

    #[cfg(feature = "plot")]
    gp_descent::plot::render_posterior(
        &config.output.plot_path,
        &data,
        &x_test,
        &posterior,
    )?;
    #[cfg(not(feature = "plot"))]
    info!(
        "posterior mean at {} points: {}",
        posterior.mean().len(),
        format_floats(posterior.mean().as_slice(), 3)
    );

    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
