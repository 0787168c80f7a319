use gp_descent::config::FitConfig;
use gp_descent::data::noisy_sine;
use gp_descent::mll::ExactMarginalLogLikelihood;
use gp_descent::process::Parameterized;
use gp_descent::train::train;
use indoc::indoc;
use rand::rngs::SmallRng;
use rand::SeedableRng;

fn run(config: &FitConfig) -> (gp_descent::config::SineModel, Vec<String>, Vec<f64>) {
    let mut rng = SmallRng::seed_from_u64(config.seed);
    let data = noisy_sine(&config.data, &mut rng).unwrap();
    let mut model = config.model.build(&data).unwrap();
    let mut optimizer = config.training.optimizer.build().unwrap();

    let mut lines = Vec::new();
    let history = train(
        &mut model,
        &ExactMarginalLogLikelihood::new(),
        optimizer.as_mut(),
        config.training.n_iter,
        |report| lines.push(report.to_string()),
    )
    .unwrap();
    (model, lines, history.losses())
}

#[test]
fn default_pipeline_prints_one_line_per_iteration() {
    let config = FitConfig::default();
    let (model, lines, losses) = run(&config);

    assert_eq!(lines.len(), 100);
    assert!(lines[0].starts_with("Iter 1/100 - Loss: "));
    assert!(lines[0].ends_with("   lengthscale: 0.693   noise: 0.693"));
    assert!(lines[99].starts_with("Iter 100/100 - Loss: "));
    assert!(losses[99] < losses[0]);

    let posterior = model.posterior(&config.prediction.inputs()).unwrap();
    assert_eq!(posterior.mean().len(), 51);
    assert!(posterior.variance().iter().all(|v| *v >= 0.0));
}

#[test]
fn fitted_model_tracks_the_sine() {
    let (model, _, _) = run(&FitConfig::default());
    let x = nalgebra::DMatrix::from_column_slice(3, 1, &[0.25, 0.5, 0.75]);
    let posterior = model.posterior(&x).unwrap();
    let expected = [1.0, 0.0, -1.0];
    for (m, e) in posterior.mean().iter().zip(expected.iter()) {
        assert!((m - e).abs() < 0.5, "mean {m}, expected about {e}");
    }
}

#[test]
fn same_seed_same_trajectory() {
    let config = FitConfig::from_yaml_str(indoc! {"
        seed: 3
        training:
          n_iter: 10
    "})
    .unwrap();
    let (a, lines_a, _) = run(&config);
    let (b, lines_b, _) = run(&config);
    assert_eq!(lines_a, lines_b);
    assert_eq!(a.raw_parameters(), b.raw_parameters());
}

#[test]
fn sgd_from_yaml_also_descends() {
    let config = FitConfig::from_yaml_str(indoc! {"
        training:
          n_iter: 50
          optimizer:
            kind: sgd
            lr: 0.1
            momentum: 0.5
    "})
    .unwrap();
    let (_, _, losses) = run(&config);
    assert!(losses[49] < losses[0]);
}
