//! Fit the hyperparameters of a Gaussian process with an explicit
//! gradient-descent loop.
//!
//! Each training iteration clears the gradient, computes the marginal
//! distribution of the training targets, evaluates the negative marginal log
//! likelihood, accumulates its analytic gradient into the model, and steps an
//! optimizer.
//!
//! # Example
//!
//! ```rust
//! use gp_descent::config::ModelConfig;
//! use gp_descent::data::{noisy_sine, SineConfig};
//! use gp_descent::mll::ExactMarginalLogLikelihood;
//! use gp_descent::optim::Adam;
//! use gp_descent::train::train;
//! use rand::rngs::SmallRng;
//! use rand::SeedableRng;
//!
//! let mut rng = SmallRng::seed_from_u64(0);
//! let data = noisy_sine(&SineConfig::default(), &mut rng).unwrap();
//! let mut model = ModelConfig::default().build(&data).unwrap();
//!
//! let mut adam = Adam::new(0.1).unwrap();
//! let mll = ExactMarginalLogLikelihood::new();
//! let history = train(&mut model, &mll, &mut adam, 20, |report| {
//!     println!("{report}");
//! })
//! .unwrap();
//!
//! assert!(history.final_loss() < history.initial_loss());
//! ```
pub mod config;
pub mod consts;
pub mod data;
pub mod misc;
pub mod mll;
pub mod optim;
#[cfg(feature = "plot")]
pub mod plot;
pub mod process;
pub mod result;
pub mod train;

pub use result::{Error, ErrorKind, Result};
