//! Numerical utilities
mod cholesky;
mod func;

pub use cholesky::*;
pub use func::*;
