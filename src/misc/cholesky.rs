use log::warn;
use nalgebra::linalg::Cholesky;
use nalgebra::{DMatrix, Dyn};

use crate::result::{Error, ErrorKind, Result};

/// Relative jitter added to the diagonal on successive retries
pub const CHOLESKY_JITTER: [f64; 3] = [1E-6, 1E-5, 1E-4];

/// Cholesky decomposition that retries with diagonal jitter.
///
/// The jitter on each retry is `CHOLESKY_JITTER[i]` times the mean of the
/// diagonal, so it follows the scale of the matrix.
pub fn psd_safe_cholesky(k: &DMatrix<f64>) -> Result<Cholesky<f64, Dyn>> {
    if !k.is_square() {
        return Err(Error::new(
            ErrorKind::ShapeMismatch,
            &format!("Cholesky requires a square matrix, got {:?}", k.shape()),
        ));
    }

    if k.iter().any(|x| !x.is_finite()) {
        return Err(Error::new(
            ErrorKind::NumericalDivergence,
            "covariance contains non-finite entries",
        ));
    }

    if let Some(chol) = Cholesky::new(k.clone()) {
        return Ok(chol);
    }

    let n = k.nrows();
    let mean_diag = if n == 0 {
        1.0
    } else {
        k.diagonal().sum().abs() / n as f64
    };

    for rel in CHOLESKY_JITTER {
        let jitter = rel * mean_diag.max(f64::MIN_POSITIVE);
        let mut kj = k.clone();
        for i in 0..n {
            kj[(i, i)] += jitter;
        }
        warn!("covariance not positive definite, retrying with jitter {jitter:.1e}");
        if let Some(chol) = Cholesky::new(kj) {
            return Ok(chol);
        }
    }

    Err(Error::new(
        ErrorKind::NotPositiveDefinite,
        "The covariance is not positive definite even after adding jitter. \
         Try a larger noise floor.",
    ))
}
