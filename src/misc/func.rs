use nalgebra::{DMatrix, DVector};

/// `n` evenly spaced values over `[start, stop]`, both ends included.
///
/// # Example
///
/// ```rust
/// # use gp_descent::misc::linspace;
/// let xs = linspace(0.0, 1.0, 5);
///
/// assert_eq!(xs.as_slice(), &[0.0, 0.25, 0.5, 0.75, 1.0]);
/// assert_eq!(linspace(2.0, 3.0, 1).as_slice(), &[2.0]);
/// assert!(linspace(2.0, 3.0, 0).is_empty());
/// ```
pub fn linspace(start: f64, stop: f64, n: usize) -> DVector<f64> {
    match n {
        0 => DVector::zeros(0),
        1 => DVector::from_element(1, start),
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            DVector::from_fn(n, |i, _| {
                if i == n - 1 {
                    stop
                } else {
                    step.mul_add(i as f64, start)
                }
            })
        }
    }
}

/// Turn a vector of scalar inputs into an `n x 1` design matrix
#[inline]
pub fn as_column(xs: &DVector<f64>) -> DMatrix<f64> {
    DMatrix::from_column_slice(xs.nrows(), 1, xs.as_slice())
}

/// `v v^T`
#[inline]
pub fn outer_product_self(col: &DVector<f64>) -> DMatrix<f64> {
    col * col.transpose()
}

/// Format a sequence of floats with a fixed number of decimals
///
/// # Example
///
/// ```rust
/// # use gp_descent::misc::format_floats;
/// assert_eq!(format_floats(&[0.5, 1.0 / 3.0], 3), "[0.500, 0.333]");
/// ```
pub fn format_floats(xs: &[f64], decimals: usize) -> String {
    let body: Vec<String> =
        xs.iter().map(|x| format!("{x:.decimals$}")).collect();
    format!("[{}]", body.join(", "))
}
