use nalgebra::base::constraint::{
    SameNumberOfColumns, SameNumberOfRows, ShapeConstraint,
};
use nalgebra::base::storage::Storage;
use nalgebra::{Dim, Matrix, Scalar};
use num_traits::Float;

/// Squared Euclidean distance between two points after dividing each
/// coordinate by `scale`.
#[inline]
pub fn e2_norm<N, R1, C1, S1, R2, C2, S2>(
    m1: &Matrix<N, R1, C1, S1>,
    m2: &Matrix<N, R2, C2, S2>,
    scale: N,
) -> N
where
    N: Scalar + Float,
    R1: Dim,
    C1: Dim,
    S1: Storage<N, R1, C1>,
    R2: Dim,
    C2: Dim,
    S2: Storage<N, R2, C2>,
    ShapeConstraint: SameNumberOfRows<R1, R2> + SameNumberOfColumns<C1, C2>,
{
    m1.zip_fold(m2, N::zero(), |acc, a, b| {
        let diff = (a - b) / scale;
        acc + diff * diff
    })
}
