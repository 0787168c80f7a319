//! Mathematical constants

/// 0.5 ln(2π)
pub const HALF_LN_2PI: f64 = 0.918_938_533_204_672_7;
/// Softplus evaluated at zero, ln(2). Default initial value for positive
/// hyperparameters.
pub const SOFTPLUS_ZERO: f64 = std::f64::consts::LN_2;
