use std::fmt;
use std::result;

use crate::optim::OptimizeError;
use crate::process::gaussian::kernel::{CovGradError, KernelError};

pub type Result<T> = result::Result<T, Error>;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ErrorKind {
    /// One or more of the supplied parameters is invalid
    InvalidParameter,
    /// A covariance matrix could not be factored, even with added jitter
    NotPositiveDefinite,
    /// Two inputs that must agree in size do not
    ShapeMismatch,
    /// A loss, gradient, or parameter became NaN or infinite
    NumericalDivergence,
    /// The run configuration is invalid
    InvalidConfig,
    /// Reading or writing a file failed
    Io,
    /// An external optimizer failed to produce a result
    OptimizationFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &str {
        match self {
            ErrorKind::InvalidParameter => "invalid parameter",
            ErrorKind::NotPositiveDefinite => "not positive definite",
            ErrorKind::ShapeMismatch => "shape mismatch",
            ErrorKind::NumericalDivergence => "numerical divergence",
            ErrorKind::InvalidConfig => "invalid config",
            ErrorKind::Io => "io",
            ErrorKind::OptimizationFailed => "optimization failed",
        }
    }
}

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Error {
    msg: String,
    kind: ErrorKind,
}

impl Error {
    pub fn new(kind: ErrorKind, msg: &str) -> Self {
        Error {
            msg: String::from(msg),
            kind,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn description(&self) -> &str {
        self.msg.as_str()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.msg)
    }
}

impl std::error::Error for Error {}

impl From<KernelError> for Error {
    fn from(err: KernelError) -> Self {
        let kind = match err {
            KernelError::CovGrad(_) => ErrorKind::ShapeMismatch,
            _ => ErrorKind::InvalidParameter,
        };
        Error::new(kind, err.to_string().trim_end())
    }
}

impl From<CovGradError> for Error {
    fn from(err: CovGradError) -> Self {
        Error::new(ErrorKind::ShapeMismatch, err.to_string().trim_end())
    }
}

impl From<OptimizeError> for Error {
    fn from(err: OptimizeError) -> Self {
        let kind = match err {
            OptimizeError::NumericalDivergence { .. } => {
                ErrorKind::NumericalDivergence
            }
            OptimizeError::ShapeMismatch { .. } => ErrorKind::ShapeMismatch,
            OptimizeError::InvalidHyperparameter { .. } => {
                ErrorKind::InvalidParameter
            }
        };
        Error::new(kind, &err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::new(ErrorKind::Io, &err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::new(ErrorKind::InvalidConfig, &err.to_string())
    }
}
