#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

mod cancel;
pub use cancel::CancellationToken;

mod levenberg_marquardt;
pub use levenberg_marquardt::{LevenbergMarquardt, OptimizerResult, TerminationReason};

mod problem;
pub use problem::{numerical_jacobian, LeastSquaresProblem};

use thiserror::Error;

/// Errors that can occur while setting up or running an optimization.
#[derive(Debug, Error)]
pub enum OptimizerError {
    /// The parameter vector does not match the problem dimension.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected number of values.
        expected: usize,
        /// Actual number of values.
        actual: usize,
    },

    /// The problem has fewer residuals than free parameters.
    #[error("Underdetermined problem: {residuals} residuals for {parameters} parameters")]
    Underdetermined {
        /// Number of residuals.
        residuals: usize,
        /// Number of free parameters.
        parameters: usize,
    },

    /// The residual function produced NaN or infinite values.
    #[error("Residual evaluation produced non-finite values")]
    NonFiniteResidual,

    /// The damped normal equations could not be solved.
    #[error("Linear system solve failed: {0}")]
    SolveFailed(String),
}
