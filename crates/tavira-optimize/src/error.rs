//! Solver error type.

use tavira_traits::TaviraError;
use thiserror::Error;

/// Errors raised while setting up or solving a QP.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    /// Vectors or matrices with incompatible shapes were combined.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// The problem data contains NaN or infinite entries.
    #[error("non-finite problem data in {0}")]
    NonFinite(&'static str),

    /// A solver or optimizer parameter is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The constraint set admits no point.
    #[error("primal infeasible after {iterations} iterations")]
    PrimalInfeasible {
        /// Iterations run before the certificate was found.
        iterations: usize,
    },

    /// The objective is unbounded below on the feasible set.
    #[error("dual infeasible (unbounded objective) after {iterations} iterations")]
    DualInfeasible {
        /// Iterations run before the certificate was found.
        iterations: usize,
    },

    /// The iteration cap was reached before convergence.
    #[error("no convergence after {iterations} iterations (primal {primal:e}, dual {dual:e})")]
    MaxIterations {
        /// Iterations run.
        iterations: usize,
        /// Final primal residual.
        primal: f64,
        /// Final dual residual.
        dual: f64,
    },

    /// Clarabel rejected the settings or problem data.
    #[error("solver setup failed: {0}")]
    Setup(String),

    /// Clarabel stopped on a numerical failure.
    #[error("solver stopped with status {0}")]
    Numerical(String),
}

impl From<SolverError> for TaviraError {
    fn from(err: SolverError) -> Self {
        match err {
            SolverError::PrimalInfeasible { .. } => Self::Infeasible {
                date: None,
                reason: err.to_string(),
            },
            SolverError::DimensionMismatch { expected, actual } => {
                Self::DimensionMismatch { expected, actual }
            }
            SolverError::InvalidParameter(reason) => Self::InvalidData(reason),
            other => Self::Solver(other.to_string()),
        }
    }
}
