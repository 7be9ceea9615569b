//! Error types for the Tavira framework.
//!
//! A single error enum covers the whole pipeline. Schema violations are
//! surfaced to the caller immediately, while data and numerical failures
//! scoped to one rebalance period can be recovered by the orchestrator (see
//! [`TaviraError::is_period_recoverable`]).

use crate::Date;
use thiserror::Error;

/// The main error type for Tavira operations.
#[derive(Debug, Error)]
pub enum TaviraError {
    /// A record table does not match its declared column contract.
    #[error("Schema violation in {table}: {reason}")]
    SchemaViolation {
        /// Name of the record table being constructed.
        table: &'static str,
        /// What was wrong with the input frame.
        reason: String,
    },

    /// Error when a required column is missing from the data.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// A key that must be unique appears more than once.
    #[error("Duplicate key in {table}: {key}")]
    DuplicateKey {
        /// Name of the record table being constructed.
        table: &'static str,
        /// Rendered offending key.
        key: String,
    },

    /// Error due to invalid or malformed data.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Error when data is insufficient for the requested operation.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Risk-model inputs are absent for a rebalance date.
    #[error("Missing risk model data for {date}: {reason}")]
    MissingRiskData {
        /// The rebalance date.
        date: Date,
        /// Which table was absent.
        reason: String,
    },

    /// The optimization problem has no feasible point.
    #[error("Infeasible problem{}: {reason}", on_date(.date))]
    Infeasible {
        /// The rebalance date, when known.
        date: Option<Date>,
        /// Solver or constraint diagnostic.
        reason: String,
    },

    /// The solver failed for a reason other than infeasibility.
    #[error("Solver failure: {0}")]
    Solver(String),

    /// Vectors or matrices with incompatible shapes were combined.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// Error when a date is out of range or invalid.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Error from file system operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from Polars operations.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Generic error for other cases.
    #[error("Error: {0}")]
    Other(String),
}

fn on_date(date: &Option<Date>) -> String {
    date.map(|d| format!(" on {d}")).unwrap_or_default()
}

impl TaviraError {
    /// Creates a [`TaviraError::SchemaViolation`] for `table`.
    pub fn schema(table: &'static str, reason: impl Into<String>) -> Self {
        Self::SchemaViolation {
            table,
            reason: reason.into(),
        }
    }

    /// Whether the error only invalidates a single rebalance period.
    ///
    /// Missing risk data, infeasible or failed solves and insufficient data
    /// skip the period. Everything else stops the run.
    pub const fn is_period_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MissingRiskData { .. }
                | Self::Infeasible { .. }
                | Self::Solver(_)
                | Self::InsufficientData(_)
        )
    }
}

impl From<String> for TaviraError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<&str> for TaviraError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

/// A specialized Result type for Tavira operations.
pub type Result<T> = std::result::Result<T, TaviraError>;
