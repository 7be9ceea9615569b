#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tavira/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

//! Portfolio construction for the Tavira backtest engine.
//!
//! - [`constraint`]: the closed set of portfolio constraints and their
//!   expansion into a linear [`ConstraintSystem`]
//! - [`solver`]: convex quadratic programs solved with Clarabel
//! - [`optimizer`]: mean-variance utility maximization on top of the solver
//! - [`portfolio`]: per-period portfolio constructors: mean-variance efficient
//!   under the risk model, and equal-weight alpha deciles

pub mod constraint;
pub mod error;
pub mod optimizer;
pub mod portfolio;
pub mod solver;

pub use constraint::{Constraint, ConstraintContext, ConstraintSystem, LinearConstraint, impute_betas};
pub use error::SolverError;
pub use optimizer::{DEFAULT_RISK_AVERSION, MeanVarianceOptimizer, Solution, optimize};
pub use portfolio::{DECILES, DecilePortfolio, MeanVarianceEfficient, PeriodInput, PortfolioConstructor};
pub use solver::{QpProblem, QpSolution, QpSolver, SolveStatus, SolverSettings};
