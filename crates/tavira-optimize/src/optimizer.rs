//! Mean-variance portfolio optimization.
//!
//! Maximizes the concave utility
//!
//! U(w) = wᵀα − ½ γ wᵀΣw
//!
//! over the period's constraint set by handing the equivalent minimization
//! `½ wᵀ(γΣ)w − αᵀw` to the Clarabel-backed [`QpSolver`].

use crate::constraint::ConstraintSystem;
use crate::error::SolverError;
use crate::solver::{QpProblem, QpSolver, SolveStatus, SolverSettings};
use ndarray::{Array1, Array2};
use tavira_traits::Result;
use tracing::debug;

/// Default risk-aversion coefficient γ.
pub const DEFAULT_RISK_AVERSION: f64 = 2.0;

/// Optimal weights for one period.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Weights aligned positionally with the alpha vector.
    pub weights: Array1<f64>,
    /// How the solver terminated.
    pub status: SolveStatus,
    /// Solver iterations.
    pub iterations: usize,
    /// Utility `wᵀα − ½ γ wᵀΣw` at the optimum.
    pub objective: f64,
}

/// Mean-variance optimizer with a fixed risk aversion.
#[derive(Debug, Clone)]
pub struct MeanVarianceOptimizer {
    risk_aversion: f64,
    solver: QpSolver,
}

impl Default for MeanVarianceOptimizer {
    fn default() -> Self {
        Self::new(DEFAULT_RISK_AVERSION)
    }
}

impl MeanVarianceOptimizer {
    /// Creates an optimizer with risk aversion `γ` and default solver
    /// settings.
    pub fn new(risk_aversion: f64) -> Self {
        Self {
            risk_aversion,
            solver: QpSolver::default(),
        }
    }

    /// Replaces the solver settings.
    pub fn with_settings(mut self, settings: SolverSettings) -> Self {
        self.solver = QpSolver::new(settings);
        self
    }

    /// The risk-aversion coefficient.
    pub const fn risk_aversion(&self) -> f64 {
        self.risk_aversion
    }

    /// Solves for the utility-maximizing weights.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::InvalidParameter`] for a negative or
    /// non-finite risk aversion, and any error from [`QpSolver::solve`].
    /// A zero covariance without bounds on the weights is unbounded and
    /// surfaces as [`SolverError::DualInfeasible`].
    pub fn optimize(
        &self,
        alpha: &Array1<f64>,
        covariance: &Array2<f64>,
        constraints: &ConstraintSystem,
    ) -> std::result::Result<Solution, SolverError> {
        if !self.risk_aversion.is_finite() || self.risk_aversion < 0.0 {
            return Err(SolverError::InvalidParameter(format!(
                "risk aversion must be non-negative, got {}",
                self.risk_aversion
            )));
        }

        let p = covariance * self.risk_aversion;
        let q = -alpha;
        let problem = QpProblem::new(p, q, constraints.clone())?;
        let solution = self.solver.solve(&problem)?;

        debug!(
            assets = alpha.len(),
            iterations = solution.iterations,
            status = %solution.status,
            "mean-variance solve"
        );
        Ok(Solution {
            objective: -solution.objective,
            weights: solution.x,
            status: solution.status,
            iterations: solution.iterations,
        })
    }
}

/// Returns the weights maximizing `wᵀα − ½ γ wᵀΣw` subject to
/// `constraints`, with default solver settings.
///
/// # Errors
///
/// Solver failures are converted into recoverable
/// [`tavira_traits::TaviraError`]s.
pub fn optimize(
    alpha: &Array1<f64>,
    covariance: &Array2<f64>,
    constraints: &ConstraintSystem,
    risk_aversion: f64,
) -> Result<Array1<f64>> {
    Ok(MeanVarianceOptimizer::new(risk_aversion)
        .optimize(alpha, covariance, constraints)?
        .weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{Constraint, ConstraintContext};
    use approx::assert_relative_eq;
    use ndarray::array;
    use rstest::rstest;
    use tavira_traits::{AssetId, TaviraError};

    fn ids(n: usize) -> Vec<AssetId> {
        (0..n).map(|i| format!("A{i}")).collect()
    }

    fn system(n: usize, constraints: &[Constraint]) -> ConstraintSystem {
        let assets = ids(n);
        ConstraintSystem::assemble(&ConstraintContext::new(&assets), constraints).unwrap()
    }

    #[test]
    fn test_three_assets_long_only() {
        let alpha = array![0.1, 0.2, 0.15];
        let cov = Array2::from_diag(&array![0.1, 0.1, 0.1]);
        let constraints = system(3, &[Constraint::FullInvestment, Constraint::LongOnly]);

        let w = optimize(&alpha, &cov, &constraints, DEFAULT_RISK_AVERSION).unwrap();

        assert!(w.iter().all(|&x| (0.0..=1.0 + 1e-7).contains(&x)));
        assert_relative_eq!(w.sum(), 1.0, epsilon = 1e-7);
        assert!(w[1] > w[0] && w[1] > w[2]);
        // Interior solution: w = (α − ν) / (γσ²) with ν fixed by Σw = 1.
        assert_relative_eq!(w[0], 1.0 / 12.0, epsilon = 1e-6);
        assert_relative_eq!(w[1], 7.0 / 12.0, epsilon = 1e-6);
        assert_relative_eq!(w[2], 1.0 / 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_single_asset_full_investment() {
        let constraints = system(1, &[Constraint::FullInvestment]);
        let w = optimize(&array![0.03], &array![[0.04]], &constraints, 2.0).unwrap();
        assert_relative_eq!(w[0], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_long_only_binds() {
        // The low-alpha asset would be shorted without the bound.
        let alpha = array![0.2, -0.2];
        let cov = Array2::from_diag(&array![0.05, 0.05]);
        let constraints = system(2, &[Constraint::FullInvestment, Constraint::LongOnly]);
        let w = optimize(&alpha, &cov, &constraints, 2.0).unwrap();
        assert_relative_eq!(w[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(w[1], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_unit_beta_with_imputed_beta() {
        let assets = ids(3);
        let ctx = ConstraintContext::new(&assets)
            .with_betas(&[Some(0.8), None, Some(1.6)])
            .unwrap();
        let constraints = ConstraintSystem::assemble(
            &ctx,
            &[Constraint::FullInvestment, Constraint::unit_beta()],
        )
        .unwrap();
        let alpha = array![0.01, 0.02, 0.015];
        let cov = Array2::from_diag(&array![0.04, 0.05, 0.06]);
        let w = optimize(&alpha, &cov, &constraints, 2.0).unwrap();
        assert_relative_eq!(w.sum(), 1.0, epsilon = 1e-7);
        assert_relative_eq!(w.dot(&array![0.8, 1.2, 1.6]), 1.0, epsilon = 1e-7);
    }

    #[test]
    fn test_dollar_neutral_with_caps() {
        let alpha = array![0.05, 0.01, -0.03, 0.02];
        let cov = Array2::from_diag(&array![0.02, 0.03, 0.02, 0.04]);
        let constraints = system(
            4,
            &[Constraint::ZeroInvestment, Constraint::MaxWeight { limit: 0.25 }],
        );
        let solution = MeanVarianceOptimizer::default()
            .optimize(&alpha, &cov, &constraints)
            .unwrap();
        assert!(constraints.is_satisfied(&solution.weights, 1e-7));
        assert!(solution.objective > 0.0);
    }

    #[test]
    fn test_infeasible_is_recoverable() {
        // Two assets capped at 25% cannot be fully invested.
        let constraints = system(
            2,
            &[Constraint::FullInvestment, Constraint::MaxWeight { limit: 0.25 }],
        );
        let err = optimize(&array![0.1, 0.1], &Array2::eye(2), &constraints, 2.0).unwrap_err();
        assert!(matches!(err, TaviraError::Infeasible { .. }), "{err}");
        assert!(err.is_period_recoverable());
    }

    #[test]
    fn test_zero_risk_without_bounds_is_unbounded() {
        let constraints = system(2, &[Constraint::FullInvestment]);
        let result = MeanVarianceOptimizer::new(2.0).optimize(
            &array![0.1, 0.3],
            &Array2::zeros((2, 2)),
            &constraints,
        );
        assert!(
            matches!(result, Err(SolverError::DualInfeasible { .. })),
            "{result:?}"
        );

        let err = optimize(&array![0.1, 0.3], &Array2::zeros((2, 2)), &constraints, 2.0)
            .unwrap_err();
        assert!(err.to_string().contains("unbounded"), "{err}");
    }

    #[rstest]
    #[case(-1.0)]
    #[case(f64::NAN)]
    fn test_rejects_bad_risk_aversion(#[case] gamma: f64) {
        let constraints = system(1, &[Constraint::FullInvestment]);
        let result = MeanVarianceOptimizer::new(gamma).optimize(&array![0.1], &array![[0.1]], &constraints);
        assert!(matches!(result, Err(SolverError::InvalidParameter(_))));
    }

    #[test]
    fn test_higher_risk_aversion_lowers_variance() {
        let alpha = array![0.08, 0.02];
        let cov = array![[0.09, 0.01], [0.01, 0.01]];
        let constraints = system(2, &[Constraint::FullInvestment, Constraint::LongOnly]);
        let variance = |gamma: f64| {
            let w = optimize(&alpha, &cov, &constraints, gamma).unwrap();
            w.dot(&cov.dot(&w))
        };
        assert!(variance(10.0) < variance(0.5));
    }
}
