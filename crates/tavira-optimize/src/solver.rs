//! Convex quadratic programming on top of Clarabel.
//!
//! Solves
//!
//! ```text
//! minimize    ½ xᵀ P x + qᵀ x
//! subject to  l ≤ R x ≤ u
//!             lb ≤ x ≤ ub
//! ```
//!
//! Clarabel expects conic form `A x + s = b, s ∈ K`. Rows whose bounds
//! coincide go to the zero cone. Every finite one-sided bound becomes a row of
//! the nonnegative cone: `a x ≤ u` as `(a, u)` and `a x ≥ l` as `(-a, -l)`.

use crate::constraint::ConstraintSystem;
use crate::error::SolverError;
use clarabel::algebra::CscMatrix;
use clarabel::solver::*;
use derive_more::Display;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Bounds closer than this are treated as an equality.
const EQUALITY_TOLERANCE: f64 = 1e-12;

/// Settings handed to Clarabel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Interior point iteration cap.
    pub max_iter: u32,
    /// Absolute duality gap tolerance.
    pub tol_gap_abs: f64,
    /// Relative duality gap tolerance.
    pub tol_gap_rel: f64,
    /// Feasibility tolerance.
    pub tol_feas: f64,
    /// Print Clarabel's iteration log.
    pub verbose: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iter: 200,
            tol_gap_abs: 1e-9,
            tol_gap_rel: 1e-9,
            tol_feas: 1e-9,
            verbose: false,
        }
    }
}

/// A convex QP instance.
#[derive(Debug, Clone)]
pub struct QpProblem {
    p: Array2<f64>,
    q: Array1<f64>,
    constraints: ConstraintSystem,
}

impl QpProblem {
    /// Bundles the quadratic term `p`, linear term `q` and constraints.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::DimensionMismatch`] if the shapes disagree and
    /// [`SolverError::NonFinite`] if any coefficient is NaN or infinite, or
    /// any bound is NaN.
    pub fn new(
        p: Array2<f64>,
        q: Array1<f64>,
        constraints: ConstraintSystem,
    ) -> Result<Self, SolverError> {
        let n = q.len();
        for actual in [p.nrows(), p.ncols(), constraints.num_vars(), constraints.rows.ncols()] {
            if actual != n {
                return Err(SolverError::DimensionMismatch { expected: n, actual });
            }
        }
        if p.iter().any(|v| !v.is_finite()) {
            return Err(SolverError::NonFinite("quadratic term"));
        }
        if q.iter().any(|v| !v.is_finite()) {
            return Err(SolverError::NonFinite("linear term"));
        }
        if constraints.rows.iter().any(|v| !v.is_finite()) {
            return Err(SolverError::NonFinite("constraint matrix"));
        }
        let mut bounds = constraints
            .row_lower
            .iter()
            .chain(&constraints.row_upper)
            .chain(&constraints.lower)
            .chain(&constraints.upper);
        if bounds.any(|v| v.is_nan()) {
            return Err(SolverError::NonFinite("constraint bounds"));
        }
        Ok(Self { p, q, constraints })
    }

    /// Number of variables.
    pub fn num_vars(&self) -> usize {
        self.q.len()
    }

    /// `½ xᵀ P x + qᵀ x`.
    pub fn objective(&self, x: &Array1<f64>) -> f64 {
        0.5 * x.dot(&self.p.dot(x)) + self.q.dot(x)
    }

    /// Upper triangle of `P` in compressed column form.
    fn quadratic_term(&self) -> CscMatrix<f64> {
        let n = self.num_vars();
        let mut colptr = Vec::with_capacity(n + 1);
        let mut rowval = Vec::new();
        let mut nzval = Vec::new();
        colptr.push(0);
        for j in 0..n {
            for i in 0..=j {
                // Average the two triangles so a slightly asymmetric P is
                // read as its symmetric part.
                let value = 0.5 * (self.p[[i, j]] + self.p[[j, i]]);
                if value != 0.0 {
                    rowval.push(i);
                    nzval.push(value);
                }
            }
            colptr.push(nzval.len());
        }
        CscMatrix::new(n, n, colptr, rowval, nzval)
    }

    /// Stacks the constraints into `(A, b, cones)`.
    fn conic_form(&self) -> (CscMatrix<f64>, Vec<f64>, Vec<SupportedConeT<f64>>) {
        let n = self.num_vars();
        let system = &self.constraints;
        let mut equalities: Vec<(Vec<f64>, f64)> = Vec::new();
        let mut inequalities: Vec<(Vec<f64>, f64)> = Vec::new();

        for (r, row) in system.rows.rows().into_iter().enumerate() {
            let (lower, upper) = (system.row_lower[r], system.row_upper[r]);
            let coefficients = row.to_vec();
            push_interval(&mut equalities, &mut inequalities, coefficients, lower, upper);
        }
        for i in 0..n {
            let mut unit = vec![0.0; n];
            unit[i] = 1.0;
            push_interval(
                &mut equalities,
                &mut inequalities,
                unit,
                system.lower[i],
                system.upper[i],
            );
        }

        let (m_eq, m_ineq) = (equalities.len(), inequalities.len());
        let rows: Vec<(Vec<f64>, f64)> = equalities.into_iter().chain(inequalities).collect();

        let mut colptr = Vec::with_capacity(n + 1);
        let mut rowval = Vec::new();
        let mut nzval = Vec::new();
        colptr.push(0);
        for j in 0..n {
            for (i, (coefficients, _)) in rows.iter().enumerate() {
                if coefficients[j] != 0.0 {
                    rowval.push(i);
                    nzval.push(coefficients[j]);
                }
            }
            colptr.push(nzval.len());
        }
        let a = CscMatrix::new(rows.len(), n, colptr, rowval, nzval);
        let b = rows.iter().map(|(_, value)| *value).collect();

        let mut cones = Vec::with_capacity(2);
        if m_eq > 0 {
            cones.push(ZeroConeT(m_eq));
        }
        if m_ineq > 0 {
            cones.push(NonnegativeConeT(m_ineq));
        }
        (a, b, cones)
    }
}

fn push_interval(
    equalities: &mut Vec<(Vec<f64>, f64)>,
    inequalities: &mut Vec<(Vec<f64>, f64)>,
    coefficients: Vec<f64>,
    lower: f64,
    upper: f64,
) {
    if lower.is_finite() && upper.is_finite() && (upper - lower).abs() <= EQUALITY_TOLERANCE {
        equalities.push((coefficients, upper));
        return;
    }
    if lower.is_finite() {
        let negated = coefficients.iter().map(|c| -c).collect();
        inequalities.push((negated, -lower));
    }
    if upper.is_finite() {
        inequalities.push((coefficients, upper));
    }
}

/// How Clarabel terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// Full accuracy.
    #[display("solved")]
    Solved,
    /// Reduced accuracy tolerances were met.
    #[display("almost_solved")]
    AlmostSolved,
}

/// Primal solution of a [`QpProblem`].
#[derive(Debug, Clone)]
pub struct QpSolution {
    /// Primal solution, clipped into the variable bounds.
    pub x: Array1<f64>,
    /// How the solver terminated.
    pub status: SolveStatus,
    /// Interior point iterations run.
    pub iterations: usize,
    /// Objective value at `x`.
    pub objective: f64,
}

/// Interior point QP solver backed by Clarabel.
#[derive(Debug, Clone, Default)]
pub struct QpSolver {
    settings: SolverSettings,
}

impl QpSolver {
    /// Creates a solver with the given settings.
    pub const fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }

    /// The solver settings.
    pub const fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Solves `problem`.
    ///
    /// # Errors
    ///
    /// - [`SolverError::PrimalInfeasible`] when the constraints admit no point
    /// - [`SolverError::DualInfeasible`] when the objective is unbounded below
    /// - [`SolverError::MaxIterations`] when the iteration cap is reached
    /// - [`SolverError::Setup`] when Clarabel rejects the settings or data
    /// - [`SolverError::Numerical`] for any other termination
    pub fn solve(&self, problem: &QpProblem) -> Result<QpSolution, SolverError> {
        let n = problem.num_vars();
        if n == 0 {
            return Ok(QpSolution {
                x: Array1::zeros(0),
                status: SolveStatus::Solved,
                iterations: 0,
                objective: 0.0,
            });
        }

        let settings = DefaultSettingsBuilder::default()
            .max_iter(self.settings.max_iter)
            .tol_gap_abs(self.settings.tol_gap_abs)
            .tol_gap_rel(self.settings.tol_gap_rel)
            .tol_feas(self.settings.tol_feas)
            .verbose(self.settings.verbose)
            .build()
            .map_err(|e| SolverError::Setup(e.to_string()))?;

        let p = problem.quadratic_term();
        let q = problem.q.to_vec();
        let (a, b, cones) = problem.conic_form();
        trace!(vars = n, rows = b.len(), cones = cones.len(), "clarabel problem");

        let mut solver = DefaultSolver::new(&p, &q, &a, &b, &cones, settings)
            .map_err(|e| SolverError::Setup(format!("{e:?}")))?;
        solver.solve();

        let solution = &solver.solution;
        let iterations = solution.iterations as usize;
        let status = match solution.status {
            SolverStatus::Solved => SolveStatus::Solved,
            SolverStatus::AlmostSolved => SolveStatus::AlmostSolved,
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                return Err(SolverError::PrimalInfeasible { iterations });
            }
            SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
                return Err(SolverError::DualInfeasible { iterations });
            }
            SolverStatus::MaxIterations => {
                return Err(SolverError::MaxIterations {
                    iterations,
                    primal: solution.r_prim,
                    dual: solution.r_dual,
                });
            }
            other => return Err(SolverError::Numerical(format!("{other:?}"))),
        };

        let system = &problem.constraints;
        let x: Array1<f64> = solution
            .x
            .iter()
            .enumerate()
            .map(|(i, v)| v.max(system.lower[i]).min(system.upper[i]))
            .collect();
        let objective = problem.objective(&x);
        Ok(QpSolution {
            x,
            status,
            iterations,
            objective,
        })
    }
}
