//! Portfolio constraints.
//!
//! A [`Constraint`] is a closed set of named kinds. Each kind expands, for a
//! given period, into one or more [`LinearConstraint`]s over the weight
//! vector. A strategy's constraints are combined by concatenation into a
//! [`ConstraintSystem`], which is what the solver consumes.

use derive_more::Display;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use tavira_traits::{AssetId, Date, Result, TaviraError};

/// Bounds closer than this are considered equal when checking for crossings.
const BOUND_TOLERANCE: f64 = 1e-12;

/// A named portfolio constraint.
#[derive(Debug, Clone, PartialEq, Display, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Constraint {
    /// Weights sum to one.
    #[display("full_investment")]
    FullInvestment,
    /// Weights sum to zero (dollar neutral).
    #[display("zero_investment")]
    ZeroInvestment,
    /// Every weight is at most one.
    #[display("no_buying_on_margin")]
    NoBuyingOnMargin,
    /// Every weight is non-negative.
    #[display("long_only")]
    LongOnly,
    /// Every weight is at least minus one.
    #[display("shorting_limit")]
    ShortingLimit,
    /// Every weight is at most `limit` in absolute value.
    #[display("max_weight({limit})")]
    MaxWeight {
        /// Position cap, must be positive.
        limit: f64,
    },
    /// Beta-weighted sum of weights equals `target`.
    #[display("beta_target({target})")]
    BetaTarget {
        /// Target portfolio beta.
        target: f64,
    },
    /// The listed assets must hold zero weight.
    #[display("zero_holding({})", asset_ids.join(","))]
    ZeroHolding {
        /// Assets forced to zero.
        asset_ids: Vec<AssetId>,
    },
}

impl Constraint {
    /// Unit portfolio beta.
    pub const fn unit_beta() -> Self {
        Self::BetaTarget { target: 1.0 }
    }

    /// Zero portfolio beta (market neutral).
    pub const fn zero_beta() -> Self {
        Self::BetaTarget { target: 0.0 }
    }

    /// Whether this constraint needs predicted betas in its context.
    pub const fn requires_betas(&self) -> bool {
        matches!(self, Self::BetaTarget { .. })
    }

    /// Expands the constraint for one period.
    ///
    /// # Errors
    ///
    /// Returns [`TaviraError::InsufficientData`] when a beta constraint is
    /// built without betas, and [`TaviraError::InvalidData`] for a
    /// non-positive weight cap.
    pub fn construct(&self, ctx: &ConstraintContext<'_>) -> Result<Vec<LinearConstraint>> {
        let n = ctx.len();
        let constraint = match self {
            Self::FullInvestment => LinearConstraint::equality(Array1::ones(n), 1.0),
            Self::ZeroInvestment => LinearConstraint::equality(Array1::ones(n), 0.0),
            Self::NoBuyingOnMargin => LinearConstraint::Bounds {
                lower: Array1::from_elem(n, f64::NEG_INFINITY),
                upper: Array1::ones(n),
            },
            Self::LongOnly => LinearConstraint::Bounds {
                lower: Array1::zeros(n),
                upper: Array1::from_elem(n, f64::INFINITY),
            },
            Self::ShortingLimit => LinearConstraint::Bounds {
                lower: Array1::from_elem(n, -1.0),
                upper: Array1::from_elem(n, f64::INFINITY),
            },
            Self::MaxWeight { limit } => {
                if !limit.is_finite() || *limit <= 0.0 {
                    return Err(TaviraError::InvalidData(format!(
                        "max weight must be positive, got {limit}"
                    )));
                }
                LinearConstraint::Bounds {
                    lower: Array1::from_elem(n, -limit),
                    upper: Array1::from_elem(n, *limit),
                }
            }
            Self::BetaTarget { target } => {
                let betas = ctx.betas.as_ref().ok_or_else(|| {
                    TaviraError::InsufficientData(format!(
                        "{self} needs predicted betas{}",
                        ctx.date.map(|d| format!(" on {d}")).unwrap_or_default()
                    ))
                })?;
                LinearConstraint::equality(betas.clone(), *target)
            }
            Self::ZeroHolding { asset_ids } => {
                let held: HashSet<&str> = asset_ids.iter().map(String::as_str).collect();
                let mut lower = Array1::from_elem(n, f64::NEG_INFINITY);
                let mut upper = Array1::from_elem(n, f64::INFINITY);
                for (i, id) in ctx.asset_ids.iter().enumerate() {
                    if held.contains(id.as_str()) {
                        lower[i] = 0.0;
                        upper[i] = 0.0;
                    }
                }
                LinearConstraint::Bounds { lower, upper }
            }
        };
        Ok(vec![constraint])
    }
}

impl FromStr for Constraint {
    type Err = TaviraError;

    /// Parses the command-line spelling of a constraint.
    ///
    /// Accepts `full-investment`, `zero-investment`, `no-buying-on-margin`,
    /// `long-only`, `shorting-limit`, `unit-beta`, `zero-beta`,
    /// `beta=<x>` and `max-weight=<x>`; underscores may replace hyphens.
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        let parse_value = |v: &str| {
            v.trim()
                .parse::<f64>()
                .map_err(|_| TaviraError::InvalidData(format!("invalid constraint value in '{s}'")))
        };
        if let Some((key, value)) = normalized.split_once('=') {
            return match key {
                "beta" | "beta-target" => Ok(Self::BetaTarget {
                    target: parse_value(value)?,
                }),
                "max-weight" => Ok(Self::MaxWeight {
                    limit: parse_value(value)?,
                }),
                _ => Err(TaviraError::InvalidData(format!("unknown constraint: {s}"))),
            };
        }
        match normalized.as_str() {
            "full-investment" => Ok(Self::FullInvestment),
            "zero-investment" | "dollar-neutral" => Ok(Self::ZeroInvestment),
            "no-buying-on-margin" => Ok(Self::NoBuyingOnMargin),
            "long-only" => Ok(Self::LongOnly),
            "shorting-limit" => Ok(Self::ShortingLimit),
            "unit-beta" => Ok(Self::unit_beta()),
            "zero-beta" => Ok(Self::zero_beta()),
            _ => Err(TaviraError::InvalidData(format!("unknown constraint: {s}"))),
        }
    }
}

/// One linear condition over the weight vector `w`.
#[derive(Debug, Clone, PartialEq)]
pub enum LinearConstraint {
    /// `lower ≤ coefficientsᵀ w ≤ upper`.
    Row {
        /// Coefficient per asset.
        coefficients: Array1<f64>,
        /// Lower bound, may be `-∞`.
        lower: f64,
        /// Upper bound, may be `+∞`.
        upper: f64,
    },
    /// Elementwise `lower ≤ w ≤ upper`.
    Bounds {
        /// Per-asset lower bounds.
        lower: Array1<f64>,
        /// Per-asset upper bounds.
        upper: Array1<f64>,
    },
}

impl LinearConstraint {
    /// `coefficientsᵀ w = value`.
    pub fn equality(coefficients: Array1<f64>, value: f64) -> Self {
        Self::Row {
            coefficients,
            lower: value,
            upper: value,
        }
    }
}

/// Per-period inputs a constraint may need.
#[derive(Debug, Clone)]
pub struct ConstraintContext<'a> {
    /// Rebalance date, used in diagnostics.
    pub date: Option<Date>,
    /// Assets in optimizer order.
    pub asset_ids: &'a [AssetId],
    /// Predicted betas aligned with `asset_ids`, already imputed.
    pub betas: Option<Array1<f64>>,
}

impl<'a> ConstraintContext<'a> {
    /// Context without auxiliary data.
    pub const fn new(asset_ids: &'a [AssetId]) -> Self {
        Self {
            date: None,
            asset_ids,
            betas: None,
        }
    }

    /// Sets the rebalance date.
    pub fn with_date(mut self, date: Date) -> Self {
        self.date = Some(date);
        self
    }

    /// Attaches raw betas, imputing missing entries with the cross-sectional
    /// mean. If no beta is available at all the context stays without betas.
    ///
    /// # Errors
    ///
    /// Returns [`TaviraError::DimensionMismatch`] when `betas` is not aligned
    /// with the asset list.
    pub fn with_betas(mut self, betas: &[Option<f64>]) -> Result<Self> {
        if betas.len() != self.asset_ids.len() {
            return Err(TaviraError::DimensionMismatch {
                expected: self.asset_ids.len(),
                actual: betas.len(),
            });
        }
        self.betas = impute_betas(betas);
        Ok(self)
    }

    /// Number of assets.
    pub const fn len(&self) -> usize {
        self.asset_ids.len()
    }

    /// Whether the context has no assets.
    pub const fn is_empty(&self) -> bool {
        self.asset_ids.is_empty()
    }
}

/// Fills missing or non-finite betas with the mean of the finite ones.
///
/// Returns `None` when no finite beta is present.
pub fn impute_betas(betas: &[Option<f64>]) -> Option<Array1<f64>> {
    let present: Vec<f64> = betas.iter().flatten().copied().filter(|b| b.is_finite()).collect();
    if present.is_empty() {
        return None;
    }
    let mean = present.iter().sum::<f64>() / present.len() as f64;
    Some(
        betas
            .iter()
            .map(|b| b.filter(|v| v.is_finite()).unwrap_or(mean))
            .collect(),
    )
}

/// Every constraint of a period, stacked into solver form.
///
/// General rows satisfy `row_lower ≤ rows · w ≤ row_upper`; variable bounds
/// are the intersection of all [`LinearConstraint::Bounds`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintSystem {
    /// General constraint matrix (m x n).
    pub rows: Array2<f64>,
    /// Row lower bounds.
    pub row_lower: Array1<f64>,
    /// Row upper bounds.
    pub row_upper: Array1<f64>,
    /// Variable lower bounds.
    pub lower: Array1<f64>,
    /// Variable upper bounds.
    pub upper: Array1<f64>,
}

impl ConstraintSystem {
    /// An unconstrained system over `n` variables.
    pub fn unconstrained(n: usize) -> Self {
        Self {
            rows: Array2::zeros((0, n)),
            row_lower: Array1::zeros(0),
            row_upper: Array1::zeros(0),
            lower: Array1::from_elem(n, f64::NEG_INFINITY),
            upper: Array1::from_elem(n, f64::INFINITY),
        }
    }

    /// Expands and concatenates `constraints` for the period in `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`TaviraError::Infeasible`], tagged with the period date, when
    /// bounds cross, and any error raised by [`Constraint::construct`].
    pub fn assemble(ctx: &ConstraintContext<'_>, constraints: &[Constraint]) -> Result<Self> {
        let mut linear = Vec::new();
        for constraint in constraints {
            linear.extend(constraint.construct(ctx)?);
        }
        Self::from_linear(ctx.len(), &linear).map_err(|err| match err {
            TaviraError::Infeasible { reason, .. } => TaviraError::Infeasible {
                date: ctx.date,
                reason,
            },
            other => other,
        })
    }

    /// Stacks already expanded constraints over `n` variables.
    ///
    /// # Errors
    ///
    /// Returns [`TaviraError::DimensionMismatch`] for a constraint of the
    /// wrong length and [`TaviraError::Infeasible`] for crossing bounds.
    pub fn from_linear(n: usize, constraints: &[LinearConstraint]) -> Result<Self> {
        let mut system = Self::unconstrained(n);
        let mut rows: Vec<&Array1<f64>> = Vec::new();
        let mut row_lower = Vec::new();
        let mut row_upper = Vec::new();

        for constraint in constraints {
            match constraint {
                LinearConstraint::Row {
                    coefficients,
                    lower,
                    upper,
                } => {
                    check_len(n, coefficients.len())?;
                    if *lower > *upper + BOUND_TOLERANCE {
                        return Err(TaviraError::Infeasible {
                            date: None,
                            reason: format!("row bounds cross: {lower} > {upper}"),
                        });
                    }
                    rows.push(coefficients);
                    row_lower.push(*lower);
                    row_upper.push(*upper);
                }
                LinearConstraint::Bounds { lower, upper } => {
                    check_len(n, lower.len())?;
                    check_len(n, upper.len())?;
                    for i in 0..n {
                        system.lower[i] = system.lower[i].max(lower[i]);
                        system.upper[i] = system.upper[i].min(upper[i]);
                    }
                }
            }
        }

        for i in 0..n {
            if system.lower[i] > system.upper[i] + BOUND_TOLERANCE {
                return Err(TaviraError::Infeasible {
                    date: None,
                    reason: format!(
                        "bounds cross for asset {i}: {} > {}",
                        system.lower[i], system.upper[i]
                    ),
                });
            }
            if system.lower[i] > system.upper[i] {
                system.upper[i] = system.lower[i];
            }
        }

        let mut matrix = Array2::zeros((rows.len(), n));
        for (r, coefficients) in rows.iter().enumerate() {
            matrix.row_mut(r).assign(coefficients);
        }
        system.rows = matrix;
        system.row_lower = Array1::from(row_lower);
        system.row_upper = Array1::from(row_upper);
        Ok(system)
    }

    /// Number of variables.
    pub fn num_vars(&self) -> usize {
        self.lower.len()
    }

    /// Number of general rows.
    pub fn num_rows(&self) -> usize {
        self.rows.nrows()
    }

    /// Largest violation of any row or bound at `w`.
    pub fn max_violation(&self, w: &Array1<f64>) -> f64 {
        let ax = self.rows.dot(w);
        let rows = ax
            .iter()
            .zip(self.row_lower.iter().zip(self.row_upper.iter()))
            .map(|(v, (l, u))| (l - v).max(v - u).max(0.0));
        let bounds = w
            .iter()
            .zip(self.lower.iter().zip(self.upper.iter()))
            .map(|(v, (l, u))| (l - v).max(v - u).max(0.0));
        rows.chain(bounds).fold(0.0, f64::max)
    }

    /// Whether `w` satisfies every condition within `tol`.
    pub fn is_satisfied(&self, w: &Array1<f64>, tol: f64) -> bool {
        w.len() == self.num_vars() && self.max_violation(w) <= tol
    }
}

fn check_len(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(TaviraError::DimensionMismatch { expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use rstest::rstest;

    fn ids(names: &[&str]) -> Vec<AssetId> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_full_investment_row() {
        let assets = ids(&["A", "B", "C"]);
        let ctx = ConstraintContext::new(&assets);
        let built = Constraint::FullInvestment.construct(&ctx).unwrap();
        assert_eq!(built, vec![LinearConstraint::equality(array![1.0, 1.0, 1.0], 1.0)]);
    }

    #[test]
    fn test_missing_beta_imputed_with_mean() {
        let assets = ids(&["A", "B", "C"]);
        let ctx = ConstraintContext::new(&assets)
            .with_betas(&[Some(1.0), None, Some(1.4)])
            .unwrap();
        let built = Constraint::unit_beta().construct(&ctx).unwrap();
        let LinearConstraint::Row {
            coefficients,
            lower,
            upper,
        } = &built[0]
        else {
            panic!("expected a row");
        };
        assert_relative_eq!(coefficients[1], 1.2, epsilon = 1e-12);
        assert_eq!((*lower, *upper), (1.0, 1.0));
    }

    #[test]
    fn test_zero_beta_target() {
        let assets = ids(&["A", "B"]);
        let ctx = ConstraintContext::new(&assets)
            .with_betas(&[Some(0.8), Some(1.1)])
            .unwrap();
        let built = Constraint::zero_beta().construct(&ctx).unwrap();
        assert_eq!(built, vec![LinearConstraint::equality(array![0.8, 1.1], 0.0)]);
    }

    #[test]
    fn test_beta_constraint_without_betas() {
        let assets = ids(&["A"]);
        let ctx = ConstraintContext::new(&assets).with_betas(&[None]).unwrap();
        assert!(ctx.betas.is_none());
        let err = Constraint::unit_beta().construct(&ctx).unwrap_err();
        assert!(err.is_period_recoverable());
    }

    #[test]
    fn test_misaligned_betas() {
        let assets = ids(&["A", "B"]);
        assert!(matches!(
            ConstraintContext::new(&assets).with_betas(&[Some(1.0)]),
            Err(TaviraError::DimensionMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_impute_betas_ignores_nan() {
        let imputed = impute_betas(&[Some(f64::NAN), Some(2.0), None]).unwrap();
        assert_eq!(imputed, array![2.0, 2.0, 2.0]);
        assert!(impute_betas(&[None, None]).is_none());
    }

    #[test]
    fn test_bounds_intersect() {
        let assets = ids(&["A", "B"]);
        let ctx = ConstraintContext::new(&assets);
        let system = ConstraintSystem::assemble(
            &ctx,
            &[
                Constraint::LongOnly,
                Constraint::NoBuyingOnMargin,
                Constraint::MaxWeight { limit: 0.6 },
                Constraint::FullInvestment,
            ],
        )
        .unwrap();
        assert_eq!(system.lower, array![0.0, 0.0]);
        assert_eq!(system.upper, array![0.6, 0.6]);
        assert_eq!(system.num_rows(), 1);
        assert!(system.is_satisfied(&array![0.5, 0.5], 1e-12));
        assert!(!system.is_satisfied(&array![0.7, 0.3], 1e-12));
    }

    #[test]
    fn test_zero_holding() {
        let assets = ids(&["A", "B", "C"]);
        let ctx = ConstraintContext::new(&assets);
        let system = ConstraintSystem::assemble(
            &ctx,
            &[Constraint::ZeroHolding {
                asset_ids: ids(&["B", "Z"]),
            }],
        )
        .unwrap();
        assert_eq!(system.lower[1], 0.0);
        assert_eq!(system.upper[1], 0.0);
        assert_eq!(system.lower[0], f64::NEG_INFINITY);
        assert_eq!(system.upper[2], f64::INFINITY);
    }

    #[test]
    fn test_crossing_bounds_infeasible() {
        let crossing = ConstraintSystem::from_linear(
            1,
            &[
                LinearConstraint::Bounds {
                    lower: array![0.2],
                    upper: array![1.0],
                },
                LinearConstraint::Bounds {
                    lower: array![-1.0],
                    upper: array![0.1],
                },
            ],
        );
        assert!(matches!(crossing, Err(TaviraError::Infeasible { .. })));

        let row = ConstraintSystem::from_linear(
            1,
            &[LinearConstraint::Row {
                coefficients: array![1.0],
                lower: 1.0,
                upper: 0.0,
            }],
        );
        assert!(matches!(row, Err(TaviraError::Infeasible { .. })));
    }

    #[test]
    fn test_touching_bounds_are_feasible() {
        let assets = ids(&["A"]);
        let system = ConstraintSystem::assemble(
            &ConstraintContext::new(&assets),
            &[
                Constraint::LongOnly,
                Constraint::ZeroHolding {
                    asset_ids: ids(&["A"]),
                },
                Constraint::MaxWeight { limit: 0.5 },
            ],
        )
        .unwrap();
        assert_eq!((system.lower[0], system.upper[0]), (0.0, 0.0));
    }

    #[test]
    fn test_invalid_max_weight() {
        let assets = ids(&["A"]);
        let date = Date::from_ymd_opt(2024, 1, 31).unwrap();
        let ctx = ConstraintContext::new(&assets).with_date(date);
        assert!(matches!(
            ConstraintSystem::assemble(&ctx, &[Constraint::MaxWeight { limit: -1.0 }]),
            Err(TaviraError::InvalidData(_))
        ));
    }

    #[test]
    fn test_row_length_mismatch() {
        let result = ConstraintSystem::from_linear(2, &[LinearConstraint::equality(array![1.0], 1.0)]);
        assert!(matches!(
            result,
            Err(TaviraError::DimensionMismatch { expected: 2, actual: 1 })
        ));
    }

    #[rstest]
    #[case("full-investment", Constraint::FullInvestment)]
    #[case("long_only", Constraint::LongOnly)]
    #[case("Zero-Investment", Constraint::ZeroInvestment)]
    #[case("no-buying-on-margin", Constraint::NoBuyingOnMargin)]
    #[case("shorting-limit", Constraint::ShortingLimit)]
    #[case("unit-beta", Constraint::BetaTarget { target: 1.0 })]
    #[case("zero-beta", Constraint::BetaTarget { target: 0.0 })]
    #[case("beta=0.5", Constraint::BetaTarget { target: 0.5 })]
    #[case("max-weight=0.1", Constraint::MaxWeight { limit: 0.1 })]
    fn test_parse(#[case] input: &str, #[case] expected: Constraint) {
        assert_eq!(input.parse::<Constraint>().unwrap(), expected);
    }

    #[rstest]
    #[case("leverage")]
    #[case("beta=abc")]
    #[case("sector=0.2")]
    fn test_parse_rejects(#[case] input: &str) {
        assert!(input.parse::<Constraint>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Constraint::unit_beta().to_string(), "beta_target(1)");
        let holding = Constraint::ZeroHolding {
            asset_ids: ids(&["A", "B"]),
        };
        assert_eq!(holding.to_string(), "zero_holding(A,B)");
        assert!(Constraint::unit_beta().requires_betas());
        assert!(!Constraint::LongOnly.requires_betas());
    }
}
