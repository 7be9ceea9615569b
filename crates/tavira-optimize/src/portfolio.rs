//! Portfolio construction for a single rebalance date.

use crate::constraint::{Constraint, ConstraintContext, ConstraintSystem};
use crate::optimizer::MeanVarianceOptimizer;
use crate::solver::SolverSettings;
use ndarray::Array1;
use polars::prelude::*;
use std::collections::HashMap;
use tavira_risk::RiskModelAssembler;
use tavira_traits::types::date_column;
use tavira_traits::{AssetId, Date, Portfolio, Result, TaviraError};
use tracing::debug;

/// Everything a constructor needs for one rebalance date.
///
/// Owned so it can be moved into a worker.
#[derive(Debug, Clone)]
pub struct PeriodInput {
    /// Rebalance date.
    pub date: Date,
    /// Eligible assets with an alpha.
    pub asset_ids: Vec<AssetId>,
    /// Alpha per asset, aligned with `asset_ids`.
    pub alphas: Vec<f64>,
    /// Predicted beta per asset, aligned with `asset_ids`.
    pub betas: Vec<Option<f64>>,
}

impl PeriodInput {
    /// Creates an input without betas.
    ///
    /// # Errors
    ///
    /// Returns [`TaviraError::DimensionMismatch`] if `alphas` is not aligned
    /// with `asset_ids`.
    pub fn new(date: Date, asset_ids: Vec<AssetId>, alphas: Vec<f64>) -> Result<Self> {
        if alphas.len() != asset_ids.len() {
            return Err(TaviraError::DimensionMismatch {
                expected: asset_ids.len(),
                actual: alphas.len(),
            });
        }
        let betas = vec![None; asset_ids.len()];
        Ok(Self {
            date,
            asset_ids,
            alphas,
            betas,
        })
    }

    /// Attaches predicted betas.
    ///
    /// # Errors
    ///
    /// Returns [`TaviraError::DimensionMismatch`] if `betas` is not aligned
    /// with the assets.
    pub fn with_betas(mut self, betas: Vec<Option<f64>>) -> Result<Self> {
        if betas.len() != self.asset_ids.len() {
            return Err(TaviraError::DimensionMismatch {
                expected: self.asset_ids.len(),
                actual: betas.len(),
            });
        }
        self.betas = betas;
        Ok(self)
    }

    /// Number of assets.
    pub fn len(&self) -> usize {
        self.asset_ids.len()
    }

    /// Whether the period has no assets.
    pub fn is_empty(&self) -> bool {
        self.asset_ids.is_empty()
    }
}

/// Turns a period's alphas into portfolio weights.
pub trait PortfolioConstructor: Send + Sync {
    /// Display name.
    fn name(&self) -> &str;

    /// Builds the portfolio for `input.date`.
    ///
    /// # Errors
    ///
    /// Period-scoped failures (missing risk data, infeasible constraints,
    /// solver failures) are reported as recoverable
    /// [`TaviraError`]s.
    fn construct(
        &self,
        input: &PeriodInput,
        risk: &RiskModelAssembler,
        constraints: &[Constraint],
    ) -> Result<Portfolio>;
}

/// Mean-variance efficient portfolio under the factor risk model.
#[derive(Debug, Clone, Default)]
pub struct MeanVarianceEfficient {
    optimizer: MeanVarianceOptimizer,
}

impl MeanVarianceEfficient {
    /// Creates the constructor with risk aversion `γ`.
    pub fn new(risk_aversion: f64) -> Self {
        Self {
            optimizer: MeanVarianceOptimizer::new(risk_aversion),
        }
    }

    /// Replaces the solver settings.
    pub fn with_settings(mut self, settings: SolverSettings) -> Self {
        self.optimizer = self.optimizer.with_settings(settings);
        self
    }

    /// The underlying optimizer.
    pub const fn optimizer(&self) -> &MeanVarianceOptimizer {
        &self.optimizer
    }
}

impl PortfolioConstructor for MeanVarianceEfficient {
    fn name(&self) -> &str {
        "mve"
    }

    fn construct(
        &self,
        input: &PeriodInput,
        risk: &RiskModelAssembler,
        constraints: &[Constraint],
    ) -> Result<Portfolio> {
        let date = input.date;
        if input.is_empty() {
            return Err(TaviraError::InsufficientData(format!("no assets to optimize on {date}")));
        }

        let covariance = risk.build_covariance(date, &input.asset_ids)?;
        if covariance.is_empty() {
            return Err(TaviraError::InsufficientData(format!(
                "no assets left after risk model assembly on {date}"
            )));
        }

        // The matrix is sorted by asset id and may have dropped assets.
        let position: HashMap<&str, usize> = input
            .asset_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        let rows: Vec<usize> = covariance
            .asset_ids()
            .iter()
            .filter_map(|id| position.get(id.as_str()).copied())
            .collect();
        let alphas: Array1<f64> = rows.iter().map(|&i| input.alphas[i]).collect();
        let betas: Vec<Option<f64>> = rows.iter().map(|&i| input.betas[i]).collect();

        let ctx = ConstraintContext::new(covariance.asset_ids())
            .with_date(date)
            .with_betas(&betas)?;
        let system = ConstraintSystem::assemble(&ctx, constraints)?;

        let solution = self
            .optimizer
            .optimize(&alphas, covariance.matrix(), &system)
            .map_err(|err| on_date(err.into(), date))?;
        debug!(
            %date,
            assets = covariance.len(),
            iterations = solution.iterations,
            "portfolio constructed"
        );

        let n = covariance.len();
        let df = DataFrame::new(vec![
            date_column("date", &vec![date; n]),
            Column::new("asset_id".into(), covariance.asset_ids()),
            Column::new("weight".into(), solution.weights.to_vec()),
        ])?;
        Portfolio::new(df)
    }
}

/// Number of quantile bins used by [`DecilePortfolio`].
pub const DECILES: usize = 10;

const DECILE_TOLERANCE: f64 = 1e-9;

/// Equal-weight portfolio of one alpha decile.
///
/// Each date's alphas are cut at their linearly interpolated quantiles into
/// [`DECILES`] bins, right-closed, so ties share a bin. Every asset in the
/// chosen bin gets weight `1 / k`. The risk model is not consulted. The
/// constraints are checked against the resulting weights and a violation
/// is reported as infeasible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecilePortfolio {
    decile: usize,
}

impl Default for DecilePortfolio {
    fn default() -> Self {
        Self::top()
    }
}

impl DecilePortfolio {
    /// The highest-alpha decile.
    pub const fn top() -> Self {
        Self { decile: DECILES - 1 }
    }

    /// The lowest-alpha decile.
    pub const fn bottom() -> Self {
        Self { decile: 0 }
    }

    /// Decile `decile`, counted from zero at the lowest alphas.
    ///
    /// # Errors
    ///
    /// Returns [`TaviraError::InvalidData`] unless `decile < DECILES`.
    pub fn new(decile: usize) -> Result<Self> {
        if decile >= DECILES {
            return Err(TaviraError::InvalidData(format!(
                "decile must be below {DECILES}, got {decile}"
            )));
        }
        Ok(Self { decile })
    }

    /// The selected decile.
    pub const fn decile(&self) -> usize {
        self.decile
    }
}

/// Bin of every value under a right-closed quantile cut into `bins` bins.
fn quantile_bins(values: &[f64], bins: usize) -> Vec<usize> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let last = sorted.len().saturating_sub(1);
    let breaks: Vec<f64> = (1..bins)
        .map(|k| {
            let h = last as f64 * k as f64 / bins as f64;
            let lo = h.floor() as usize;
            let hi = (lo + 1).min(last);
            sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
        })
        .collect();
    values
        .iter()
        .map(|v| breaks.iter().filter(|b| **b < *v).count())
        .collect()
}

impl PortfolioConstructor for DecilePortfolio {
    fn name(&self) -> &str {
        "decile"
    }

    fn construct(
        &self,
        input: &PeriodInput,
        _risk: &RiskModelAssembler,
        constraints: &[Constraint],
    ) -> Result<Portfolio> {
        let date = input.date;
        if input.is_empty() {
            return Err(TaviraError::InsufficientData(format!("no assets to bin on {date}")));
        }

        let bins = quantile_bins(&input.alphas, DECILES);
        let mut members: Vec<usize> = (0..input.len()).filter(|&i| bins[i] == self.decile).collect();
        if members.is_empty() {
            return Err(TaviraError::InsufficientData(format!(
                "decile {} is empty among {} assets on {date}",
                self.decile,
                input.len()
            )));
        }
        members.sort_by(|&a, &b| input.asset_ids[a].cmp(&input.asset_ids[b]));

        let ids: Vec<AssetId> = members.iter().map(|&i| input.asset_ids[i].clone()).collect();
        let betas: Vec<Option<f64>> = members.iter().map(|&i| input.betas[i]).collect();
        let weight = 1.0 / members.len() as f64;
        let weights = Array1::from_elem(members.len(), weight);

        let ctx = ConstraintContext::new(&ids).with_date(date).with_betas(&betas)?;
        let system = ConstraintSystem::assemble(&ctx, constraints)?;
        let violation = system.max_violation(&weights);
        if violation > DECILE_TOLERANCE {
            return Err(TaviraError::Infeasible {
                date: Some(date),
                reason: format!("equal-weight decile violates constraints by {violation:e}"),
            });
        }
        debug!(%date, decile = self.decile, assets = ids.len(), "decile portfolio");

        let n = ids.len();
        let df = DataFrame::new(vec![
            date_column("date", &vec![date; n]),
            Column::new("asset_id".into(), ids),
            Column::new("weight".into(), weights.to_vec()),
        ])?;
        Portfolio::new(df)
    }
}

fn on_date(err: TaviraError, date: Date) -> TaviraError {
    match err {
        TaviraError::Infeasible { date: None, reason } => TaviraError::Infeasible {
            date: Some(date),
            reason,
        },
        TaviraError::Solver(reason) => TaviraError::Solver(format!("{reason} on {date}")),
        other => other,
    }
}
