//! Risk Model Assembler
//!
//! Builds dense asset covariance matrices from a factor risk model:
//!
//! Σ = X · F · Xᵀ + Δ
//!
//! where:
//! - X = factor exposures (N x K), missing exposures are zero
//! - F = factor covariance (K x K), mirrored from its upper triangle
//! - Δ = diagonal of squared specific risk
//!
//! The per-date tables are fetched once into an immutable [`RiskSnapshot`].
//! Any number of asset subsets can then be assembled from the snapshot
//! without touching the provider again.

use crate::config::{RiskConfig, SpecificRiskPolicy};
use crate::covariance::CovarianceMatrix;
use ndarray::Array2;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tavira_traits::types::{opt_f64_values, str_values};
use tavira_traits::{AssetId, Date, Result, RiskModelProvider, TaviraError};
use tracing::debug;

/// Immutable factor risk model for one date.
#[derive(Debug, Clone)]
pub struct RiskSnapshot {
    date: Date,
    factors: Vec<String>,
    exposures: HashMap<AssetId, Vec<f64>>,
    factor_covariance: Array2<f64>,
    specific_risk: HashMap<AssetId, f64>,
    config: RiskConfig,
}

impl RiskSnapshot {
    /// Loads and pivots all risk tables for `date`.
    ///
    /// # Errors
    ///
    /// Returns [`TaviraError::MissingRiskData`] when the exposure or factor
    /// covariance table for `date` is empty.
    pub fn load(provider: &dyn RiskModelProvider, date: Date, config: &RiskConfig) -> Result<Self> {
        let exposures = provider.load_factor_exposures(date)?;
        if exposures.is_empty() {
            return Err(TaviraError::MissingRiskData {
                date,
                reason: "no factor exposures".to_string(),
            });
        }
        let covariances = provider.load_factor_covariances(date)?;
        if covariances.is_empty() {
            return Err(TaviraError::MissingRiskData {
                date,
                reason: "no factor covariances".to_string(),
            });
        }
        let specific = provider.load_specific_risk(date)?;

        let exp_assets = str_values(exposures.data(), "asset_id")?;
        let exp_factors = str_values(exposures.data(), "factor")?;
        let exp_values = opt_f64_values(exposures.data(), "exposure")?;

        let cov_f1 = str_values(covariances.data(), "factor_1")?;
        let cov_f2 = str_values(covariances.data(), "factor_2")?;
        let cov_values = opt_f64_values(covariances.data(), "covariance")?;

        // Canonical factor order: lexicographic over everything referenced.
        let factors: Vec<String> = exp_factors
            .iter()
            .chain(&cov_f1)
            .chain(&cov_f2)
            .filter(|f| !config.is_omitted(f))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if factors.is_empty() {
            return Err(TaviraError::MissingRiskData {
                date,
                reason: "every factor is omitted".to_string(),
            });
        }
        let index: HashMap<&str, usize> = factors
            .iter()
            .enumerate()
            .map(|(i, f)| (f.as_str(), i))
            .collect();
        let k = factors.len();

        let mut exposure_rows: HashMap<AssetId, Vec<f64>> = HashMap::new();
        for ((asset, factor), value) in exp_assets.into_iter().zip(&exp_factors).zip(exp_values) {
            let Some(&j) = index.get(factor.as_str()) else {
                continue;
            };
            let row = exposure_rows.entry(asset).or_insert_with(|| vec![0.0; k]);
            row[j] = value.filter(|v| v.is_finite()).unwrap_or(0.0);
        }

        let entries = cov_f1
            .iter()
            .zip(&cov_f2)
            .zip(&cov_values)
            .filter_map(|((f1, f2), value)| {
                let v = value.filter(|v| v.is_finite())?;
                Some((*index.get(f1.as_str())?, *index.get(f2.as_str())?, v))
            });
        let factor_covariance = mirror_upper(k, entries);

        let spec_assets = str_values(specific.data(), "asset_id")?;
        let spec_values = opt_f64_values(specific.data(), "specific_risk")?;
        let specific_risk = spec_assets
            .into_iter()
            .zip(spec_values)
            .filter_map(|(a, v)| v.filter(|x| x.is_finite()).map(|x| (a, x)))
            .collect();

        debug!(%date, factors = k, assets = exposure_rows.len(), "loaded risk snapshot");

        Ok(Self {
            date,
            factors,
            exposures: exposure_rows,
            factor_covariance,
            specific_risk,
            config: config.clone(),
        })
    }

    /// The snapshot date.
    pub const fn date(&self) -> Date {
        self.date
    }

    /// Factors in canonical order.
    pub fn factors(&self) -> &[String] {
        &self.factors
    }

    /// Symmetrized factor covariance in source units.
    pub const fn factor_covariance(&self) -> &Array2<f64> {
        &self.factor_covariance
    }

    /// Assembles the covariance matrix for `asset_ids`, in decimal units.
    ///
    /// The result is sorted by asset id. Under
    /// [`SpecificRiskPolicy::DropAsset`] it may cover fewer assets than
    /// requested.
    ///
    /// # Errors
    ///
    /// Fails on duplicate ids.
    pub fn covariance(&self, asset_ids: &[AssetId]) -> Result<CovarianceMatrix> {
        let mut seen = HashSet::with_capacity(asset_ids.len());
        if let Some(dup) = asset_ids.iter().find(|a| !seen.insert(a.as_str())) {
            return Err(TaviraError::InvalidData(format!(
                "duplicate asset id {dup} in covariance request for {}",
                self.date
            )));
        }

        let mut ids: Vec<AssetId> = asset_ids.to_vec();
        ids.sort_unstable();

        let missing_specific = ids
            .iter()
            .filter(|a| !self.specific_risk.contains_key(a.as_str()))
            .count();
        if missing_specific > 0 {
            match self.config.specific_risk {
                SpecificRiskPolicy::FillZero => {
                    debug!(date = %self.date, missing_specific, "specific risk filled with zero");
                }
                SpecificRiskPolicy::DropAsset => {
                    debug!(date = %self.date, missing_specific, "assets without specific risk dropped");
                    ids.retain(|a| self.specific_risk.contains_key(a.as_str()));
                }
            }
        }

        let n = ids.len();
        let k = self.factors.len();
        let zeros = vec![0.0; k];
        let mut x = Array2::<f64>::zeros((n, k));
        for (i, id) in ids.iter().enumerate() {
            let row = self.exposures.get(id).unwrap_or(&zeros);
            for (j, v) in row.iter().enumerate() {
                x[[i, j]] = *v;
            }
        }

        let mut sigma = x.dot(&self.factor_covariance).dot(&x.t());
        for (i, id) in ids.iter().enumerate() {
            let s = self.specific_risk.get(id).copied().unwrap_or(0.0);
            sigma[[i, i]] += s * s;
        }

        let sigma = (&sigma + &sigma.t()) * (0.5 * self.config.units.variance_scale());
        CovarianceMatrix::new(ids, sigma)
    }
}

/// Builds a `k × k` matrix from sparse `(row, col, value)` entries. For each
/// pair the upper-triangle entry wins and is mirrored; cells absent on both
/// sides are zero.
fn mirror_upper(k: usize, entries: impl IntoIterator<Item = (usize, usize, f64)>) -> Array2<f64> {
    let mut cells: Array2<Option<f64>> = Array2::from_elem((k, k), None);
    for (i, j, v) in entries {
        cells[[i, j]] = Some(v);
    }

    let mut out = Array2::<f64>::zeros((k, k));
    for i in 0..k {
        for j in i..k {
            let v = cells[[i, j]].or(cells[[j, i]]).unwrap_or(0.0);
            out[[i, j]] = v;
            out[[j, i]] = v;
        }
    }
    out
}

/// Assembles per-date covariance matrices from a shared risk model provider.
#[derive(Clone)]
pub struct RiskModelAssembler {
    provider: Arc<dyn RiskModelProvider>,
    config: RiskConfig,
}

impl fmt::Debug for RiskModelAssembler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RiskModelAssembler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RiskModelAssembler {
    /// Creates an assembler over `provider`.
    pub fn new(provider: Arc<dyn RiskModelProvider>, config: RiskConfig) -> Self {
        Self { provider, config }
    }

    /// The assembly configuration.
    pub const fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Fetches the immutable snapshot for `date`.
    pub fn snapshot(&self, date: Date) -> Result<RiskSnapshot> {
        RiskSnapshot::load(self.provider.as_ref(), date, &self.config)
    }

    /// Builds the covariance matrix for `asset_ids` on `date`.
    pub fn build_covariance(&self, date: Date, asset_ids: &[AssetId]) -> Result<CovarianceMatrix> {
        self.snapshot(date)?.covariance(asset_ids)
    }
}
