//! Risk model assembly configuration.

use serde::{Deserialize, Serialize};
use tavira_traits::RiskUnits;

/// How to treat an asset with no specific-risk estimate on a date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecificRiskPolicy {
    /// Keep the asset with zero idiosyncratic variance.
    #[default]
    FillZero,
    /// Remove the asset from the covariance matrix and hence from the period.
    DropAsset,
}

/// Configuration of the [`RiskModelAssembler`](crate::RiskModelAssembler).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Units of the vendor covariance and specific-risk figures.
    pub units: RiskUnits,
    /// Treatment of missing specific risk.
    pub specific_risk: SpecificRiskPolicy,
    /// Factors excluded from both exposures and factor covariance.
    pub omitted_factors: Vec<String>,
}

impl RiskConfig {
    /// Returns a copy with `factors` omitted.
    #[must_use]
    pub fn with_omitted_factors<I, S>(mut self, factors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.omitted_factors = factors.into_iter().map(Into::into).collect();
        self
    }

    /// Returns a copy with the given specific-risk policy.
    #[must_use]
    pub const fn with_specific_risk(mut self, policy: SpecificRiskPolicy) -> Self {
        self.specific_risk = policy;
        self
    }

    /// Whether `factor` is omitted.
    pub fn is_omitted(&self, factor: &str) -> bool {
        self.omitted_factors.iter().any(|f| f == factor)
    }
}
