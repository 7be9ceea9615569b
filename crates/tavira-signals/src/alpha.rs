//! Alpha constructors.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tavira_traits::{Alpha, AlphaConstructor, Result, RiskUnits, Score, TotalRisk};

/// Default information coefficient.
pub const DEFAULT_IC: f64 = 0.05;

/// Grinold–Kahn alpha: `alpha = IC · volatility · score`.
///
/// Scores are left-joined against the total risk forecast. Rows without a
/// forecast get an alpha of exactly `0.0`, so the output covers every scored
/// `(date, asset_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrinoldKahn {
    /// Information coefficient.
    pub ic: f64,
    /// Units of the `total_risk` column.
    pub units: RiskUnits,
}

impl Default for GrinoldKahn {
    fn default() -> Self {
        Self {
            ic: DEFAULT_IC,
            units: RiskUnits::default(),
        }
    }
}

impl GrinoldKahn {
    /// Creates the constructor with an explicit IC.
    #[must_use]
    pub const fn new(ic: f64, units: RiskUnits) -> Self {
        Self { ic, units }
    }
}

impl AlphaConstructor for GrinoldKahn {
    fn name(&self) -> &str {
        "grinold_kahn"
    }

    fn alpha(&self, score: &Score, risk: &TotalRisk) -> Result<Alpha> {
        let vols = risk
            .data()
            .clone()
            .lazy()
            .select([col("date"), col("asset_id"), col("total_risk")]);

        let scale = self.ic * self.units.volatility_scale();
        let df = score
            .data()
            .clone()
            .lazy()
            .join(
                vols,
                [col("date"), col("asset_id")],
                [col("date"), col("asset_id")],
                JoinArgs::new(JoinType::Left),
            )
            .with_column(
                (lit(scale) * col("total_risk") * col("score"))
                    .fill_nan(lit(0.0))
                    .fill_null(lit(0.0))
                    .alias("alpha"),
            )
            .select([col("date"), col("asset_id"), col("alpha")])
            .sort(
                ["date", "asset_id"],
                SortMultipleOptions::new().with_maintain_order(true),
            )
            .collect()?;

        Alpha::new(df)
    }
}

/// Constant alpha for every scored row.
///
/// With zero this turns the mean-variance optimizer into a minimum-variance
/// optimizer under the strategy's constraints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticAlpha {
    /// Alpha assigned to every row.
    pub value: f64,
}

impl AlphaConstructor for StaticAlpha {
    fn name(&self) -> &str {
        "static"
    }

    fn alpha(&self, score: &Score, _risk: &TotalRisk) -> Result<Alpha> {
        let df = score
            .data()
            .clone()
            .lazy()
            .with_column(lit(self.value).alias("alpha"))
            .select([col("date"), col("asset_id"), col("alpha")])
            .sort(
                ["date", "asset_id"],
                SortMultipleOptions::new().with_maintain_order(true),
            )
            .collect()?;

        Alpha::new(df)
    }
}
