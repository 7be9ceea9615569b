//! Score constructors.
//!
//! Scores are computed independently within each date. Two kinds exist with
//! different contracts:
//! - [`ZScore`]: drops rows without a signal value, then standardizes within
//!   the date (mean 0, sample std 1). A date whose signals have no dispersion
//!   (identical values or a single asset) scores every asset `0.0`.
//! - [`UniformScore`]: `1.0` when a signal value is present and `0.0`
//!   otherwise. No normalization property holds.

use polars::prelude::*;
use tavira_traits::stats::standardize;
use tavira_traits::types::{date_values, f64_values};
use tavira_traits::{Result, Score, ScoreConstructor, Signal};

/// Cross-sectional z-score within each date.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZScore;

impl ScoreConstructor for ZScore {
    fn name(&self) -> &str {
        "z_score"
    }

    fn score(&self, signal: &Signal) -> Result<Score> {
        let mut df = signal
            .data()
            .clone()
            .lazy()
            .filter(col("signal").is_not_null().and(col("signal").is_not_nan()))
            .sort(
                ["date", "asset_id"],
                SortMultipleOptions::new().with_maintain_order(true),
            )
            .collect()?;

        let dates = date_values(&df, "date")?;
        let values = f64_values(&df, "signal")?;
        let mut scores = Vec::with_capacity(values.len());
        let mut offset = 0;
        for cross_section in dates.chunk_by(|a, b| a == b) {
            let end = offset + cross_section.len();
            let (z, _) = standardize(&values[offset..end]);
            scores.extend(z);
            offset = end;
        }
        df.with_column(Column::new("score".into(), scores))?;

        let df = df
            .lazy()
            .select([col("date"), col("asset_id"), col("score")])
            .sort(
                ["asset_id", "date"],
                SortMultipleOptions::new().with_maintain_order(true),
            )
            .collect()?;

        Score::new(df)
    }
}

/// Presence indicator: every asset with a signal gets the same score.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformScore;

impl ScoreConstructor for UniformScore {
    fn name(&self) -> &str {
        "uniform"
    }

    fn score(&self, signal: &Signal) -> Result<Score> {
        let df = signal
            .data()
            .clone()
            .lazy()
            .with_column(
                when(col("signal").is_not_null())
                    .then(lit(1.0))
                    .otherwise(lit(0.0))
                    .cast(DataType::Float64)
                    .alias("score"),
            )
            .select([col("date"), col("asset_id"), col("score")])
            .sort(
                ["asset_id", "date"],
                SortMultipleOptions::new().with_maintain_order(true),
            )
            .collect()?;

        Score::new(df)
    }
}
