//! Betting-against-beta: prefer assets with low predicted beta.

use polars::prelude::*;
use tavira_traits::{History, Result, Signal, SignalConstructor};

/// Negated predicted beta, lagged one period per asset.
///
/// The beta forecast published for `t` is only used from `t + 1` on.
#[derive(Debug, Clone, Copy, Default)]
pub struct LowBeta;

impl LowBeta {
    /// Create a new low-beta signal.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SignalConstructor for LowBeta {
    fn name(&self) -> &str {
        "low_beta"
    }

    fn required_columns(&self) -> &[&str] {
        &["predicted_beta"]
    }

    fn lookback(&self) -> usize {
        1
    }

    fn signal(&self, history: &History) -> Result<Signal> {
        history.require(self.required_columns())?;

        let df = history
            .data()
            .clone()
            .lazy()
            .with_column(
                (lit(-1.0) * col("predicted_beta").shift(lit(1)).over([col("asset_id")]))
                    .alias("signal"),
            )
            .select([col("date"), col("asset_id"), col("signal")])
            .sort(
                ["asset_id", "date"],
                SortMultipleOptions::new().with_maintain_order(true),
            )
            .collect()?;

        Signal::new(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{history_with_betas, signal_values};

    #[test]
    fn test_low_beta_lags_and_negates() {
        let history = history_with_betas(&[("A", vec![Some(0.8), Some(1.1), None])]);
        let values = signal_values(&LowBeta.signal(&history).unwrap());
        assert_eq!(values, vec![None, Some(-0.8), Some(-1.1)]);
    }

    #[test]
    fn test_requires_beta_column() {
        let history = crate::test_support::history_for(&[("A", vec![0.01])]);
        assert!(LowBeta::new().signal(&history).is_err());
    }
}
