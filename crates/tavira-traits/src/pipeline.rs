//! Signal, score and alpha constructor traits.
//!
//! The three stages are pure transformations over whole histories. They run
//! once per backtest, before the per-period loop, and never look at the
//! rebalance schedule.

use crate::records::{Alpha, Score, Signal, TotalRisk};
use crate::{Result, TaviraError};
use polars::prelude::*;

/// Training history handed to signal constructors.
///
/// Holds the universe-filtered return and risk history, sorted by
/// `(asset_id, date)` so that per-asset window operations see each series
/// in time order. Always contains `date` and `asset_id`; other columns
/// depend on what was joined in.
#[derive(Debug, Clone)]
pub struct History {
    data: DataFrame,
}

impl History {
    /// Wraps a frame, sorting it by `(asset_id, date)`.
    ///
    /// # Errors
    ///
    /// Fails when `date` or `asset_id` is missing.
    pub fn new(data: DataFrame) -> Result<Self> {
        for name in ["date", "asset_id"] {
            if data.column(name).is_err() {
                return Err(TaviraError::MissingColumn(name.to_string()));
            }
        }
        let data = data.sort(
            ["asset_id", "date"],
            SortMultipleOptions::new().with_maintain_order(true),
        )?;
        Ok(Self { data })
    }

    /// Returns a reference to the underlying DataFrame.
    pub const fn data(&self) -> &DataFrame {
        &self.data
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.data.height()
    }

    /// Whether the history is empty.
    pub fn is_empty(&self) -> bool {
        self.data.height() == 0
    }

    /// Checks if a column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.data
            .get_column_names()
            .iter()
            .any(|s| s.as_str() == name)
    }

    /// Fails with [`TaviraError::MissingColumn`] for the first absent column.
    pub fn require(&self, columns: &[&str]) -> Result<()> {
        match columns.iter().find(|c| !self.has_column(c)) {
            Some(missing) => Err(TaviraError::MissingColumn((*missing).to_string())),
            None => Ok(()),
        }
    }
}

/// Derives one raw feature per `(date, asset_id)` from history.
///
/// Implementations must only use observations at or before each row's date
/// for the same asset, and leave the value null when the trailing window is
/// incomplete.
pub trait SignalConstructor: Send + Sync {
    /// Unique name used for logging and registry lookups.
    fn name(&self) -> &str;

    /// History columns the constructor reads besides `date` and `asset_id`.
    fn required_columns(&self) -> &[&str];

    /// Periods of history consumed before the first non-null value.
    fn lookback(&self) -> usize;

    /// Computes the signal table.
    fn signal(&self, history: &History) -> Result<Signal>;
}

/// Cross-sectional transform of a signal, applied independently per date.
pub trait ScoreConstructor: Send + Sync {
    /// Unique name.
    fn name(&self) -> &str;

    /// Computes the score table.
    fn score(&self, signal: &Signal) -> Result<Score>;
}

/// Converts scores into expected returns.
///
/// Every `(date, asset_id)` in the score must appear exactly once in the
/// output.
pub trait AlphaConstructor: Send + Sync {
    /// Unique name.
    fn name(&self) -> &str;

    /// Computes the alpha table.
    fn alpha(&self, score: &Score, risk: &TotalRisk) -> Result<Alpha>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Date, date_column};

    #[test]
    fn test_history_sorted_by_asset_then_date() {
        let d1 = Date::from_ymd_opt(2024, 1, 31).unwrap();
        let d2 = Date::from_ymd_opt(2024, 2, 29).unwrap();
        let df = DataFrame::new(vec![
            date_column("date", &[d2, d1, d1]),
            Column::new("asset_id".into(), &["A", "B", "A"]),
            Column::new("ret".into(), &[0.02, 0.03, 0.01]),
        ])
        .unwrap();

        let history = History::new(df).unwrap();
        let rets = crate::types::f64_values(history.data(), "ret").unwrap();
        assert_eq!(rets, vec![0.01, 0.02, 0.03]);
        assert!(history.require(&["ret"]).is_ok());
        assert!(matches!(
            history.require(&["ret", "predicted_beta"]),
            Err(TaviraError::MissingColumn(c)) if c == "predicted_beta"
        ));
    }

    #[test]
    fn test_history_requires_keys() {
        let df = DataFrame::new(vec![Column::new("ret".into(), &[0.01])]).unwrap();
        assert!(History::new(df).is_err());
    }
}
