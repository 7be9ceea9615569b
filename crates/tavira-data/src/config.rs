//! Data store layout.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tavira_traits::Interval;

/// Directory layout of a Parquet data store.
///
/// ```text
/// {root}/universe_{interval}.parquet        date, asset_id
/// {root}/returns_{interval}.parquet         date, asset_id, ret, market_cap, price
/// {root}/total_risk_{interval}.parquet      date, asset_id, total_risk, specific_risk, predicted_beta
/// {root}/factor_exposures/{year}.parquet    date, asset_id, factor, exposure
/// {root}/factor_covariances/{year}.parquet  date, factor_1, factor_2, covariance
/// {root}/specific_risk/{year}.parquet       date, asset_id, specific_risk
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataConfig {
    /// Store root directory
    pub root: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self::new("data")
    }
}

impl DataConfig {
    /// Creates a layout rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Universe membership file.
    pub fn universe_path(&self, interval: Interval) -> PathBuf {
        self.root.join(format!("universe_{interval}.parquet"))
    }

    /// Returns file.
    pub fn returns_path(&self, interval: Interval) -> PathBuf {
        self.root.join(format!("returns_{interval}.parquet"))
    }

    /// Total risk forecasts file.
    pub fn total_risk_path(&self, interval: Interval) -> PathBuf {
        self.root.join(format!("total_risk_{interval}.parquet"))
    }

    /// Factor exposures for one year.
    pub fn factor_exposures_path(&self, year: i32) -> PathBuf {
        self.root.join("factor_exposures").join(format!("{year}.parquet"))
    }

    /// Factor covariances for one year.
    pub fn factor_covariances_path(&self, year: i32) -> PathBuf {
        self.root.join("factor_covariances").join(format!("{year}.parquet"))
    }

    /// Specific risk for one year.
    pub fn specific_risk_path(&self, year: i32) -> PathBuf {
        self.root.join("specific_risk").join(format!("{year}.parquet"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let config = DataConfig::new("/data/tavira");
        assert_eq!(
            config.universe_path(Interval::Monthly),
            PathBuf::from("/data/tavira/universe_monthly.parquet")
        );
        assert_eq!(
            config.total_risk_path(Interval::Daily),
            PathBuf::from("/data/tavira/total_risk_daily.parquet")
        );
        assert_eq!(
            config.factor_covariances_path(2023),
            PathBuf::from("/data/tavira/factor_covariances/2023.parquet")
        );
    }

    #[test]
    fn test_serde() {
        let config: DataConfig = serde_json::from_str(r#"{"root":"store"}"#).unwrap();
        assert_eq!(config.root(), Path::new("store"));
        assert_eq!(DataConfig::default().root(), Path::new("data"));
    }
}
