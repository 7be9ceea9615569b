//! Deterministic synthetic market for tests and demos.
//!
//! Returns follow smooth per-asset waves so results are reproducible without
//! a random number generator. The risk model is a single market factor
//! whose exposures equal each asset's predicted beta, in percent units.

use crate::memory::InMemoryStore;
use chrono::{Datelike, Months};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tavira_traits::types::date_column;
use tavira_traits::{
    Date, FactorCovariances, FactorExposures, Result, Returns, SpecificRisk, TaviraError,
    TotalRisk, Universe,
};

/// Shape of a synthetic monthly market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticMarket {
    /// Number of assets, named `A00`, `A01`, ...
    pub assets: usize,
    /// Number of month ends.
    pub periods: usize,
    /// First month end.
    pub start: Date,
    /// Month ends left without a risk model.
    #[serde(default)]
    pub missing_risk_dates: Vec<Date>,
}

impl Default for SyntheticMarket {
    fn default() -> Self {
        Self {
            assets: 8,
            periods: 24,
            start: Date::from_ymd_opt(2020, 1, 31).unwrap_or(Date::MIN),
            missing_risk_dates: Vec::new(),
        }
    }
}

impl SyntheticMarket {
    /// A market of `assets` assets over `periods` month ends.
    pub fn new(assets: usize, periods: usize) -> Self {
        Self {
            assets,
            periods,
            ..Self::default()
        }
    }

    /// Leaves `date` without factor exposures, covariances or specific risk.
    #[must_use]
    pub fn without_risk_model(mut self, date: Date) -> Self {
        self.missing_risk_dates.push(date);
        self
    }

    /// Month ends covered by the market.
    ///
    /// # Errors
    ///
    /// Returns [`TaviraError::InvalidDate`] if a date overflows the calendar.
    pub fn dates(&self) -> Result<Vec<Date>> {
        (0..self.periods)
            .map(|t| month_end_after(self.start, t as u32))
            .collect()
    }

    /// Asset identifiers.
    pub fn asset_ids(&self) -> Vec<String> {
        (0..self.assets).map(|i| format!("A{i:02}")).collect()
    }

    /// Builds the in-memory store.
    ///
    /// # Errors
    ///
    /// Propagates date and table construction errors.
    pub fn build(&self) -> Result<InMemoryStore> {
        let dates = self.dates()?;
        let ids = self.asset_ids();

        let mut date_col = Vec::new();
        let mut id_col = Vec::new();
        let mut ret = Vec::new();
        let mut market_cap = Vec::new();
        let mut price = Vec::new();
        let mut total_risk = Vec::new();
        let mut specific_risk = Vec::new();
        let mut beta = Vec::new();
        for (t, date) in dates.iter().enumerate() {
            for (i, id) in ids.iter().enumerate() {
                let (x, s) = (i as f64, t as f64);
                date_col.push(*date);
                id_col.push(id.clone());
                ret.push(0.04 * (1.3 * x + 0.7 * s).sin() + 0.002 * (i % 3) as f64);
                market_cap.push(1_000.0 + 250.0 * x + 10.0 * s);
                price.push(20.0 + x + 0.1 * s);
                total_risk.push(predicted_total_risk(i));
                specific_risk.push(predicted_specific_risk(i));
                beta.push(predicted_beta(i));
            }
        }

        let universe = Universe::new(DataFrame::new(vec![
            date_column("date", &date_col),
            Column::new("asset_id".into(), id_col.clone()),
        ])?)?;
        let returns = Returns::new(DataFrame::new(vec![
            date_column("date", &date_col),
            Column::new("asset_id".into(), id_col.clone()),
            Column::new("ret".into(), ret),
            Column::new("market_cap".into(), market_cap),
            Column::new("price".into(), price),
        ])?)?;
        let total = TotalRisk::new(DataFrame::new(vec![
            date_column("date", &date_col),
            Column::new("asset_id".into(), id_col),
            Column::new("total_risk".into(), total_risk),
            Column::new("specific_risk".into(), specific_risk),
            Column::new("predicted_beta".into(), beta),
        ])?)?;

        let mut store = InMemoryStore::new(universe, returns, total);
        for date in dates {
            if self.missing_risk_dates.contains(&date) {
                continue;
            }
            let (exposures, covariances, specific) = self.risk_model()?;
            store = store.with_risk_model(date, exposures, covariances, specific);
        }
        Ok(store)
    }

    fn risk_model(&self) -> Result<(FactorExposures, FactorCovariances, SpecificRisk)> {
        let ids = self.asset_ids();
        let n = ids.len();
        let betas: Vec<f64> = (0..n).map(predicted_beta).collect();
        let specific: Vec<f64> = (0..n).map(predicted_specific_risk).collect();

        let exposures = FactorExposures::new(DataFrame::new(vec![
            Column::new("asset_id".into(), ids.clone()),
            Column::new("factor".into(), vec!["MKT"; n]),
            Column::new("exposure".into(), betas),
        ])?)?;
        // 15% market volatility, in percent squared.
        let covariances = FactorCovariances::new(DataFrame::new(vec![
            Column::new("factor_1".into(), &["MKT"]),
            Column::new("factor_2".into(), &["MKT"]),
            Column::new("covariance".into(), &[225.0]),
        ])?)?;
        let specific = SpecificRisk::new(DataFrame::new(vec![
            Column::new("asset_id".into(), ids),
            Column::new("specific_risk".into(), specific),
        ])?)?;
        Ok((exposures, covariances, specific))
    }
}

fn predicted_beta(i: usize) -> f64 {
    0.7 + 0.08 * i as f64
}

fn predicted_specific_risk(i: usize) -> f64 {
    12.0 + 1.5 * i as f64
}

fn predicted_total_risk(i: usize) -> f64 {
    let market = 15.0 * predicted_beta(i);
    let specific = predicted_specific_risk(i);
    (market * market + specific * specific).sqrt()
}

fn month_end_after(start: Date, months: u32) -> Result<Date> {
    start
        .with_day(1)
        .and_then(|d| d.checked_add_months(Months::new(months + 1)))
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| TaviraError::InvalidDate(format!("{months} months after {start}")))
}
