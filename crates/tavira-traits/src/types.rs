//! Common types used throughout the Tavira framework.
//!
//! Identifiers, rebalance frequencies, risk units and the small helpers that
//! move values between polars columns and plain Rust vectors.

use crate::{Result, TaviraError};
use derive_more::Display;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// Re-export date type from chrono
pub use chrono::NaiveDate as Date;

/// A security identifier as it appears in the `asset_id` column.
pub type AssetId = String;

/// Days between 0001-01-01 (CE) and 1970-01-01.
///
/// Polars stores `Date` as days since the Unix epoch, chrono counts from CE.
pub const CE_TO_UNIX_EPOCH_DAYS: i32 = 719_163;

/// Rebalance frequency of a backtest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    /// One period per trading day.
    #[display("daily")]
    Daily,
    /// One period per calendar month.
    #[display("monthly")]
    Monthly,
}

impl Interval {
    /// Number of periods in a year, used to annualize statistics.
    #[must_use]
    pub const fn periods_per_year(self) -> usize {
        match self {
            Self::Daily => 252,
            Self::Monthly => 12,
        }
    }

    /// Earliest calendar date from which `periods` whole periods precede
    /// `date`. Daily periods are trading days, so the calendar span covers
    /// weekends and a week of holidays. Saturates at [`Date::MIN`].
    #[must_use]
    pub fn periods_before(self, date: Date, periods: usize) -> Date {
        if periods == 0 {
            return date;
        }
        let earlier = match self {
            Self::Daily => {
                let days = (periods as u64 * 7).div_ceil(5) + 7;
                date.checked_sub_days(chrono::Days::new(days))
            }
            Self::Monthly => u32::try_from(periods)
                .ok()
                .and_then(|n| date.checked_sub_months(chrono::Months::new(n))),
        };
        earlier.unwrap_or(Date::MIN)
    }
}

impl FromStr for Interval {
    type Err = TaviraError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "daily" | "d" => Ok(Self::Daily),
            "monthly" | "m" => Ok(Self::Monthly),
            other => Err(TaviraError::InvalidData(format!("unknown interval '{other}'"))),
        }
    }
}

/// Units in which a vendor reports risk figures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskUnits {
    /// Already in decimal return units (0.20 = 20%).
    #[display("decimal")]
    Decimal,
    /// Percent units (20.0 = 20%).
    #[default]
    #[display("percent")]
    Percent,
}

impl RiskUnits {
    /// Multiplier that converts a volatility into decimal units.
    #[must_use]
    pub const fn volatility_scale(self) -> f64 {
        match self {
            Self::Decimal => 1.0,
            Self::Percent => 1e-2,
        }
    }

    /// Multiplier that converts a variance or covariance into decimal units.
    #[must_use]
    pub const fn variance_scale(self) -> f64 {
        match self {
            Self::Decimal => 1.0,
            Self::Percent => 1e-4,
        }
    }
}

/// Converts a polars physical date (days since the Unix epoch) to a [`Date`].
pub fn date_from_epoch_days(days: i32) -> Result<Date> {
    Date::from_num_days_from_ce_opt(days + CE_TO_UNIX_EPOCH_DAYS)
        .ok_or_else(|| TaviraError::InvalidDate(format!("{days} days since epoch out of range")))
}

/// Converts a [`Date`] to days since the Unix epoch.
#[must_use]
pub fn epoch_days(date: Date) -> i32 {
    use chrono::Datelike;
    date.num_days_from_ce() - CE_TO_UNIX_EPOCH_DAYS
}

/// Builds a polars literal expression for a date.
#[must_use]
pub fn date_lit(date: Date) -> Expr {
    lit(epoch_days(date)).cast(DataType::Date)
}

/// Reads a non-null `Date` column into a vector.
///
/// # Errors
///
/// Fails when the column is missing, has another dtype or contains nulls.
pub fn date_values(df: &DataFrame, name: &str) -> Result<Vec<Date>> {
    df.column(name)?
        .as_materialized_series()
        .date()?
        .into_iter()
        .map(|d: Option<i32>| {
            d.ok_or_else(|| TaviraError::InvalidData(format!("null in column {name}")))
                .and_then(date_from_epoch_days)
        })
        .collect()
}

/// Reads a non-null string column into a vector of owned strings.
///
/// # Errors
///
/// Fails when the column is missing, has another dtype or contains nulls.
pub fn str_values(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    df.column(name)?
        .as_materialized_series()
        .str()?
        .into_iter()
        .map(|s: Option<&str>| {
            s.map(str::to_string)
                .ok_or_else(|| TaviraError::InvalidData(format!("null in column {name}")))
        })
        .collect()
}

/// Reads a nullable `Float64` column into a vector.
pub fn opt_f64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    Ok(df
        .column(name)?
        .as_materialized_series()
        .f64()?
        .into_iter()
        .collect())
}

/// Reads a `Float64` column into a vector, mapping nulls to NaN.
pub fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    Ok(opt_f64_values(df, name)?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Builds a `Date` column from a slice of dates.
#[must_use]
pub fn date_column(name: &str, dates: &[Date]) -> Column {
    let days: Vec<i32> = dates.iter().map(|d| epoch_days(*d)).collect();
    Int32Chunked::from_vec(name.into(), days)
        .into_date()
        .into_series()
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ymd(y: i32, m: u32, d: u32) -> Date {
        Date::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case(Interval::Monthly, ymd(2020, 3, 31), 2, ymd(2020, 1, 31))]
    #[case(Interval::Monthly, ymd(2020, 3, 31), 0, ymd(2020, 3, 31))]
    #[case(Interval::Monthly, ymd(2021, 1, 31), 12, ymd(2020, 1, 31))]
    #[case(Interval::Daily, ymd(2020, 3, 16), 5, ymd(2020, 3, 2))]
    fn test_periods_before(
        #[case] interval: Interval,
        #[case] date: Date,
        #[case] periods: usize,
        #[case] expected: Date,
    ) {
        assert_eq!(interval.periods_before(date, periods), expected);
    }

    #[test]
    fn test_periods_before_saturates() {
        assert_eq!(Interval::Monthly.periods_before(Date::MIN, 3), Date::MIN);
    }

    #[rstest]
    #[case(Interval::Daily, 252)]
    #[case(Interval::Monthly, 12)]
    fn test_periods_per_year(#[case] interval: Interval, #[case] expected: usize) {
        assert_eq!(interval.periods_per_year(), expected);
    }

    #[rstest]
    #[case("daily", Interval::Daily)]
    #[case("MONTHLY", Interval::Monthly)]
    #[case("m", Interval::Monthly)]
    fn test_interval_from_str(#[case] input: &str, #[case] expected: Interval) {
        assert_eq!(input.parse::<Interval>().unwrap(), expected);
    }

    #[test]
    fn test_interval_display_roundtrip() {
        for interval in [Interval::Daily, Interval::Monthly] {
            assert_eq!(interval.to_string().parse::<Interval>().unwrap(), interval);
        }
        assert!("weekly".parse::<Interval>().is_err());
    }

    #[test]
    fn test_risk_units() {
        assert_eq!(RiskUnits::default(), RiskUnits::Percent);
        assert!((RiskUnits::Percent.variance_scale() - 1e-4).abs() < 1e-18);
        assert!((RiskUnits::Percent.volatility_scale() - 1e-2).abs() < 1e-18);
        assert_eq!(RiskUnits::Decimal.variance_scale(), 1.0);
    }

    #[test]
    fn test_epoch_conversion() {
        let epoch = Date::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(epoch_days(epoch), 0);

        let date = Date::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(date_from_epoch_days(epoch_days(date)).unwrap(), date);
    }

    #[test]
    fn test_column_helpers() {
        let dates = vec![
            Date::from_ymd_opt(2024, 1, 31).unwrap(),
            Date::from_ymd_opt(2024, 2, 29).unwrap(),
        ];
        let df = DataFrame::new(vec![
            date_column("date", &dates),
            Column::new("asset_id".into(), &["A", "B"]),
            Column::new("x".into(), &[Some(1.0), None]),
        ])
        .unwrap();

        assert_eq!(date_values(&df, "date").unwrap(), dates);
        assert_eq!(str_values(&df, "asset_id").unwrap(), vec!["A", "B"]);
        assert_eq!(opt_f64_values(&df, "x").unwrap(), vec![Some(1.0), None]);
        assert!(f64_values(&df, "x").unwrap()[1].is_nan());
        assert!(str_values(&df, "missing").is_err());
    }
}
