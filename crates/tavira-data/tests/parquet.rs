//! Round trips through the Parquet layout.

use tavira_data::{DataConfig, ParquetStore, SyntheticMarket};
use tavira_traits::types::{f64_values, str_values};
use tavira_traits::{
    Date, Interval, MarketDataProvider, RiskModelProvider, TaviraError, UniverseProvider,
};
use tempfile::TempDir;

fn store(market: &SyntheticMarket) -> (TempDir, ParquetStore) {
    let dir = TempDir::new().unwrap();
    let config = DataConfig::new(dir.path());
    market
        .build()
        .unwrap()
        .write_parquet(&config, Interval::Monthly)
        .unwrap();
    (dir, ParquetStore::new(config))
}

#[test]
fn test_range_tables_filtered_by_date() {
    let market = SyntheticMarket::new(3, 14);
    let dates = market.dates().unwrap();
    let (_dir, store) = store(&market);

    let universe = store
        .load_universe(Interval::Monthly, dates[2], dates[4])
        .unwrap();
    assert_eq!(universe.len(), 9);
    assert_eq!(universe.dates().unwrap(), &dates[2..=4]);

    let returns = store
        .load_returns(Interval::Monthly, dates[0], dates[13])
        .unwrap();
    assert_eq!(returns.len(), 42);
    assert_eq!(&str_values(returns.data(), "asset_id").unwrap()[..3], ["A00", "A01", "A02"]);

    let risk = store
        .load_total_risk(Interval::Monthly, dates[13], dates[13])
        .unwrap();
    let betas = f64_values(risk.data(), "predicted_beta").unwrap();
    assert!((betas[1] - 0.78).abs() < 1e-12);
}

#[test]
fn test_risk_model_spans_years() {
    let market = SyntheticMarket::new(3, 14);
    let dates = market.dates().unwrap();
    let (dir, store) = store(&market);

    assert!(dir.path().join("factor_exposures/2020.parquet").exists());
    assert!(dir.path().join("factor_exposures/2021.parquet").exists());

    let exposures = store.load_factor_exposures(dates[13]).unwrap();
    assert_eq!(exposures.len(), 3);
    let covariances = store.load_factor_covariances(dates[0]).unwrap();
    assert_eq!(f64_values(covariances.data(), "covariance").unwrap(), [225.0]);
    assert_eq!(store.load_specific_risk(dates[5]).unwrap().len(), 3);
}

#[test]
fn test_missing_year_is_empty() {
    let market = SyntheticMarket::new(2, 2);
    let (_dir, store) = store(&market);
    let date = Date::from_ymd_opt(1999, 12, 31).unwrap();
    assert!(store.load_factor_exposures(date).unwrap().is_empty());
    assert!(store.load_specific_risk(date).unwrap().is_empty());
}

#[test]
fn test_missing_range_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let store = ParquetStore::new(DataConfig::new(dir.path()));
    let date = Date::from_ymd_opt(2020, 1, 31).unwrap();
    let result = store.load_universe(Interval::Daily, date, date);
    assert!(matches!(result, Err(TaviraError::Io(_))));
}
