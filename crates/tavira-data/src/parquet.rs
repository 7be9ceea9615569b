//! Parquet-backed providers.
//!
//! Every call opens its own reader, so one store can serve many backtest
//! workers at once without locking.

use crate::config::DataConfig;
use chrono::Datelike;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::Path;
use tavira_traits::types::date_lit;
use tavira_traits::{
    Date, FactorCovariances, FactorExposures, Interval, MarketDataProvider, Record, Result,
    Returns, RiskModelProvider, SpecificRisk, TotalRisk, Universe, UniverseProvider,
};
use tracing::{debug, trace};

/// Read-only Parquet data store.
#[derive(Debug, Clone)]
pub struct ParquetStore {
    config: DataConfig,
}

impl ParquetStore {
    /// Opens the store described by `config`.
    pub const fn new(config: DataConfig) -> Self {
        Self { config }
    }

    /// The store layout.
    pub const fn config(&self) -> &DataConfig {
        &self.config
    }
}

impl UniverseProvider for ParquetStore {
    fn load_universe(&self, interval: Interval, start: Date, end: Date) -> Result<Universe> {
        load_range(&self.config.universe_path(interval), start, end)
    }
}

impl MarketDataProvider for ParquetStore {
    fn load_returns(&self, interval: Interval, start: Date, end: Date) -> Result<Returns> {
        load_range(&self.config.returns_path(interval), start, end)
    }

    fn load_total_risk(&self, interval: Interval, start: Date, end: Date) -> Result<TotalRisk> {
        load_range(&self.config.total_risk_path(interval), start, end)
    }
}

impl RiskModelProvider for ParquetStore {
    fn load_factor_exposures(&self, date: Date) -> Result<FactorExposures> {
        load_date(&self.config.factor_exposures_path(date.year()), date)
    }

    fn load_factor_covariances(&self, date: Date) -> Result<FactorCovariances> {
        load_date(&self.config.factor_covariances_path(date.year()), date)
    }

    fn load_specific_risk(&self, date: Date) -> Result<SpecificRisk> {
        load_date(&self.config.specific_risk_path(date.year()), date)
    }
}

fn read(path: &Path) -> Result<DataFrame> {
    trace!(path = %path.display(), "reading parquet");
    let file = File::open(path)?;
    Ok(ParquetReader::new(file).finish()?)
}

fn canonical<R: Record>() -> Vec<Expr> {
    R::COLUMNS.iter().map(|c| col(c.name)).collect()
}

/// Rows of a `date`-keyed table within `[start, end]`.
fn load_range<R: Record>(path: &Path, start: Date, end: Date) -> Result<R> {
    let df = read(path)?
        .lazy()
        .filter(
            col("date")
                .gt_eq(date_lit(start))
                .and(col("date").lt_eq(date_lit(end))),
        )
        .select(canonical::<R>())
        .sort_by_exprs(
            R::KEYS.iter().map(|k| col(*k)).collect::<Vec<_>>(),
            SortMultipleOptions::default(),
        )
        .collect()?;
    debug!(table = R::NAME, rows = df.height(), %start, %end, "loaded table");
    R::try_new(df)
}

/// Rows of a yearly file for one date. A missing file yields an empty table.
fn load_date<R: Record>(path: &Path, date: Date) -> Result<R> {
    if !path.exists() {
        debug!(table = R::NAME, %date, path = %path.display(), "no file for year");
        return Ok(R::empty());
    }
    let df = read(path)?
        .lazy()
        .filter(col("date").eq(date_lit(date)))
        .select(canonical::<R>())
        .collect()?;
    R::try_new(df)
}

/// Writes `df` to `path`, creating parent directories.
pub(crate) fn write(path: &Path, df: &DataFrame) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    let mut df = df.clone();
    ParquetWriter::new(&mut file).finish(&mut df)?;
    Ok(())
}
