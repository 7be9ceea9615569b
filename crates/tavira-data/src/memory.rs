//! In-memory providers for tests and small experiments.

use crate::config::DataConfig;
use crate::parquet::write;
use chrono::Datelike;
use polars::prelude::*;
use std::collections::BTreeMap;
use tavira_traits::types::date_lit;
use tavira_traits::{
    Date, FactorCovariances, FactorExposures, Interval, MarketDataProvider, Record, Result,
    Returns, RiskModelProvider, SpecificRisk, TotalRisk, Universe, UniverseProvider,
};

#[derive(Debug, Clone)]
struct RiskTables {
    exposures: FactorExposures,
    covariances: FactorCovariances,
    specific: SpecificRisk,
}

/// Provider over tables held in memory.
///
/// Dates without a registered risk model return empty tables, which the
/// assembler reports as missing risk data.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    universe: Universe,
    returns: Returns,
    total_risk: TotalRisk,
    risk_models: BTreeMap<Date, RiskTables>,
}

impl InMemoryStore {
    /// Creates a store without any risk model dates.
    pub const fn new(universe: Universe, returns: Returns, total_risk: TotalRisk) -> Self {
        Self {
            universe,
            returns,
            total_risk,
            risk_models: BTreeMap::new(),
        }
    }

    /// Registers the risk model tables for `date`, replacing earlier ones.
    #[must_use]
    pub fn with_risk_model(
        mut self,
        date: Date,
        exposures: FactorExposures,
        covariances: FactorCovariances,
        specific: SpecificRisk,
    ) -> Self {
        self.risk_models.insert(
            date,
            RiskTables {
                exposures,
                covariances,
                specific,
            },
        );
        self
    }

    /// Dates with a registered risk model, ascending.
    pub fn risk_model_dates(&self) -> Vec<Date> {
        self.risk_models.keys().copied().collect()
    }

    /// Writes every table in the [`DataConfig`] layout so a
    /// [`ParquetStore`](crate::ParquetStore) can read it back.
    ///
    /// # Errors
    ///
    /// Propagates I/O and polars errors.
    pub fn write_parquet(&self, config: &DataConfig, interval: Interval) -> Result<()> {
        write(&config.universe_path(interval), self.universe.data())?;
        write(&config.returns_path(interval), self.returns.data())?;
        write(&config.total_risk_path(interval), self.total_risk.data())?;

        let mut years: BTreeMap<i32, Vec<(Date, &RiskTables)>> = BTreeMap::new();
        for (date, tables) in &self.risk_models {
            years.entry(date.year()).or_default().push((*date, tables));
        }
        for (year, entries) in years {
            let stamp = |df: &DataFrame, date: Date| df.clone().lazy().with_column(date_lit(date).alias("date"));
            let exposures = entries
                .iter()
                .map(|(d, t)| stamp(t.exposures.data(), *d))
                .collect::<Vec<_>>();
            let covariances = entries
                .iter()
                .map(|(d, t)| stamp(t.covariances.data(), *d))
                .collect::<Vec<_>>();
            let specific = entries
                .iter()
                .map(|(d, t)| stamp(t.specific.data(), *d))
                .collect::<Vec<_>>();
            write(
                &config.factor_exposures_path(year),
                &concat(exposures, UnionArgs::default())?.collect()?,
            )?;
            write(
                &config.factor_covariances_path(year),
                &concat(covariances, UnionArgs::default())?.collect()?,
            )?;
            write(
                &config.specific_risk_path(year),
                &concat(specific, UnionArgs::default())?.collect()?,
            )?;
        }
        Ok(())
    }

    fn risk(&self, date: Date) -> Option<&RiskTables> {
        self.risk_models.get(&date)
    }
}

fn within<R: Record>(table: &R, start: Date, end: Date) -> Result<R> {
    let df = table
        .data()
        .clone()
        .lazy()
        .filter(
            col("date")
                .gt_eq(date_lit(start))
                .and(col("date").lt_eq(date_lit(end))),
        )
        .collect()?;
    R::try_new(df)
}

impl UniverseProvider for InMemoryStore {
    fn load_universe(&self, _interval: Interval, start: Date, end: Date) -> Result<Universe> {
        within(&self.universe, start, end)
    }
}

impl MarketDataProvider for InMemoryStore {
    fn load_returns(&self, _interval: Interval, start: Date, end: Date) -> Result<Returns> {
        within(&self.returns, start, end)
    }

    fn load_total_risk(&self, _interval: Interval, start: Date, end: Date) -> Result<TotalRisk> {
        within(&self.total_risk, start, end)
    }
}

impl RiskModelProvider for InMemoryStore {
    fn load_factor_exposures(&self, date: Date) -> Result<FactorExposures> {
        Ok(self
            .risk(date)
            .map_or_else(FactorExposures::empty, |t| t.exposures.clone()))
    }

    fn load_factor_covariances(&self, date: Date) -> Result<FactorCovariances> {
        Ok(self
            .risk(date)
            .map_or_else(FactorCovariances::empty, |t| t.covariances.clone()))
    }

    fn load_specific_risk(&self, date: Date) -> Result<SpecificRisk> {
        Ok(self
            .risk(date)
            .map_or_else(SpecificRisk::empty, |t| t.specific.clone()))
    }
}
