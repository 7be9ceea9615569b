//! Data provider interfaces.
//!
//! Providers are shared read-only across backtest workers, so every
//! implementation must be `Send + Sync` and tolerate concurrent calls.

use crate::records::{
    FactorCovariances, FactorExposures, Returns, SpecificRisk, TotalRisk, Universe,
};
use crate::{Date, Interval, Result};

/// Point-in-time universe membership.
pub trait UniverseProvider: Send + Sync {
    /// Loads eligible `(date, asset_id)` pairs within `[start, end]`.
    fn load_universe(&self, interval: Interval, start: Date, end: Date) -> Result<Universe>;
}

/// Return and risk-forecast history.
pub trait MarketDataProvider: Send + Sync {
    /// Loads realized returns with market data within `[start, end]`.
    fn load_returns(&self, interval: Interval, start: Date, end: Date) -> Result<Returns>;

    /// Loads total risk, specific risk and predicted beta within `[start, end]`.
    fn load_total_risk(&self, interval: Interval, start: Date, end: Date) -> Result<TotalRisk>;
}

/// Per-date factor risk model tables.
pub trait RiskModelProvider: Send + Sync {
    /// Sparse exposures on `date`. An empty table means no data.
    fn load_factor_exposures(&self, date: Date) -> Result<FactorExposures>;

    /// Sparse factor covariances on `date`. An empty table means no data.
    fn load_factor_covariances(&self, date: Date) -> Result<FactorCovariances>;

    /// Specific risk on `date`.
    fn load_specific_risk(&self, date: Date) -> Result<SpecificRisk>;
}
