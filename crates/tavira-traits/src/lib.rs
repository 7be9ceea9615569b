#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tavira/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core types and contracts for the Tavira backtest engine.
//!
//! This crate defines the typed record tables that flow between pipeline
//! stages, the signal/score/alpha constructor traits, the data provider
//! interfaces and the shared error type.

/// The version of the tavira-traits crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;
pub mod pipeline;
pub mod provider;
pub mod records;
pub mod stats;
pub mod types;

pub use error::{Result, TaviraError};
pub use pipeline::{AlphaConstructor, History, ScoreConstructor, SignalConstructor};
pub use provider::{MarketDataProvider, RiskModelProvider, UniverseProvider};
pub use records::{
    Alpha, AssetReturns, FactorCovariances, FactorExposures, Portfolio, Record, Returns, Score,
    Signal, SpecificRisk, TotalRisk, Universe,
};
pub use types::{AssetId, CE_TO_UNIX_EPOCH_DAYS, Date, Interval, RiskUnits};
