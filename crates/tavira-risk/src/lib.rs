//! Factor risk model assembly for the Tavira backtest engine.
//!
//! Turns sparse per-date exposure, factor covariance and specific-risk tables
//! into dense, labeled asset covariance matrices ready for the optimizer.

pub mod assembler;
pub mod config;
pub mod covariance;

pub use assembler::{RiskModelAssembler, RiskSnapshot};
pub use config::{RiskConfig, SpecificRiskPolicy};
pub use covariance::CovarianceMatrix;
