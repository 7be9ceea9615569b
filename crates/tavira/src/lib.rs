#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tavira/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! # tavira
//!
//! tavira is an umbrella crate that re-exports all tavira sub-crates for
//! convenience.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use tavira::prelude::*;
//!
//! # fn main() -> tavira::Result<()> {
//! let store = Arc::new(ParquetStore::new(DataConfig::new("/data/tavira")));
//! let config = BacktestConfig::default();
//! let backtester = Backtester::new(config.clone(), store.as_ref(), store.as_ref(), store.clone(), RiskConfig::default())?;
//!
//! let strategy = Strategy::builder()
//!     .signal(Momentum::default())
//!     .score(ZScore)
//!     .alpha(GrinoldKahn::default())
//!     .portfolio(MeanVarianceEfficient::default())
//!     .constraints([Constraint::FullInvestment, Constraint::LongOnly])
//!     .build()?;
//!
//! let pnl = backtester.run_parallel(&strategy, None)?;
//! println!("{}", Performance::new(config.interval, &pnl, None)?.summary());
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Organization
//!
//! - [`traits`] - Record tables, pipeline and provider traits, errors
//! - [`signals`] - Signal, score and alpha constructors
//! - [`risk`] - Factor risk model assembly
//! - [`optimize`] - Constraints, QP solver and mean-variance optimizer
//! - [`eval`] - Strategy, backtest orchestration and performance
//! - [`data`] - Parquet and in-memory data providers

/// Version information for the tavira crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Record tables, pipeline and provider traits.
pub mod traits {
    pub use tavira_traits::*;
}

// Re-export error types
pub use tavira_traits::{Result, TaviraError};

// Re-export common types
pub use tavira_traits::{AssetId, Date, Interval, RiskUnits};

/// Signal, score and alpha constructors.
///
/// ## Signals
///
/// - **Momentum**: 11-month log return sum skipping the latest month
/// - **Reversal**: negated latest month
/// - **LowBeta**: negated lagged predicted beta
///
/// ## Scores
///
/// - **ZScore**: within-date standardization
/// - **UniformScore**: 1.0 wherever a signal is present
///
/// ## Alphas
///
/// - **GrinoldKahn**: `IC · volatility · score`
/// - **StaticAlpha**: one constant for every row
pub mod signals {
    pub use tavira_signals::*;
}

/// Factor risk model assembly.
///
/// ```text
/// Σ = X F Xᵀ + diag(s²)
/// ```
pub mod risk {
    pub use tavira_risk::*;
}

/// Constraints, QP solver and mean-variance optimizer.
pub mod optimize {
    pub use tavira_optimize::*;
}

/// Strategy, backtest orchestration, benchmark and performance.
pub mod eval {
    pub use tavira_eval::*;
}

/// Data providers.
pub mod data {
    pub use tavira_data::*;
}

/// Prelude module for convenient imports.
///
/// ```ignore
/// use tavira::prelude::*;
/// ```
pub mod prelude {
    pub use crate::data::{DataConfig, InMemoryStore, ParquetStore, SyntheticMarket};
    pub use crate::eval::{
        BacktestConfig, BacktestOutcome, Backtester, Benchmark, Compounding, ExecutionMode,
        Performance, PerformanceSummary, Strategy,
    };
    pub use crate::optimize::{Constraint, DecilePortfolio, MeanVarianceEfficient, PortfolioConstructor};
    pub use crate::risk::{RiskConfig, RiskModelAssembler, SpecificRiskPolicy};
    pub use crate::signals::{
        GrinoldKahn, LowBeta, Momentum, Reversal, StaticAlpha, UniformScore, ZScore,
    };
    pub use crate::traits::{
        AlphaConstructor, AssetReturns, MarketDataProvider, Portfolio, RiskModelProvider,
        ScoreConstructor, SignalConstructor, UniverseProvider,
    };
    pub use crate::{Date, Interval, Result, RiskUnits, TaviraError};
}
