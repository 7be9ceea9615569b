//! Backtest orchestration and performance evaluation for Tavira.
//!
//! This crate ties the pipeline together:
//! - [`Strategy`] bundles signal, score, alpha and portfolio construction
//!   with an ordered constraint list
//! - [`Backtester`] runs a strategy over every rebalance date, sequentially
//!   or on a thread pool, and joins weights with forward returns
//! - [`Benchmark`] builds market-cap weights
//! - [`Performance`] summarizes the resulting P&L
//!
//! # Example
//!
//! ```rust,ignore
//! use tavira_eval::{Backtester, BacktestConfig, Performance, Strategy};
//!
//! let backtester = Backtester::new(config, &store, &store, store.clone(), RiskConfig::default())?;
//! let pnl = backtester.run_parallel(&strategy, None)?;
//! println!("{}", Performance::new(config.interval, &pnl, None)?.summary());
//! ```

pub mod backtest;
pub mod benchmark;
pub mod performance;
pub mod strategy;

pub use backtest::{
    BacktestConfig, BacktestOutcome, Backtester, ExecutionMode, PeriodFailure, forward_returns,
};
pub use benchmark::Benchmark;
pub use performance::{Compounding, Performance, PerformanceSummary};
pub use strategy::{Strategy, StrategyBuilder};
