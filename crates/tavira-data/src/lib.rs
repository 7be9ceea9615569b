#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tavira/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Data providers for the Tavira backtest engine.
//!
//! - [`ParquetStore`] reads the on-disk layout described by [`DataConfig`]
//! - [`InMemoryStore`] serves tables held in memory
//! - [`SyntheticMarket`] generates a small deterministic market
//!
//! # Example
//!
//! ```rust,ignore
//! use tavira_data::{DataConfig, ParquetStore};
//!
//! let store = ParquetStore::new(DataConfig::new("/data/tavira"));
//! let universe = store.load_universe(Interval::Monthly, start, end)?;
//! ```

mod config;
mod memory;
mod parquet;
mod synthetic;

pub use config::DataConfig;
pub use memory::InMemoryStore;
pub use parquet::ParquetStore;
pub use synthetic::SyntheticMarket;
