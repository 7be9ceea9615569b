//! CLI subcommand modules.
//!
//! This module contains the implementations for all tavira CLI subcommands.

pub(crate) mod backtest;
pub(crate) mod signals;
pub(crate) mod summary;

use clap::ValueEnum;

/// Report format shared by the subcommands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable tables
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}
