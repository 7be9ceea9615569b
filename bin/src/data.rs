//! Data store resolution for the Tavira CLI.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use tavira_data::DataConfig;

/// Environment variable naming the data store root.
pub(crate) const DATA_ROOT_VAR: &str = "TAVIRA_DATA_ROOT";

/// Builds the store layout from `--data-root`, falling back to
/// `TAVIRA_DATA_ROOT` from the environment or a `.env` file.
pub(crate) fn data_config(root: Option<PathBuf>) -> Result<DataConfig> {
    if let Some(root) = root {
        return Ok(DataConfig::new(root));
    }

    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let root = env::var(DATA_ROOT_VAR)
        .with_context(|| format!("no --data-root given and {DATA_ROOT_VAR} is not set"))?;
    Ok(DataConfig::new(root))
}
