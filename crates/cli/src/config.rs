use std::path::Path;

use anyhow::{Context, Result};
use spool_core::config::load_dotenv;
use spool_core::SpoolConfig;
use tracing::debug;

/// Load config from `path`, or from defaults plus environment overrides.
///
/// A `.env` file in the working directory is read first either way.
pub fn load(path: Option<&Path>) -> Result<SpoolConfig> {
    load_dotenv();
    let config = match path {
        Some(path) => SpoolConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => SpoolConfig::from_env().context("invalid SPOOL_* environment overrides")?,
    };
    debug!(?config, "configuration loaded");
    Ok(config)
}
