//! # Configuration Loading
//!
//! Reads a [`PipelineConfig`] from TOML. A missing file means defaults;
//! a file that exists but does not parse or validate is an error.
//!
//! ```toml
//! [limits]
//! max_nodes = 80
//!
//! [sentinel]
//! uniform_default_ratio = 0.9
//! ```

use crate::cli::read_input;
use dagwright_core::{DagwrightError, PipelineConfig};
use std::path::Path;

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "dagwright.toml";

/// Parse and validate a TOML document.
pub fn from_toml(raw: &str) -> Result<PipelineConfig, DagwrightError> {
    let config: PipelineConfig = toml::from_str(raw)
        .map_err(|e| DagwrightError::InvalidConfig(format!("TOML parse error: {}", e)))?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from `path`, falling back to defaults when it does not exist.
pub fn load_config(path: &Path) -> Result<PipelineConfig, DagwrightError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(PipelineConfig::default());
    }
    let raw = read_input(path)?;
    let config = from_toml(&raw)?;
    tracing::info!(path = %path.display(), "loaded configuration");
    Ok(config)
}

/// Render a configuration back to TOML.
pub fn to_toml(config: &PipelineConfig) -> Result<String, DagwrightError> {
    toml::to_string_pretty(config).map_err(|e| DagwrightError::Serialization(e.to_string()))
}

// =============================================================================
// TESTS
// =============================================================================
