//! Exporter config loader (strict parsing).

pub mod schema;

use std::fs;
use std::path::Path;

use marathon_exporter_core::error::{ExporterError, Result};

pub use schema::{ExporterConfig, ExporterSection, SourceConfig};

pub fn load_from_str(s: &str) -> Result<ExporterConfig> {
    let cfg = parse_str(s)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Parse without validating, so command-line overrides can be applied first.
pub(crate) fn parse_file(path: &Path) -> Result<ExporterConfig> {
    let s = fs::read_to_string(path).map_err(|e| {
        ExporterError::Config(format!("read config {} failed: {e}", path.display()))
    })?;
    parse_str(&s)
}

pub(crate) fn parse_str(s: &str) -> Result<ExporterConfig> {
    serde_yaml::from_str(s).map_err(|e| ExporterError::Config(format!("invalid yaml: {e}")))
}
