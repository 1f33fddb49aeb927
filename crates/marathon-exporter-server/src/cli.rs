//! Command-line flags, merged over the optional config file.

use std::path::PathBuf;

use clap::Parser;

use marathon_exporter_core::error::Result;

use crate::config::{self, ExporterConfig, SourceConfig};

#[derive(Debug, Parser)]
#[command(name = "marathon-exporter", version, about = "Prometheus exporter for Marathon metrics")]
pub struct Cli {
    /// YAML config file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Address to listen on for web interface and telemetry.
    #[arg(long = "web.listen-address")]
    pub listen_address: Option<String>,

    /// Path under which to expose metrics.
    #[arg(long = "web.telemetry-path")]
    pub telemetry_path: Option<String>,

    /// URI of Marathon; repeat to scrape several instances.
    #[arg(long = "marathon.uri")]
    pub marathon_uri: Vec<String>,

    /// Metric name prefix.
    #[arg(long)]
    pub namespace: Option<String>,
}

impl Cli {
    /// Load the config file (if any), apply flag overrides, then validate.
    pub fn into_config(self) -> Result<ExporterConfig> {
        let mut cfg = match &self.config {
            Some(path) => config::parse_file(path)?,
            None => ExporterConfig::empty(),
        };

        if let Some(listen) = self.listen_address {
            cfg.exporter.listen = listen;
        }
        if let Some(path) = self.telemetry_path {
            cfg.exporter.metrics_path = path;
        }
        if let Some(namespace) = self.namespace {
            cfg.exporter.namespace = namespace;
        }
        cfg.sources
            .extend(self.marathon_uri.into_iter().map(SourceConfig::new));

        cfg.validate()?;
        Ok(cfg)
    }
}
