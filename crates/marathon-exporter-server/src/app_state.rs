//! Shared application state for the exporter HTTP server.

use std::sync::Arc;

use crate::exporter::Exporter;

#[derive(Clone)]
pub struct AppState {
    exporter: Arc<Exporter>,
    metrics_path: Arc<str>,
}

impl AppState {
    pub fn new(exporter: Exporter, metrics_path: &str) -> Self {
        Self {
            exporter: Arc::new(exporter),
            metrics_path: Arc::from(metrics_path),
        }
    }

    pub fn exporter(&self) -> Arc<Exporter> {
        Arc::clone(&self.exporter)
    }

    pub fn metrics_path(&self) -> &str {
        &self.metrics_path
    }
}
