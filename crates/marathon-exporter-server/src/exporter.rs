//! Multi-source exporter: one [`ScrapeCoordinator`] per configured source.

use std::sync::Arc;

use futures_util::future::join_all;

use marathon_exporter_core::error::Result;
use marathon_exporter_core::Exposition;

use crate::config::ExporterConfig;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::scrape::ScrapeCoordinator;

pub struct Exporter {
    coordinators: Vec<Arc<ScrapeCoordinator>>,
}

impl Exporter {
    pub fn new(coordinators: Vec<Arc<ScrapeCoordinator>>) -> Self {
        Self { coordinators }
    }

    /// Build one HTTP-backed coordinator per source. Every source gets an
    /// `instance` label so several sources can share one namespace.
    pub fn from_config(cfg: &ExporterConfig) -> Result<Self> {
        let mut coordinators = Vec::with_capacity(cfg.sources.len());
        for source in &cfg.sources {
            let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(source)?);
            let instance = source.instance_id()?;
            let coordinator = ScrapeCoordinator::new(&cfg.exporter.namespace, fetcher, source.timeout())
                .with_const_labels(vec![("instance".to_string(), instance)])
                .with_apps(source.scrape_apps);
            coordinators.push(Arc::new(coordinator));
        }
        Ok(Self::new(coordinators))
    }

    /// Scrape every source concurrently and merge the published series.
    pub async fn scrape_all(&self) -> Exposition {
        let outcomes = join_all(self.coordinators.iter().map(|c| c.scrape())).await;
        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        tracing::debug!(sources = outcomes.len(), failed, "scrape finished");

        let mut out = Exposition::new();
        for coordinator in &self.coordinators {
            coordinator.collect_into(&mut out);
        }
        out
    }

    pub async fn render(&self) -> String {
        self.scrape_all().await.render()
    }
}
