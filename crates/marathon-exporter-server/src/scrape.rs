//! Scrape coordinator: one fetch → parse → translate → publish cycle per pull.
//!
//! Discipline:
//! - Cycles of one coordinator never overlap (`cycle` mutex).
//! - Each cycle builds a brand-new [`Generation`]. It is swapped into
//!   `published` only after the cycle finished, so readers never see a
//!   registry mid-mutation and series absent from the current document are
//!   gone from the output.
//! - Any cycle error empties the generation before it is published; the
//!   instrumentation series still reflect the attempt.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde_json::Value;
use tokio::sync::Mutex;

use marathon_exporter_core::apps::translate_apps;
use marathon_exporter_core::error::{ExporterError, Result};
use marathon_exporter_core::translate::{translate_document, TranslationReport};
use marathon_exporter_core::{Exposition, Generation, SeriesKind};

use crate::fetch::{Fetcher, APPS_PATH, METRICS_PATH};

/// Phase of a scrape cycle. Publishing is the unconditional tail of every
/// cycle and never fails, so it has no variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeState {
    Idle,
    Fetching,
    Parsing,
    Translating,
}

impl ScrapeState {
    pub fn as_str(self) -> &'static str {
        match self {
            ScrapeState::Idle => "idle",
            ScrapeState::Fetching => "fetching",
            ScrapeState::Parsing => "parsing",
            ScrapeState::Translating => "translating",
        }
    }
}

/// Result of one cycle.
#[derive(Debug)]
pub struct ScrapeOutcome {
    pub duration: Duration,
    /// The failing phase and its error, if the cycle failed.
    pub error: Option<(ScrapeState, ExporterError)>,
    /// Number of series published by this cycle.
    pub series: usize,
    pub report: Option<TranslationReport>,
}

impl ScrapeOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Exporter self-metrics, kept across cycles.
#[derive(Debug, Default)]
struct Instrumentation {
    duration_bits: AtomicU64,
    last_error: AtomicBool,
    scrapes_total: AtomicU64,
    errors_total: AtomicU64,
    up: AtomicBool,
}

impl Instrumentation {
    fn record(&self, duration: Duration, ok: bool) {
        self.duration_bits
            .store(duration.as_secs_f64().to_bits(), Ordering::Relaxed);
        self.last_error.store(!ok, Ordering::Relaxed);
        self.up.store(ok, Ordering::Relaxed);
        if !ok {
            self.errors_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn collect_into(&self, namespace: &str, labels: &[(String, String)], out: &mut Exposition) {
        let flag = |b: &AtomicBool| if b.load(Ordering::Relaxed) { 1.0 } else { 0.0 };
        let lines = [
            (
                "exporter_last_scrape_duration_seconds",
                "Duration of the last scrape of metrics from Marathon.",
                SeriesKind::Gauge,
                f64::from_bits(self.duration_bits.load(Ordering::Relaxed)),
            ),
            (
                "exporter_last_scrape_error",
                "Whether the last scrape of metrics from Marathon resulted in an error (1 for error, 0 for success).",
                SeriesKind::Gauge,
                flag(&self.last_error),
            ),
            (
                "exporter_scrapes_total",
                "Total number of times Marathon was scraped for metrics.",
                SeriesKind::Counter,
                self.scrapes_total.load(Ordering::Relaxed) as f64,
            ),
            (
                "exporter_errors_total",
                "Total number of times the exporter experienced errors collecting Marathon metrics.",
                SeriesKind::Counter,
                self.errors_total.load(Ordering::Relaxed) as f64,
            ),
            (
                "up",
                "Whether the last scrape of Marathon succeeded (1 for up, 0 for down).",
                SeriesKind::Gauge,
                flag(&self.up),
            ),
        ];
        for (name, help, kind, value) in lines {
            out.push(&format!("{namespace}_{name}"), help, kind, labels.to_vec(), value);
        }
    }
}

/// Drives scrape cycles for one source and holds its published series.
pub struct ScrapeCoordinator {
    namespace: String,
    const_labels: Vec<(String, String)>,
    fetcher: Arc<dyn Fetcher>,
    timeout: Duration,
    scrape_apps: bool,
    instrumentation: Instrumentation,
    published: RwLock<Arc<Generation>>,
    cycle: Mutex<()>,
}

impl ScrapeCoordinator {
    pub fn new(namespace: &str, fetcher: Arc<dyn Fetcher>, timeout: Duration) -> Self {
        Self {
            namespace: namespace.to_string(),
            const_labels: Vec::new(),
            fetcher,
            timeout,
            scrape_apps: false,
            instrumentation: Instrumentation::default(),
            published: RwLock::new(Arc::new(Generation::new(namespace, &[]))),
            cycle: Mutex::new(()),
        }
    }

    /// Labels attached to every series this coordinator emits.
    pub fn with_const_labels(mut self, labels: Vec<(String, String)>) -> Self {
        self.const_labels = labels;
        self
    }

    /// Also translate the `/v2/apps` document on every cycle.
    pub fn with_apps(mut self, enabled: bool) -> Self {
        self.scrape_apps = enabled;
        self
    }

    /// Run one full cycle and publish its result.
    pub async fn scrape(&self) -> ScrapeOutcome {
        let _cycle = self.cycle.lock().await;
        self.instrumentation.scrapes_total.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();

        let previous = self.published();
        let generation = Generation::new(&self.namespace, &self.const_labels);
        let mut state = ScrapeState::Idle;
        let result = self.populate(&generation, &previous, &mut state).await;

        let duration = started.elapsed();
        self.instrumentation.record(duration, result.is_ok());

        let (report, error) = match result {
            Ok(report) => (Some(report), None),
            Err(e) => {
                match &e {
                    ExporterError::SourceReported(message) => {
                        tracing::error!(%message, "problem collecting metrics");
                    }
                    other => {
                        tracing::debug!(state = state.as_str(), kind = other.kind(), error = %other, "scrape failed");
                    }
                }
                generation.rebuild();
                (None, Some((state, e)))
            }
        };

        let series = generation.series_count();
        *self.published.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(generation);

        ScrapeOutcome {
            duration,
            error,
            series,
            report,
        }
    }

    async fn populate(
        &self,
        generation: &Generation,
        previous: &Generation,
        state: &mut ScrapeState,
    ) -> Result<TranslationReport> {
        *state = ScrapeState::Fetching;
        let body = self.fetch(METRICS_PATH).await?;
        *state = ScrapeState::Parsing;
        let doc = parse_body(&body)?;
        *state = ScrapeState::Translating;
        let report = translate_document(&doc, generation, Some(previous))?;

        if self.scrape_apps {
            *state = ScrapeState::Fetching;
            let body = self.fetch(APPS_PATH).await?;
            *state = ScrapeState::Parsing;
            let doc = parse_body(&body)?;
            *state = ScrapeState::Translating;
            let apps = translate_apps(&doc, generation)?;
            tracing::trace!(apps = apps.apps, skipped = apps.skipped, "translated apps");
        }
        Ok(report)
    }

    async fn fetch(&self, path: &str) -> Result<Bytes> {
        match tokio::time::timeout(self.timeout, self.fetcher.fetch(path)).await {
            Ok(res) => res,
            Err(_) => Err(ExporterError::Transport(format!(
                "GET {path}: timed out after {:?}",
                self.timeout
            ))),
        }
    }

    fn published(&self) -> Arc<Generation> {
        Arc::clone(&self.published.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Append the last published generation and the self-metrics to `out`.
    pub fn collect_into(&self, out: &mut Exposition) {
        self.published().collect_into(out);
        self.instrumentation
            .collect_into(&self.namespace, &self.const_labels, out);
    }
}

fn parse_body(body: &[u8]) -> Result<Value> {
    serde_json::from_slice(body).map_err(|e| ExporterError::Parse(format!("invalid json: {e}")))
}
