//! Translation of the Marathon `/metrics` document into typed series.
//!
//! The document is a Dropwizard metrics dump:
//!
//! ```json
//! { "version": "4.0.0",
//!   "counters":   { "<name>": { "count": 1 } },
//!   "gauges":     { "<name>": { "value": 2 } },
//!   "meters":     { "<name>": { "count": 5, "m1_rate": 1, "units": "events/second" } },
//!   "histograms": { "<name>": { "count": 3, "p50": 10, "max": 12 } },
//!   "timers":     { "<name>": { "count": 3, "p50": 10, "rate_units": "calls/second" } } }
//! ```
//!
//! Each family has its own decoder. A metric that fails to decode is skipped
//! and the rest of the document is still translated; only a top-level
//! `message` aborts the whole document.

use serde_json::{Map, Value};

use crate::error::{ExporterError, Result};
use crate::naming::{normalize, normalize_rate_window};
use crate::registry::{Generation, Series, SeriesKind};

const PERCENTILES: [&str; 6] = ["p50", "p75", "p95", "p98", "p99", "p999"];
const SNAPSHOT_STATS: [&str; 4] = ["max", "mean", "min", "stddev"];
const TIMER_RATES: [&str; 4] = ["mean_rate", "m1_rate", "m5_rate", "m15_rate"];

/// The five Dropwizard metric shapes found in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Counter,
    Gauge,
    Meter,
    Histogram,
    Timer,
}

impl Family {
    /// Translation order. Fixed so logs and first-seen events are stable.
    pub const ALL: [Family; 5] = [
        Family::Counter,
        Family::Gauge,
        Family::Meter,
        Family::Histogram,
        Family::Timer,
    ];

    /// Top-level document key holding this family.
    pub fn section(self) -> &'static str {
        match self {
            Family::Counter => "counters",
            Family::Gauge => "gauges",
            Family::Meter => "meters",
            Family::Histogram => "histograms",
            Family::Timer => "timers",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Family::Counter => "counter",
            Family::Gauge => "gauge",
            Family::Meter => "meter",
            Family::Histogram => "histogram",
            Family::Timer => "timer",
        }
    }

    /// Kind and normalized name of the series whose creation marks a metric
    /// as new: the metric itself for counters and gauges, `<name>_count` otherwise.
    pub fn primary_series(self, key: &str) -> (SeriesKind, String) {
        match self {
            Family::Counter => (SeriesKind::Counter, normalize(key)),
            Family::Gauge => (SeriesKind::Gauge, normalize(key)),
            Family::Meter | Family::Histogram | Family::Timer => {
                (SeriesKind::Counter, format!("{}_count", normalize(key)))
            }
        }
    }

    /// Translate one metric of this family. Returns whether its primary
    /// series was created by this call.
    pub fn translate(self, key: &str, metric: &Value, generation: &Generation) -> Result<bool> {
        match self {
            Family::Counter => translate_counter(key, metric, generation),
            Family::Gauge => translate_gauge(key, metric, generation),
            Family::Meter => translate_meter(key, metric, generation),
            Family::Histogram => translate_histogram(key, metric, generation),
            Family::Timer => translate_timer(key, metric, generation),
        }
    }
}

/// What one document translation did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TranslationReport {
    /// Metrics whose series were created in this generation.
    pub created: usize,
    /// Metrics absent from the previously published generation.
    pub first_seen: usize,
    /// Metrics that updated series already present in this generation.
    pub updated: usize,
    /// Metrics skipped because they failed to decode.
    pub skipped: usize,
    pub version: Option<String>,
}

/// Translate a whole metrics document into `generation`.
///
/// Fails with [`ExporterError::Parse`] when the document is not an object and
/// with [`ExporterError::SourceReported`] when it carries a `message`; in the
/// latter case nothing is written to `generation`.
///
/// `previous` is the generation published by the last cycle; metrics missing
/// from it are counted (and logged) as first seen.
pub fn translate_document(
    doc: &Value,
    generation: &Generation,
    previous: Option<&Generation>,
) -> Result<TranslationReport> {
    let root = doc
        .as_object()
        .ok_or_else(|| ExporterError::Parse("metrics document is not a JSON object".into()))?;

    if let Some(message) = root.get("message") {
        let message = message
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| message.to_string());
        return Err(ExporterError::SourceReported(message));
    }

    let mut report = TranslationReport::default();

    if let Some(version) = root.get("version") {
        match version.as_str() {
            Some(v) => {
                let (gauge, _) = generation.gauges.fetch_or_create(
                    "metrics_version",
                    "Marathon metrics version",
                    &["version"],
                );
                gauge.set(&[("version", v)], 1.0)?;
                report.version = Some(v.to_string());
            }
            None => {
                tracing::warn!(found = %version, "unexpected value for metrics version");
            }
        }
    }

    for family in Family::ALL {
        let Some(section) = root.get(family.section()) else {
            continue;
        };
        let Some(metrics) = section.as_object() else {
            tracing::warn!(section = family.section(), "metrics section is not an object");
            continue;
        };
        translate_family(family, metrics, generation, previous, &mut report);
    }

    Ok(report)
}

fn translate_family(
    family: Family,
    metrics: &Map<String, Value>,
    generation: &Generation,
    previous: Option<&Generation>,
    report: &mut TranslationReport,
) {
    for (key, metric) in metrics {
        match family.translate(key, metric, generation) {
            Ok(created) => {
                if created {
                    report.created += 1;
                } else {
                    report.updated += 1;
                }
                let (kind, name) = family.primary_series(key);
                let known = previous.is_some_and(|p| p.registry(kind).get(&name, &[]).is_some());
                if !known {
                    report.first_seen += 1;
                    tracing::info!(family = family.as_str(), metric = %name, "added series");
                }
            }
            Err(e) => {
                report.skipped += 1;
                tracing::debug!(family = family.as_str(), kind = e.kind(), error = %e, "skipping metric");
            }
        }
    }
}

fn number(metric: &str, v: &Value, field: &'static str) -> Result<f64> {
    match v.get(field) {
        None | Some(Value::Null) => Err(ExporterError::missing(metric, field)),
        Some(x) => x
            .as_f64()
            .ok_or_else(|| ExporterError::wrong_type(metric, field, x)),
    }
}

fn string<'a>(metric: &str, v: &'a Value, field: &'static str) -> Result<&'a str> {
    match v.get(field) {
        None | Some(Value::Null) => Err(ExporterError::missing(metric, field)),
        Some(x) => x
            .as_str()
            .ok_or_else(|| ExporterError::wrong_type(metric, field, x)),
    }
}

/// Numeric sibling fields, ignoring anything that is not a number.
fn numeric_fields(v: &Value) -> impl Iterator<Item = (&str, f64)> {
    v.as_object()
        .into_iter()
        .flat_map(|m| m.iter())
        .filter_map(|(k, x)| x.as_f64().map(|f| (k.as_str(), f)))
}

fn set_count(generation: &Generation, name: &str, help: &str, count: f64) -> Result<bool> {
    let (counter, created) = generation.counters.fetch_or_create(name, help, &[]);
    counter.set(&[], count)?;
    Ok(created)
}

/// Percentile gauge plus the `_max`/`_mean`/`_min`/`_stddev` scalars shared by
/// histograms and timers.
fn set_snapshot(generation: &Generation, name: &str, help: &str, v: &Value) -> Result<()> {
    let (percentiles, _) = generation.gauges.fetch_or_create(name, help, &["percentile"]);
    for (field, value) in numeric_fields(v) {
        if PERCENTILES.contains(&field) {
            set_percentile(&percentiles, field, value)?;
        } else if SNAPSHOT_STATS.contains(&field) {
            let (gauge, _) = generation
                .gauges
                .fetch_or_create(&format!("{name}_{field}"), help, &[]);
            gauge.set(&[], value)?;
        }
    }
    Ok(())
}

fn set_percentile(series: &Series, field: &str, value: f64) -> Result<()> {
    let digits = field.strip_prefix('p').unwrap_or(field);
    let label = format!("0.{digits}");
    series.set(&[("percentile", label.as_str())], value)
}

pub fn translate_counter(key: &str, v: &Value, generation: &Generation) -> Result<bool> {
    let count = number(key, v, "count")?;
    let help = format!("Marathon counter {key}");
    set_count(generation, &normalize(key), &help, count)
}

/// Gauges read `value`; older Marathon releases only report `max`.
pub fn translate_gauge(key: &str, v: &Value, generation: &Generation) -> Result<bool> {
    let value = match v.get("value") {
        None | Some(Value::Null) => number(key, v, "max")?,
        Some(_) => number(key, v, "value")?,
    };
    let help = format!("Marathon gauge {key}");
    let (gauge, created) = generation.gauges.fetch_or_create(&normalize(key), &help, &[]);
    gauge.set(&[], value)?;
    Ok(created)
}

pub fn translate_meter(key: &str, v: &Value, generation: &Generation) -> Result<bool> {
    let count = number(key, v, "count")?;
    let units = string(key, v, "units")?;

    let name = normalize(key);
    let help = format!("Marathon meter {key} ({units})");
    let created = set_count(generation, &format!("{name}_count"), &help, count)?;

    let (rates, _) = generation.gauges.fetch_or_create(&name, &help, &["rate"]);
    for (field, value) in numeric_fields(v) {
        if field.contains("rate") {
            let window = normalize_rate_window(field);
            rates.set(&[("rate", window.as_str())], value)?;
        }
    }
    Ok(created)
}

pub fn translate_histogram(key: &str, v: &Value, generation: &Generation) -> Result<bool> {
    let count = number(key, v, "count")?;

    let name = normalize(key);
    let help = format!("Marathon histogram {key}");
    let created = set_count(generation, &format!("{name}_count"), &help, count)?;
    set_snapshot(generation, &name, &help, v)?;
    Ok(created)
}

pub fn translate_timer(key: &str, v: &Value, generation: &Generation) -> Result<bool> {
    let count = number(key, v, "count")?;
    let units = string(key, v, "rate_units")?;

    let name = normalize(key);
    let help = format!("Marathon timer {key} ({units})");
    let created = set_count(generation, &format!("{name}_count"), &help, count)?;

    let (rates, _) = generation
        .gauges
        .fetch_or_create(&format!("{name}_rate"), &help, &["rate"]);
    for (field, value) in numeric_fields(v) {
        if TIMER_RATES.contains(&field) {
            let window = normalize_rate_window(field);
            rates.set(&[("rate", window.as_str())], value)?;
        }
    }
    set_snapshot(generation, &name, &help, v)?;
    Ok(created)
}
