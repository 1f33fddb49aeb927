//! Prometheus text exposition (format 0.0.4).
//!
//! Samples from several registries (and several sources) are merged by metric
//! name so each name gets exactly one `# HELP`/`# TYPE` header. Output is
//! sorted by name, then by label set, to keep scrapes diffable.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::registry::SeriesKind;

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn escape_help(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Format a sample value the way the text format expects.
pub fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".into()
    } else if v.is_infinite() {
        if v > 0.0 { "+Inf".into() } else { "-Inf".into() }
    } else {
        format!("{v}")
    }
}

#[derive(Debug)]
struct MetricFamily {
    help: String,
    kind: SeriesKind,
    samples: Vec<(Vec<(String, String)>, f64)>,
}

#[derive(Debug, Default)]
pub struct Exposition {
    families: BTreeMap<String, MetricFamily>,
}

impl Exposition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one sample. The first push for a name fixes its help and type; a
    /// sample of another type, or one repeating a label set already present,
    /// is dropped.
    pub fn push(
        &mut self,
        name: &str,
        help: &str,
        kind: SeriesKind,
        mut labels: Vec<(String, String)>,
        value: f64,
    ) {
        labels.sort();
        let family = self
            .families
            .entry(name.to_string())
            .or_insert_with(|| MetricFamily {
                help: help.to_string(),
                kind,
                samples: Vec::new(),
            });
        if family.kind != kind {
            tracing::debug!(metric = %name, first = family.kind.as_str(), got = kind.as_str(), "metric type clash, dropping sample");
            return;
        }
        if family.samples.iter().any(|(existing, _)| *existing == labels) {
            tracing::debug!(metric = %name, "duplicate label set, dropping sample");
            return;
        }
        family.samples.push((labels, value));
    }

    /// Move every sample of `other` into `self`.
    pub fn merge(&mut self, other: Exposition) {
        for (name, family) in other.families {
            for (labels, value) in family.samples {
                self.push(&name, &family.help, family.kind, labels, value);
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.families.contains_key(name)
    }

    /// Value of the sample with exactly these labels (any order).
    pub fn value(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        let mut want: Vec<(String, String)> = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        want.sort();
        self.families
            .get(name)?
            .samples
            .iter()
            .find(|(l, _)| *l == want)
            .map(|(_, v)| *v)
    }

    /// Number of samples across all families.
    pub fn sample_count(&self) -> usize {
        self.families.values().map(|f| f.samples.len()).sum()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, family) in &self.families {
            let _ = writeln!(out, "# HELP {} {}", name, escape_help(&family.help));
            let _ = writeln!(out, "# TYPE {} {}", name, family.kind.as_str());

            let mut samples: Vec<_> = family.samples.iter().collect();
            samples.sort_by(|a, b| a.0.cmp(&b.0));
            for (labels, value) in samples {
                if labels.is_empty() {
                    let _ = writeln!(out, "{} {}", name, format_value(*value));
                } else {
                    let label_str = labels
                        .iter()
                        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
                        .collect::<Vec<_>>()
                        .join(",");
                    let _ = writeln!(out, "{}{{{}}} {}", name, label_str, format_value(*value));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn render_unlabeled_and_labeled() {
        let mut e = Exposition::new();
        e.push("ns_foo_count", "Marathon counter foo", SeriesKind::Counter, vec![], 1.0);
        e.push("ns_foo", "Marathon meter foo (u)", SeriesKind::Gauge, labels(&[("rate", "1m")]), 0.25);

        let out = e.render();
        assert!(out.contains("# HELP ns_foo_count Marathon counter foo\n"));
        assert!(out.contains("# TYPE ns_foo_count counter\n"));
        assert!(out.contains("ns_foo_count 1\n"));
        assert!(out.contains("# TYPE ns_foo gauge\n"));
        assert!(out.contains("ns_foo{rate=\"1m\"} 0.25\n"));
    }

    #[test]
    fn one_header_per_name_when_merged() {
        let mut a = Exposition::new();
        a.push("ns_up", "up", SeriesKind::Gauge, labels(&[("instance", "a")]), 1.0);
        let mut b = Exposition::new();
        b.push("ns_up", "up", SeriesKind::Gauge, labels(&[("instance", "b")]), 0.0);
        a.merge(b);

        let out = a.render();
        assert_eq!(out.matches("# TYPE ns_up gauge").count(), 1);
        assert!(out.contains("ns_up{instance=\"a\"} 1\n"));
        assert!(out.contains("ns_up{instance=\"b\"} 0\n"));
        assert_eq!(a.sample_count(), 2);
    }

    #[test]
    fn type_clash_keeps_first_type() {
        let mut e = Exposition::new();
        e.push("ns_foo_count", "histogram foo", SeriesKind::Counter, vec![], 1.0);
        e.push("ns_foo_count", "gauge foo.count", SeriesKind::Gauge, vec![], 9.0);

        let out = e.render();
        assert!(out.contains("# TYPE ns_foo_count counter\n"));
        assert!(out.contains("ns_foo_count 1\n"));
        assert!(!out.contains("ns_foo_count 9"));
        assert_eq!(e.sample_count(), 1);
    }

    #[test]
    fn duplicate_label_set_is_dropped() {
        let mut e = Exposition::new();
        e.push("ns_up", "up", SeriesKind::Gauge, labels(&[("instance", "a"), ("zone", "z")]), 1.0);
        e.push("ns_up", "up", SeriesKind::Gauge, labels(&[("zone", "z"), ("instance", "a")]), 0.0);
        e.push("ns_up", "up", SeriesKind::Gauge, labels(&[("instance", "b"), ("zone", "z")]), 0.0);

        assert_eq!(e.sample_count(), 2);
        assert_eq!(e.value("ns_up", &[("instance", "a"), ("zone", "z")]), Some(1.0));
        assert_eq!(e.render().matches("ns_up{instance=\"a\"").count(), 1);
    }

    #[test]
    fn labels_are_sorted_and_escaped() {
        let mut e = Exposition::new();
        e.push(
            "ns_app",
            "h",
            SeriesKind::Gauge,
            labels(&[("version", "a\"b"), ("app", "/x\\y")]),
            2.0,
        );
        assert!(e
            .render()
            .contains("ns_app{app=\"/x\\\\y\",version=\"a\\\"b\"} 2\n"));
        assert_eq!(e.value("ns_app", &[("version", "a\"b"), ("app", "/x\\y")]), Some(2.0));
    }

    #[test]
    fn special_values() {
        assert_eq!(format_value(f64::NAN), "NaN");
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(f64::NEG_INFINITY), "-Inf");
        assert_eq!(format_value(10.0), "10");
        assert_eq!(format_value(0.125), "0.125");
    }
}
