//! Per-scrape series registries.
//!
//! A [`SeriesRegistry`] owns lazily created [`Series`], looked up by name plus
//! the sorted set of label keys. Values are `f64` stored as bits in atomics so
//! the translation path and the publish path can share a registry without a
//! lock around every write. A fresh [`Generation`] (counters + gauges) is
//! built for every scrape; whatever the scrape did not touch is simply absent.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::{ExporterError, Result};
use crate::exposition::Exposition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    Counter,
    Gauge,
}

impl SeriesKind {
    /// Type name used in `# TYPE` lines.
    pub fn as_str(self) -> &'static str {
        match self {
            SeriesKind::Counter => "counter",
            SeriesKind::Gauge => "gauge",
        }
    }
}

/// One named series with a fixed label schema and a value per label combination.
///
/// Counters are not incremented: Marathon reports cumulative totals and the
/// translator re-asserts them with [`Series::set`] on every scrape.
#[derive(Debug)]
pub struct Series {
    kind: SeriesKind,
    name: String,
    help: String,
    label_keys: Vec<String>,
    values: DashMap<Vec<String>, AtomicU64>,
}

impl Series {
    fn new(kind: SeriesKind, name: &str, help: &str, label_keys: Vec<String>) -> Self {
        Self {
            kind,
            name: name.to_string(),
            help: help.to_string(),
            label_keys,
            values: DashMap::new(),
        }
    }

    pub fn kind(&self) -> SeriesKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    /// Sorted label keys.
    pub fn label_keys(&self) -> &[String] {
        &self.label_keys
    }

    /// Set the value for one label combination. Label order does not matter,
    /// but the keys must be exactly the series' schema.
    pub fn set(&self, labels: &[(&str, &str)], value: f64) -> Result<()> {
        let key = self.label_values(labels)?;
        let bits = value.to_bits();
        match self.values.entry(key) {
            Entry::Occupied(e) => e.get().store(bits, Ordering::Relaxed),
            Entry::Vacant(e) => {
                e.insert(AtomicU64::new(bits));
            }
        }
        Ok(())
    }

    /// Current value for one label combination, if it was set.
    pub fn get(&self, labels: &[(&str, &str)]) -> Option<f64> {
        let key = self.label_values(labels).ok()?;
        self.values
            .get(&key)
            .map(|v| f64::from_bits(v.load(Ordering::Relaxed)))
    }

    /// Number of label combinations that carry a value.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn label_values(&self, labels: &[(&str, &str)]) -> Result<Vec<String>> {
        let mut pairs: Vec<(&str, &str)> = labels.to_vec();
        pairs.sort_by(|a, b| a.0.cmp(b.0));

        let matches = pairs.len() == self.label_keys.len()
            && pairs.iter().zip(&self.label_keys).all(|((k, _), want)| *k == want.as_str());
        if !matches {
            return Err(ExporterError::LabelMismatch {
                series: self.name.clone(),
                expected: self.label_keys.clone(),
                got: pairs.iter().map(|(k, _)| k.to_string()).collect(),
            });
        }
        Ok(pairs.into_iter().map(|(_, v)| v.to_string()).collect())
    }

    fn collect_into(&self, full_name: &str, const_labels: &[(String, String)], out: &mut Exposition) {
        for r in self.values.iter() {
            let mut labels: Vec<(String, String)> = const_labels.to_vec();
            labels.extend(self.label_keys.iter().cloned().zip(r.key().iter().cloned()));
            let value = f64::from_bits(r.value().load(Ordering::Relaxed));
            out.push(full_name, &self.help, self.kind, labels, value);
        }
    }
}

/// Lookup key: metric name plus the sorted label keys, e.g. `foo{color,value}`.
pub fn series_key(name: &str, label_keys: &[&str]) -> String {
    let mut keys = label_keys.to_vec();
    keys.sort_unstable();
    format!("{}{{{}}}", name, keys.join(","))
}

/// Namespace-scoped map from series key to a lazily created series of one kind.
#[derive(Debug)]
pub struct SeriesRegistry {
    kind: SeriesKind,
    namespace: String,
    const_labels: Vec<(String, String)>,
    map: DashMap<String, Arc<Series>>,
}

impl SeriesRegistry {
    pub fn new(kind: SeriesKind, namespace: &str, const_labels: &[(String, String)]) -> Self {
        Self {
            kind,
            namespace: namespace.to_string(),
            const_labels: const_labels.to_vec(),
            map: DashMap::new(),
        }
    }

    pub fn counters(namespace: &str, const_labels: &[(String, String)]) -> Self {
        Self::new(SeriesKind::Counter, namespace, const_labels)
    }

    pub fn gauges(namespace: &str, const_labels: &[(String, String)]) -> Self {
        Self::new(SeriesKind::Gauge, namespace, const_labels)
    }

    pub fn kind(&self) -> SeriesKind {
        self.kind
    }

    /// Return the series for `name` + `label_keys`, creating it if needed.
    ///
    /// The boolean is `true` when this call created the series. Asking for the
    /// same name with a different set of label keys yields a distinct series.
    pub fn fetch_or_create(&self, name: &str, help: &str, label_keys: &[&str]) -> (Arc<Series>, bool) {
        match self.map.entry(series_key(name, label_keys)) {
            Entry::Occupied(e) => (Arc::clone(e.get()), false),
            Entry::Vacant(e) => {
                let mut keys: Vec<String> = label_keys.iter().map(|k| k.to_string()).collect();
                keys.sort();
                let series = Arc::new(Series::new(self.kind, name, help, keys));
                e.insert(Arc::clone(&series));
                (series, true)
            }
        }
    }

    /// Look up an existing series without creating it.
    pub fn get(&self, name: &str, label_keys: &[&str]) -> Option<Arc<Series>> {
        self.map
            .get(&series_key(name, label_keys))
            .map(|r| Arc::clone(r.value()))
    }

    /// Drop every series.
    pub fn rebuild(&self) {
        self.map.clear();
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Fully qualified exposition name for a series.
    pub fn full_name(&self, name: &str) -> String {
        if self.namespace.is_empty() {
            name.to_string()
        } else {
            format!("{}_{}", self.namespace, name)
        }
    }

    pub fn collect_into(&self, out: &mut Exposition) {
        for r in self.map.iter() {
            let series = r.value();
            series.collect_into(&self.full_name(series.name()), &self.const_labels, out);
        }
    }
}

/// The counters and gauges produced by one scrape cycle.
#[derive(Debug)]
pub struct Generation {
    pub counters: SeriesRegistry,
    pub gauges: SeriesRegistry,
}

impl Generation {
    pub fn new(namespace: &str, const_labels: &[(String, String)]) -> Self {
        Self {
            counters: SeriesRegistry::counters(namespace, const_labels),
            gauges: SeriesRegistry::gauges(namespace, const_labels),
        }
    }

    /// Drop every series from both registries.
    pub fn rebuild(&self) {
        self.counters.rebuild();
        self.gauges.rebuild();
    }

    pub fn series_count(&self) -> usize {
        self.counters.len() + self.gauges.len()
    }

    pub fn registry(&self, kind: SeriesKind) -> &SeriesRegistry {
        match kind {
            SeriesKind::Counter => &self.counters,
            SeriesKind::Gauge => &self.gauges,
        }
    }

    pub fn collect_into(&self, out: &mut Exposition) {
        self.counters.collect_into(out);
        self.gauges.collect_into(out);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn container_key() {
        assert_eq!(series_key("foo", &[]), "foo{}");
        assert_eq!(series_key("foo", &["value"]), "foo{value}");
        assert_eq!(series_key("foo", &["value", "color"]), "foo{color,value}");
    }

    #[test]
    fn fetch_counter_creates_once() {
        let reg = SeriesRegistry::counters("ns", &[]);
        let (_, created) = reg.fetch_or_create("foo", "", &[]);
        assert!(created);
        assert_eq!(reg.len(), 1);

        let (_, created) = reg.fetch_or_create("foo", "", &[]);
        assert!(!created);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn fetch_gauge_creates_once() {
        let reg = SeriesRegistry::gauges("ns", &[]);
        assert!(reg.fetch_or_create("foo", "", &[]).1);
        assert!(!reg.fetch_or_create("foo", "", &[]).1);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn label_order_does_not_matter() {
        let reg = SeriesRegistry::gauges("ns", &[]);
        let (a, created_a) = reg.fetch_or_create("foo", "", &["a", "b"]);
        let (b, created_b) = reg.fetch_or_create("foo", "", &["b", "a"]);
        assert!(created_a);
        assert!(!created_b);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn different_label_keys_are_distinct_series() {
        let reg = SeriesRegistry::gauges("ns", &[]);
        let (plain, _) = reg.fetch_or_create("foo", "", &[]);
        let (rated, created) = reg.fetch_or_create("foo", "", &["rate"]);
        assert!(created);
        assert!(!Arc::ptr_eq(&plain, &rated));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn set_overwrites_instead_of_adding() {
        let reg = SeriesRegistry::counters("ns", &[]);
        let (c, _) = reg.fetch_or_create("foo", "", &[]);
        c.set(&[], 5.0).unwrap();
        c.set(&[], 3.0).unwrap();
        assert_eq!(c.get(&[]), Some(3.0));
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn set_accepts_any_label_order() {
        let reg = SeriesRegistry::gauges("ns", &[]);
        let (g, _) = reg.fetch_or_create("foo", "", &["b", "a"]);
        g.set(&[("a", "1"), ("b", "2")], 7.0).unwrap();
        assert_eq!(g.get(&[("b", "2"), ("a", "1")]), Some(7.0));
    }

    #[test]
    fn set_rejects_wrong_label_keys() {
        let reg = SeriesRegistry::gauges("ns", &[]);
        let (g, _) = reg.fetch_or_create("foo", "", &["rate"]);
        let err = g.set(&[("percentile", "0.5")], 1.0).unwrap_err();
        assert_eq!(err.kind(), "LABEL_MISMATCH");
        assert!(g.is_empty());
    }

    #[test]
    fn rebuild_empties_registry() {
        let generation = Generation::new("ns", &[]);
        generation.counters.fetch_or_create("foo", "", &[]);
        generation.gauges.fetch_or_create("bar", "", &[]);
        assert_eq!(generation.series_count(), 2);

        generation.rebuild();
        assert_eq!(generation.series_count(), 0);
        assert!(generation.counters.fetch_or_create("foo", "", &[]).1);
    }

    #[test]
    fn registry_by_kind() {
        let generation = Generation::new("ns", &[]);
        generation.gauges.fetch_or_create("g", "", &[]);
        assert!(generation.registry(SeriesKind::Gauge).get("g", &[]).is_some());
        assert!(generation.registry(SeriesKind::Counter).get("g", &[]).is_none());
    }

    #[test]
    fn collect_prefixes_namespace_and_const_labels() {
        let labels = vec![("instance".to_string(), "m1:8080".to_string())];
        let generation = Generation::new("marathon", &labels);
        let (c, _) = generation.counters.fetch_or_create("foo_count", "help", &[]);
        c.set(&[], 1.0).unwrap();

        let mut out = Exposition::new();
        generation.collect_into(&mut out);
        assert_eq!(
            out.value("marathon_foo_count", &[("instance", "m1:8080")]),
            Some(1.0)
        );
    }

    #[test]
    fn concurrent_fetch_yields_one_series() {
        let reg = Arc::new(SeriesRegistry::gauges("ns", &[]));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reg = Arc::clone(&reg);
                std::thread::spawn(move || reg.fetch_or_create("foo", "", &["x", "y"]).1)
            })
            .collect();
        let created = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|c| *c)
            .count();
        assert_eq!(created, 1);
        assert_eq!(reg.len(), 1);
    }
}
