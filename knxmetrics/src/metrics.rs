//! Gauge registry backing the `/metrics` endpoint.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use parking_lot::RwLock;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use tracing::{debug, warn};

/// Ordered label name/value pairs bound to one series.
pub type LabelSet = Vec<(String, String)>;

type GaugeFamily = Family<LabelSet, Gauge<f64, AtomicU64>>;

/// Name of the dispatch outcome counter family (exposed with `_total`).
pub const EVENTS_METRIC: &str = "knxmetrics_events";

/// Writable handle to one gauge family.
///
/// Cloning is cheap; clones write to the same family. A series only appears
/// in the exposition once a value has been recorded for it.
#[derive(Debug, Clone, Default)]
pub struct GaugeHandle {
    family: GaugeFamily,
    written: Arc<RwLock<HashSet<LabelSet>>>,
}

impl GaugeHandle {
    /// Set the series identified by `labels` to `value`.
    pub fn record(&self, value: f64, labels: &LabelSet) {
        self.family.get_or_create(labels).set(value);
        if !self.written.read().contains(labels) {
            self.written.write().insert(labels.clone());
        }
    }

    /// Last recorded value of a series, `None` if it was never written.
    pub fn value(&self, labels: &LabelSet) -> Option<f64> {
        if !self.written.read().contains(labels) {
            return None;
        }
        Some(self.family.get_or_create(labels).get())
    }
}

/// Per-outcome dispatch counters.
#[derive(Debug, Clone)]
pub struct EventCounters {
    pub ignored: Counter,
    pub unknown_address: Counter,
    pub undecodable: Counter,
    pub recorded: Counter,
}

impl EventCounters {
    fn from_family(family: &Family<LabelSet, Counter>) -> Self {
        let outcome = |name: &str| {
            family
                .get_or_create(&vec![("outcome".to_string(), name.to_string())])
                .clone()
        };
        Self {
            ignored: outcome("ignored"),
            unknown_address: outcome("unknown_address"),
            undecodable: outcome("undecodable"),
            recorded: outcome("recorded"),
        }
    }
}

/// Registry of gauges populated once during setup.
///
/// Registration needs `&mut self`; after setup the registry is shared
/// read-only (see [`SharedRegistry`]) and series writes go through
/// [`GaugeHandle`]s, which are internally synchronized.
#[derive(Debug)]
pub struct MetricRegistry {
    registry: Registry,
    gauges: HashMap<String, GaugeHandle>,
    events: EventCounters,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricRegistry {
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let events = Family::<LabelSet, Counter>::default();
        registry.register(
            EVENTS_METRIC,
            "Bus events handled by the dispatcher, by outcome",
            events.clone(),
        );

        Self {
            registry,
            gauges: HashMap::new(),
            events: EventCounters::from_family(&events),
        }
    }

    /// Get or register the gauge family called `name`.
    ///
    /// The name is sanitized to the Prometheus character set. Asking for an
    /// already registered name returns the existing family; its first
    /// description is kept.
    pub fn gauge(&mut self, name: &str, description: &str) -> GaugeHandle {
        let sanitized = sanitize_metric_name(name);
        if sanitized != name {
            warn!(metric = %name, sanitized = %sanitized, "Metric name sanitized");
        }

        if let Some(handle) = self.gauges.get(&sanitized) {
            return handle.clone();
        }

        let handle = GaugeHandle::default();
        self.registry
            .register(sanitized.clone(), description, handle.family.clone());
        debug!(metric = %sanitized, "Registered gauge");

        self.gauges.insert(sanitized, handle.clone());
        handle
    }

    /// Counters the dispatcher bumps per handled event.
    pub fn event_counters(&self) -> EventCounters {
        self.events.clone()
    }

    /// Number of distinct gauge families.
    pub fn gauge_count(&self) -> usize {
        self.gauges.len()
    }

    /// Render all metrics in the OpenMetrics text format.
    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut output = String::new();
        encode(&mut output, &self.registry)?;
        Ok(output)
    }
}

/// Registry handle shared with the HTTP endpoint.
pub type SharedRegistry = Arc<MetricRegistry>;

/// True if `name` would clash with the exporter's own counter family.
pub fn is_reserved_metric_name(name: &str) -> bool {
    sanitize_metric_name(name)
        .strip_prefix(EVENTS_METRIC)
        .is_some_and(|suffix| matches!(suffix, "" | "_total" | "_created"))
}

/// Sanitize a metric name to `[a-zA-Z_:][a-zA-Z0-9_:]*`.
pub fn sanitize_metric_name(name: &str) -> String {
    sanitize_identifier(name, |c| c == ':').unwrap_or_else(|| "unnamed".to_string())
}

/// Sanitize a label name to `[a-zA-Z_][a-zA-Z0-9_]*`.
///
/// Names starting with `__` are reserved by Prometheus. Runs of underscores
/// collapse, so the result never starts with `__`.
pub fn sanitize_label_name(name: &str) -> String {
    sanitize_identifier(name, |_| false).unwrap_or_else(|| "label".to_string())
}

/// Map every character outside `[a-zA-Z0-9_]` (plus `extra`) to `_`,
/// collapsing runs and trimming trailing underscores. A leading digit is
/// kept behind a `_` prefix. `None` if nothing but separators remain.
fn sanitize_identifier(name: &str, extra: impl Fn(char) -> bool) -> Option<String> {
    let mut result = String::with_capacity(name.len() + 1);
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        result.push('_');
    }

    for c in name.chars() {
        if c.is_ascii_alphanumeric() || extra(c) {
            result.push(c);
        } else if !result.ends_with('_') {
            result.push('_');
        }
    }

    let trimmed = result.trim_end_matches('_');
    if trimmed.is_empty() {
        return None;
    }
    result.truncate(trimmed.len());
    Some(result)
}

/// Build a label set from configured name/value pairs.
///
/// Names are sanitized. When two names end up identical the later value
/// replaces the earlier one, keeping the first position.
pub fn label_set<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> LabelSet {
    let mut labels: LabelSet = Vec::new();
    for (name, value) in pairs {
        let sanitized = sanitize_label_name(name);
        match labels.iter_mut().find(|(existing, _)| *existing == sanitized) {
            Some(slot) => {
                warn!(label = %name, sanitized = %sanitized, "Duplicate label name, last value wins");
                slot.1 = value.to_string();
            }
            None => labels.push((sanitized, value.to_string())),
        }
    }
    labels
}
