//! Streaming metric aggregators.
//!
//! Each aggregator turns a stream of samples into a compact summary using
//! fixed memory, and writes that summary to a [`Writer`] at the end of a
//! publish window.

mod counter;
mod gauge;
mod histogram;
mod labels;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracemeter_types::Sample;
use tracing::{debug, warn};

use crate::writer::{WriteResult, Writer};

pub use counter::Counter;
pub use gauge::Gauge;
pub use histogram::{Histogram, Percentile, RESERVOIR_SIZE};
pub use labels::Labels;

/// The aggregator used for a metric name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Per-second rate of a monotonic total.
    Counter,
    /// Time-weighted average of a level.
    Gauge,
    /// Extremes and percentiles of a distribution.
    Histogram,
    /// Occurrences of distinct lines of text.
    Labels,
}

/// An aggregation of values over a period of time.
///
/// The variant for a name is fixed by whichever kind first records under it.
#[derive(Debug, Clone)]
pub enum Metric {
    /// See [`Counter`].
    Counter(Counter),
    /// See [`Gauge`].
    Gauge(Gauge),
    /// See [`Histogram`].
    Histogram(Histogram),
    /// See [`Labels`].
    Labels(Labels),
    /// Per-key sub-buckets of a mapping-shaped sample.
    Map(MetricMap),
}

impl Metric {
    /// Create an empty aggregator of the given kind.
    ///
    /// Histograms report `percentiles` when given, the defaults otherwise.
    pub fn new(kind: MetricKind, percentiles: Option<&Arc<[Percentile]>>) -> Self {
        match kind {
            MetricKind::Counter => Metric::Counter(Counter::new()),
            MetricKind::Gauge => Metric::Gauge(Gauge::new()),
            MetricKind::Histogram => match percentiles {
                Some(p) => Metric::Histogram(Histogram::with_percentiles(p.clone())),
                None => Metric::Histogram(Histogram::new()),
            },
            MetricKind::Labels => Metric::Labels(Labels::new()),
        }
    }

    /// Update the metric with a sample.
    ///
    /// # Panics
    ///
    /// Panics if the aggregator does not support the sample kind.
    pub fn record(&mut self, sample: &Sample) {
        match self {
            Metric::Counter(m) => m.record(sample),
            Metric::Gauge(m) => m.record(sample),
            Metric::Histogram(m) => m.record(sample),
            Metric::Labels(m) => m.record(sample),
            Metric::Map(_) => panic!(
                "unsupported sample kind '{}' for map metric",
                sample.kind()
            ),
        }
    }

    /// Prepare the metric for the next window.
    pub fn reset(&mut self) {
        match self {
            Metric::Counter(m) => m.reset(),
            Metric::Gauge(m) => m.reset(),
            Metric::Histogram(m) => m.reset(),
            Metric::Labels(m) => m.reset(),
            Metric::Map(m) => m.reset(),
        }
    }

    /// Write the aggregated values under `name`.
    pub fn write(&mut self, w: &mut dyn Writer, name: &str) {
        match self {
            Metric::Counter(m) => m.write(w, name),
            Metric::Gauge(m) => m.write(w, name),
            Metric::Histogram(m) => m.write(w, name),
            Metric::Labels(m) => m.write(w, name),
            Metric::Map(m) => m.write(w, name),
        }
    }

    /// The kind of a scalar metric; `None` for maps.
    pub fn kind(&self) -> Option<MetricKind> {
        match self {
            Metric::Counter(_) => Some(MetricKind::Counter),
            Metric::Gauge(_) => Some(MetricKind::Gauge),
            Metric::Histogram(_) => Some(MetricKind::Histogram),
            Metric::Labels(_) => Some(MetricKind::Labels),
            Metric::Map(_) => None,
        }
    }
}

/// A declared structured sample: named fields, each with its aggregator.
///
/// ```rust
/// use std::time::Duration;
/// use tracemeter::{Fields, MetricKind};
///
/// let fields = Fields::new()
///     .counter("Requests", true)
///     .histogram("Latency", Duration::from_millis(3))
///     .nested("Body", Fields::new().histogram("Bytes", 512))
///     .labels("Status", "200");
///
/// assert_eq!(fields.len(), 4);
/// # let _ = MetricKind::Counter;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Fields {
    entries: Vec<(String, Field)>,
}

/// One field of a structured sample.
#[derive(Debug, Clone)]
pub enum Field {
    /// A sample for a scalar aggregator.
    Metric(MetricKind, Sample),
    /// A nested structure, flattened to `name.child`.
    Nested(Fields),
    /// Per-key structures, kept in a [`MetricMap`].
    Map(BTreeMap<String, Fields>),
}

impl Fields {
    /// Create an empty set of fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field.
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.entries.push((name.into(), field));
        self
    }

    /// Add a counter sample.
    pub fn counter(self, name: impl Into<String>, sample: impl Into<Sample>) -> Self {
        self.field(name, Field::Metric(MetricKind::Counter, sample.into()))
    }

    /// Add a gauge sample.
    pub fn gauge(self, name: impl Into<String>, sample: impl Into<Sample>) -> Self {
        self.field(name, Field::Metric(MetricKind::Gauge, sample.into()))
    }

    /// Add a histogram sample.
    pub fn histogram(self, name: impl Into<String>, sample: impl Into<Sample>) -> Self {
        self.field(name, Field::Metric(MetricKind::Histogram, sample.into()))
    }

    /// Add a labels sample.
    pub fn labels(self, name: impl Into<String>, sample: impl Into<Sample>) -> Self {
        self.field(name, Field::Metric(MetricKind::Labels, sample.into()))
    }

    /// Add a nested structure.
    pub fn nested(self, name: impl Into<String>, fields: Fields) -> Self {
        self.field(name, Field::Nested(fields))
    }

    /// Add a mapping of keys to structures.
    pub fn map<K: Into<String>>(
        self,
        name: impl Into<String>,
        items: impl IntoIterator<Item = (K, Fields)>,
    ) -> Self {
        let items = items.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self.field(name, Field::Map(items))
    }

    /// Iterate over the fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.entries.iter().map(|(name, field)| (name.as_str(), field))
    }

    /// Number of top-level fields.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no fields.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A set of named metrics plus the number of samples folded into it.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    keys: BTreeMap<String, Metric>,
    hits: u64,
}

impl Metrics {
    /// Create an empty bucket.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a structured sample into the bucket and count one hit.
    pub fn record_fields(&mut self, fields: &Fields, percentiles: Option<&Arc<[Percentile]>>) {
        self.hits += 1;
        self.apply(fields, "", percentiles);
    }

    fn apply(&mut self, fields: &Fields, prefix: &str, percentiles: Option<&Arc<[Percentile]>>) {
        for (name, field) in fields.iter() {
            let key = format!("{}{}", prefix, name);
            match field {
                Field::Metric(kind, sample) => {
                    self.entry(key, *kind, percentiles).record(sample);
                }
                Field::Nested(inner) => {
                    self.apply(inner, &format!("{}.", key), percentiles);
                }
                Field::Map(items) => {
                    let metric = self
                        .keys
                        .entry(key)
                        .or_insert_with(|| Metric::Map(MetricMap::default()));
                    match metric {
                        Metric::Map(map) => map.record(items, percentiles),
                        other => panic!(
                            "unsupported map sample for {:?} metric",
                            other.kind()
                        ),
                    }
                }
            }
        }
    }

    /// Fold one sample into the named metric, creating it with `kind` if needed.
    pub fn record(
        &mut self,
        name: &str,
        kind: MetricKind,
        sample: &Sample,
        percentiles: Option<&Arc<[Percentile]>>,
    ) {
        match self.keys.get_mut(name) {
            Some(metric) => metric.record(sample),
            None => self.entry(name.to_string(), kind, percentiles).record(sample),
        }
    }

    fn entry(
        &mut self,
        key: String,
        kind: MetricKind,
        percentiles: Option<&Arc<[Percentile]>>,
    ) -> &mut Metric {
        self.keys
            .entry(key)
            .or_insert_with(|| Metric::new(kind, percentiles))
    }

    /// Count one hit without recording any value.
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    /// Reset every metric in place and clear the hit count.
    pub fn reset(&mut self) {
        for metric in self.keys.values_mut() {
            metric.reset();
        }
        self.hits = 0;
    }

    /// Write every metric under `path.<metric name>`.
    pub fn write(&mut self, w: &mut dyn Writer, path: &str) {
        for (name, metric) in self.keys.iter_mut() {
            metric.write(w, &join(path, name));
        }
    }

    /// Look up a metric by name.
    pub fn get(&self, name: &str) -> Option<&Metric> {
        self.keys.get(name)
    }

    /// Names of the metrics in the bucket.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    /// Samples folded into the bucket during the window.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Number of metrics in the bucket.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the bucket holds no metrics.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Per-key sub-buckets fed by mapping-shaped samples.
#[derive(Debug, Clone, Default)]
pub struct MetricMap {
    items: BTreeMap<String, Metrics>,
}

impl MetricMap {
    /// Fold each key's structure into its own bucket.
    pub fn record(
        &mut self,
        items: &BTreeMap<String, Fields>,
        percentiles: Option<&Arc<[Percentile]>>,
    ) {
        for (key, fields) in items {
            self.items
                .entry(key.clone())
                .or_default()
                .record_fields(fields, percentiles);
        }
    }

    /// Reset every sub-bucket.
    pub fn reset(&mut self) {
        for bucket in self.items.values_mut() {
            bucket.reset();
        }
    }

    /// Write each sub-bucket under `name.<key>`.
    pub fn write(&mut self, w: &mut dyn Writer, name: &str) {
        for (key, bucket) in self.items.iter_mut() {
            bucket.write(w, &join(name, key));
        }
    }

    /// Look up the bucket for a key.
    pub fn get(&self, key: &str) -> Option<&Metrics> {
        self.items.get(key)
    }
}

/// Join two path segments with a `.`, skipping empty ones.
pub(crate) fn join(path: &str, name: &str) -> String {
    match (path.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (_, true) => path.to_string(),
        _ => format!("{}.{}", path, name),
    }
}

/// Numeric view of a sample for counters and gauges.
pub(crate) fn numeric(sample: &Sample, what: &str) -> f64 {
    match sample.as_f64() {
        Some(value) => value,
        None => panic!("unsupported sample kind '{}' for {}", sample.kind(), what),
    }
}

/// Log a write that no sink took.
pub(crate) fn emit(result: WriteResult, name: &str) {
    match result {
        Ok(()) => {}
        Err(err) if err.is_ignored() => debug!("metric '{}' ignored by every sink", name),
        Err(err) => warn!("failed to write metric '{}': {}", name, err),
    }
}
