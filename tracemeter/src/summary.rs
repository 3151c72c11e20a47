//! Windowed aggregation of samples, grouped by source.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracemeter_types::Sample;

use crate::metric::{join, Fields, MetricKind, Metrics, Percentile};
use crate::writer::Reporter;

/// The metrics of one publish window.
///
/// A summary maps source names to [`Metrics`] buckets. It is owned by a
/// single aggregation stream and is never shared while being recorded into;
/// at each publish boundary it is handed off whole and a fresh one installed.
#[derive(Debug, Clone)]
pub struct Summary {
    name: String,
    buckets: BTreeMap<String, Metrics>,
    sequence: u64,
    time: SystemTime,
    step: Duration,
    percentiles: Option<Arc<[Percentile]>>,
}

impl Summary {
    /// Create an empty summary whose metrics are written under `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            buckets: BTreeMap::new(),
            sequence: 0,
            time: SystemTime::now(),
            step: Duration::ZERO,
            percentiles: None,
        }
    }

    /// Report histograms created by this summary with these percentiles.
    ///
    /// # Panics
    ///
    /// Panics when a histogram is created if a percentile is outside `[0, 100]`.
    pub fn with_percentiles(mut self, percentiles: impl Into<Arc<[Percentile]>>) -> Self {
        self.percentiles = Some(percentiles.into());
        self
    }

    /// An empty summary for the window following this one.
    pub fn next(&self, time: SystemTime, step: Duration) -> Self {
        Self {
            name: self.name.clone(),
            buckets: BTreeMap::new(),
            sequence: self.sequence + 1,
            time,
            step,
            percentiles: self.percentiles.clone(),
        }
    }

    /// Fold a structured sample into the bucket for `source`.
    pub fn record(&mut self, source: &str, fields: &Fields) {
        let percentiles = self.percentiles.as_ref();
        self.buckets
            .entry(source.to_string())
            .or_default()
            .record_fields(fields, percentiles);
    }

    /// Add to the counter `name` of the unnamed bucket.
    pub fn count(&mut self, name: &str, sample: impl Into<Sample>) {
        self.record_kind(name, MetricKind::Counter, sample.into());
    }

    /// Set the gauge `name` of the unnamed bucket.
    pub fn set(&mut self, name: &str, sample: impl Into<Sample>) {
        self.record_kind(name, MetricKind::Gauge, sample.into());
    }

    /// Add a sample to the histogram `name` of the unnamed bucket.
    pub fn record_value(&mut self, name: &str, sample: impl Into<Sample>) {
        self.record_kind(name, MetricKind::Histogram, sample.into());
    }

    /// Add a line to the labels `name` of the unnamed bucket.
    pub fn log(&mut self, name: &str, sample: impl Into<Sample>) {
        self.record_kind(name, MetricKind::Labels, sample.into());
    }

    fn record_kind(&mut self, name: &str, kind: MetricKind, sample: Sample) {
        let percentiles = self.percentiles.as_ref();
        let bucket = self.buckets.entry(String::new()).or_default();
        bucket.hit();
        bucket.record(name, kind, &sample, percentiles);
    }

    /// Write every metric through a writer opened on `reporter`, then close it.
    pub fn write(&mut self, reporter: &dyn Reporter) {
        let mut w = reporter.new_writer(self);
        for (source, bucket) in self.buckets.iter_mut() {
            bucket.write(w.as_mut(), &join(&self.name, source));
        }
        w.close();
    }

    /// Reset every metric in place, keeping the buckets and metric kinds.
    pub fn reset(&mut self) {
        for bucket in self.buckets.values_mut() {
            bucket.reset();
        }
    }

    /// Name under which the metrics are written.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Publish sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Start of the window.
    pub fn time(&self) -> SystemTime {
        self.time
    }

    /// Length of the window.
    pub fn step(&self) -> Duration {
        self.step
    }

    /// Set the window start and length.
    pub fn set_window(&mut self, time: SystemTime, step: Duration) {
        self.time = time;
        self.step = step;
    }

    /// Total samples recorded across every bucket.
    pub fn hits(&self) -> u64 {
        self.buckets.values().map(Metrics::hits).sum()
    }

    /// The bucket for a source, if anything was recorded under it.
    pub fn bucket(&self, source: &str) -> Option<&Metrics> {
        self.buckets.get(source)
    }

    /// Names of the sources recorded so far.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }
}

impl Default for Summary {
    fn default() -> Self {
        Self::new("")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tracemeter_types::Point;

    use super::*;
    use crate::testing::Capture;
    use crate::writer::{WriteResult, Writer};

    /// Collects the points of every window it is asked to write.
    #[derive(Default)]
    struct Collect {
        points: Arc<Mutex<Vec<Point>>>,
    }

    struct Forward {
        inner: Capture,
        points: Arc<Mutex<Vec<Point>>>,
    }

    impl Writer for Forward {
        fn write(&mut self, name: &str, value: f64) -> WriteResult {
            self.inner.write(name, value)
        }

        fn write_scaled(&mut self, name: &str, value: f64) -> WriteResult {
            self.inner.write_scaled(name, value)
        }

        fn write_string(&mut self, name: &str, text: &str) -> WriteResult {
            self.inner.write_string(name, text)
        }

        fn close(self: Box<Self>) {
            let Forward { inner, points } = *self;
            points.lock().extend(inner.points);
        }
    }

    impl Reporter for Collect {
        fn new_writer(&self, summary: &Summary) -> Box<dyn Writer> {
            Box::new(Forward {
                inner: Capture::new(summary.step()),
                points: self.points.clone(),
            })
        }
    }

    fn names(points: &[Point]) -> Vec<&str> {
        points.iter().map(Point::name).collect()
    }

    #[test]
    fn paths_join_name_source_and_metric() {
        let mut summary = Summary::new("app");
        summary.set_window(SystemTime::now(), Duration::from_secs(1));
        summary.record("db", &Fields::new().counter("Queries", 2));
        summary.count("Requests", 1);

        let collect = Collect::default();
        summary.write(&collect);

        let points = collect.points.lock();
        assert_eq!(names(&points), vec!["app.Requests", "app.db.Queries"]);
    }

    #[test]
    fn labels_lines_and_rate() {
        let mut summary = Summary::default();
        summary.set_window(SystemTime::now(), Duration::from_secs(2));
        summary.log("Status", "a");
        summary.log("Status", "a");
        summary.log("Status", "b");

        let collect = Collect::default();
        summary.write(&collect);

        let points = collect.points.lock();
        let texts: Vec<_> = points
            .iter()
            .filter_map(|p| match p {
                Point::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["a (2)", "b"]);
        assert_eq!(
            points
                .iter()
                .filter(|p| p.name() == "Status")
                .find_map(Point::value),
            Some(1.5)
        );
    }

    #[test]
    fn hits_count_every_sample() {
        let mut summary = Summary::new("s");
        summary.record("a", &Fields::new().counter("x", 1).gauge("y", 2));
        summary.record("a", &Fields::new().counter("x", 1));
        summary.set("level", 4);

        assert_eq!(summary.hits(), 3);
        assert_eq!(summary.bucket("a").map(Metrics::hits), Some(2));
        assert_eq!(summary.sources().collect::<Vec<_>>(), vec!["", "a"]);
    }

    #[test]
    fn reset_keeps_buckets() {
        let mut summary = Summary::new("s");
        summary.record_value("latency", Duration::from_millis(5));
        summary.reset();

        assert_eq!(summary.hits(), 0);
        let bucket = summary.bucket("").unwrap();
        assert_eq!(
            bucket.get("latency").and_then(|m| m.kind()),
            Some(MetricKind::Histogram)
        );
    }

    #[test]
    fn next_window_advances_sequence() {
        let summary = Summary::new("s")
            .with_percentiles(vec![Percentile::new("max", 100.0).unwrap()]);
        let now = SystemTime::now();
        let mut next = summary.next(now, Duration::from_secs(5));

        assert_eq!(next.sequence(), 1);
        assert_eq!(next.time(), now);
        assert_eq!(next.step(), Duration::from_secs(5));
        assert_eq!(next.name(), "s");

        next.record_value("h", 3);
        let collect = Collect::default();
        next.write(&collect);
        assert_eq!(
            names(&collect.points.lock()),
            vec!["s.h.Minimum", "s.h.Maximum", "s.h.max"]
        );
    }
}
