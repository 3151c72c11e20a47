//! Turns completed traces into windowed metrics.

use std::sync::Arc;
use std::time::{Instant, SystemTime};

use parking_lot::Mutex;
use tracemeter_types::{Event, EventKind, Sample};
use tracing::debug;

use super::handler::Handler;
use crate::metric::Percentile;
use crate::summary::Summary;
use crate::writer::Reporter;

/// Derives metrics from the events of each trace.
///
/// Metrics are named after the span they were recorded in. Opening a span
/// counts `<path>.Entered`; leaving it with `name` counts `<path>.<name>` and
/// records the time spent in the span as `<path>.<name>Latency`.
///
/// Calls are expected to be serialized, typically by wrapping the handler in
/// a [`Periodic`](super::Periodic).
pub struct MetricsHandler {
    reporter: Option<Box<dyn Reporter>>,
    state: Mutex<State>,
}

struct State {
    summary: Summary,
    window: Option<(Instant, SystemTime)>,
}

impl MetricsHandler {
    /// Write metrics under `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            reporter: None,
            state: Mutex::new(State {
                summary: Summary::new(prefix),
                window: None,
            }),
        }
    }

    /// Send reports through `reporter`.
    pub fn with_reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporter = Some(Box::new(reporter));
        self
    }

    /// Report histograms with these percentiles.
    pub fn with_percentiles(self, percentiles: impl Into<Arc<[Percentile]>>) -> Self {
        {
            let mut state = self.state.lock();
            let summary = std::mem::take(&mut state.summary);
            state.summary = summary.with_percentiles(percentiles);
        }
        self
    }

    /// A copy of the metrics accumulated in the current window.
    pub fn summary(&self) -> Summary {
        self.state.lock().summary.clone()
    }
}

impl std::fmt::Debug for MetricsHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsHandler")
            .field("reporter", &self.reporter.is_some())
            .finish()
    }
}

impl Handler for MetricsHandler {
    fn handle_trace(&self, events: &[Event]) {
        let mut state = self.state.lock();
        if state.window.is_none() {
            state.window = Some((Instant::now(), SystemTime::now()));
        }

        let summary = &mut state.summary;
        let mut paths = vec![String::new(); events.len()];

        for (i, item) in events.iter().enumerate().skip(1) {
            let from = &events[item.from];
            let parent = &paths[item.from];

            match item.kind {
                EventKind::Count => summary.count(&format!("{}{}", parent, item.what), sample(item)),
                EventKind::Set => summary.set(&format!("{}{}", parent, item.what), sample(item)),
                EventKind::Record => {
                    summary.record_value(&format!("{}{}", parent, item.what), sample(item))
                }
                EventKind::Log => summary.log(&format!("{}{}", parent, item.what), sample(item)),
                EventKind::Start => {
                    summary.count(&format!("{}.Entered", item.what), 1);
                    paths[i] = format!("{}.", item.what);
                }
                EventKind::Enter => {
                    let path = format!("{}{}.", parent, item.what);
                    summary.count(&format!("{}Entered", path), 1);
                    paths[i] = path;
                }
                EventKind::Leave => {
                    let name = format!("{}{}", parent, item.what);
                    summary.count(&name, 1);
                    if from.kind.opens_span() {
                        let latency = item.when.saturating_sub(from.when);
                        summary.record_value(&format!("{}Latency", name), latency);
                    }
                }
                EventKind::Root => {}
            }
        }
    }

    fn report(&self) {
        let Some(reporter) = &self.reporter else {
            return;
        };

        let mut state = self.state.lock();
        let Some((begin, time)) = state.window.take() else {
            return;
        };

        debug!("reporting metrics of traces since {:?}", time);
        state.summary.set_window(time, begin.elapsed());
        state.summary.write(reporter.as_ref());
        state.summary.reset();
    }
}

fn sample(event: &Event) -> Sample {
    event.data.clone().unwrap_or(Sample::Int(1))
}
