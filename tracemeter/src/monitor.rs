//! The background service that aggregates recorded samples and publishes
//! them once per interval.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::metric::{Fields, Percentile};
use crate::summary::Summary;
use crate::writer::Reporter;

/// Default time between two publications.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Samples waiting for the worker before recorders start to block.
const QUEUE_SIZE: usize = 65536;

/// Receives each published summary.
///
/// Any `FnMut(Summary) + Send` closure is a publisher.
pub trait Publisher: Send {
    /// Take ownership of a completed window.
    fn publish(&mut self, summary: Summary);
}

impl<F> Publisher for F
where
    F: FnMut(Summary) + Send,
{
    fn publish(&mut self, summary: Summary) {
        self(summary)
    }
}

/// Writes published summaries through a [`Reporter`].
#[derive(Debug, Clone)]
pub struct ReporterPublisher<R> {
    reporter: R,
}

impl<R: Reporter> ReporterPublisher<R> {
    /// Publish through `reporter`.
    pub fn new(reporter: R) -> Self {
        Self { reporter }
    }
}

impl<R: Reporter> Publisher for ReporterPublisher<R> {
    fn publish(&mut self, mut summary: Summary) {
        summary.write(&self.reporter);
    }
}

/// Logs a one-line digest of each summary.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPublisher;

impl Publisher for LogPublisher {
    fn publish(&mut self, summary: Summary) {
        info!(
            name = summary.name(),
            sequence = summary.sequence(),
            hits = summary.hits(),
            sources = summary.sources().count(),
            "published metrics summary"
        );
    }
}

/// Aggregates structured samples and periodically publishes them.
///
/// # Example
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use std::time::Duration;
/// use tracemeter::{Fields, Monitor, Summary};
///
/// let published = Arc::new(Mutex::new(Vec::new()));
/// let sink = published.clone();
///
/// let monitor = Monitor::builder()
///     .name("worker")
///     .interval(Duration::from_secs(60))
///     .publisher(move |s: Summary| sink.lock().unwrap().push(s.hits()))
///     .build()
///     .unwrap();
///
/// let handle = monitor.start().unwrap();
/// handle.recorder().record("jobs", Fields::new().counter("Done", 1));
/// handle.stop();
///
/// assert_eq!(*published.lock().unwrap(), vec![1]);
/// ```
pub struct Monitor {
    name: String,
    interval: Duration,
    publisher: Box<dyn Publisher>,
    percentiles: Option<Arc<[Percentile]>>,
}

impl Monitor {
    /// Create a builder for configuring the monitor.
    pub fn builder() -> MonitorBuilder {
        MonitorBuilder::new()
    }

    /// Name the published metrics are written under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Time between two publications.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start the background worker.
    ///
    /// Returns a handle to record samples and stop the worker.
    pub fn start(self) -> Result<MonitorHandle> {
        let (feed, rx) = mpsc::sync_channel(QUEUE_SIZE);

        let mut summary = Summary::new(self.name.clone());
        if let Some(percentiles) = self.percentiles {
            summary = summary.with_percentiles(percentiles);
        }
        let summary = summary.next(SystemTime::now(), self.interval);

        let interval = self.interval;
        let publisher = self.publisher;
        let worker = thread::Builder::new()
            .name(format!("tracemeter-monitor-{}", self.name))
            .spawn(move || run(summary, publisher, rx, interval))?;

        debug!("monitor '{}' started", self.name);
        Ok(MonitorHandle {
            recorder: Recorder { feed },
            worker: Some(worker),
        })
    }
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .finish()
    }
}

/// Builder for configuring a [`Monitor`].
#[derive(Default)]
pub struct MonitorBuilder {
    name: Option<String>,
    interval: Option<Duration>,
    publisher: Option<Box<dyn Publisher>>,
    percentiles: Option<Arc<[Percentile]>>,
}

impl MonitorBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name published metrics are written under. Required.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the publication interval.
    ///
    /// Defaults to 1 second if not specified or zero.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Set who receives published summaries.
    ///
    /// Defaults to [`LogPublisher`].
    pub fn publisher(mut self, publisher: impl Publisher + 'static) -> Self {
        self.publisher = Some(Box::new(publisher));
        self
    }

    /// Publish through a reporter.
    pub fn reporter(self, reporter: impl Reporter + 'static) -> Self {
        self.publisher(ReporterPublisher::new(reporter))
    }

    /// Report histograms with these percentiles.
    pub fn percentiles(mut self, percentiles: impl Into<Arc<[Percentile]>>) -> Self {
        self.percentiles = Some(percentiles.into());
        self
    }

    /// Build the monitor.
    ///
    /// # Errors
    ///
    /// Fails if no name was given or a percentile is outside `[0, 100]`.
    pub fn build(self) -> Result<Monitor> {
        let name = self
            .name
            .filter(|name| !name.is_empty())
            .ok_or(Error::MissingName)?;

        if let Some(percentiles) = &self.percentiles {
            percentiles.iter().try_for_each(Percentile::validate)?;
        }

        Ok(Monitor {
            name,
            interval: self
                .interval
                .filter(|i| !i.is_zero())
                .unwrap_or(DEFAULT_INTERVAL),
            publisher: self.publisher.unwrap_or_else(|| Box::new(LogPublisher)),
            percentiles: self.percentiles,
        })
    }
}

enum Command {
    Record(String, Fields),
    Stop,
}

/// Posts samples to a running monitor. Cheap to clone.
#[derive(Clone)]
pub struct Recorder {
    feed: SyncSender<Command>,
}

impl Recorder {
    /// Fold a structured sample into the bucket for `source`.
    ///
    /// Blocks only when the worker has fallen far behind.
    pub fn record(&self, source: &str, fields: Fields) {
        if self.feed.send(Command::Record(source.to_string(), fields)).is_err() {
            debug!("monitor stopped, dropping sample for '{}'", source);
        }
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder").finish_non_exhaustive()
    }
}

/// Handle for a running [`Monitor`].
///
/// Drop this handle to stop the monitor, or call `stop()` explicitly.
/// Stopping publishes whatever was recorded since the last publication.
#[derive(Debug)]
pub struct MonitorHandle {
    recorder: Recorder,
    worker: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// A recorder for posting samples.
    pub fn recorder(&self) -> Recorder {
        self.recorder.clone()
    }

    /// Stop the monitor and wait for the final publication.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let _ = self.recorder.feed.send(Command::Stop);
        if worker.join().is_err() {
            warn!("monitor worker panicked");
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(
    mut summary: Summary,
    mut publisher: Box<dyn Publisher>,
    rx: Receiver<Command>,
    interval: Duration,
) {
    let mut window = Window {
        started: Instant::now(),
        interval,
    };
    let mut next = window.started + interval;

    loop {
        // A due publication goes first, however many samples are queued.
        let now = Instant::now();
        if now >= next {
            window.publish(&mut summary, publisher.as_mut());
            next = now + interval;
            continue;
        }

        match rx.recv_timeout(next - now) {
            Ok(Command::Record(source, fields)) => summary.record(&source, &fields),
            Ok(Command::Stop) | Err(RecvTimeoutError::Disconnected) => {
                window.publish(&mut summary, publisher.as_mut());
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }
    }

    debug!("monitor '{}' stopped", summary.name());
}

/// Start of the live summary's window.
struct Window {
    started: Instant,
    interval: Duration,
}

impl Window {
    /// Hand the live summary to the publisher and install the next one.
    ///
    /// The published step is the time actually covered, so a window cut
    /// short by `stop` is not scaled by the full interval. Empty windows
    /// are not published; the window restarts at the tick instead.
    fn publish(&mut self, summary: &mut Summary, publisher: &mut dyn Publisher) {
        let elapsed = self.started.elapsed();
        self.started = Instant::now();
        let now = SystemTime::now();

        if summary.hits() == 0 {
            summary.set_window(now, self.interval);
            return;
        }

        summary.set_window(summary.time(), elapsed);
        let next = summary.next(now, self.interval);
        let done = std::mem::replace(summary, next);
        debug!(
            "publishing summary {} of '{}' with {} hits",
            done.sequence(),
            done.name(),
            done.hits()
        );
        publisher.publish(done);
    }
}
