//! Serialized, periodically reporting handler.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracemeter_types::Event;
use tracing::{debug, warn};

use super::handler::Handler;
use crate::error::Result;

/// Default time between two reports.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(1);

/// Traces waiting for the worker before callers start to block.
pub const QUEUE_SIZE: usize = 65536;

enum Command {
    Trace(Vec<Event>),
    Report,
    Close,
}

/// Funnels every call to an inner handler through one worker thread.
///
/// Completed traces are copied and queued, so the caller never waits for
/// the inner handler unless the queue is full. The worker also calls
/// [`Handler::report`] on the inner handler once per period. The inner
/// handler therefore never sees concurrent calls.
///
/// Closing, or dropping, the handler processes what is queued, closes the
/// inner handler and stops the worker.
pub struct Periodic {
    feed: SyncSender<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
    period: Duration,
}

impl Periodic {
    /// Serialize `inner`, reporting every [`DEFAULT_PERIOD`].
    pub fn new(inner: impl Handler + 'static) -> Result<Self> {
        Self::with_period(inner, DEFAULT_PERIOD)
    }

    /// Serialize `inner`, reporting every `period`.
    ///
    /// A zero period falls back to [`DEFAULT_PERIOD`].
    pub fn with_period(inner: impl Handler + 'static, period: Duration) -> Result<Self> {
        let period = if period.is_zero() {
            DEFAULT_PERIOD
        } else {
            period
        };

        let (feed, rx) = mpsc::sync_channel(QUEUE_SIZE);
        let worker = thread::Builder::new()
            .name("tracemeter-periodic".into())
            .spawn(move || run(inner, rx, period))?;

        Ok(Self {
            feed,
            worker: Mutex::new(Some(worker)),
            period,
        })
    }

    /// Time between two reports.
    pub fn period(&self) -> Duration {
        self.period
    }

    fn send(&self, command: Command) {
        if self.feed.send(command).is_err() {
            debug!("periodic handler is closed");
        }
    }

    fn shutdown(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        self.send(Command::Close);
        if worker.join().is_err() {
            warn!("periodic handler worker panicked");
        }
    }
}

impl std::fmt::Debug for Periodic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Periodic")
            .field("period", &self.period)
            .finish()
    }
}

impl Handler for Periodic {
    fn handle_trace(&self, events: &[Event]) {
        self.send(Command::Trace(events.to_vec()));
    }

    fn report(&self) {
        self.send(Command::Report);
    }

    fn close(&self) {
        self.shutdown();
    }
}

impl Drop for Periodic {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(inner: impl Handler, rx: Receiver<Command>, period: Duration) {
    let mut next = Instant::now() + period;

    loop {
        // A due report goes first, however many traces are queued.
        let now = Instant::now();
        if now >= next {
            inner.report();
            next = now + period;
            continue;
        }

        match rx.recv_timeout(next - now) {
            Ok(Command::Trace(events)) => inner.handle_trace(&events),
            Ok(Command::Report) => inner.report(),
            Ok(Command::Close) | Err(RecvTimeoutError::Disconnected) => {
                inner.close();
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }
    }

    debug!("periodic handler stopped");
}
