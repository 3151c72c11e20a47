//! Per-cycle output sinks.
//!
//! A [`Reporter`] manufactures one [`Writer`] per publish cycle. The writer
//! receives every aggregated value of the window and is closed once the
//! cycle is complete. Writers that do not support a call shape answer with
//! [`WriteError::Ignored`] so that a [`Stack`] can route the value to the
//! next sink.

mod aggregate;
pub(crate) mod carbon;
mod channel;
mod console;
mod logs;
mod stack;

use std::io;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use crate::summary::Summary;

pub use aggregate::Aggregate;
pub use carbon::Carbon;
pub use channel::ChannelReporter;
pub use console::Console;
pub use logs::Logs;
pub use stack::Stack;

/// Outcome of a single write that did not succeed.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The sink does not support this call shape; try the next one.
    #[error("ignored")]
    Ignored,

    /// The sink failed to write.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl WriteError {
    /// Whether this is the routing signal rather than a failure.
    pub fn is_ignored(&self) -> bool {
        matches!(self, WriteError::Ignored)
    }
}

/// Result of a single write.
pub type WriteResult = Result<(), WriteError>;

/// Receives the values of one publish cycle.
pub trait Writer: Send {
    /// Write an absolute, instantaneous value.
    fn write(&mut self, name: &str, value: f64) -> WriteResult;

    /// Write a total accumulated over the window; the sink divides it by the
    /// window length in seconds.
    fn write_scaled(&mut self, name: &str, value: f64) -> WriteResult;

    /// Write a textual sample.
    fn write_string(&mut self, name: &str, text: &str) -> WriteResult;

    /// Flush and finalize the cycle.
    fn close(self: Box<Self>);
}

/// Creates a [`Writer`] scoped to one publish window.
pub trait Reporter: Send + Sync {
    /// Open a writer for the given summary.
    fn new_writer(&self, summary: &Summary) -> Box<dyn Writer>;
}

impl<R: Reporter + ?Sized> Reporter for Arc<R> {
    fn new_writer(&self, summary: &Summary) -> Box<dyn Writer> {
        (**self).new_writer(summary)
    }
}

impl<R: Reporter + ?Sized> Reporter for Box<R> {
    fn new_writer(&self, summary: &Summary) -> Box<dyn Writer> {
        (**self).new_writer(summary)
    }
}

/// Divide a window total by the window length in seconds.
///
/// An empty window leaves the total unchanged.
pub(crate) fn per_second(value: f64, step: Duration) -> f64 {
    let dt = step.as_secs_f64();
    if dt > 0.0 {
        value / dt
    } else {
        value
    }
}

/// Append a trailing `.` to a non-empty prefix.
pub(crate) fn dotted(prefix: &str) -> String {
    if prefix.is_empty() || prefix.ends_with('.') {
        prefix.to_string()
    } else {
        format!("{}.", prefix)
    }
}

/// Format a timestamp as RFC3339 in UTC.
pub(crate) fn rfc3339(time: SystemTime, precision: SecondsFormat) -> String {
    DateTime::<Utc>::from(time).to_rfc3339_opts(precision, true)
}
