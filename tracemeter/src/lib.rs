//! # tracemeter
//!
//! In-process tracing spans and windowed metric aggregation, reported to
//! Carbon daemons, log files, the console or your own channel.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tracemeter::{TelemetryConfig, Tracer};
//!
//! #[tokio::main]
//! async fn main() -> tracemeter::Result<()> {
//!     // Carbon destinations, publish period, sinks...
//!     let settings = TelemetryConfig::load(None)?;
//!     let handler = Arc::new(settings.build_handler()?);
//!
//!     // Spans are recorded into pooled per-trace buffers
//!     let tracer = Tracer::new();
//!     let root = tracer.scope().with_handler(handler);
//!
//!     let request = root.start("Request", "user-42");
//!     let parse = request.enter("Parse");
//!     parse.count("Bytes", 512);
//!     parse.leave("Done");
//!     request.leave("Served");
//!
//!     // Request.Entered, Request.Served, Request.ServedLatency,
//!     // Request.Parse.Bytes, ... are reported once per period.
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Spans**: nested, thread-safe, recycled buffers; late writes from
//!   detached work are dropped once a trace completes
//! - **Aggregators**: counters, time-weighted gauges, reservoir histograms
//!   and label counts in bounded memory
//! - **Sinks**: Carbon with per-destination retry, logs, console, channel,
//!   composed into a fallback [`Stack`]
//! - **Monitor**: record structured samples directly, without spans

mod error;
mod metric;
mod monitor;
mod settings;
mod summary;
mod trace;
mod writer;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use metric::{
    Counter, Field, Fields, Gauge, Histogram, Labels, Metric, MetricKind, MetricMap, Metrics,
    Percentile, RESERVOIR_SIZE,
};
pub use monitor::{
    LogPublisher, Monitor, MonitorBuilder, MonitorHandle, Publisher, Recorder, ReporterPublisher,
    DEFAULT_INTERVAL,
};
pub use settings::{TelemetryConfig, ENV_PREFIX};
pub use summary::Summary;
pub use trace::{
    Handler, MetricsHandler, MultiHandler, NilHandler, Periodic, Scope, Tracer, DEFAULT_PERIOD,
    QUEUE_CAPACITY, QUEUE_SIZE,
};
pub use writer::{
    Aggregate, Carbon, ChannelReporter, Console, Logs, Reporter, Stack, WriteError, WriteResult,
    Writer,
};

// Re-export types for convenience
pub use tracemeter_types::{Batch, Event, EventKind, Point, Sample};
