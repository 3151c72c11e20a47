//! Span tracing and the bridge from traces to metrics.
//!
//! A [`Tracer`] leases one buffer per trace from its pool. Every span of the
//! trace appends timed events to that buffer; when the outermost span is
//! left the buffer is handed to the trace's [`Handler`] and recycled.
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tracemeter::{Aggregate, MetricsHandler, Periodic, Tracer};
//!
//! let aggregate = Aggregate::new();
//! let metrics = MetricsHandler::new("app").with_reporter(aggregate.clone());
//! let handler = Arc::new(Periodic::with_period(metrics, Duration::from_secs(10)).unwrap());
//!
//! let tracer = Tracer::new();
//! let request = tracer.scope().with_handler(handler.clone()).start("Request", "*");
//! request.count("Bytes", 1024);
//! request.leave("Done");
//! ```

mod handler;
mod metrics;
mod periodic;
mod span;
mod timeline;

pub use handler::{Handler, MultiHandler, NilHandler};
pub use metrics::MetricsHandler;
pub use periodic::{Periodic, DEFAULT_PERIOD, QUEUE_SIZE};
pub use span::{Scope, Tracer};
pub use timeline::QUEUE_CAPACITY;
