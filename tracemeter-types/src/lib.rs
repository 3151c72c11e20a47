//! # tracemeter-types
//!
//! Core value types shared by every layer of tracemeter: the samples that
//! instrumented code records, the events a trace buffers, and the points a
//! publish window produces.
//!
//! ## Features
//!
//! - `serde`: derive `Serialize`/`Deserialize` for every type
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use tracemeter_types::Sample;
//!
//! let latency = Sample::from(Duration::from_millis(250));
//! assert_eq!(latency.as_f64(), Some(0.25));
//!
//! let status = Sample::from(vec!["GET".to_string(), "200".to_string()]);
//! assert_eq!(status.to_text(), "GET 200");
//! ```

mod event;
mod point;
mod sample;

pub use event::*;
pub use point::*;
pub use sample::*;
