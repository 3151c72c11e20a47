//! Error types for tracemeter.

use thiserror::Error;

/// Errors raised while configuring or starting tracemeter components.
///
/// Misuse of the instrumentation API (leaving a span twice, recording an
/// unsupported sample kind) is not represented here: those are bugs at the
/// call site and panic instead.
#[derive(Debug, Error)]
pub enum Error {
    /// A destination address could not be parsed.
    #[error("invalid destination '{url}': {reason}")]
    InvalidDestination {
        /// The address as configured.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A destination uses a scheme the writer cannot dial.
    #[error("unsupported scheme '{scheme}' in destination '{url}'")]
    UnsupportedScheme {
        /// The address as configured.
        url: String,
        /// The rejected scheme.
        scheme: String,
    },

    /// Network destinations need a tokio runtime to run their workers.
    #[error("no tokio runtime available to run destination workers")]
    NoRuntime,

    /// A histogram percentile is outside `[0, 100]`.
    #[error("invalid percentile '{name}={value}'")]
    InvalidPercentile {
        /// Key suffix of the percentile.
        name: String,
        /// The rejected value.
        value: f64,
    },

    /// A monitor was built without a name.
    #[error("missing monitor name")]
    MissingName,

    /// Loading configuration failed.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// An I/O resource could not be opened.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
