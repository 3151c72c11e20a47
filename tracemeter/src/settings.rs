//! Loading telemetry settings from files and the environment.

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use tracing::info;

use crate::error::Result;
use crate::metric::Percentile;
use crate::monitor::Monitor;
use crate::trace::{MetricsHandler, Periodic};
use crate::writer::{carbon, Carbon, Console, Logs, Stack};

/// Prefix of the environment variables read by [`TelemetryConfig::load`].
pub const ENV_PREFIX: &str = "TRACEMETER";

/// Where metrics go and how often.
///
/// Every field has a default, so an empty file is a valid configuration.
///
/// ```toml
/// destinations = ["tcp://127.0.0.1:2003"]
/// prefix = "myapp"
/// period_ms = 10000
/// console = true
///
/// [[percentiles]]
/// name = "99.9th"
/// value = 99.9
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Carbon daemons, as `tcp://host:port`.
    pub destinations: Vec<String>,
    /// Path under which Carbon keys are written.
    pub prefix: String,
    /// Publish period in milliseconds.
    pub period_ms: u64,
    /// Percentiles reported by histograms.
    pub percentiles: Vec<Percentile>,
    /// Write `name=value` log lines.
    pub logs: bool,
    /// Log file template; `%s` is replaced by the start time. Implies `logs`.
    pub log_file: Option<String>,
    /// Prefix of every log line.
    pub log_prefix: String,
    /// Write human-readable lines to standard output.
    pub console: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            destinations: Vec::new(),
            prefix: String::new(),
            period_ms: 1000,
            percentiles: Percentile::defaults(),
            logs: false,
            log_file: None,
            log_prefix: String::new(),
            console: false,
        }
    }
}

impl TelemetryConfig {
    /// Load from an optional file plus `TRACEMETER_*` environment variables.
    ///
    /// Environment variables take precedence. `TRACEMETER_DESTINATIONS` is a
    /// comma-separated list.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("destinations"),
            )
            .build()?;

        let settings: Self = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse TOML text, without consulting the environment.
    pub fn from_toml(text: &str) -> Result<Self> {
        let settings: Self = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check every destination and percentile.
    pub fn validate(&self) -> Result<()> {
        for destination in &self.destinations {
            carbon::parse(destination)?;
        }
        for percentile in &self.percentiles {
            percentile.validate()?;
        }
        Ok(())
    }

    /// Time between two reports; zero falls back to one second.
    pub fn period(&self) -> Duration {
        match self.period_ms {
            0 => Duration::from_secs(1),
            ms => Duration::from_millis(ms),
        }
    }

    /// The sinks described by the configuration, in order: Carbon, logs, console.
    ///
    /// Carbon destinations need a running tokio runtime.
    pub fn build_reporter(&self) -> Result<Stack> {
        let mut stack = Stack::new();

        if !self.destinations.is_empty() {
            stack = stack.push(Carbon::new(&self.destinations, &self.prefix)?);
        }

        match &self.log_file {
            Some(template) => stack = stack.push(Logs::open(template, self.log_prefix.clone())?),
            None if self.logs => stack = stack.push(Logs::stderr(self.log_prefix.clone())),
            None => {}
        }

        if self.console {
            stack = stack.push(Console::stdout());
        }

        info!(
            destinations = self.destinations.len(),
            sinks = stack.len(),
            "built metrics reporter"
        );
        Ok(stack)
    }

    /// A trace handler reporting trace metrics through [`Self::build_reporter`].
    pub fn build_handler(&self) -> Result<Periodic> {
        let metrics = MetricsHandler::new("")
            .with_percentiles(self.percentiles.clone())
            .with_reporter(self.build_reporter()?);
        Periodic::with_period(metrics, self.period())
    }

    /// A monitor named `name` publishing through [`Self::build_reporter`].
    pub fn build_monitor(&self, name: &str) -> Result<Monitor> {
        Monitor::builder()
            .name(name)
            .interval(self.period())
            .percentiles(self.percentiles.clone())
            .reporter(self.build_reporter()?)
            .build()
    }
}
