use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::SecondsFormat;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::Result;
use crate::summary::Summary;

use super::{per_second, rfc3339, Reporter, WriteResult, Writer};

/// Writes one `name=value` log line per metric.
///
/// Lines are buffered and flushed when each cycle closes.
#[derive(Clone)]
pub struct Logs {
    inner: Arc<LogsInner>,
}

struct LogsInner {
    prefix: String,
    path: Option<PathBuf>,
    out: Mutex<BufWriter<Box<dyn Write + Send>>>,
}

impl Logs {
    /// Log to standard error.
    pub fn stderr(prefix: impl Into<String>) -> Self {
        Self::with_output(prefix.into(), None, Box::new(io::stderr()))
    }

    /// Log to a file.
    ///
    /// A `%s` in `template` is replaced by the current UTC time in RFC3339
    /// format. Fails if the file cannot be opened.
    pub fn open(template: &str, prefix: impl Into<String>) -> Result<Self> {
        let path = PathBuf::from(
            template.replacen("%s", &rfc3339(SystemTime::now(), SecondsFormat::Secs), 1),
        );
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!("logging metrics to {}", path.display());
        Ok(Self::with_output(prefix.into(), Some(path), Box::new(file)))
    }

    fn with_output(prefix: String, path: Option<PathBuf>, out: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Arc::new(LogsInner {
                prefix,
                path,
                out: Mutex::new(BufWriter::new(out)),
            }),
        }
    }

    /// The file being written, if not standard error.
    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }
}

impl std::fmt::Debug for Logs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logs")
            .field("prefix", &self.inner.prefix)
            .field("path", &self.inner.path)
            .finish()
    }
}

impl Reporter for Logs {
    fn new_writer(&self, summary: &Summary) -> Box<dyn Writer> {
        Box::new(LogWriter {
            logs: self.inner.clone(),
            step: summary.step(),
        })
    }
}

struct LogWriter {
    logs: Arc<LogsInner>,
    step: Duration,
}

impl LogWriter {
    fn line(&self, name: &str, value: &dyn std::fmt::Display) -> WriteResult {
        let now = rfc3339(SystemTime::now(), SecondsFormat::Micros);
        let mut out = self.logs.out.lock();
        writeln!(out, "{}{} {}={}", self.logs.prefix, now, name, value)?;
        Ok(())
    }
}

impl Writer for LogWriter {
    fn write(&mut self, name: &str, value: f64) -> WriteResult {
        self.line(name, &format_args!("{:.6}", value))
    }

    fn write_scaled(&mut self, name: &str, value: f64) -> WriteResult {
        self.line(name, &format_args!("{:.6}", per_second(value, self.step)))
    }

    fn write_string(&mut self, name: &str, text: &str) -> WriteResult {
        self.line(name, &text)
    }

    fn close(self: Box<Self>) {
        if let Err(err) = self.logs.out.lock().flush() {
            warn!("failed to flush metric logs: {}", err);
        }
    }
}
