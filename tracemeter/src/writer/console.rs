use std::io::{self, Write};
use std::sync::Arc;

use chrono::SecondsFormat;
use parking_lot::Mutex;
use tracing::warn;

use crate::summary::Summary;

use super::{per_second, rfc3339, Reporter, WriteResult, Writer};

type SharedOutput = Arc<Mutex<dyn Write + Send>>;

/// Writes human-readable lines, `<time> <name> <value>`.
///
/// Numeric values are written as they arrive. Text values are held back and
/// written together when the cycle closes.
#[derive(Clone, Default)]
pub struct Console {
    output: Option<SharedOutput>,
}

impl Console {
    /// Write to standard output.
    pub fn stdout() -> Self {
        Self { output: None }
    }

    /// Write to a shared output.
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use parking_lot::Mutex;
    /// use tracemeter::Console;
    ///
    /// let buffer = Arc::new(Mutex::new(Vec::<u8>::new()));
    /// let console = Console::to(buffer.clone());
    /// # drop(console);
    /// ```
    pub fn to<W: Write + Send + 'static>(output: Arc<Mutex<W>>) -> Self {
        let output: SharedOutput = output;
        Self {
            output: Some(output),
        }
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let target = if self.output.is_some() { "shared" } else { "stdout" };
        f.debug_struct("Console").field("output", &target).finish()
    }
}

impl Reporter for Console {
    fn new_writer(&self, summary: &Summary) -> Box<dyn Writer> {
        Box::new(ConsoleWriter {
            output: self.output.clone(),
            time: rfc3339(summary.time(), SecondsFormat::Secs),
            step: summary.step(),
            texts: Vec::new(),
        })
    }
}

struct ConsoleWriter {
    output: Option<SharedOutput>,
    time: String,
    step: std::time::Duration,
    texts: Vec<String>,
}

impl ConsoleWriter {
    fn emit(&self, lines: &[String]) -> io::Result<()> {
        match &self.output {
            Some(output) => {
                let mut out = output.lock();
                for line in lines {
                    out.write_all(line.as_bytes())?;
                }
                out.flush()
            }
            None => {
                let mut out = io::stdout().lock();
                for line in lines {
                    out.write_all(line.as_bytes())?;
                }
                out.flush()
            }
        }
    }

    fn number(&self, name: &str, value: f64) -> WriteResult {
        let line = format!("{} {} {:.6}\n", self.time, name, value);
        self.emit(&[line])?;
        Ok(())
    }
}

impl Writer for ConsoleWriter {
    fn write(&mut self, name: &str, value: f64) -> WriteResult {
        self.number(name, value)
    }

    fn write_scaled(&mut self, name: &str, value: f64) -> WriteResult {
        self.number(name, per_second(value, self.step))
    }

    fn write_string(&mut self, name: &str, text: &str) -> WriteResult {
        self.texts.push(format!("{} {} {}\n", self.time, name, text));
        Ok(())
    }

    fn close(self: Box<Self>) {
        if self.texts.is_empty() {
            return;
        }
        if let Err(err) = self.emit(&self.texts) {
            warn!("failed to write console text lines: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;

    fn window() -> Summary {
        let time = SystemTime::UNIX_EPOCH + Duration::from_secs(60);
        Summary::new("").next(time, Duration::from_secs(2))
    }

    fn contents(buffer: &Arc<Mutex<Vec<u8>>>) -> String {
        String::from_utf8(buffer.lock().clone()).unwrap()
    }

    #[test]
    fn numbers_are_written_immediately() {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let console = Console::to(buffer.clone());

        let mut w = console.new_writer(&window());
        w.write("a", 1.5).unwrap();
        w.write_scaled("b", 10.0).unwrap();

        assert_eq!(
            contents(&buffer),
            "1970-01-01T00:01:00Z a 1.500000\n1970-01-01T00:01:00Z b 5.000000\n"
        );
        w.close();
    }

    #[test]
    fn texts_are_written_at_close() {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let console = Console::to(buffer.clone());

        let mut w = console.new_writer(&window());
        w.write_string("status", "ok (2)").unwrap();
        w.write("n", 1.0).unwrap();
        assert_eq!(contents(&buffer), "1970-01-01T00:01:00Z n 1.000000\n");

        w.close();
        assert_eq!(
            contents(&buffer),
            "1970-01-01T00:01:00Z n 1.000000\n1970-01-01T00:01:00Z status ok (2)\n"
        );
    }
}
