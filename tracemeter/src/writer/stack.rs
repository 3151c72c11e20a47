use crate::summary::Summary;

use super::{Reporter, WriteError, WriteResult, Writer};

/// An ordered fallback chain of reporters.
///
/// Each write goes to the first sink that does not answer
/// [`WriteError::Ignored`]. Closing the writer closes every sink in order.
///
/// ```rust
/// use tracemeter::{Console, Stack};
///
/// let stack = Stack::new().push(Console::stdout());
/// assert_eq!(stack.len(), 1);
/// ```
#[derive(Default)]
pub struct Stack {
    items: Vec<Box<dyn Reporter>>,
}

impl Stack {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a reporter to the end of the chain.
    pub fn push(mut self, reporter: impl Reporter + 'static) -> Self {
        self.items.push(Box::new(reporter));
        self
    }

    /// Append a boxed reporter to the end of the chain.
    pub fn push_boxed(mut self, reporter: Box<dyn Reporter>) -> Self {
        self.items.push(reporter);
        self
    }

    /// Number of reporters in the chain.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl std::fmt::Debug for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack").field("items", &self.items.len()).finish()
    }
}

impl Reporter for Stack {
    fn new_writer(&self, summary: &Summary) -> Box<dyn Writer> {
        let sinks = self
            .items
            .iter()
            .map(|reporter| reporter.new_writer(summary))
            .collect();
        Box::new(StackWriter { sinks })
    }
}

struct StackWriter {
    sinks: Vec<Box<dyn Writer>>,
}

impl StackWriter {
    fn route(&mut self, mut f: impl FnMut(&mut dyn Writer) -> WriteResult) -> WriteResult {
        for sink in self.sinks.iter_mut() {
            match f(sink.as_mut()) {
                Err(WriteError::Ignored) => continue,
                result => return result,
            }
        }
        Err(WriteError::Ignored)
    }
}

impl Writer for StackWriter {
    fn write(&mut self, name: &str, value: f64) -> WriteResult {
        self.route(|w| w.write(name, value))
    }

    fn write_scaled(&mut self, name: &str, value: f64) -> WriteResult {
        self.route(|w| w.write_scaled(name, value))
    }

    fn write_string(&mut self, name: &str, text: &str) -> WriteResult {
        self.route(|w| w.write_string(name, text))
    }

    fn close(self: Box<Self>) {
        for sink in self.sinks {
            sink.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    type Log = Arc<Mutex<Vec<String>>>;

    /// Records calls as `<sink>:<shape>:<name>`; optionally ignores strings.
    struct Probe {
        label: &'static str,
        ignore_strings: bool,
        log: Log,
    }

    struct ProbeWriter {
        label: &'static str,
        ignore_strings: bool,
        log: Log,
    }

    impl Reporter for Probe {
        fn new_writer(&self, _summary: &Summary) -> Box<dyn Writer> {
            Box::new(ProbeWriter {
                label: self.label,
                ignore_strings: self.ignore_strings,
                log: self.log.clone(),
            })
        }
    }

    impl Writer for ProbeWriter {
        fn write(&mut self, name: &str, _value: f64) -> WriteResult {
            self.log.lock().push(format!("{}:write:{}", self.label, name));
            Ok(())
        }

        fn write_scaled(&mut self, name: &str, _value: f64) -> WriteResult {
            self.log.lock().push(format!("{}:scaled:{}", self.label, name));
            Ok(())
        }

        fn write_string(&mut self, name: &str, _text: &str) -> WriteResult {
            if self.ignore_strings {
                return Err(WriteError::Ignored);
            }
            self.log.lock().push(format!("{}:string:{}", self.label, name));
            Ok(())
        }

        fn close(self: Box<Self>) {
            self.log.lock().push(format!("{}:close", self.label));
        }
    }

    fn probe(label: &'static str, ignore_strings: bool, log: &Log) -> Probe {
        Probe {
            label,
            ignore_strings,
            log: log.clone(),
        }
    }

    #[test]
    fn first_accepting_sink_wins() {
        let log = Log::default();
        let stack = Stack::new()
            .push(probe("a", true, &log))
            .push(probe("b", false, &log));

        let mut w = stack.new_writer(&Summary::default());
        w.write("x", 1.0).unwrap();
        w.write_scaled("y", 2.0).unwrap();
        w.write_string("z", "text").unwrap();
        w.close();

        assert_eq!(
            *log.lock(),
            vec![
                "a:write:x",
                "a:scaled:y",
                "b:string:z",
                "a:close",
                "b:close",
            ]
        );
    }

    #[test]
    fn ignored_by_every_sink() {
        let log = Log::default();
        let stack = Stack::new().push(probe("a", true, &log));

        let mut w = stack.new_writer(&Summary::default());
        assert!(w.write_string("z", "text").unwrap_err().is_ignored());
    }

    #[test]
    fn empty_stack_ignores_everything() {
        let mut w = Stack::new().new_writer(&Summary::default());
        assert!(w.write("x", 1.0).unwrap_err().is_ignored());
        w.close();
    }
}
