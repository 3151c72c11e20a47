use std::collections::BTreeMap;

use tracemeter_types::Sample;
use tracing::warn;

use super::emit;
use crate::writer::Writer;

/// Counts occurrences of distinct lines of text.
#[derive(Debug, Clone, Default)]
pub struct Labels {
    lines: BTreeMap<String, u64>,
    count: u64,
}

impl Labels {
    /// Create an empty set of labels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track the textual form of a sample. Empty text is logged and ignored.
    pub fn record(&mut self, sample: &Sample) {
        let text = sample.to_text();
        if text.is_empty() {
            warn!("cannot record an empty string");
            return;
        }

        *self.lines.entry(text).or_insert(0) += 1;
        self.count += 1;
    }

    /// Forget every line.
    pub fn reset(&mut self) {
        self.lines.clear();
        self.count = 0;
    }

    /// Write one text value per distinct line and the scaled total count.
    ///
    /// A line seen more than once carries its count in parentheses.
    pub fn write(&mut self, w: &mut dyn Writer, name: &str) {
        if self.lines.is_empty() {
            return;
        }

        for (text, n) in &self.lines {
            let result = if *n > 1 {
                w.write_string(name, &format!("{} ({})", text, n))
            } else {
                w.write_string(name, text)
            };
            emit(result, name);
        }

        emit(w.write_scaled(name, self.count as f64), name);
    }

    /// Occurrences of a line in the window.
    pub fn occurrences(&self, text: &str) -> u64 {
        self.lines.get(text).copied().unwrap_or(0)
    }

    /// Total number of recorded lines.
    pub fn total(&self) -> u64 {
        self.count
    }
}
