use tracemeter_types::Sample;
use tracing::warn;

use super::{emit, numeric};
use crate::writer::Writer;

/// A monotonically increasing value reported per second.
#[derive(Debug, Clone, Default)]
pub struct Counter {
    value: f64,
    valid: bool,
}

impl Counter {
    /// Create an empty counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sample to the running total.
    ///
    /// Negative samples are not monotonic; they are logged and ignored.
    ///
    /// # Panics
    ///
    /// Panics if the sample has no numeric view.
    pub fn record(&mut self, sample: &Sample) {
        let value = numeric(sample, "counter");
        if value < 0.0 {
            warn!("counter increment of '{}' is not monotonically-increasing", value);
            return;
        }

        self.value += value;
        self.valid = true;
    }

    /// Restart the counter from zero.
    pub fn reset(&mut self) {
        self.value = 0.0;
        self.valid = false;
    }

    /// Write the total, scaled over the window by the sink.
    pub fn write(&mut self, w: &mut dyn Writer, name: &str) {
        if !self.valid {
            return;
        }

        emit(w.write_scaled(name, self.value), name);
    }

    /// Running total of the window.
    pub fn total(&self) -> f64 {
        self.value
    }

    /// Whether at least one sample was recorded since the last reset.
    pub fn is_valid(&self) -> bool {
        self.valid
    }
}
