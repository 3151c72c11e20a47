use std::time::Instant;

use tracemeter_types::Sample;

use super::{emit, numeric};
use crate::writer::Writer;

/// An instantaneous level, reported as its time-weighted average.
///
/// Each recorded value contributes `value × time held` to an accumulated
/// area. The written value is that area divided by the time elapsed since
/// the gauge was first set or last reset. The level itself survives a reset.
#[derive(Debug, Clone)]
pub struct Gauge {
    start: Instant,
    since: Instant,
    sum: f64,
    value: f64,
    valid: bool,
}

impl Default for Gauge {
    fn default() -> Self {
        Self::new()
    }
}

impl Gauge {
    /// Create an unset gauge.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            since: now,
            sum: 0.0,
            value: 0.0,
            valid: false,
        }
    }

    /// Set the level of the gauge.
    ///
    /// # Panics
    ///
    /// Panics if the sample has no numeric view.
    pub fn record(&mut self, sample: &Sample) {
        self.record_at(sample, Instant::now());
    }

    /// Set the level of the gauge as of `now`.
    pub fn record_at(&mut self, sample: &Sample, now: Instant) {
        let value = numeric(sample, "gauge");

        // account for the previous level up until now
        if self.valid {
            self.sum += self.value * now.saturating_duration_since(self.since).as_secs_f64();
        } else {
            self.sum = 0.0;
            self.start = now;
        }

        self.value = value;
        self.since = now;
        self.valid = true;
    }

    /// Restart the averaging window, keeping the current level.
    pub fn reset(&mut self) {
        self.reset_at(Instant::now());
    }

    /// Restart the averaging window as of `now`.
    pub fn reset_at(&mut self, now: Instant) {
        self.sum = 0.0;
        self.start = now;
        self.since = now;
    }

    /// Write the average level over the window.
    pub fn write(&mut self, w: &mut dyn Writer, name: &str) {
        self.write_at(w, name, Instant::now());
    }

    /// Write the average level over the window ending at `now`.
    pub fn write_at(&mut self, w: &mut dyn Writer, name: &str, now: Instant) {
        if let Some(value) = self.average_at(now) {
            emit(w.write(name, value), name);
        }
    }

    /// Time-weighted average over the window ending at `now`.
    ///
    /// Returns `None` until the gauge has been set. An empty window reports
    /// the current level.
    pub fn average_at(&self, now: Instant) -> Option<f64> {
        if !self.valid {
            return None;
        }

        let total = self.sum + self.value * now.saturating_duration_since(self.since).as_secs_f64();
        let elapsed = now.saturating_duration_since(self.start).as_secs_f64();
        if elapsed > 0.0 {
            Some(total / elapsed)
        } else {
            Some(self.value)
        }
    }

    /// The current level.
    pub fn level(&self) -> Option<f64> {
        self.valid.then_some(self.value)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::{assert_close, Capture};

    #[test]
    fn time_weighted_average() {
        let t0 = Instant::now();
        let d = Duration::from_secs(2);

        let mut gauge = Gauge::new();
        gauge.record_at(&Sample::from(4), t0);
        gauge.record_at(&Sample::from(10), t0 + d);

        let mut w = Capture::new(Duration::from_secs(1));
        gauge.write_at(&mut w, "g", t0 + d * 2);
        assert_close(w.value("g").unwrap(), (4.0 * 2.0 + 10.0 * 2.0) / 4.0);
    }

    #[test]
    fn uneven_segments() {
        let t0 = Instant::now();

        let mut gauge = Gauge::new();
        gauge.record_at(&Sample::from(1.0), t0);
        gauge.record_at(&Sample::from(3.0), t0 + Duration::from_secs(3));

        let average = gauge.average_at(t0 + Duration::from_secs(4)).unwrap();
        assert_close(average, (1.0 * 3.0 + 3.0 * 1.0) / 4.0);
    }

    #[test]
    fn reset_keeps_level() {
        let t0 = Instant::now();

        let mut gauge = Gauge::new();
        gauge.record_at(&Sample::from(1), t0);
        gauge.record_at(&Sample::from(5), t0 + Duration::from_secs(1));
        gauge.reset_at(t0 + Duration::from_secs(2));

        assert_eq!(gauge.level(), Some(5.0));
        let average = gauge.average_at(t0 + Duration::from_secs(3)).unwrap();
        assert_close(average, 5.0);
    }

    #[test]
    fn empty_window_reports_level() {
        let t0 = Instant::now();
        let mut gauge = Gauge::new();
        gauge.record_at(&Sample::from(true), t0);
        assert_eq!(gauge.average_at(t0), Some(1.0));
    }

    #[test]
    fn unset_gauge_writes_nothing() {
        let mut gauge = Gauge::new();
        let mut w = Capture::new(Duration::from_secs(1));
        gauge.write(&mut w, "g");
        assert!(w.points.is_empty());
        assert_eq!(gauge.level(), None);
    }

    #[test]
    #[should_panic(expected = "unsupported sample")]
    fn text_is_unsupported() {
        Gauge::new().record(&Sample::from("level"));
    }
}
