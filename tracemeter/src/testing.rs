//! Helpers shared by the unit tests.

use std::time::Duration;

use tracemeter_types::Point;

use crate::writer::{per_second, WriteResult, Writer};

/// A writer that keeps every point in memory.
#[derive(Debug)]
pub(crate) struct Capture {
    pub(crate) points: Vec<Point>,
    pub(crate) step: Duration,
}

impl Capture {
    pub(crate) fn new(step: Duration) -> Self {
        Self {
            points: Vec::new(),
            step,
        }
    }

    pub(crate) fn value(&self, name: &str) -> Option<f64> {
        self.points
            .iter()
            .filter(|p| p.name() == name)
            .find_map(Point::value)
    }

    pub(crate) fn texts(&self, name: &str) -> Vec<String> {
        self.points
            .iter()
            .filter_map(|p| match p {
                Point::Text { name: n, text } if n == name => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn names(&self) -> Vec<&str> {
        self.points.iter().map(Point::name).collect()
    }
}

impl Writer for Capture {
    fn write(&mut self, name: &str, value: f64) -> WriteResult {
        self.points.push(Point::Value {
            name: name.to_string(),
            value,
        });
        Ok(())
    }

    fn write_scaled(&mut self, name: &str, value: f64) -> WriteResult {
        self.points.push(Point::Rate {
            name: name.to_string(),
            value: per_second(value, self.step),
        });
        Ok(())
    }

    fn write_string(&mut self, name: &str, text: &str) -> WriteResult {
        self.points.push(Point::Text {
            name: name.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    fn close(self: Box<Self>) {}
}

/// Assert two floats are within a small tolerance.
pub(crate) fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
