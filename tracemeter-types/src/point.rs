//! Published values of a metrics window.

use std::time::{Duration, SystemTime};

/// One value written by an aggregator during a publish cycle.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Point {
    /// An absolute, instantaneous value.
    Value {
        /// Dotted metric path.
        name: String,
        /// The value.
        value: f64,
    },
    /// A period total already divided by the window length.
    Rate {
        /// Dotted metric path.
        name: String,
        /// Value per second.
        value: f64,
    },
    /// A textual sample.
    Text {
        /// Dotted metric path.
        name: String,
        /// The text.
        text: String,
    },
}

impl Point {
    /// The dotted metric path of this point.
    pub fn name(&self) -> &str {
        match self {
            Point::Value { name, .. } | Point::Rate { name, .. } | Point::Text { name, .. } => {
                name
            }
        }
    }

    /// The numeric value, if any.
    pub fn value(&self) -> Option<f64> {
        match self {
            Point::Value { value, .. } | Point::Rate { value, .. } => Some(*value),
            Point::Text { .. } => None,
        }
    }
}

/// All the points written during one publish cycle.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Batch {
    /// Sequence number of the published summary.
    pub sequence: u64,
    /// Publication time stamp.
    pub time: SystemTime,
    /// Length of the aggregation window.
    pub step: Duration,
    /// Points in the order they were written.
    pub points: Vec<Point>,
}

impl Batch {
    /// Find the first point with the given name.
    pub fn get(&self, name: &str) -> Option<&Point> {
        self.points.iter().find(|p| p.name() == name)
    }

    /// All points with the given name, in write order.
    pub fn all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Point> + 'a {
        self.points.iter().filter(move |p| p.name() == name)
    }

    /// Number of points in the batch.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
