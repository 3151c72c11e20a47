use std::sync::Arc;

use rand::Rng;
use serde::Deserialize;
use tracemeter_types::Sample;

use super::emit;
use crate::error::{Error, Result};
use crate::writer::Writer;

/// Number of samples kept by a histogram's reservoir.
pub const RESERVOIR_SIZE: usize = 1000;

/// A named percentile reported by histograms, e.g. `99.9th = 99.9`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Percentile {
    /// Key suffix under which the percentile is written.
    pub name: String,
    /// Percentile in `[0, 100]`.
    pub value: f64,
}

impl Percentile {
    /// Create a percentile, rejecting values outside `[0, 100]`.
    pub fn new(name: impl Into<String>, value: f64) -> Result<Self> {
        let percentile = Self {
            name: name.into(),
            value,
        };
        percentile.validate()?;
        Ok(percentile)
    }

    /// Check the value lies in `[0, 100]`.
    pub fn validate(&self) -> Result<()> {
        if (0.0..=100.0).contains(&self.value) {
            Ok(())
        } else {
            Err(Error::InvalidPercentile {
                name: self.name.clone(),
                value: self.value,
            })
        }
    }

    /// The 50th, 90th and 99th percentiles.
    pub fn defaults() -> Vec<Percentile> {
        vec![
            Percentile::named("50th", 50.0),
            Percentile::named("90th", 90.0),
            Percentile::named("99th", 99.0),
        ]
    }

    fn named(name: &str, value: f64) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }
}

/// Tracks the distribution of a stream of values in bounded memory.
///
/// The first [`RESERVOIR_SIZE`] samples are kept as is. Each later sample,
/// the i-th seen, replaces a stored one when a uniform draw in `[0, i)` lands
/// inside the reservoir. Minimum and maximum are tracked over every sample.
#[derive(Debug, Clone, Default)]
pub struct Histogram {
    percentiles: Option<Arc<[Percentile]>>,
    minimum: f64,
    maximum: f64,
    items: Vec<f64>,
    sorted: bool,
    total: usize,
}

impl Histogram {
    /// Create a histogram reporting the default percentiles.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a histogram reporting the given percentiles.
    ///
    /// # Panics
    ///
    /// Panics if a percentile is outside `[0, 100]`.
    pub fn with_percentiles(percentiles: Arc<[Percentile]>) -> Self {
        for p in percentiles.iter() {
            if let Err(err) = p.validate() {
                panic!("histogram: {}", err);
            }
        }

        Self {
            percentiles: Some(percentiles),
            ..Self::default()
        }
    }

    /// Add a sample to the stream.
    ///
    /// # Panics
    ///
    /// Panics for booleans and text, which have no place in a distribution.
    pub fn record(&mut self, sample: &Sample) {
        let value = match sample {
            Sample::Int(_) | Sample::Float(_) | Sample::Duration(_) => {
                sample.as_f64().unwrap_or_default()
            }
            other => panic!("unsupported sample kind '{}' for histogram", other.kind()),
        };

        if self.items.capacity() == 0 {
            self.items.reserve_exact(RESERVOIR_SIZE);
        }

        let i = self.total;
        if i < RESERVOIR_SIZE {
            self.items.push(value);
        } else {
            let j = rand::rng().random_range(0..i);
            if j < RESERVOIR_SIZE {
                self.items[j] = value;
            }
        }

        self.sorted = false;

        // keep track of extremes
        if i > 0 {
            self.minimum = self.minimum.min(value);
            self.maximum = self.maximum.max(value);
        } else {
            self.minimum = value;
            self.maximum = value;
        }

        self.total += 1;
    }

    /// Drop every sample of the window.
    pub fn reset(&mut self) {
        self.items.clear();
        self.sorted = false;
        self.total = 0;
    }

    /// Write the minimum, the maximum and each percentile.
    pub fn write(&mut self, w: &mut dyn Writer, name: &str) {
        if self.total == 0 {
            return;
        }

        let path = format!("{}.", name);
        let key = format!("{}Minimum", path);
        emit(w.write(&key, self.minimum), &key);
        let key = format!("{}Maximum", path);
        emit(w.write(&key, self.maximum), &key);

        match self.percentiles.clone() {
            Some(percentiles) => {
                for p in percentiles.iter() {
                    let key = format!("{}{}", path, p.name);
                    emit(w.write(&key, self.percentile(p.value)), &key);
                }
            }
            None => {
                for p in Percentile::defaults() {
                    let key = format!("{}{}", path, p.name);
                    emit(w.write(&key, self.percentile(p.value)), &key);
                }
            }
        }
    }

    /// Value at the given percentile of the retained samples.
    ///
    /// Returns 0 when nothing was recorded.
    pub fn percentile(&mut self, pct: f64) -> f64 {
        if self.items.is_empty() {
            return 0.0;
        }

        if !self.sorted {
            self.items.sort_by(f64::total_cmp);
            self.sorted = true;
        }

        let n = self.items.len();
        let index = ((n as f64) * pct / 100.0).floor() as usize;
        self.items[index.min(n - 1)]
    }

    /// Smallest value seen in the window.
    pub fn minimum(&self) -> Option<f64> {
        (self.total > 0).then_some(self.minimum)
    }

    /// Largest value seen in the window.
    pub fn maximum(&self) -> Option<f64> {
        (self.total > 0).then_some(self.maximum)
    }

    /// Number of samples seen in the window.
    pub fn seen(&self) -> usize {
        self.total
    }

    /// Number of samples held by the reservoir.
    pub fn stored(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::{assert_close, Capture};

    #[test]
    fn default_percentiles() {
        let mut histogram = Histogram::new();
        for i in 0..100 {
            histogram.record(&Sample::from(i));
        }

        let mut w = Capture::new(Duration::from_secs(1));
        histogram.write(&mut w, "h");

        assert_eq!(
            w.names(),
            vec!["h.Minimum", "h.Maximum", "h.50th", "h.90th", "h.99th"]
        );
        assert_close(w.value("h.Minimum").unwrap(), 0.0);
        assert_close(w.value("h.Maximum").unwrap(), 99.0);
        assert_close(w.value("h.50th").unwrap(), 50.0);
        assert_close(w.value("h.90th").unwrap(), 90.0);
        assert_close(w.value("h.99th").unwrap(), 99.0);
    }

    #[test]
    fn exact_extremes_below_capacity() {
        let mut histogram = Histogram::new();
        let values = [7.5, -2.0, 13.25, 0.0, 4.0];
        for v in values {
            histogram.record(&Sample::from(v));
        }

        assert_eq!(histogram.minimum(), Some(-2.0));
        assert_eq!(histogram.maximum(), Some(13.25));
        assert_eq!(histogram.stored(), values.len());
    }

    #[test]
    fn reservoir_is_bounded() {
        let mut histogram = Histogram::new();
        for i in 0..5000 {
            histogram.record(&Sample::from(i));
        }

        assert_eq!(histogram.seen(), 5000);
        assert_eq!(histogram.stored(), RESERVOIR_SIZE);
        assert_eq!(histogram.minimum(), Some(0.0));
        assert_eq!(histogram.maximum(), Some(4999.0));
    }

    #[test]
    fn percentiles_stay_in_bounds() {
        let mut histogram = Histogram::new();
        histogram.record(&Sample::from(Duration::from_millis(3)));

        assert_close(histogram.percentile(0.0), 0.003);
        assert_close(histogram.percentile(99.0), 0.003);
        assert_close(histogram.percentile(100.0), 0.003);
    }

    #[test]
    fn custom_percentiles() {
        let percentiles: Arc<[Percentile]> = vec![Percentile::new("999", 99.9).unwrap()].into();
        let mut histogram = Histogram::with_percentiles(percentiles);
        for i in 0..10 {
            histogram.record(&Sample::from(i));
        }

        let mut w = Capture::new(Duration::from_secs(1));
        histogram.write(&mut w, "h");
        assert_eq!(w.names(), vec!["h.Minimum", "h.Maximum", "h.999"]);
        assert_close(w.value("h.999").unwrap(), 9.0);
    }

    #[test]
    fn reset_clears_window() {
        let mut histogram = Histogram::new();
        histogram.record(&Sample::from(1));
        histogram.reset();

        assert_eq!(histogram.seen(), 0);
        assert_eq!(histogram.minimum(), None);

        let mut w = Capture::new(Duration::from_secs(1));
        histogram.write(&mut w, "h");
        assert!(w.points.is_empty());

        histogram.record(&Sample::from(42));
        assert_eq!(histogram.minimum(), Some(42.0));
        assert_eq!(histogram.maximum(), Some(42.0));
    }

    #[test]
    fn invalid_percentile_is_rejected() {
        assert!(Percentile::new("bad", 120.0).is_err());
        assert!(Percentile::new("bad", -1.0).is_err());
        assert!(Percentile::new("max", 100.0).is_ok());
    }

    #[test]
    #[should_panic(expected = "invalid percentile")]
    fn invalid_percentile_panics_on_histogram() {
        let percentiles: Arc<[Percentile]> = vec![Percentile {
            name: "bad".to_string(),
            value: 101.0,
        }]
        .into();
        Histogram::with_percentiles(percentiles);
    }

    #[test]
    #[should_panic(expected = "unsupported sample")]
    fn bool_is_unsupported() {
        Histogram::new().record(&Sample::from(true));
    }
}
