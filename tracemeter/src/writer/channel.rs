use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tracemeter_types::{Batch, Point};
use tracing::debug;

use crate::summary::Summary;

use super::{per_second, Reporter, WriteResult, Writer};

/// Sends each publish window as one [`Batch`] through a channel.
///
/// Sending is best effort: a full or closed channel drops the batch.
///
/// ```rust
/// use tracemeter::ChannelReporter;
///
/// let (reporter, mut rx) = ChannelReporter::channel(16);
///
/// // Later, receive batches
/// // while let Some(batch) = rx.recv().await {
/// //     println!("Got {} points", batch.len());
/// // }
/// # drop((reporter, rx.try_recv()));
/// ```
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    tx: mpsc::Sender<Batch>,
}

impl ChannelReporter {
    /// Wrap an existing sender.
    pub fn new(tx: mpsc::Sender<Batch>) -> Self {
        Self { tx }
    }

    /// Create a reporter and the receiver for its batches.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Batch>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

impl Reporter for ChannelReporter {
    fn new_writer(&self, summary: &Summary) -> Box<dyn Writer> {
        Box::new(ChannelWriter {
            tx: self.tx.clone(),
            sequence: summary.sequence(),
            time: summary.time(),
            step: summary.step(),
            points: Vec::new(),
        })
    }
}

struct ChannelWriter {
    tx: mpsc::Sender<Batch>,
    sequence: u64,
    time: SystemTime,
    step: Duration,
    points: Vec<Point>,
}

impl Writer for ChannelWriter {
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

    fn close(self: Box<Self>) {
        let ChannelWriter {
            tx,
            sequence,
            time,
            step,
            points,
        } = *self;
        let batch = Batch {
            sequence,
            time,
            step,
            points,
        };
        // Best effort send (don't block if channel is full)
        if let Err(err) = tx.try_send(batch) {
            debug!("dropping batch {}: {}", sequence, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::Fields;

    #[test]
    fn window_arrives_as_one_batch() {
        let (reporter, mut rx) = ChannelReporter::channel(4);
        let mut summary = Summary::new("app").next(SystemTime::now(), Duration::from_secs(2));
        summary.record("db", &Fields::new().counter("Queries", 4).labels("Table", "users"));
        summary.record("db", &Fields::new().labels("Table", "users"));
        summary.record("db", &Fields::new().labels("Table", "orders"));
        summary.write(&reporter);

        let batch = rx.try_recv().unwrap();
        assert_eq!(batch.sequence, 1);
        assert_eq!(batch.step, Duration::from_secs(2));
        assert_eq!(batch.get("app.db.Queries").and_then(Point::value), Some(2.0));

        let table: Vec<_> = batch.all("app.db.Table").collect();
        assert_eq!(table.len(), 3);
        assert!(matches!(table[0], Point::Text { text, .. } if text == "orders"));
        assert!(matches!(table[1], Point::Text { text, .. } if text == "users (2)"));
        assert!(matches!(table[2], Point::Rate { value, .. } if *value == 1.5));
    }

    #[test]
    fn full_channel_drops_batch() {
        let (reporter, mut rx) = ChannelReporter::channel(1);
        let mut summary = Summary::default();
        summary.count("x", 1);
        summary.write(&reporter);
        summary.write(&reporter);

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
