//! Events buffered by a trace.

use std::borrow::Cow;
use std::time::Duration;

use crate::Sample;

/// Type of an event recorded during a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventKind {
    /// The synthetic entry at index 0 of every trace buffer.
    #[default]
    Root,
    /// A new top-level span whose name is not prefixed by its parent.
    Start,
    /// A nested span named after its parent's path.
    Enter,
    /// The exit point of a span.
    Leave,
    /// A counter increment.
    Count,
    /// An instantaneous gauge measurement.
    Set,
    /// A sample of a distribution.
    Record,
    /// A line of text.
    Log,
}

impl EventKind {
    /// Whether the event opens a span.
    pub fn opens_span(&self) -> bool {
        matches!(self, EventKind::Start | EventKind::Enter)
    }
}

/// The data gathered for a single event of a trace.
///
/// Events are stored by value in the trace buffer; an event's index in that
/// buffer doubles as its id, so `from` always points to an earlier entry.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Event {
    /// Index of the span this event was recorded under.
    pub from: usize,
    /// Type of event.
    pub kind: EventKind,
    /// When the event was recorded relative to the beginning of the trace.
    pub when: Duration,
    /// Name of the event.
    pub what: Cow<'static, str>,
    /// Scratch space for handlers that build names from a parent's path.
    pub path: String,
    /// Sample attached to `Count`, `Set`, `Record` and `Log` events.
    pub data: Option<Sample>,
}

impl Event {
    /// The synthetic root entry.
    pub fn root() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_default() {
        let root = Event::root();
        assert_eq!(root.kind, EventKind::Root);
        assert_eq!(root.from, 0);
        assert_eq!(root.when, Duration::ZERO);
        assert!(root.data.is_none());
    }

    #[test]
    fn span_opening_kinds() {
        assert!(EventKind::Start.opens_span());
        assert!(EventKind::Enter.opens_span());
        assert!(!EventKind::Leave.opens_span());
        assert!(!EventKind::Count.opens_span());
        assert!(!EventKind::Root.opens_span());
    }
}
