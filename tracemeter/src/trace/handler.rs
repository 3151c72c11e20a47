//! Consumers of completed traces.

use std::sync::Arc;

use tracemeter_types::Event;

/// Processes the events of completed traces.
///
/// The first event of a trace is the synthetic root. Every other event
/// points to the span it was recorded under through its `from` index.
///
/// `handle_trace` runs while the trace's buffer is still locked, so an
/// implementation must not record into spans of the trace it is handling.
pub trait Handler: Send + Sync {
    /// Process the events of one completed trace.
    fn handle_trace(&self, events: &[Event]);

    /// Publish what has been accumulated so far.
    fn report(&self) {}

    /// Release any resources held by the handler.
    fn close(&self) {}
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn handle_trace(&self, events: &[Event]) {
        (**self).handle_trace(events)
    }

    fn report(&self) {
        (**self).report()
    }

    fn close(&self) {
        (**self).close()
    }
}

/// Discards every trace.
#[derive(Debug, Default, Clone, Copy)]
pub struct NilHandler;

impl Handler for NilHandler {
    fn handle_trace(&self, _events: &[Event]) {}
}

/// Forwards every call to each handler in order.
#[derive(Clone, Default)]
pub struct MultiHandler {
    items: Vec<Arc<dyn Handler>>,
}

impl MultiHandler {
    /// Combine handlers.
    pub fn new(items: Vec<Arc<dyn Handler>>) -> Self {
        Self { items }
    }

    /// Append a handler.
    pub fn push(&mut self, handler: Arc<dyn Handler>) {
        self.items.push(handler);
    }

    /// Number of handlers.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether there are no handlers.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl std::fmt::Debug for MultiHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiHandler")
            .field("items", &self.items.len())
            .finish()
    }
}

impl Handler for MultiHandler {
    fn handle_trace(&self, events: &[Event]) {
        for item in &self.items {
            item.handle_trace(events);
        }
    }

    fn report(&self) {
        for item in &self.items {
            item.report();
        }
    }

    fn close(&self) {
        for item in &self.items {
            item.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct Calls(Mutex<Vec<&'static str>>);

    impl Handler for Calls {
        fn handle_trace(&self, _events: &[Event]) {
            self.0.lock().push("trace");
        }

        fn report(&self) {
            self.0.lock().push("report");
        }

        fn close(&self) {
            self.0.lock().push("close");
        }
    }

    #[test]
    fn multi_forwards_in_order() {
        let a = Arc::new(Calls::default());
        let b = Arc::new(Calls::default());
        let multi = MultiHandler::new(vec![a.clone(), b.clone()]);

        multi.handle_trace(&[Event::root()]);
        multi.report();
        multi.close();

        assert_eq!(*a.0.lock(), vec!["trace", "report", "close"]);
        assert_eq!(*b.0.lock(), vec!["trace", "report", "close"]);
    }

    #[test]
    fn nil_accepts_everything() {
        let nil = NilHandler;
        nil.handle_trace(&[Event::root()]);
        nil.report();
        nil.close();
    }
}
