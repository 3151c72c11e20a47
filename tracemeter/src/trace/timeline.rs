//! Pooled per-trace event buffers.

use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracemeter_types::{Event, EventKind, Sample};

use super::handler::Handler;

/// Entries preallocated in every trace buffer.
pub const QUEUE_CAPACITY: usize = 1000;

/// The event buffer of one trace.
///
/// A timeline is leased from a [`Pool`] for the duration of a trace. Spans
/// keep a copy of the epoch the timeline had when they were created; once the
/// trace completes the epoch advances and those spans become inert.
pub(crate) struct Timeline {
    pub(crate) state: Mutex<TimelineState>,
}

pub(crate) struct TimelineState {
    pub(crate) queue: Vec<Event>,
    pub(crate) begin: Instant,
    pub(crate) epoch: u64,
    pub(crate) tracing: String,
    pub(crate) handler: Option<Arc<dyn Handler>>,
}

impl Timeline {
    fn new() -> Self {
        let mut queue = Vec::with_capacity(QUEUE_CAPACITY);
        queue.push(Event::root());

        Self {
            state: Mutex::new(TimelineState {
                queue,
                begin: Instant::now(),
                epoch: 0,
                tracing: String::new(),
                handler: None,
            }),
        }
    }
}

impl TimelineState {
    /// Append an event and return its index.
    pub(crate) fn add(
        &mut self,
        from: usize,
        kind: EventKind,
        what: Cow<'static, str>,
        data: Option<Sample>,
    ) -> usize {
        let id = self.queue.len();
        self.queue.push(Event {
            from,
            kind,
            when: self.begin.elapsed(),
            what,
            path: String::new(),
            data,
        });
        id
    }
}

/// Free list of timelines plus the epoch counter shared by all of them.
#[derive(Default)]
pub(crate) struct Pool {
    free: Mutex<Vec<Arc<Timeline>>>,
    created: AtomicUsize,
    epoch: AtomicU64,
}

impl Pool {
    /// Take an idle timeline, or allocate one, and prepare it for a new trace.
    ///
    /// Returns the timeline and its current epoch.
    pub(crate) fn lease(
        &self,
        handler: Option<Arc<dyn Handler>>,
        tracing: &str,
    ) -> (Arc<Timeline>, u64) {
        let timeline = self.free.lock().pop().unwrap_or_else(|| {
            self.created.fetch_add(1, Ordering::Relaxed);
            Arc::new(Timeline::new())
        });

        let epoch = {
            let mut state = timeline.state.lock();
            state.queue.truncate(1);
            state.begin = Instant::now();
            state.tracing.clear();
            state.tracing.push_str(tracing);
            state.handler = handler;
            state.epoch
        };

        (timeline, epoch)
    }

    /// Return a completed timeline to the free list.
    pub(crate) fn release(&self, timeline: Arc<Timeline>) {
        self.free.lock().push(timeline);
    }

    /// Draw a fresh epoch, distinct from every epoch handed out before.
    pub(crate) fn next_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Timelines allocated so far.
    pub(crate) fn size(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// Timelines waiting on the free list.
    pub(crate) fn idle(&self) -> usize {
        self.free.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_reuses_released_timelines() {
        let pool = Pool::default();
        let (first, _) = pool.lease(None, "a");
        pool.release(first.clone());

        let (second, _) = pool.lease(None, "b");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(pool.size(), 1);
        assert_eq!(second.state.lock().tracing, "b");
    }

    #[test]
    fn lease_resets_to_root() {
        let pool = Pool::default();
        let (timeline, _) = pool.lease(None, "");
        timeline
            .state
            .lock()
            .add(0, EventKind::Start, Cow::Borrowed("x"), None);
        pool.release(timeline);

        let (timeline, _) = pool.lease(None, "");
        let state = timeline.state.lock();
        assert_eq!(state.queue.len(), 1);
        assert_eq!(state.queue[0].kind, EventKind::Root);
        assert!(state.queue.capacity() >= QUEUE_CAPACITY);
    }

    #[test]
    fn buffer_grows_past_capacity() {
        let pool = Pool::default();
        let (timeline, _) = pool.lease(None, "");
        let mut state = timeline.state.lock();
        for _ in 0..QUEUE_CAPACITY * 2 {
            state.add(0, EventKind::Count, Cow::Borrowed("n"), Some(Sample::from(1)));
        }
        assert_eq!(state.queue.len(), QUEUE_CAPACITY * 2 + 1);
        assert_eq!(state.queue.last().map(|e| e.from), Some(0));
    }

    #[test]
    fn epochs_are_unique() {
        let pool = Pool::default();
        let a = pool.next_epoch();
        let b = pool.next_epoch();
        assert_ne!(a, 0);
        assert_ne!(a, b);
    }
}
