//! Spans and the scopes that carry them.

use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracemeter_types::{EventKind, Sample};

use super::handler::{Handler, MultiHandler};
use super::timeline::{Pool, Timeline};

/// Owns a pool of trace buffers and the epoch counter that guards them.
///
/// Tracers are cheap to clone; clones share the same pool. Independent
/// tracers never see each other's timelines.
///
/// # Example
///
/// ```rust
/// use tracemeter::Tracer;
///
/// let tracer = Tracer::new();
/// let scope = tracer.scope().start("Request", "user-42");
///
/// let inner = scope.enter("Parse");
/// inner.count("Bytes", 512);
/// inner.leave("Done");
///
/// scope.leave("Served");
/// assert_eq!(tracer.idle(), 1);
/// ```
#[derive(Clone, Default)]
pub struct Tracer {
    pool: Arc<Pool>,
}

impl Tracer {
    /// Create a tracer with an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// A scope with no handler and no open span.
    pub fn scope(&self) -> Scope {
        Scope {
            tracer: self.clone(),
            handler: None,
            span: None,
        }
    }

    /// Number of trace buffers allocated so far.
    pub fn pool_size(&self) -> usize {
        self.pool.size()
    }

    /// Number of trace buffers waiting for a trace.
    pub fn idle(&self) -> usize {
        self.pool.idle()
    }
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer")
            .field("pool_size", &self.pool_size())
            .field("idle", &self.idle())
            .finish()
    }
}

/// One entry/exit bracketed unit of work within a trace.
struct Span {
    id: usize,
    epoch: u64,
    owner: Arc<Timeline>,
    up: Option<Arc<Span>>,
    done: AtomicBool,
}

impl Span {
    /// The synthetic root of a freshly leased timeline.
    fn root(owner: Arc<Timeline>, epoch: u64) -> Arc<Self> {
        Arc::new(Self {
            id: 0,
            epoch,
            owner,
            up: None,
            done: AtomicBool::new(false),
        })
    }

    /// Whether this is the outermost span of its trace.
    fn is_top(&self) -> bool {
        self.up.as_ref().is_some_and(|up| up.id == 0)
    }
}

/// The instrumentation context threaded through calls.
///
/// A scope carries the handler that will receive completed traces and the
/// current span, if any. Opening a span returns a new scope; the scope it was
/// derived from is unchanged, so scopes can be cloned into detached work.
///
/// Operations on a span whose trace has already completed are ignored.
#[derive(Clone)]
pub struct Scope {
    tracer: Tracer,
    handler: Option<Arc<dyn Handler>>,
    span: Option<Arc<Span>>,
}

impl Scope {
    /// Install the handler for traces started from this scope.
    pub fn with_handler(&self, handler: Arc<dyn Handler>) -> Scope {
        Scope {
            handler: Some(handler),
            ..self.clone()
        }
    }

    /// Add a handler next to the one already installed.
    pub fn add_handler(&self, handler: Arc<dyn Handler>) -> Scope {
        let handler: Arc<dyn Handler> = match &self.handler {
            Some(current) => Arc::new(MultiHandler::new(vec![current.clone(), handler])),
            None => handler,
        };
        self.with_handler(handler)
    }

    /// Open a span whose name does not include its parent's.
    ///
    /// Without a current span this begins a new trace tagged with `tracing`.
    pub fn start(&self, name: impl Into<Cow<'static, str>>, tracing: &str) -> Scope {
        self.create(name.into(), tracing, EventKind::Start)
    }

    /// Open a span named under its parent's path.
    ///
    /// Without a current span this begins a new, untagged trace.
    pub fn enter(&self, name: impl Into<Cow<'static, str>>) -> Scope {
        self.create(name.into(), "*", EventKind::Enter)
    }

    fn create(&self, name: Cow<'static, str>, tracing: &str, kind: EventKind) -> Scope {
        let parent = match &self.span {
            Some(span) => span.clone(),
            None => {
                let (timeline, epoch) = self.tracer.pool.lease(self.handler.clone(), tracing);
                Span::root(timeline, epoch)
            }
        };

        let id = {
            let mut state = parent.owner.state.lock();
            if parent.epoch != state.epoch {
                return self.clone();
            }
            state.add(parent.id, kind, name, None)
        };

        Scope {
            span: Some(Arc::new(Span {
                id,
                epoch: parent.epoch,
                owner: parent.owner.clone(),
                up: Some(parent),
                done: AtomicBool::new(false),
            })),
            ..self.clone()
        }
    }

    /// Close the current span.
    ///
    /// Leaving the outermost span hands the whole trace to its handler and
    /// recycles the buffer.
    ///
    /// # Panics
    ///
    /// Panics if the scope has no span or if the span was already left.
    pub fn leave(&self, name: impl Into<Cow<'static, str>>) {
        let name = name.into();
        let Some(span) = &self.span else {
            panic!("no span: {}", name);
        };

        let mut state = span.owner.state.lock();
        if span.epoch != state.epoch {
            return;
        }
        if span.done.swap(true, Ordering::AcqRel) {
            panic!("span was already left: {}", name);
        }

        state.add(span.id, EventKind::Leave, name, None);

        if span.is_top() {
            state.epoch = self.tracer.pool.next_epoch();
            if let Some(handler) = state.handler.take() {
                handler.handle_trace(&state.queue);
            }
            self.tracer.pool.release(span.owner.clone());
        }
    }

    /// Add to a counter under the current span.
    pub fn count(&self, name: impl Into<Cow<'static, str>>, data: impl Into<Sample>) {
        self.store(EventKind::Count, name.into(), data.into());
    }

    /// Set a gauge under the current span.
    pub fn set(&self, name: impl Into<Cow<'static, str>>, data: impl Into<Sample>) {
        self.store(EventKind::Set, name.into(), data.into());
    }

    /// Record a sample of a distribution under the current span.
    pub fn record(&self, name: impl Into<Cow<'static, str>>, data: impl Into<Sample>) {
        self.store(EventKind::Record, name.into(), data.into());
    }

    /// Log a line of text under the current span.
    pub fn log(&self, name: impl Into<Cow<'static, str>>, data: impl Into<Sample>) {
        self.store(EventKind::Log, name.into(), data.into());
    }

    fn store(&self, kind: EventKind, name: Cow<'static, str>, data: Sample) {
        let Some(span) = &self.span else {
            panic!("no span: {}", name);
        };

        let mut state = span.owner.state.lock();
        if span.epoch != state.epoch {
            return;
        }
        state.add(span.id, kind, name, Some(data));
    }

    /// The key given to [`Scope::start`] for the current trace.
    pub fn tracing(&self) -> Option<String> {
        self.span
            .as_ref()
            .map(|span| span.owner.state.lock().tracing.clone())
    }

    /// Whether the scope carries an open span.
    pub fn has_span(&self) -> bool {
        self.span.is_some()
    }

    /// The tracer this scope belongs to.
    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("handler", &self.handler.is_some())
            .field("span", &self.span.as_ref().map(|s| s.id))
            .finish()
    }
}
