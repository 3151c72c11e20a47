use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::summary::Summary;

use super::{Reporter, WriteError, WriteResult, Writer};

type Commit = dyn Fn(&BTreeMap<String, i64>) -> bool + Send + Sync;

/// A tap that accumulates scaled totals across cycles.
///
/// Every write answers [`WriteError::Ignored`], so inside a [`Stack`] the
/// values still reach the sinks behind it. When a cycle closes the commit
/// callback sees the running totals; returning `true` clears them.
///
/// [`Stack`]: super::Stack
#[derive(Clone)]
pub struct Aggregate {
    counts: Arc<Mutex<BTreeMap<String, i64>>>,
    commit: Option<Arc<Commit>>,
}

impl Aggregate {
    /// Accumulate without committing.
    pub fn new() -> Self {
        Self {
            counts: Arc::default(),
            commit: None,
        }
    }

    /// Accumulate and hand the totals to `commit` after each cycle.
    pub fn with_commit<F>(commit: F) -> Self
    where
        F: Fn(&BTreeMap<String, i64>) -> bool + Send + Sync + 'static,
    {
        Self {
            counts: Arc::default(),
            commit: Some(Arc::new(commit)),
        }
    }

    /// A copy of the running totals.
    pub fn counts(&self) -> BTreeMap<String, i64> {
        self.counts.lock().clone()
    }
}

impl Default for Aggregate {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Aggregate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregate")
            .field("counts", &*self.counts.lock())
            .field("commit", &self.commit.is_some())
            .finish()
    }
}

impl Reporter for Aggregate {
    fn new_writer(&self, _summary: &Summary) -> Box<dyn Writer> {
        Box::new(self.clone())
    }
}

impl Writer for Aggregate {
    fn write(&mut self, _name: &str, _value: f64) -> WriteResult {
        Err(WriteError::Ignored)
    }

    fn write_scaled(&mut self, name: &str, value: f64) -> WriteResult {
        *self.counts.lock().entry(name.to_string()).or_insert(0) += value as i64;
        Err(WriteError::Ignored)
    }

    fn write_string(&mut self, _name: &str, _text: &str) -> WriteResult {
        Err(WriteError::Ignored)
    }

    fn close(self: Box<Self>) {
        let Some(commit) = &self.commit else {
            return;
        };
        let mut counts = self.counts.lock();
        if commit(&counts) {
            counts.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::Fields;
    use crate::testing::Capture;
    use crate::writer::Stack;

    struct Behind;

    impl Reporter for Behind {
        fn new_writer(&self, summary: &Summary) -> Box<dyn Writer> {
            Box::new(Capture::new(summary.step()))
        }
    }

    #[test]
    fn totals_accumulate_across_cycles() {
        let aggregate = Aggregate::new();
        let mut summary = Summary::default();
        summary.count("hits", 3);
        summary.write(&aggregate);
        summary.count("hits", 2);
        summary.write(&aggregate);

        // Totals are not divided by the window and are not reset with it.
        assert_eq!(aggregate.counts().get("hits"), Some(&8));
    }

    #[test]
    fn commit_clears_when_accepted() {
        let totals = Arc::new(Mutex::new(Vec::new()));
        let seen = totals.clone();
        let aggregate = Aggregate::with_commit(move |counts| {
            let total = counts.get("svc.Jobs").copied().unwrap_or(0);
            seen.lock().push(total);
            total >= 4
        });

        for _ in 0..3 {
            let mut summary = Summary::default();
            summary.record("svc", &Fields::new().counter("Jobs", 2));
            summary.write(&aggregate);
        }

        assert_eq!(*totals.lock(), vec![2, 4, 2]);
        assert_eq!(aggregate.counts().get("svc.Jobs"), Some(&2));
    }

    #[test]
    fn values_pass_through_in_a_stack() {
        let aggregate = Aggregate::new();
        let stack = Stack::new().push(aggregate.clone()).push(Behind);

        let mut w = stack.new_writer(&Summary::default());
        assert!(w.write_scaled("x", 5.0).is_ok());
        assert!(w.write_string("y", "text").is_ok());
        w.close();
        assert_eq!(aggregate.counts().get("x"), Some(&5));
    }
}
