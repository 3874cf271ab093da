//! Recording collaborators for tests.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::tags::{ScopedTagSink, TagScope, TagSink, TagSnapshot};

/// A tag sink that behaves like [`ScopedTagSink`] and records every snapshot
/// entered into it.
#[derive(Debug)]
pub struct RecordingTagSink {
    inner: Arc<ScopedTagSink>,
    entered: Mutex<Vec<Arc<TagSnapshot>>>,
}

impl Default for RecordingTagSink {
    fn default() -> Self {
        Self {
            inner: ScopedTagSink::new(),
            entered: Mutex::new(Vec::new()),
        }
    }
}

impl RecordingTagSink {
    /// Creates a new recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every snapshot entered so far, oldest first.
    #[must_use]
    pub fn entered(&self) -> Vec<Arc<TagSnapshot>> {
        self.entered.lock().clone()
    }

    /// Returns the number of scopes entered so far.
    #[must_use]
    pub fn enter_count(&self) -> usize {
        self.entered.lock().len()
    }

    /// Returns the underlying scoped sink.
    #[must_use]
    pub fn inner(&self) -> &Arc<ScopedTagSink> {
        &self.inner
    }

    /// Clears the recorded snapshots.
    pub fn reset(&self) {
        self.entered.lock().clear();
    }
}

impl TagSink for RecordingTagSink {
    fn current_snapshot(&self) -> Option<Arc<TagSnapshot>> {
        self.inner.current_snapshot()
    }

    fn enter(&self, snapshot: Arc<TagSnapshot>) -> TagScope {
        self.entered.lock().push(Arc::clone(&snapshot));
        self.inner.enter(snapshot)
    }
}
