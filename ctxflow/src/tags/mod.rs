//! Tag/baggage sink integration.
//!
//! The sink is the external tagging system that metrics and tracing backends
//! read their tags from. Contexts publish snapshots into it on activation and
//! read the current snapshot when they are created.

mod sink;
pub mod values;

pub use sink::{NoOpTagSink, ScopedTagSink};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// An immutable set of tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSnapshot {
    tags: BTreeMap<String, String>,
}

impl TagSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a tag value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Returns the number of tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Returns true if there are no tags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Iterates over the tags in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the tags as owned pairs.
    #[must_use]
    pub fn to_entries(&self) -> Vec<(String, String)> {
        self.tags
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl<K: Into<String>, V: AsRef<str>> FromIterator<(K, V)> for TagSnapshot {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            tags: iter
                .into_iter()
                .map(|(k, v)| (k.into(), values::sanitize_tag_value(v.as_ref())))
                .collect(),
        }
    }
}

/// Callback releasing a scope.
pub type ScopeRelease = Box<dyn FnOnce() + Send>;

/// A tag snapshot made current in a sink until the scope is dropped.
///
/// Dropping the scope releases it, which also covers unwinding.
pub struct TagScope {
    snapshot: Arc<TagSnapshot>,
    release: Option<ScopeRelease>,
}

impl TagScope {
    /// Creates a scope with a release callback.
    #[must_use]
    pub fn new(snapshot: Arc<TagSnapshot>, release: ScopeRelease) -> Self {
        Self {
            snapshot,
            release: Some(release),
        }
    }

    /// Creates a scope that releases nothing.
    #[must_use]
    pub fn detached(snapshot: Arc<TagSnapshot>) -> Self {
        Self {
            snapshot,
            release: None,
        }
    }

    /// The snapshot this scope made current.
    #[must_use]
    pub fn snapshot(&self) -> &Arc<TagSnapshot> {
        &self.snapshot
    }

    /// Releases the scope now.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for TagScope {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for TagScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagScope")
            .field("snapshot", &self.snapshot)
            .field("released", &self.release.is_none())
            .finish()
    }
}

/// The tagging system contexts publish into.
pub trait TagSink: Send + Sync {
    /// Returns the snapshot current on the calling execution unit.
    fn current_snapshot(&self) -> Option<Arc<TagSnapshot>>;

    /// Makes `snapshot` current on the calling execution unit.
    fn enter(&self, snapshot: Arc<TagSnapshot>) -> TagScope;

    /// Returns the tags current on the calling execution unit.
    fn current_entries(&self) -> Vec<(String, String)> {
        self.current_snapshot()
            .map(|s| s.to_entries())
            .unwrap_or_default()
    }

    /// Builds a snapshot from `entries` and makes it current.
    fn build_scope_from(&self, entries: Vec<(String, String)>) -> TagScope {
        self.enter(Arc::new(entries.into_iter().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_snapshot_from_pairs_is_sorted() {
        let snapshot: TagSnapshot = [("b", "2"), ("a", "1")].into_iter().collect();
        let keys: Vec<&str> = snapshot.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(snapshot.get("a"), Some("1"));
    }

    #[test]
    fn test_scope_releases_once_on_drop() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let scope = TagScope::new(
            Arc::new(TagSnapshot::new()),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        scope.close();

        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_scope_released_on_panic() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let result = std::panic::catch_unwind(move || {
            let _scope = TagScope::new(
                Arc::new(TagSnapshot::new()),
                Box::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            );
            panic!("measurement failed");
        });

        assert!(result.is_err());
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
