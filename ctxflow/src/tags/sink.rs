//! Tag sink implementations.

use super::{TagScope, TagSink, TagSnapshot};
use crate::context::{register_termination_listener, ExecutionUnitId, UnitTerminationListener};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{trace, warn};

/// A tag sink that discards everything.
///
/// Used when no tagging system is installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpTagSink;

impl TagSink for NoOpTagSink {
    fn current_snapshot(&self) -> Option<Arc<TagSnapshot>> {
        None
    }

    fn enter(&self, snapshot: Arc<TagSnapshot>) -> TagScope {
        TagScope::detached(snapshot)
    }
}

type ScopeStacks = DashMap<ExecutionUnitId, Vec<(u64, Arc<TagSnapshot>)>>;

/// An in-process tag sink keeping one scope stack per execution unit.
///
/// Stacks of terminated units are evicted automatically.
#[derive(Debug, Default)]
pub struct ScopedTagSink {
    stacks: Arc<ScopeStacks>,
    next_scope: AtomicU64,
}

impl ScopedTagSink {
    /// Creates a sink and registers it for unit termination.
    #[must_use]
    pub fn new() -> Arc<Self> {
        let sink = Arc::new(Self::default());
        let listener: Arc<dyn UnitTerminationListener> = sink.clone();
        register_termination_listener(Arc::downgrade(&listener));
        sink
    }

    /// Returns the scope depth of `unit`.
    #[must_use]
    pub fn depth_on(&self, unit: ExecutionUnitId) -> usize {
        self.stacks.get(&unit).map_or(0, |s| s.len())
    }

    /// Returns the number of units with open scopes.
    #[must_use]
    pub fn active_units(&self) -> usize {
        self.stacks.len()
    }

    fn release(stacks: &Weak<ScopeStacks>, unit: ExecutionUnitId, scope_id: u64) {
        let Some(stacks) = stacks.upgrade() else {
            return;
        };
        let now_empty = {
            let Some(mut stack) = stacks.get_mut(&unit) else {
                warn!(%unit, scope_id, "Released a tag scope on a unit without scopes");
                return;
            };
            match stack.iter().rposition(|(id, _)| *id == scope_id) {
                Some(pos) => {
                    if pos + 1 != stack.len() {
                        warn!(%unit, scope_id, "Tag scope released out of order");
                    }
                    stack.remove(pos);
                }
                None => warn!(%unit, scope_id, "Released an unknown tag scope"),
            }
            stack.is_empty()
        };
        if now_empty {
            stacks.remove_if(&unit, |_, s| s.is_empty());
        }
        trace!(%unit, scope_id, "Tag scope released");
    }
}

impl TagSink for ScopedTagSink {
    fn current_snapshot(&self) -> Option<Arc<TagSnapshot>> {
        let unit = ExecutionUnitId::current();
        self.stacks
            .get(&unit)
            .and_then(|s| s.last().map(|(_, snapshot)| snapshot.clone()))
    }

    fn enter(&self, snapshot: Arc<TagSnapshot>) -> TagScope {
        let unit = ExecutionUnitId::current();
        let scope_id = self.next_scope.fetch_add(1, Ordering::Relaxed);
        self.stacks
            .entry(unit)
            .or_default()
            .push((scope_id, snapshot.clone()));
        trace!(%unit, scope_id, tags = snapshot.len(), "Tag scope entered");

        let stacks = Arc::downgrade(&self.stacks);
        TagScope::new(
            snapshot,
            Box::new(move || Self::release(&stacks, unit, scope_id)),
        )
    }
}

impl UnitTerminationListener for ScopedTagSink {
    fn unit_terminated(&self, unit: ExecutionUnitId) {
        if let Some((_, leaked)) = self.stacks.remove(&unit) {
            warn!(%unit, scopes = leaked.len(), "Evicted tag scopes of a terminated unit");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(pairs: &[(&str, &str)]) -> Arc<TagSnapshot> {
        Arc::new(pairs.iter().copied().collect())
    }

    #[test]
    fn test_noop_sink_has_no_snapshot() {
        let sink = NoOpTagSink;
        let _scope = sink.enter(snapshot(&[("a", "1")]));
        assert!(sink.current_snapshot().is_none());
        assert!(sink.current_entries().is_empty());
    }

    #[test]
    fn test_nested_scopes_restore_in_order() {
        let sink = ScopedTagSink::new();
        let outer = sink.enter(snapshot(&[("a", "1")]));
        {
            let _inner = sink.build_scope_from(vec![("a".to_string(), "2".to_string())]);
            assert_eq!(sink.current_snapshot().unwrap().get("a"), Some("2"));
        }
        assert_eq!(sink.current_snapshot().unwrap().get("a"), Some("1"));
        drop(outer);
        assert!(sink.current_snapshot().is_none());
        assert_eq!(sink.active_units(), 0);
    }

    #[test]
    fn test_out_of_order_release_keeps_remaining_scope() {
        let sink = ScopedTagSink::new();
        let outer = sink.enter(snapshot(&[("a", "outer")]));
        let inner = sink.enter(snapshot(&[("a", "inner")]));

        drop(outer);

        assert_eq!(sink.current_snapshot().unwrap().get("a"), Some("inner"));
        drop(inner);
        assert!(sink.current_snapshot().is_none());
    }

    #[test]
    fn test_scopes_are_per_unit() {
        let sink = ScopedTagSink::new();
        let _scope = sink.enter(snapshot(&[("a", "1")]));

        let remote = sink.clone();
        let seen = std::thread::spawn(move || remote.current_snapshot())
            .join()
            .unwrap();

        assert!(seen.is_none());
    }

    #[test]
    fn test_terminated_unit_is_evicted() {
        let sink = ScopedTagSink::new();
        let remote = sink.clone();
        std::thread::spawn(move || {
            std::mem::forget(remote.enter(snapshot(&[("leak", "1")])));
        })
        .join()
        .unwrap();

        assert_eq!(sink.active_units(), 0);
    }
}
