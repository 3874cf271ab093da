//! Execution unit identity.
//!
//! An execution unit is the scope a context is opened in: an OS thread by
//! default, or a tokio task wrapped in [`ExecutionUnitId::scope`] so that a
//! task keeps one identity while the runtime moves it between threads.

use parking_lot::RwLock;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_UNIT: AtomicU64 = AtomicU64::new(1);

/// Listeners notified when an execution unit terminates.
static TERMINATION_LISTENERS: RwLock<Vec<Weak<dyn UnitTerminationListener>>> =
    RwLock::new(Vec::new());

tokio::task_local! {
    static TASK_UNIT: ExecutionUnitId;
}

thread_local! {
    static THREAD_UNIT: ThreadUnit = ThreadUnit(ExecutionUnitId::allocate());
}

/// Process-unique identifier of an execution unit. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExecutionUnitId(u64);

impl ExecutionUnitId {
    fn allocate() -> Self {
        Self(NEXT_UNIT.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the unit of the caller.
    ///
    /// A surrounding task scope wins over the thread identity.
    #[must_use]
    pub fn current() -> Self {
        TASK_UNIT
            .try_with(|unit| *unit)
            .unwrap_or_else(|_| THREAD_UNIT.with(|unit| unit.0))
    }

    /// Runs `future` as a fresh execution unit.
    ///
    /// Listeners are notified when the future completes or is dropped.
    pub async fn scope<F: Future>(future: F) -> F::Output {
        let unit = Self::allocate();
        let _terminate = TerminationGuard(unit);
        TASK_UNIT.scope(unit, future).await
    }

    /// Runs `f` synchronously as a fresh execution unit.
    pub fn sync_scope<R>(f: impl FnOnce() -> R) -> R {
        let unit = Self::allocate();
        let _terminate = TerminationGuard(unit);
        TASK_UNIT.sync_scope(unit, f)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ExecutionUnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit-{}", self.0)
    }
}

/// Receives execution unit termination notifications.
pub trait UnitTerminationListener: Send + Sync {
    /// Called once after `unit` has terminated.
    fn unit_terminated(&self, unit: ExecutionUnitId);
}

/// Registers a listener for unit terminations.
///
/// Only a weak reference is kept; dropped listeners are pruned on the next
/// notification.
pub fn register_termination_listener(listener: Weak<dyn UnitTerminationListener>) {
    TERMINATION_LISTENERS.write().push(listener);
}

fn notify_terminated(unit: ExecutionUnitId) {
    let listeners: Vec<Arc<dyn UnitTerminationListener>> = {
        let mut registered = TERMINATION_LISTENERS.write();
        registered.retain(|l| l.strong_count() > 0);
        registered.iter().filter_map(Weak::upgrade).collect()
    };
    for listener in listeners {
        listener.unit_terminated(unit);
    }
}

struct ThreadUnit(ExecutionUnitId);

impl Drop for ThreadUnit {
    fn drop(&mut self) {
        notify_terminated(self.0);
    }
}

struct TerminationGuard(ExecutionUnitId);

impl Drop for TerminationGuard {
    fn drop(&mut self) {
        notify_terminated(self.0);
    }
}
