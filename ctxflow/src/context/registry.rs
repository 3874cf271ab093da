//! Registry of the active context per execution unit.

use super::{
    register_termination_listener, ExecutionUnitId, InstrumentationContext,
    UnitTerminationListener,
};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{trace, warn};

/// Holds the innermost active context of every execution unit.
///
/// Each unit owns one cell, so units never contend with each other. Cells of
/// terminated units are evicted automatically.
#[derive(Default)]
pub struct ActiveContextRegistry {
    cells: DashMap<ExecutionUnitId, Arc<InstrumentationContext>>,
}

impl ActiveContextRegistry {
    /// Creates a registry and registers it for unit termination.
    #[must_use]
    pub fn new() -> Arc<Self> {
        let registry = Arc::new(Self::default());
        let listener: Arc<dyn UnitTerminationListener> = registry.clone();
        register_termination_listener(Arc::downgrade(&listener));
        registry
    }

    /// Returns the context active on the calling unit.
    #[must_use]
    pub fn current(&self) -> Option<Arc<InstrumentationContext>> {
        self.current_on(ExecutionUnitId::current())
    }

    /// Returns the context active on `unit`.
    #[must_use]
    pub fn current_on(&self, unit: ExecutionUnitId) -> Option<Arc<InstrumentationContext>> {
        self.cells.get(&unit).map(|c| Arc::clone(c.value()))
    }

    /// Makes `context` active on the calling unit and returns the previous one.
    pub fn set_current(
        &self,
        context: Arc<InstrumentationContext>,
    ) -> Option<Arc<InstrumentationContext>> {
        self.set_current_on(ExecutionUnitId::current(), context)
    }

    /// Makes `context` active on `unit` and returns the previous one.
    pub fn set_current_on(
        &self,
        unit: ExecutionUnitId,
        context: Arc<InstrumentationContext>,
    ) -> Option<Arc<InstrumentationContext>> {
        trace!(%unit, context_id = %context.id(), "Context made current");
        self.cells.insert(unit, context)
    }

    /// Restores `previous` on the calling unit.
    pub fn restore(
        &self,
        previous: Option<Arc<InstrumentationContext>>,
    ) -> Option<Arc<InstrumentationContext>> {
        self.restore_on(ExecutionUnitId::current(), previous)
    }

    /// Restores `previous` on `unit`, emptying the cell for `None`.
    ///
    /// Returns the context that was replaced.
    pub fn restore_on(
        &self,
        unit: ExecutionUnitId,
        previous: Option<Arc<InstrumentationContext>>,
    ) -> Option<Arc<InstrumentationContext>> {
        match previous {
            Some(context) => self.cells.insert(unit, context),
            None => self.cells.remove(&unit).map(|(_, c)| c),
        }
    }

    /// Removes the cell of `unit`.
    pub fn evict_unit(&self, unit: ExecutionUnitId) -> Option<Arc<InstrumentationContext>> {
        self.cells.remove(&unit).map(|(_, c)| c)
    }

    /// Makes a context captured elsewhere active on the calling unit.
    ///
    /// Contexts created while the guard is alive become its children. The
    /// previous occupant is restored when the guard drops.
    #[must_use]
    pub fn attach(self: &Arc<Self>, context: Arc<InstrumentationContext>) -> AttachGuard {
        let unit = ExecutionUnitId::current();
        let attached = context.id();
        let previous = self.set_current_on(unit, context);
        AttachGuard {
            registry: Arc::clone(self),
            unit,
            attached,
            previous,
        }
    }

    /// Returns the number of units with an active context.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns true if no unit has an active context.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl UnitTerminationListener for ActiveContextRegistry {
    fn unit_terminated(&self, unit: ExecutionUnitId) {
        if let Some(context) = self.evict_unit(unit) {
            warn!(%unit, context_id = %context.id(), "Evicted active context of a terminated unit");
        }
    }
}

impl fmt::Debug for ActiveContextRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveContextRegistry")
            .field("units", &self.cells.len())
            .finish()
    }
}

/// Keeps an attached context current until dropped.
#[must_use = "the context is detached when the guard is dropped"]
pub struct AttachGuard {
    registry: Arc<ActiveContextRegistry>,
    unit: ExecutionUnitId,
    attached: super::ContextId,
    previous: Option<Arc<InstrumentationContext>>,
}

impl AttachGuard {
    /// The unit the context was attached on.
    #[must_use]
    pub fn unit(&self) -> ExecutionUnitId {
        self.unit
    }
}

impl Drop for AttachGuard {
    fn drop(&mut self) {
        let replaced = self.registry.restore_on(self.unit, self.previous.take());
        if !replaced.as_ref().is_some_and(|c| c.id() == self.attached) {
            warn!(unit = %self.unit, context_id = %self.attached, "Detached a context that was not current");
        }
    }
}

impl fmt::Debug for AttachGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachGuard")
            .field("unit", &self.unit)
            .field("attached", &self.attached)
            .finish_non_exhaustive()
    }
}
