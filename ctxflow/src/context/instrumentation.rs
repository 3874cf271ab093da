//! The instrumentation context and its lifecycle.
//!
//! A context moves through three observable phases:
//!
//! ```text
//! Entry --activate()--> Active --close()--> Closed
//!   \______________________close()________^
//! ```
//!
//! The exit phase of an intercepted method is the tail of `Active`: it has no
//! transition of its own.
//!
//! Data visible to a context is its own overwrites laid over `post_entry_data`,
//! an immutable snapshot shared with children. Every change to what children
//! inherit produces a new snapshot, so a child never sees a snapshot change
//! underneath it.

use super::{ActiveContextRegistry, ExecutionUnitId};
use crate::core::{DataMap, DataValue, Overwrite};
use crate::errors::ContextError;
use crate::policy::PropagationPolicy;
use crate::tags::{TagScope, TagSink, TagSnapshot};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a context, used in logs and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wraps a raw id.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle phase of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    /// Created, data may be written before activation.
    Entry,
    /// Published as the current context; includes the exit phase.
    Active,
    /// Closed; no further writes are accepted.
    Closed,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Entry => "entry",
            Self::Active => "active",
            Self::Closed => "closed",
        })
    }
}

struct Activation {
    unit: ExecutionUnitId,
    previous: Option<Arc<InstrumentationContext>>,
}

struct ContextState {
    phase: LifecyclePhase,
    parent: Option<Arc<InstrumentationContext>>,
    post_entry_data: DataMap,
    overwrites: HashMap<String, Overwrite>,
    /// `None` after an up-propagation touched a down-propagating key.
    cached_down_snapshot: Option<DataMap>,
    tag_snapshot_stale: bool,
    published_tags: Option<Arc<TagSnapshot>>,
    opened_tag_scope: Option<TagScope>,
    activation: Option<Activation>,
}

impl ContextState {
    fn lookup(&self, key: &str) -> Option<DataValue> {
        match self.overwrites.get(key) {
            Some(overwrite) => overwrite.value().cloned(),
            None => self.post_entry_data.get(key).cloned(),
        }
    }

    fn full_data(&self) -> DataMap {
        if self.overwrites.is_empty() {
            self.post_entry_data.clone()
        } else {
            self.post_entry_data.overlay(&self.overwrites, |_| true)
        }
    }
}

/// A node in the tree of instrumentation contexts.
///
/// Created through [`ContextManager::create_context`](super::ContextManager::create_context),
/// always as a child of the context currently active on the calling
/// execution unit.
pub struct InstrumentationContext {
    id: ContextId,
    opening_unit: ExecutionUnitId,
    /// Fixed at creation; a context that starts asynchronous stays so.
    created_asynchronous: bool,
    policy: Arc<dyn PropagationPolicy>,
    registry: Arc<ActiveContextRegistry>,
    tag_sink: Arc<dyn TagSink>,
    state: Mutex<ContextState>,
}

impl InstrumentationContext {
    /// Creates a context in the entry phase.
    ///
    /// Reads the parent's phase and data under the parent's lock, so the
    /// synchronous/asynchronous decision and the inherited snapshot agree.
    pub(super) fn new(
        parent: Option<Arc<Self>>,
        policy: Arc<dyn PropagationPolicy>,
        registry: Arc<ActiveContextRegistry>,
        tag_sink: Arc<dyn TagSink>,
    ) -> Self {
        let opening_unit = ExecutionUnitId::current();
        let (created_asynchronous, post_entry_data) = match &parent {
            None => (true, DataMap::new()),
            Some(parent) => parent.inherit_into(opening_unit),
        };
        let id = ContextId::next();
        trace!(
            context_id = %id,
            parent_id = ?parent.as_ref().map(|p| p.id),
            unit = %opening_unit,
            asynchronous = created_asynchronous,
            "Context created"
        );

        Self {
            id,
            opening_unit,
            created_asynchronous,
            policy,
            registry,
            tag_sink,
            state: Mutex::new(ContextState {
                phase: LifecyclePhase::Entry,
                parent,
                post_entry_data,
                overwrites: HashMap::new(),
                cached_down_snapshot: None,
                tag_snapshot_stale: false,
                published_tags: None,
                opened_tag_scope: None,
                activation: None,
            }),
        }
    }

    /// Returns the context id.
    #[must_use]
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Returns the unit the context was created on.
    #[must_use]
    pub fn opening_unit(&self) -> ExecutionUnitId {
        self.opening_unit
    }

    /// Returns the current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> LifecyclePhase {
        self.state.lock().phase
    }

    /// Returns the propagation policy of this context.
    #[must_use]
    pub fn policy(&self) -> &Arc<dyn PropagationPolicy> {
        &self.policy
    }

    /// Returns the parent, or `None` for roots and closed contexts.
    #[must_use]
    pub fn parent(&self) -> Option<Arc<Self>> {
        self.state.lock().parent.clone()
    }

    /// Whether this context is asynchronous to its parent.
    ///
    /// True for roots, for contexts opened on another unit than the parent or
    /// while the parent was not active, and once the parent is no longer
    /// active. Asynchronous contexts never up-propagate.
    #[must_use]
    pub fn is_asynchronous(&self) -> bool {
        let parent = self.state.lock().parent.clone();
        self.asynchronous_to(parent.as_deref())
    }

    fn asynchronous_to(&self, parent: Option<&Self>) -> bool {
        self.created_asynchronous
            || parent.map_or(true, |p| {
                p.opening_unit != self.opening_unit || p.phase() != LifecyclePhase::Active
            })
    }

    /// Whether the tags published at activation are outdated.
    ///
    /// Becomes true when a child up-propagates a tag that is also
    /// down-propagated; [`enter_local_tag_scope`](Self::enter_local_tag_scope)
    /// provides an up-to-date view in that case.
    #[must_use]
    pub fn is_tag_snapshot_stale(&self) -> bool {
        self.state.lock().tag_snapshot_stale
    }

    /// Sets a value.
    ///
    /// Accepted in the entry and active phases.
    pub fn set_data(&self, key: impl Into<String>, value: impl Into<DataValue>) -> Result<(), ContextError> {
        self.write(key.into(), Overwrite::Set(value.into()))
    }

    /// Clears a value, shadowing anything inherited for `key`.
    pub fn clear_data(&self, key: impl Into<String>) -> Result<(), ContextError> {
        self.write(key.into(), Overwrite::Cleared)
    }

    /// Records writes made while the context is being created.
    pub(super) fn seed_data(&self, entries: impl IntoIterator<Item = (String, DataValue)>) {
        let mut state = self.state.lock();
        for (key, value) in entries {
            state.overwrites.insert(key, Overwrite::Set(value));
        }
    }

    fn write(&self, key: String, overwrite: Overwrite) -> Result<(), ContextError> {
        let mut state = self.state.lock();
        if state.phase == LifecyclePhase::Closed {
            return Err(ContextError::Closed { id: self.id });
        }
        state.overwrites.insert(key, overwrite);
        Ok(())
    }

    /// Returns the value visible for `key`, if any.
    #[must_use]
    pub fn get_data(&self, key: &str) -> Option<DataValue> {
        self.state.lock().lookup(key)
    }

    /// Returns every visible entry.
    #[must_use]
    pub fn get_data_entries(&self) -> HashMap<String, DataValue> {
        self.state
            .lock()
            .full_data()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Makes this context the current one on the calling execution unit.
    ///
    /// Freezes the data inherited by children created from now on and, with
    /// `publish_to_sink`, makes the tag subset of that data current in the
    /// tag sink until [`close`](Self::close).
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::InvalidPhase`] if the context already left the
    /// entry phase. Nothing is changed in that case.
    pub fn activate(self: &Arc<Self>, publish_to_sink: bool) -> Result<(), ContextError> {
        let unit = ExecutionUnitId::current();
        let (tags_to_publish, reused_tags) = {
            let mut state = self.state.lock();
            if state.phase != LifecyclePhase::Entry {
                return Err(ContextError::invalid_phase(
                    self.id,
                    LifecyclePhase::Entry,
                    state.phase,
                ));
            }

            let policy = &self.policy;
            let any_down_overwritten = state
                .overwrites
                .keys()
                .any(|key| policy.is_propagated_down(key));
            if any_down_overwritten {
                state.post_entry_data = state
                    .post_entry_data
                    .overlay(&state.overwrites, |key| policy.is_propagated_down(key));
            }
            state.cached_down_snapshot = Some(state.post_entry_data.clone());
            state.phase = LifecyclePhase::Active;

            if publish_to_sink {
                let reused = if any_down_overwritten
                    || self.asynchronous_to(state.parent.as_deref())
                {
                    None
                } else {
                    state.parent.as_ref().and_then(|p| p.reusable_tags())
                };
                match reused {
                    Some(tags) => (None, Some(tags)),
                    None => (Some(self.tag_subset(&state.post_entry_data)), None),
                }
            } else {
                (None, None)
            }
        };

        let previous = self.registry.set_current_on(unit, Arc::clone(self));
        let opened_scope = tags_to_publish.map(|tags| self.tag_sink.enter(Arc::new(tags)));

        let mut state = self.state.lock();
        state.activation = Some(Activation { unit, previous });
        state.published_tags = opened_scope
            .as_ref()
            .map(|scope| Arc::clone(scope.snapshot()))
            .or(reused_tags);
        state.opened_tag_scope = opened_scope;
        debug!(
            context_id = %self.id,
            %unit,
            published = state.published_tags.is_some(),
            opened_scope = state.opened_tag_scope.is_some(),
            "Context activated"
        );
        Ok(())
    }

    /// Closes the context.
    ///
    /// Releases the tag scope opened at activation, restores the previously
    /// active context on the unit it was activated on, merges up-propagating
    /// writes into a synchronous parent and drops the parent reference.
    /// Contexts that were never activated still up-propagate.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Closed`] if the context was already closed.
    pub fn close(&self) -> Result<(), ContextError> {
        let (scope, activation, parent, overwrites) = {
            let mut state = self.state.lock();
            if state.phase == LifecyclePhase::Closed {
                return Err(ContextError::Closed { id: self.id });
            }
            state.phase = LifecyclePhase::Closed;

            let parent = state.parent.take();
            let merge_into = parent.filter(|p| !self.asynchronous_to(Some(p.as_ref())));
            let overwrites = merge_into.as_ref().map(|_| state.overwrites.clone());
            state.published_tags = None;
            (
                state.opened_tag_scope.take(),
                state.activation.take(),
                merge_into,
                overwrites,
            )
        };

        drop(scope);

        if let Some(Activation { unit, previous }) = activation {
            let replaced = self.registry.restore_on(unit, previous);
            if !replaced.as_ref().is_some_and(|c| c.id == self.id) {
                warn!(
                    context_id = %self.id,
                    %unit,
                    "Context closed while not current; closing order is not LIFO"
                );
            }
        }

        if let (Some(parent), Some(overwrites)) = (parent, overwrites) {
            parent.merge_upwards(&overwrites);
        }

        trace!(context_id = %self.id, "Context closed");
        Ok(())
    }

    /// Builds and enters a tag scope from the current full data.
    ///
    /// Covers the tag keys of all overwrites laid over the post-entry data.
    /// The scope is released when the returned guard drops.
    #[must_use]
    pub fn enter_local_tag_scope(&self) -> TagScope {
        let tags = {
            let state = self.state.lock();
            self.tag_subset(&state.full_data())
        };
        self.tag_sink.enter(Arc::new(tags))
    }

    fn tag_subset(&self, data: &DataMap) -> TagSnapshot {
        data.iter()
            .filter(|(key, _)| self.policy.is_tag(key))
            .map(|(key, value)| (key.clone(), value.to_tag_value()))
            .collect()
    }

    /// Decides the relationship of a new child and hands it its data.
    ///
    /// Synchronous children get the down-propagation snapshot including
    /// up-propagated changes; asynchronous children share the frozen
    /// post-entry snapshot.
    fn inherit_into(&self, child_unit: ExecutionUnitId) -> (bool, DataMap) {
        let mut state = self.state.lock();
        let asynchronous =
            self.opening_unit != child_unit || state.phase != LifecyclePhase::Active;
        if asynchronous {
            return (true, state.post_entry_data.clone());
        }
        if let Some(cached) = &state.cached_down_snapshot {
            return (false, cached.clone());
        }
        let policy = &self.policy;
        let snapshot = state
            .post_entry_data
            .overlay(&state.overwrites, |key| policy.is_propagated_down(key));
        state.cached_down_snapshot = Some(snapshot.clone());
        (false, snapshot)
    }

    fn reusable_tags(&self) -> Option<Arc<TagSnapshot>> {
        let state = self.state.lock();
        if state.phase == LifecyclePhase::Active && !state.tag_snapshot_stale {
            state.published_tags.clone()
        } else {
            None
        }
    }

    fn merge_upwards(&self, child_overwrites: &HashMap<String, Overwrite>) {
        let mut state = self.state.lock();
        if state.phase == LifecyclePhase::Closed {
            debug!(context_id = %self.id, "Dropping up-propagation into a closed context");
            return;
        }
        for (key, value) in child_overwrites {
            if !self.policy.is_propagated_up(key) {
                continue;
            }
            state.overwrites.insert(key.clone(), value.clone());
            if self.policy.is_propagated_down(key) {
                state.cached_down_snapshot = None;
                if self.policy.is_tag(key) {
                    state.tag_snapshot_stale = true;
                }
            }
        }
    }
}

impl fmt::Debug for InstrumentationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("InstrumentationContext")
            .field("id", &self.id)
            .field("opening_unit", &self.opening_unit)
            .field("phase", &state.phase)
            .field("parent", &state.parent.as_ref().map(|p| p.id))
            .field("overwrites", &state.overwrites.len())
            .finish_non_exhaustive()
    }
}
