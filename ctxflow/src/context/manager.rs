//! Factory for instrumentation contexts.

use super::{ActiveContextRegistry, AttachGuard, InstrumentationContext};
use crate::common::{CommonTagsProvider, EmptyCommonTags, StaticCommonTags};
use crate::config::AgentConfig;
use crate::core::DataValue;
use crate::policy::PropagationPolicy;
use crate::tags::values::sanitize_tag_value;
use crate::tags::{NoOpTagSink, TagSink};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Creates contexts and owns the collaborators they share.
///
/// This is the entry point for instrumentation hooks: `create_context` at
/// method entry, then `activate` and `close` on the returned context.
#[derive(Clone)]
pub struct ContextManager {
    registry: Arc<ActiveContextRegistry>,
    tag_sink: Arc<dyn TagSink>,
    common_tags: Arc<dyn CommonTagsProvider>,
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new(Arc::new(NoOpTagSink))
    }
}

impl ContextManager {
    /// Creates a manager publishing into `tag_sink`.
    #[must_use]
    pub fn new(tag_sink: Arc<dyn TagSink>) -> Self {
        Self {
            registry: ActiveContextRegistry::new(),
            tag_sink,
            common_tags: Arc::new(EmptyCommonTags),
        }
    }

    /// Creates a manager from configuration.
    #[must_use]
    pub fn from_config(config: &AgentConfig, tag_sink: Arc<dyn TagSink>) -> Self {
        let common: StaticCommonTags = config
            .common_tags
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self::new(tag_sink).with_common_tags(Arc::new(common))
    }

    /// Sets the provider of root context data.
    #[must_use]
    pub fn with_common_tags(mut self, provider: Arc<dyn CommonTagsProvider>) -> Self {
        self.common_tags = provider;
        self
    }

    /// Uses an existing registry.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<ActiveContextRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ActiveContextRegistry> {
        &self.registry
    }

    /// Returns the tag sink.
    #[must_use]
    pub fn tag_sink(&self) -> &Arc<dyn TagSink> {
        &self.tag_sink
    }

    /// Returns the context active on the calling unit.
    #[must_use]
    pub fn current_context(&self) -> Option<Arc<InstrumentationContext>> {
        self.registry.current()
    }

    /// Creates a context as a child of the one active on the calling unit.
    ///
    /// Root contexts start with the common tags. With `inherit_from_sink`,
    /// tags current in the sink are copied into the new context: all of them
    /// for roots, otherwise only those whose value differs from what the
    /// parent already passes down. Sink values are compared against the
    /// sanitized rendering of the inherited value, so a value the sink had to
    /// truncate or replace never overwrites the original data.
    #[must_use]
    pub fn create_context(
        &self,
        policy: Arc<dyn PropagationPolicy>,
        inherit_from_sink: bool,
    ) -> Arc<InstrumentationContext> {
        let parent = self.registry.current();
        let is_root = parent.is_none();
        let context = Arc::new(InstrumentationContext::new(
            parent,
            policy,
            Arc::clone(&self.registry),
            Arc::clone(&self.tag_sink),
        ));

        if is_root {
            context.seed_data(self.common_tags.initial_root_data());
        }

        if inherit_from_sink {
            let inherited: Vec<(String, DataValue)> = self
                .tag_sink
                .current_entries()
                .into_iter()
                .filter(|(key, value)| {
                    is_root
                        || context
                            .get_data(key)
                            .map_or(true, |current| {
                                sanitize_tag_value(&current.to_tag_value()) != *value
                            })
                })
                .map(|(key, value)| (key, DataValue::String(value)))
                .collect();
            trace!(
                context_id = %context.id(),
                inherited = inherited.len(),
                "Inherited tags from sink"
            );
            context.seed_data(inherited);
        }

        context
    }

    /// Makes `context` current on the calling unit until the guard drops.
    #[must_use]
    pub fn attach(&self, context: Arc<InstrumentationContext>) -> AttachGuard {
        self.registry.attach(context)
    }
}

impl fmt::Debug for ContextManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextManager")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
