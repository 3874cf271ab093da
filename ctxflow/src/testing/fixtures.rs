//! Test fixtures for context scenarios.

use std::sync::Arc;

use super::RecordingTagSink;
use crate::common::StaticCommonTags;
use crate::context::{ContextManager, InstrumentationContext};
use crate::core::DataValue;
use crate::errors::ContextError;
use crate::policy::{DataProperties, PropagationConfig, PropagationPolicy, PropagationTable};

/// A manager wired to a recording sink, plus a policy builder.
#[derive(Debug)]
pub struct TestEnvironment {
    /// The manager under test.
    pub manager: ContextManager,
    /// The sink the manager publishes into.
    pub sink: Arc<RecordingTagSink>,
    /// The policy handed to every created context.
    pub policy: Arc<dyn PropagationPolicy>,
}

impl Default for TestEnvironment {
    fn default() -> Self {
        TestEnvironmentBuilder::new().build()
    }
}

impl TestEnvironment {
    /// Starts building an environment.
    #[must_use]
    pub fn builder() -> TestEnvironmentBuilder {
        TestEnvironmentBuilder::new()
    }

    /// Creates a context with the environment's policy.
    #[must_use]
    pub fn create(&self, inherit_from_sink: bool) -> Arc<InstrumentationContext> {
        self.manager
            .create_context(Arc::clone(&self.policy), inherit_from_sink)
    }

    /// Creates, fills and activates a context publishing to the sink.
    pub fn open(
        &self,
        data: &[(&str, DataValue)],
    ) -> Result<Arc<InstrumentationContext>, ContextError> {
        let context = self.create(false);
        for (key, value) in data {
            context.set_data(*key, value.clone())?;
        }
        context.activate(true)?;
        Ok(context)
    }
}

/// Builder for [`TestEnvironment`].
#[derive(Debug, Default)]
pub struct TestEnvironmentBuilder {
    config: PropagationConfig,
    common: Vec<(String, DataValue)>,
}

impl TestEnvironmentBuilder {
    /// Creates a builder with an empty policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a key that propagates down and up and is a tag.
    #[must_use]
    pub fn shared_key(self, key: &str) -> Self {
        self.key(key, DataProperties::default().with_down(true).with_up(true))
    }

    /// Declares a key that only propagates down.
    #[must_use]
    pub fn down_key(self, key: &str) -> Self {
        self.key(key, DataProperties::default().with_down(true))
    }

    /// Declares a key that never leaves its context.
    #[must_use]
    pub fn local_key(self, key: &str) -> Self {
        self.key(key, DataProperties::local())
    }

    /// Declares a key with explicit properties.
    #[must_use]
    pub fn key(mut self, key: &str, properties: DataProperties) -> Self {
        self.config = self.config.with_key(key, properties);
        self
    }

    /// Adds a common tag for root contexts.
    #[must_use]
    pub fn common_tag(mut self, key: &str, value: impl Into<DataValue>) -> Self {
        self.common.push((key.to_string(), value.into()));
        self
    }

    /// Builds the environment.
    #[must_use]
    pub fn build(self) -> TestEnvironment {
        let sink = Arc::new(RecordingTagSink::new());
        let common: StaticCommonTags = self.common.into_iter().collect();
        let manager = ContextManager::new(sink.clone()).with_common_tags(Arc::new(common));
        let table: PropagationTable = self.config.build();
        TestEnvironment {
            manager,
            sink,
            policy: Arc::new(table),
        }
    }
}
