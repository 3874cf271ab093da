//! # Ctxflow
//!
//! Context propagation for instrumentation agents.
//!
//! Every intercepted method call gets an [`InstrumentationContext`](context::InstrumentationContext)
//! holding key/value data. Contexts form a tree that follows the call
//! structure of the instrumented application:
//!
//! - **Down propagation**: children inherit data from the context that was
//!   active when they were created
//! - **Up propagation**: synchronous children merge data back into their
//!   parent when they close
//! - **Tag publishing**: the tag subset of a context's data is made current in
//!   an external tag sink while the context is active
//! - **Cross-process propagation**: data travels in the `Correlation-Context`
//!   HTTP header
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ctxflow::prelude::*;
//!
//! let policy: Arc<dyn PropagationPolicy> = Arc::new(
//!     PropagationConfig::new()
//!         .with_key("user", DataProperties::default().with_down(true))
//!         .build(),
//! );
//! let manager = ContextManager::new(ScopedTagSink::new());
//!
//! let context = manager.create_context(policy, true);
//! context.set_data("user", "alice")?;
//! context.activate(true)?;
//! // ... the intercepted method runs ...
//! context.close()?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod common;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod observability;
pub mod policy;
pub mod propagation;
pub mod tags;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use std::sync::Arc;

    pub use crate::common::{CommonTagsProvider, EmptyCommonTags, StaticCommonTags};
    pub use crate::config::AgentConfig;
    pub use crate::context::{
        ActiveContextRegistry, AttachGuard, ContextId, ContextManager, ExecutionUnitId,
        InstrumentationContext, LifecyclePhase, WeakContextStore,
    };
    pub use crate::core::{DataValue, TypeCode};
    pub use crate::errors::{CodecError, ConfigError, ContextError, CtxflowError};
    pub use crate::observability::{init_logging, LoggingConfig};
    pub use crate::policy::{DataProperties, PropagationConfig, PropagationPolicy, PropagationTable};
    pub use crate::propagation::{
        decode_header, down_propagation_headers, encode_header, up_propagation_headers,
        CORRELATION_CONTEXT_HEADER,
    };
    pub use crate::tags::{NoOpTagSink, ScopedTagSink, TagScope, TagSink, TagSnapshot};
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn library_compiles() {
        let manager = ContextManager::default();
        assert!(manager.current_context().is_none());
    }

    #[test]
    fn test_config_drives_manager() {
        let config = AgentConfig::new()
            .with_common_tag("service", "checkout")
            .with_propagation(
                PropagationConfig::new()
                    .with_key("service", DataProperties::default().with_down(true)),
            );
        let manager = ContextManager::from_config(&config, ScopedTagSink::new());
        let policy: Arc<dyn PropagationPolicy> = Arc::new(config.propagation.build());

        let root = manager.create_context(policy, false);

        assert_eq!(root.get_data("service"), Some(DataValue::from("checkout")));
    }
}
