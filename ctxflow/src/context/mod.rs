//! Context lifecycle and propagation within the process.
//!
//! This module provides:
//! - Instrumentation contexts with down and up propagation
//! - The per-execution-unit registry of active contexts
//! - Execution unit identity for threads and tokio tasks
//! - A weak-keyed store for re-attaching contexts on other units

mod instrumentation;
mod manager;
mod registry;
mod store;
mod unit;

pub use instrumentation::{ContextId, InstrumentationContext, LifecyclePhase};
pub use manager::ContextManager;
pub use registry::{ActiveContextRegistry, AttachGuard};
pub use store::WeakContextStore;
pub use unit::{register_termination_listener, ExecutionUnitId, UnitTerminationListener};
