//! Per-key propagation policy.
//!
//! A policy answers, for every data key, whether the key flows down to new
//! children, up into a synchronous parent on close, into the tag sink, and
//! across process boundaries through the `Correlation-Context` header.

mod settings;

pub use settings::{DataProperties, PropagationConfig, PropagationTable};

/// Decides how each data key propagates.
pub trait PropagationPolicy: Send + Sync {
    /// Whether children created after activation inherit the key.
    fn is_propagated_down(&self, key: &str) -> bool;

    /// Whether the key merges into the parent when a synchronous child closes.
    fn is_propagated_up(&self, key: &str) -> bool;

    /// Whether the key is mirrored into the tag sink.
    fn is_tag(&self, key: &str) -> bool;

    /// Whether the key is written to outgoing request headers.
    fn is_propagated_down_globally(&self, _key: &str) -> bool {
        false
    }

    /// Whether the key is written to outgoing response headers.
    fn is_propagated_up_globally(&self, _key: &str) -> bool {
        false
    }
}

impl std::fmt::Debug for dyn PropagationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn PropagationPolicy")
    }
}
