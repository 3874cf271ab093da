//! Testing utilities for context scenarios.
//!
//! This module provides:
//! - A pre-wired manager with a recording tag sink
//! - A builder for propagation policies used in tests
//! - Assertions for context data and phases

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_data, assert_no_data, assert_phase};
pub use fixtures::{TestEnvironment, TestEnvironmentBuilder};
pub use mocks::RecordingTagSink;
