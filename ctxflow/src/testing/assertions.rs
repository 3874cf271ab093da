//! Test assertions for context data.

use crate::context::{InstrumentationContext, LifecyclePhase};
use crate::core::DataValue;

/// Asserts that `key` resolves to `expected` in the context.
pub fn assert_data(context: &InstrumentationContext, key: &str, expected: impl Into<DataValue>) {
    let expected = expected.into();
    let actual = context.get_data(key);
    assert_eq!(
        actual.as_ref(),
        Some(&expected),
        "Expected context {} to hold {key}={expected}, got {:?}",
        context.id(),
        actual
    );
}

/// Asserts that `key` has no value in the context.
pub fn assert_no_data(context: &InstrumentationContext, key: &str) {
    let actual = context.get_data(key);
    assert!(
        actual.is_none(),
        "Expected context {} to hold no value for {key}, got {:?}",
        context.id(),
        actual
    );
}

/// Asserts the lifecycle phase of the context.
pub fn assert_phase(context: &InstrumentationContext, expected: LifecyclePhase) {
    assert_eq!(
        context.phase(),
        expected,
        "Expected context {} to be {expected}",
        context.id()
    );
}
