//! HTTP header helpers for process ingress and egress.

use super::codec::{decode_correlation_context, encode_correlation_context};
use crate::context::InstrumentationContext;
use crate::core::DataValue;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Name of the header carrying context data.
pub const CORRELATION_CONTEXT_HEADER: &str = "Correlation-Context";

/// Returns the names of all headers read or written by this module.
#[must_use]
pub fn propagation_header_names() -> &'static [&'static str] {
    &[CORRELATION_CONTEXT_HEADER]
}

/// Encodes entries into a header map.
///
/// The map is empty when no entry can be encoded.
pub fn encode_header<'a, I, K>(entries: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (K, &'a DataValue)>,
    K: AsRef<str>,
{
    encode_correlation_context(entries)
        .map(|value| HashMap::from([(CORRELATION_CONTEXT_HEADER.to_string(), value)]))
        .unwrap_or_default()
}

/// Decodes the `Correlation-Context` header into `target`.
///
/// Header names match case-insensitively. Returns the number of entries
/// written.
pub fn decode_header(headers: &HashMap<String, String>, target: &InstrumentationContext) -> usize {
    decode_filtered(headers, target, |_| true)
}

/// Returns the headers to attach to an outgoing request.
///
/// Contains the visible data of keys propagated down globally.
#[must_use]
pub fn down_propagation_headers(context: &InstrumentationContext) -> HashMap<String, String> {
    let policy = context.policy();
    encode_selected(context, |key| policy.is_propagated_down_globally(key))
}

/// Returns the headers to attach to an outgoing response.
///
/// Contains the visible data of keys propagated up globally.
#[must_use]
pub fn up_propagation_headers(context: &InstrumentationContext) -> HashMap<String, String> {
    let policy = context.policy();
    encode_selected(context, |key| policy.is_propagated_up_globally(key))
}

/// Reads an incoming request's headers into `target`.
///
/// Only keys propagated down globally are accepted.
pub fn read_down_propagation_headers(
    headers: &HashMap<String, String>,
    target: &InstrumentationContext,
) -> usize {
    let policy = target.policy();
    decode_filtered(headers, target, |key| policy.is_propagated_down_globally(key))
}

/// Reads a received response's headers into `target`.
///
/// Only keys propagated up globally are accepted.
pub fn read_up_propagation_headers(
    headers: &HashMap<String, String>,
    target: &InstrumentationContext,
) -> usize {
    let policy = target.policy();
    decode_filtered(headers, target, |key| policy.is_propagated_up_globally(key))
}

fn encode_selected(
    context: &InstrumentationContext,
    include: impl Fn(&str) -> bool,
) -> HashMap<String, String> {
    let mut entries: Vec<(String, DataValue)> = context
        .get_data_entries()
        .into_iter()
        .filter(|(key, _)| include(key))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    encode_header(entries.iter().map(|(k, v)| (k, v)))
}

fn decode_filtered(
    headers: &HashMap<String, String>,
    target: &InstrumentationContext,
    accept: impl Fn(&str) -> bool,
) -> usize {
    let Some(value) = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(CORRELATION_CONTEXT_HEADER))
        .map(|(_, value)| value)
    else {
        return 0;
    };

    let mut written = 0;
    decode_correlation_context(value, |key, data| {
        if !accept(&key) {
            debug!(key = %key, "Ignoring correlation context entry not configured for propagation");
            return;
        }
        match target.set_data(key, data) {
            Ok(()) => written += 1,
            Err(err) => warn!(%err, "Cannot store correlation context entry"),
        }
    });
    written
}
