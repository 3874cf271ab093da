//! `Correlation-Context` value codec.
//!
//! ```text
//! header := entry ("," entry)*
//! entry  := key "=" value (";" prop)*
//! prop   := name "=" pvalue
//! ```
//!
//! Keys, values and properties are percent-encoded UTF-8. Non-string values
//! carry a `type=<id>` property naming their scalar type.

use crate::core::{DataValue, TypeCode};
use crate::errors::CodecError;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::debug;

/// Characters left unescaped, matching URL form encoding.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'.')
    .remove(b'-')
    .remove(b'*')
    .remove(b'_');

const TYPE_PROPERTY: &str = "type";

/// Percent-encodes a key or value.
#[must_use]
pub fn encode_component(text: &str) -> String {
    utf8_percent_encode(text, COMPONENT).to_string()
}

/// Decodes a percent-encoded key or value. `+` decodes to a space.
pub fn decode_component(text: &str) -> Result<String, CodecError> {
    let spaced = text.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| CodecError::InvalidEncoding {
            text: text.to_string(),
        })
}

/// Renders one entry.
pub fn encode_entry(key: &str, value: &DataValue) -> Result<String, CodecError> {
    if !value.is_header_eligible() {
        return Err(CodecError::Unsupported {
            key: key.to_string(),
        });
    }
    let mut entry = format!(
        "{}={}",
        encode_component(key),
        encode_component(&value.to_string())
    );
    if let Some(code) = value.type_code() {
        entry.push(';');
        entry.push_str(TYPE_PROPERTY);
        entry.push('=');
        entry.push(code.as_char());
    }
    Ok(entry)
}

/// Encodes entries into a header value.
///
/// Values that cannot travel in a header are dropped. Returns `None` when no
/// entry is left, so callers never send an empty header.
pub fn encode_correlation_context<'a, I, K>(entries: I) -> Option<String>
where
    I: IntoIterator<Item = (K, &'a DataValue)>,
    K: AsRef<str>,
{
    let encoded: Vec<String> = entries
        .into_iter()
        .filter_map(|(key, value)| match encode_entry(key.as_ref(), value) {
            Ok(entry) => Some(entry),
            Err(err) => {
                debug!(%err, "Dropping correlation context entry");
                None
            }
        })
        .collect();

    if encoded.is_empty() {
        None
    } else {
        Some(encoded.join(","))
    }
}

/// Parses one entry.
pub fn decode_entry(entry: &str) -> Result<(String, DataValue), CodecError> {
    let mut segments = entry.split(';');
    let assignment = segments.next().unwrap_or_default();
    let parts: Vec<&str> = assignment.split('=').collect();
    let [raw_key, raw_value] = parts.as_slice() else {
        return Err(CodecError::MissingAssignment {
            entry: entry.to_string(),
        });
    };

    let key = decode_component(raw_key.trim())?;
    if key.is_empty() {
        return Err(CodecError::EmptyKey {
            entry: entry.to_string(),
        });
    }
    let value = decode_component(raw_value.trim())?;

    let type_code = segments
        .filter_map(|prop| prop.split_once('='))
        .find(|(name, _)| name.trim() == TYPE_PROPERTY)
        .and_then(|(_, id)| TypeCode::from_wire(id.trim()));

    let typed = match type_code {
        Some(code) => code.parse(&value).ok_or_else(|| CodecError::InvalidValue {
            value: value.clone(),
            type_id: code.as_char(),
        })?,
        None => DataValue::String(value),
    };
    Ok((key, typed))
}

/// Decodes a header value, handing every valid entry to `sink`.
///
/// Malformed entries are skipped without affecting the others. Returns the
/// number of entries accepted.
pub fn decode_correlation_context(header: &str, mut sink: impl FnMut(String, DataValue)) -> usize {
    let mut accepted = 0;
    for entry in header.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        match decode_entry(entry) {
            Ok((key, value)) => {
                sink(key, value);
                accepted += 1;
            }
            Err(err) => debug!(%err, "Skipping correlation context entry"),
        }
    }
    accepted
}
