//! Cross-process propagation through HTTP headers.
//!
//! Context data travels in a single `Correlation-Context` header. Encoding
//! and decoding are lossy by design: unsupported values are dropped and
//! malformed entries are skipped, so a bad entry only ever costs that entry.

mod codec;
#[cfg(test)]
mod codec_tests;
mod headers;

pub use codec::{
    decode_component, decode_correlation_context, decode_entry, encode_component,
    encode_correlation_context, encode_entry,
};
pub use headers::{
    decode_header, down_propagation_headers, encode_header, propagation_header_names,
    read_down_propagation_headers, read_up_propagation_headers, up_propagation_headers,
    CORRELATION_CONTEXT_HEADER,
};
