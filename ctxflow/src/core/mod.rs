//! Core data types shared by contexts, tag sinks and the header codec.
//!
//! This module contains:
//! - Typed context values and their wire type codes
//! - Overwrite records with an explicit clear marker
//! - Immutable, shareable data snapshots

mod data;
mod value;

pub use data::{DataMap, Overwrite};
pub use value::{DataValue, TypeCode};
