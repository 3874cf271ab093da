//! Configuration-derived propagation table.

use super::PropagationPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Propagation properties of a single data key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataProperties {
    /// Inherited by children within the process.
    #[serde(default)]
    pub down: bool,
    /// Merged into synchronous parents within the process.
    #[serde(default)]
    pub up: bool,
    /// Mirrored into the tag sink.
    #[serde(default = "default_tag")]
    pub tag: bool,
    /// Written to outgoing request headers. Implies `down`.
    #[serde(default)]
    pub down_global: bool,
    /// Written to outgoing response headers. Implies `up`.
    #[serde(default)]
    pub up_global: bool,
}

fn default_tag() -> bool {
    true
}

impl Default for DataProperties {
    fn default() -> Self {
        Self {
            down: false,
            up: false,
            tag: default_tag(),
            down_global: false,
            up_global: false,
        }
    }
}

impl DataProperties {
    /// Properties of a key that never leaves its context.
    #[must_use]
    pub fn local() -> Self {
        Self {
            tag: false,
            ..Self::default()
        }
    }

    /// Sets down propagation.
    #[must_use]
    pub fn with_down(mut self, down: bool) -> Self {
        self.down = down;
        self
    }

    /// Sets up propagation.
    #[must_use]
    pub fn with_up(mut self, up: bool) -> Self {
        self.up = up;
        self
    }

    /// Sets whether the key is a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: bool) -> Self {
        self.tag = tag;
        self
    }

    /// Sets global down propagation.
    #[must_use]
    pub fn with_down_global(mut self, down_global: bool) -> Self {
        self.down_global = down_global;
        self
    }

    /// Sets global up propagation.
    #[must_use]
    pub fn with_up_global(mut self, up_global: bool) -> Self {
        self.up_global = up_global;
        self
    }

    fn normalized(mut self) -> Self {
        self.down |= self.down_global;
        self.up |= self.up_global;
        self
    }
}

/// Serializable propagation configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropagationConfig {
    /// Properties applied to keys without an explicit entry.
    #[serde(default)]
    pub defaults: DataProperties,
    /// Per-key properties.
    #[serde(default)]
    pub keys: HashMap<String, DataProperties>,
}

impl PropagationConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the properties for a key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>, properties: DataProperties) -> Self {
        self.keys.insert(key.into(), properties);
        self
    }

    /// Sets the default properties.
    #[must_use]
    pub fn with_defaults(mut self, defaults: DataProperties) -> Self {
        self.defaults = defaults;
        self
    }

    /// Builds the lookup table.
    #[must_use]
    pub fn build(&self) -> PropagationTable {
        PropagationTable {
            defaults: self.defaults.normalized(),
            keys: self
                .keys
                .iter()
                .map(|(k, v)| (k.clone(), v.normalized()))
                .collect(),
        }
    }
}

/// Lookup table implementing [`PropagationPolicy`].
#[derive(Debug, Clone, Default)]
pub struct PropagationTable {
    defaults: DataProperties,
    keys: HashMap<String, DataProperties>,
}

impl PropagationTable {
    /// Returns the effective properties of a key.
    #[must_use]
    pub fn properties(&self, key: &str) -> DataProperties {
        self.keys.get(key).copied().unwrap_or(self.defaults)
    }
}

impl PropagationPolicy for PropagationTable {
    fn is_propagated_down(&self, key: &str) -> bool {
        self.properties(key).down
    }

    fn is_propagated_up(&self, key: &str) -> bool {
        self.properties(key).up
    }

    fn is_tag(&self, key: &str) -> bool {
        self.properties(key).tag
    }

    fn is_propagated_down_globally(&self, key: &str) -> bool {
        self.properties(key).down_global
    }

    fn is_propagated_up_globally(&self, key: &str) -> bool {
        self.properties(key).up_global
    }
}
