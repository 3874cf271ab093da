//! Process-wide attributes seeded into every root context.

use crate::core::DataValue;
use std::collections::HashMap;

/// Supplies the initial data of root contexts.
pub trait CommonTagsProvider: Send + Sync {
    /// Returns the data every root context starts with.
    fn initial_root_data(&self) -> HashMap<String, DataValue>;
}

/// A provider without any attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyCommonTags;

impl CommonTagsProvider for EmptyCommonTags {
    fn initial_root_data(&self) -> HashMap<String, DataValue> {
        HashMap::new()
    }
}

/// A provider with a fixed set of attributes, e.g. service and host name.
#[derive(Debug, Clone, Default)]
pub struct StaticCommonTags {
    tags: HashMap<String, DataValue>,
}

impl StaticCommonTags {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<DataValue>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

impl<K: Into<String>, V: Into<DataValue>> FromIterator<(K, V)> for StaticCommonTags {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            tags: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl CommonTagsProvider for StaticCommonTags {
    fn initial_root_data(&self) -> HashMap<String, DataValue> {
        self.tags.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_tags() {
        let provider = StaticCommonTags::new()
            .with_tag("service", "checkout")
            .with_tag("replica", 3_i32);
        let data = provider.initial_root_data();
        assert_eq!(data.get("service"), Some(&DataValue::from("checkout")));
        assert_eq!(data.get("replica"), Some(&DataValue::Int(3)));
    }

    #[test]
    fn test_empty_provider() {
        assert!(EmptyCommonTags.initial_root_data().is_empty());
    }
}
