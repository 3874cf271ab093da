//! Overwrite records and immutable data snapshots.

use super::DataValue;
use std::collections::HashMap;
use std::sync::Arc;

/// A write recorded by a context.
///
/// `Cleared` is an explicit "no value" that shadows inherited data, which is
/// different from a key never having been written.
#[derive(Debug, Clone, PartialEq)]
pub enum Overwrite {
    /// The key was set to a value.
    Set(DataValue),
    /// The key was explicitly cleared.
    Cleared,
}

impl Overwrite {
    /// Returns the value, or `None` for a cleared key.
    #[must_use]
    pub fn value(&self) -> Option<&DataValue> {
        match self {
            Self::Set(v) => Some(v),
            Self::Cleared => None,
        }
    }
}

impl From<Option<DataValue>> for Overwrite {
    fn from(value: Option<DataValue>) -> Self {
        value.map_or(Self::Cleared, Self::Set)
    }
}

/// An immutable snapshot of context data, shared by reference.
///
/// Snapshots are never mutated after construction. Changes produce a new
/// snapshot through [`DataMap::overlay`]; holders of the old one keep seeing
/// the old contents.
#[derive(Debug, Clone, Default)]
pub struct DataMap {
    entries: Arc<HashMap<String, DataValue>>,
}

impl DataMap {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a snapshot from owned entries.
    #[must_use]
    pub fn from_entries(entries: HashMap<String, DataValue>) -> Self {
        Self {
            entries: Arc::new(entries),
        }
    }

    /// Looks up a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&DataValue> {
        self.entries.get(key)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the snapshot holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &DataValue)> {
        self.entries.iter()
    }

    /// Returns true if both handles point at the same snapshot.
    #[must_use]
    pub fn same_snapshot(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }

    /// Builds a new snapshot with the overwrites selected by `include` applied.
    ///
    /// Cleared overwrites remove the key. `self` is left untouched.
    #[must_use]
    pub fn overlay<'a, I, F>(&self, overwrites: I, mut include: F) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a Overwrite)>,
        F: FnMut(&str) -> bool,
    {
        let mut entries = (*self.entries).clone();
        for (key, overwrite) in overwrites {
            if !include(key) {
                continue;
            }
            match overwrite {
                Overwrite::Set(value) => {
                    entries.insert(key.clone(), value.clone());
                }
                Overwrite::Cleared => {
                    entries.remove(key);
                }
            }
        }
        Self::from_entries(entries)
    }
}

impl FromIterator<(String, DataValue)> for DataMap {
    fn from_iter<T: IntoIterator<Item = (String, DataValue)>>(iter: T) -> Self {
        Self::from_entries(iter.into_iter().collect())
    }
}
