use parking_lot::RwLock;
use std::collections::BTreeMap;

/// A keyed table owned by a single role.
///
/// Only point reads and upserts are exposed. Readers get a clone of the
/// value, so no lock is ever held across an `.await`.
#[derive(Debug)]
pub struct Registry<K, V> {
    entries: RwLock<BTreeMap<K, V>>,
}

impl<K: Ord, V: Clone> Registry<K, V> {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// The value stored under `key`.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.read().get(key).cloned()
    }

    /// Stores `value` under `key`, returning the value it replaced.
    pub fn upsert(&self, key: K, value: V) -> Option<V> {
        self.entries.write().insert(key, value)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<K: Ord, V: Clone> Default for Registry<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_keeps_the_last_write() {
        let registry = Registry::new();
        assert_eq!(registry.upsert("bob", 1), None);
        assert_eq!(registry.upsert("bob", 2), Some(1));
        assert_eq!(registry.get(&"bob"), Some(2));
        assert_eq!(registry.get(&"carol"), None);
        assert_eq!(registry.len(), 1);
    }
}
