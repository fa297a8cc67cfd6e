use std::{collections::HashMap, hash::Hash, sync::Mutex};

/// Append-only map from identifiers to dense indices.
///
/// Indices are never reused or renumbered.
#[derive(Debug)]
pub(crate) struct Indexer<K> {
    capacity: usize,
    inner: Mutex<IndexerInner<K>>,
}

#[derive(Debug)]
struct IndexerInner<K> {
    lookup: HashMap<K, u32>,
    keys: Vec<K>,
}

impl<K: Clone + Eq + Hash> Indexer<K> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(IndexerInner {
                lookup: HashMap::new(),
                keys: Vec::new(),
            }),
        }
    }

    /// Returns the index for `key`, assigning the next one if it is new.
    ///
    /// Returns `None` if a new index would exceed the capacity.
    pub(crate) fn to_index(&self, key: &K) -> Option<(u32, bool)> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(&index) = inner.lookup.get(key) {
            return Some((index, false));
        }
        if inner.keys.len() >= self.capacity {
            return None;
        }
        let index = inner.keys.len() as u32;
        inner.keys.push(key.clone());
        inner.lookup.insert(key.clone(), index);
        Some((index, true))
    }

    pub(crate) fn get(&self, key: &K) -> Option<u32> {
        self.inner.lock().unwrap().lookup.get(key).copied()
    }

    pub(crate) fn key(&self, index: u32) -> Option<K> {
        self.inner.lock().unwrap().keys.get(index as usize).cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().unwrap().keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_sequential_and_stable() {
        let indexer = Indexer::new(8);
        assert_eq!(indexer.to_index(&"a"), Some((0, true)));
        assert_eq!(indexer.to_index(&"b"), Some((1, true)));
        assert_eq!(indexer.to_index(&"a"), Some((0, false)));
        assert_eq!(indexer.get(&"b"), Some(1));
        assert_eq!(indexer.key(1), Some("b"));
        assert_eq!(indexer.len(), 2);
    }

    #[test]
    fn full_indexer_only_returns_known_keys() {
        let indexer = Indexer::new(1);
        assert_eq!(indexer.to_index(&1), Some((0, true)));
        assert_eq!(indexer.to_index(&2), None);
        assert_eq!(indexer.to_index(&1), Some((0, false)));
    }
}
