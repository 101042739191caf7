//! A bounded, soft-evicting cache for memoised descriptor rewrites.
//!
//! Correctness never depends on a hit: a miss just recomputes. Eviction
//! is FIFO over insertion order rather than true LRU, which is enough
//! to bound memory without adding per-access bookkeeping under the lock.

use indexmap::IndexMap;
use parking_lot::Mutex;

pub struct BoundedCache<V> {
    capacity: usize,
    entries: Mutex<IndexMap<String, V>>,
}
impl<V: Clone> BoundedCache<V> {
    pub fn new(capacity: usize) -> Self {
        BoundedCache { capacity, entries: Mutex::new(IndexMap::new()) }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.entries.lock().get(key).cloned()
    }

    pub fn insert(&self, key: String, value: V) {
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            entries.shift_remove_index(0);
        }
        entries.insert(key, value);
    }

    pub fn get_or_compute<F>(&self, key: &str, compute: F) -> V
        where F: FnOnce() -> V {
        if let Some(cached) = self.get(key) {
            return cached;
        }
        let value = compute();
        self.insert(key.to_string(), value.clone());
        value
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
