//! Session-scoped memoization of fetches and fits

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Hash any hashable input into a cache key
pub fn fingerprint<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Values keyed by input fingerprint, shared behind `Arc`
///
/// Entries live until the cache is cleared or dropped. Failed computations
/// are never stored, so the next lookup retries.
#[derive(Debug)]
pub struct SessionCache<V> {
    entries: HashMap<u64, Arc<V>>,
    hits: usize,
    misses: usize,
}

impl<V> Default for SessionCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> SessionCache<V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn get(&self, key: u64) -> Option<Arc<V>> {
        self.entries.get(&key).cloned()
    }

    pub fn insert(&mut self, key: u64, value: V) -> Arc<V> {
        let value = Arc::new(value);
        self.entries.insert(key, Arc::clone(&value));
        value
    }

    /// Return the cached value for `key`, computing and storing it on a miss
    pub fn get_or_try_insert_with<E, F>(&mut self, key: u64, compute: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.entries.get(&key) {
            self.hits += 1;
            return Ok(Arc::clone(value));
        }

        self.misses += 1;
        let value = compute()?;
        Ok(self.insert(key, value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Lookups served from the cache
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Lookups that had to compute
    pub fn misses(&self) -> usize {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn second_lookup_is_a_hit() {
        let mut cache = SessionCache::new();
        let mut calls = 0;

        for _ in 0..3 {
            let value: Result<_, ()> = cache.get_or_try_insert_with(fingerprint("site"), || {
                calls += 1;
                Ok(42)
            });
            assert_eq!(*value.unwrap(), 42);
        }

        assert_eq!(calls, 1);
        assert_eq!(cache.hits(), 2);
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failures_are_not_cached() {
        let mut cache: SessionCache<i32> = SessionCache::new();
        let key = fingerprint(&("imola", 7));

        let first: Result<_, &str> = cache.get_or_try_insert_with(key, || Err("offline"));
        assert!(first.is_err());
        assert!(cache.is_empty());

        let second: Result<_, &str> = cache.get_or_try_insert_with(key, || Ok(5));
        assert_eq!(*second.unwrap(), 5);
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn keys_distinguish_inputs() {
        assert_eq!(fingerprint(&("a", 1)), fingerprint(&("a", 1)));
        assert_ne!(fingerprint(&("a", 1)), fingerprint(&("a", 2)));

        let mut cache = SessionCache::new();
        cache.insert(1, "one");
        cache.clear();
        assert!(cache.get(1).is_none());
    }
}
