//! Bounded Keyed Cache Module
//!
//! Fixed-capacity map combining HashMap storage with LRU tracking. Eviction is
//! purely recency based; values carry their own expiry and are never swept.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use tracing::debug;

use crate::cache::{CacheStats, LruTracker};
use crate::error::{CacheError, Result};

// == Bounded Keyed Cache ==
/// Fixed-capacity LRU map.
#[derive(Debug)]
pub struct BoundedKeyedCache<K, V> {
    /// Key-value storage
    entries: HashMap<K, V>,
    /// LRU access tracker
    lru: LruTracker<K>,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of entries allowed
    capacity: usize,
}

impl<K, V> BoundedKeyedCache<K, V>
where
    K: Eq + Hash + Clone,
{
    // == Constructor ==
    /// Creates an empty cache holding at most `capacity` entries.
    ///
    /// # Errors
    /// `CacheError::InvalidConfig` when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "cache capacity must be positive".to_string(),
            ));
        }

        Ok(Self {
            entries: HashMap::with_capacity(capacity),
            lru: LruTracker::with_capacity(capacity),
            stats: CacheStats::new(),
            capacity,
        })
    }

    // == Get ==
    /// Looks up a key, marking it most recently used on a hit.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.entries.get_key_value(key) {
            Some((stored, value)) => {
                self.lru.touch(stored);
                self.stats.record_hit();
                Some(value)
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// Looks up a key without affecting recency or statistics.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key)
    }

    // == Set ==
    /// Inserts or replaces the value for `key` and marks it most recently used.
    ///
    /// Inserting a new key into a full cache evicts the least recently used
    /// entry first; the evicted pair is returned.
    pub fn set(&mut self, key: K, value: V) -> Option<(K, V)> {
        let mut evicted = None;

        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            if let Some(oldest) = self.lru.evict_oldest() {
                if let Some(old_value) = self.entries.remove(&oldest) {
                    self.stats.record_eviction();
                    debug!(entries = self.entries.len(), "Evicted least recently used entry");
                    evicted = Some((oldest, old_value));
                }
            }
        }

        self.lru.touch(&key);
        self.entries.insert(key, value);
        self.stats.set_total_entries(self.entries.len());

        evicted
    }

    // == Remove ==
    /// Removes an entry, returning its value.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let (stored, value) = self.entries.remove_entry(key)?;
        self.lru.remove(&stored);
        self.stats.set_total_entries(self.entries.len());
        Some(value)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Counts an entry replaced by a richer representation of the same key.
    pub fn record_promotion(&mut self) {
        self.stats.record_promotion();
    }

    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    /// Keys from most to least recently used.
    pub fn keys_by_recency(&self) -> impl Iterator<Item = &K> {
        self.lru.iter()
    }
}
