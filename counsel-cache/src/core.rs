//! Generic LRU cache with per-entry TTL and hit-rate statistics.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

/// Snapshot of a cache's performance counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found a live entry.
    pub hits: u64,
    /// Lookups that found nothing, or an expired entry.
    pub misses: u64,
    /// Entries pushed out by the capacity bound.
    pub evictions: u64,
    /// Entries currently stored (including not-yet-collected expired ones).
    pub len: usize,
    /// Capacity bound.
    pub capacity: usize,
}

impl CacheStats {
    /// Hit rate in percent; zero when no lookups happened yet.
    pub fn hit_rate_percent(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64 * 100.0
        }
    }
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) > self.ttl
    }
}

struct Inner<K: Hash + Eq, V> {
    map: LruCache<K, Entry<V>>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// LRU cache with per-entry TTL behind a single mutex.
///
/// Lookups promote live entries to most-recently-used and treat expired
/// entries as misses (removing them on the way). Inserting over capacity
/// evicts the least recently used entry.
pub struct TtlCache<K: Hash + Eq, V> {
    inner: Mutex<Inner<K, V>>,
    default_ttl: Duration,
    capacity: usize,
}

impl<K: Hash + Eq, V: Clone> TtlCache<K, V> {
    /// Create a cache bounded to `capacity` entries with the given default
    /// TTL. A zero capacity is rounded up to one.
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                map: LruCache::new(cap),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            default_ttl,
            capacity: cap.get(),
        }
    }

    /// Look up a value, counting a hit or miss.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match inner.map.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                let value = entry.value.clone();
                inner.hits += 1;
                Some(value)
            }
            Some(_) => {
                inner.map.pop(key);
                inner.misses += 1;
                None
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Insert with the default TTL.
    pub fn put(&self, key: K, value: V) {
        self.put_with_ttl(key, value, self.default_ttl);
    }

    /// Insert with an explicit TTL.
    pub fn put_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let at_capacity = inner.map.len() == self.capacity;
        let entry = Entry {
            value,
            inserted_at: Instant::now(),
            ttl,
        };
        // push returns the displaced LRU entry when the map was full and
        // the key is new; replacing an existing key is not an eviction.
        if let Some((old_key, _)) = inner.map.push(key, entry) {
            if at_capacity && !inner.map.contains(&old_key) {
                inner.evictions += 1;
            }
        }
    }

    /// Get the cached value or compute, insert, and return it.
    pub fn get_or_insert_with(&self, key: K, compute: impl FnOnce() -> V) -> V
    where
        K: Clone,
    {
        if let Some(v) = self.get(&key) {
            return v;
        }
        let value = compute();
        self.put(key, value.clone());
        value
    }

    /// Remove a single entry.
    pub fn invalidate(&self, key: &K) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.map.pop(key);
    }

    /// Drop every entry, keeping the counters.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.map.clear();
    }

    /// Remove expired entries; returns how many were dropped.
    pub fn cleanup(&self) -> usize
    where
        K: Clone,
    {
        let now = Instant::now();
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut expired: Vec<K> = Vec::new();
        for (key, entry) in inner.map.iter() {
            if entry.is_expired(now) {
                expired.push(key.clone());
            }
        }
        for key in &expired {
            inner.map.pop(key);
        }
        expired.len()
    }

    /// Current statistics snapshot.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            len: inner.map.len(),
            capacity: self.capacity,
        }
    }
}
