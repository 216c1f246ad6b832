//! In-memory TTL cache backed by `DashMap` for concurrent access.

use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// A single cached value with the time it was stored and its lifetime.
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// Fresh while `now - stored_at <= ttl`.
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) <= self.ttl
    }
}

/// A fresh value read from the cache, together with how old it is.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit<V> {
    pub value: V,
    pub stored_at: Instant,
    pub age: Duration,
    pub ttl: Duration,
}

/// Entry counts at a point in time. `expired` entries are still physically
/// present but read as misses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub total: usize,
    pub active: usize,
    pub expired: usize,
}

/// Thread-safe in-memory cache with per-entry time-to-live.
///
/// Each entry carries its own TTL; `set_default` falls back to the TTL the
/// cache was built with. Expired entries are lazily evicted on the next `get`
/// for that key, or in bulk by [`MemoryCache::sweep`].
pub struct MemoryCache<V> {
    store: DashMap<String, CacheEntry<V>>,
    default_ttl: Duration,
}

impl<V: Clone> MemoryCache<V> {
    /// Creates a new cache whose `set_default` entries live for `default_ttl`.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            store: DashMap::new(),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Returns the cached value for `key`, or `None` if missing or expired.
    pub fn get(&self, key: &str) -> Option<V> {
        self.get_entry(key).map(|hit| hit.value)
    }

    /// Like [`MemoryCache::get`], but also reports the entry's age.
    pub fn get_entry(&self, key: &str) -> Option<CacheHit<V>> {
        let now = Instant::now();
        let entry = self.store.get(key)?;
        if !entry.is_fresh(now) {
            drop(entry);
            // Another writer may have replaced the entry since we looked.
            self.store.remove_if(key, |_, e| !e.is_fresh(now));
            return None;
        }
        Some(CacheHit {
            value: entry.value.clone(),
            stored_at: entry.stored_at,
            age: now.duration_since(entry.stored_at),
            ttl: entry.ttl,
        })
    }

    /// Inserts or overwrites a cache entry that expires `ttl` from now.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.store.insert(
            key.into(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Inserts or overwrites a cache entry using the cache's default TTL.
    pub fn set_default(&self, key: impl Into<String>, value: V) {
        self.set(key, value, self.default_ttl);
    }

    /// Removes one entry. Returns whether anything was removed.
    pub fn delete(&self, key: &str) -> bool {
        self.store.remove(key).is_some()
    }

    /// Removes all entries from the cache.
    pub fn clear(&self) {
        self.store.clear();
    }

    /// Counts entries without evicting anything.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let total = self.store.len();
        let active = self.store.iter().filter(|e| e.is_fresh(now)).count();
        CacheStats {
            total,
            active,
            expired: total - active,
        }
    }

    /// Evicts every expired entry, returning how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.store.len();
        self.store.retain(|_, e| e.is_fresh(now));
        let evicted = before.saturating_sub(self.store.len());
        if evicted > 0 {
            tracing::debug!(evicted, "swept expired cache entries");
        }
        evicted
    }
}

impl<V: Clone + Send + Sync + 'static> MemoryCache<V> {
    /// Runs [`MemoryCache::sweep`] every `interval` on the current tokio runtime.
    ///
    /// The task exits on its own once the last `Arc` to the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match cache.upgrade() {
                    Some(cache) => {
                        cache.sweep();
                    }
                    None => break,
                }
            }
        })
    }
}
