//! Instance-owned caches with an explicit freshness window.

use std::hash::Hash;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

/// A cached payload and when it was captured.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub captured_at: Instant,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            captured_at: Instant::now(),
        }
    }

    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.captured_at.elapsed() < ttl
    }
}

/// Keyed cache whose entries expire after `ttl`.
///
/// Stale entries are dropped on read.
#[derive(Debug)]
pub struct TtlCache<K, V>
where
    K: Eq + Hash,
{
    ttl: Duration,
    entries: DashMap<K, CacheEntry<V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh value for `key`, if any.
    pub fn get(&self, key: &K) -> Option<V> {
        let hit = self.entries.get(key).map(|e| (e.is_fresh(self.ttl), e.value.clone()));
        match hit {
            Some((true, value)) => Some(value),
            Some((false, _)) => {
                self.entries.remove_if(key, |_, e| !e.is_fresh(self.ttl));
                None
            }
            None => None,
        }
    }

    /// Store `value`, dropping every expired entry.
    pub fn insert(&self, key: K, value: V) {
        self.purge_expired();
        self.entries.insert(key, CacheEntry::new(value));
    }

    pub fn purge_expired(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, e| e.is_fresh(ttl));
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
