//! Query Cache
//!
//! The cache collaborator the realtime bridge invalidates, plus an in-memory
//! implementation that collapses repeated invalidations into a single refetch.

use std::{
    fmt,
    sync::{Mutex, MutexGuard, PoisonError},
};

use mockall::automock;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use smallvec::SmallVec;

/// Composite key identifying a cached query, e.g. `["menu_items", "hotel-1"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(SmallVec<[String; 3]>);

impl CacheKey {
    /// Build a key from its parts.
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// The parts making up the key.
    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(":"))
    }
}

/// Result of reading a cached query.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheRead {
    /// The cached value is fresh.
    Ready(Value),

    /// Nothing usable is cached yet; a fetch is outstanding.
    Pending,
}

/// Cache of query results shared by every live query.
#[automock]
pub trait QueryCache: Send + Sync {
    /// Read the cached value for `key`.
    fn read(&self, key: &CacheKey) -> CacheRead;

    /// Mark `key` stale so its next read refetches.
    fn invalidate(&self, key: &CacheKey);
}

#[derive(Debug, Default)]
struct MemoryCacheState {
    entries: FxHashMap<CacheKey, Value>,
    stale: FxHashSet<CacheKey>,
    invalidations: u64,
}

/// In-memory [`QueryCache`].
///
/// Invalidated keys read as [`CacheRead::Pending`] and are queued for refetch. A key
/// invalidated many times before the host calls [`MemoryCache::take_stale`] is only
/// returned once.
#[derive(Debug, Default)]
pub struct MemoryCache {
    state: Mutex<MemoryCacheState>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a freshly fetched value, clearing any staleness for the key.
    pub fn store(&self, key: CacheKey, value: Value) {
        let mut state = self.lock();

        state.stale.remove(&key);
        state.entries.insert(key, value);
    }

    /// Drain the keys that need one refetch each.
    pub fn take_stale(&self) -> Vec<CacheKey> {
        self.lock().stale.drain().collect()
    }

    /// Whether `key` is waiting for a refetch.
    pub fn is_stale(&self, key: &CacheKey) -> bool {
        self.lock().stale.contains(key)
    }

    /// Total number of invalidation requests received.
    pub fn invalidation_count(&self) -> u64 {
        self.lock().invalidations
    }

    fn lock(&self) -> MutexGuard<'_, MemoryCacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl QueryCache for MemoryCache {
    fn read(&self, key: &CacheKey) -> CacheRead {
        let state = self.lock();

        if state.stale.contains(key) {
            return CacheRead::Pending;
        }

        state
            .entries
            .get(key)
            .map_or(CacheRead::Pending, |value| CacheRead::Ready(value.clone()))
    }

    fn invalidate(&self, key: &CacheKey) {
        let mut state = self.lock();

        state.invalidations += 1;
        state.stale.insert(key.clone());
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn menu_key() -> CacheKey {
        CacheKey::new(["menu_items", "hotel-1"])
    }

    #[test]
    fn unknown_key_is_pending() {
        let cache = MemoryCache::new();

        assert_eq!(cache.read(&menu_key()), CacheRead::Pending);
    }

    #[test]
    fn stored_value_is_ready() {
        let cache = MemoryCache::new();

        cache.store(menu_key(), json!([{ "id": "m1" }]));

        assert_eq!(
            cache.read(&menu_key()),
            CacheRead::Ready(json!([{ "id": "m1" }]))
        );
    }

    #[test]
    fn repeated_invalidations_collapse_into_one_refetch() {
        let cache = MemoryCache::new();
        cache.store(menu_key(), json!([]));

        cache.invalidate(&menu_key());
        cache.invalidate(&menu_key());
        cache.invalidate(&menu_key());

        assert_eq!(cache.invalidation_count(), 3);
        assert_eq!(cache.read(&menu_key()), CacheRead::Pending);
        assert_eq!(cache.take_stale(), vec![menu_key()]);
        assert!(cache.take_stale().is_empty());
    }

    #[test]
    fn storing_clears_staleness() {
        let cache = MemoryCache::new();

        cache.invalidate(&menu_key());
        cache.store(menu_key(), json!({ "fresh": true }));

        assert!(!cache.is_stale(&menu_key()));
        assert_eq!(
            cache.read(&menu_key()),
            CacheRead::Ready(json!({ "fresh": true }))
        );
    }

    #[test]
    fn key_displays_its_parts() {
        assert_eq!(menu_key().to_string(), "menu_items:hotel-1");
        assert_eq!(menu_key().parts().len(), 2);
    }
}
