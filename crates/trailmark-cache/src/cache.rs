//! The expiring cache implementation

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, trace};

/// One cached value with its expiry and bookkeeping metadata
struct CacheEntry<V> {
    value: V,
    /// Approximate cost, from the serialized size of the value
    cost: u64,
    created_at: Instant,
    expires_at: Instant,
    /// Monotonic recency stamp, bumped on every hit (for LRU eviction)
    last_access: AtomicU64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Point-in-time cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that returned a live value
    pub hits: u64,
    /// Lookups that found nothing (absent or expired)
    pub misses: u64,
    /// Entries removed by budget (LRU) eviction
    pub evictions: u64,
    /// Entries removed because their TTL elapsed
    pub expired_removed: u64,
}

/// Time-boxed key→value store with count and byte-cost budgets
///
/// Values must be `Serialize` (for cost approximation) and `Clone`
/// (lookups return an owned copy so no map lock outlives the call).
pub struct ExpiringCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    /// Global recency counter; each hit stamps the entry with the next tick
    tick: AtomicU64,
    /// Sum of entry costs currently held
    total_cost: AtomicU64,
    max_entries: usize,
    max_cost_bytes: u64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expired_removed: AtomicU64,
}

impl<V> ExpiringCache<V>
where
    V: Serialize + Clone + Send + Sync + 'static,
{
    /// Creates a cache bounded by `max_entries` live entries and
    /// `max_cost_bytes` of approximate serialized size
    pub fn new(max_entries: usize, max_cost_bytes: u64) -> Self {
        Self {
            entries: DashMap::new(),
            tick: AtomicU64::new(0),
            total_cost: AtomicU64::new(0),
            max_entries,
            max_cost_bytes,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expired_removed: AtomicU64::new(0),
        }
    }

    /// Inserts or replaces a value with the given time-to-live
    pub fn put(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let entry = self.make_entry(value, ttl);

        if let Some(old) = self.entries.insert(key, entry) {
            self.total_cost.fetch_sub(old.cost, Ordering::Relaxed);
        }
        self.enforce_budget();
    }

    /// Looks up a live value
    ///
    /// Expired entries are evicted lazily here and count as misses. A hit
    /// refreshes the entry's recency stamp.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();

        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                entry
                    .last_access
                    .store(self.next_tick(), Ordering::Relaxed);
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        // Present but expired: evict lazily. Re-check under the shard
        // lock; a concurrent put may have replaced the entry with a live
        // one since the read guard was dropped.
        if let Some((_, old)) = self.entries.remove_if(key, |_, entry| entry.is_expired(now)) {
            self.total_cost.fetch_sub(old.cost, Ordering::Relaxed);
            self.expired_removed.fetch_add(1, Ordering::Relaxed);
            trace!(key, "Evicted expired entry on lookup");
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Inserts only if no live entry exists for `key`
    ///
    /// Atomic check-and-set: a live, non-expired entry is never replaced.
    /// Returns true if the value was inserted.
    pub fn put_if_absent(&self, key: impl Into<String>, value: V, ttl: Duration) -> bool {
        let key = key.into();
        let now = Instant::now();

        let inserted = match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    let old_cost = occupied.get().cost;
                    self.total_cost.fetch_sub(old_cost, Ordering::Relaxed);
                    self.expired_removed.fetch_add(1, Ordering::Relaxed);
                    occupied.insert(self.make_entry(value, ttl));
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(self.make_entry(value, ttl));
                true
            }
        };

        if inserted {
            self.enforce_budget();
        }
        inserted
    }

    /// Removes every entry
    pub fn invalidate_all(&self) {
        let removed = self.entries.len();
        self.entries.clear();
        self.total_cost.store(0, Ordering::Relaxed);
        debug!(removed, "Cache invalidated");
    }

    /// Removes every entry whose key contains `pattern`
    pub fn invalidate_matching(&self, pattern: &str) -> usize {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.key().contains(pattern))
            .map(|e| e.key().clone())
            .collect();

        let mut removed = 0;
        for key in keys {
            if let Some((_, old)) = self.entries.remove(&key) {
                self.total_cost.fetch_sub(old.cost, Ordering::Relaxed);
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(pattern, removed, "Invalidated matching entries");
        }
        removed
    }

    /// Removes every expired entry, regardless of access pattern
    ///
    /// Returns the number of entries removed. The background sweeper calls
    /// this on a fixed period so memory stays bounded even for keys that
    /// are never re-read.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.value().is_expired(now))
            .map(|e| e.key().clone())
            .collect();

        let mut removed = 0;
        for key in keys {
            // Re-check under the shard lock; a concurrent put may have
            // replaced the entry with a live one.
            if let Some((_, old)) = self.entries.remove_if(&key, |_, entry| entry.is_expired(now)) {
                self.total_cost.fetch_sub(old.cost, Ordering::Relaxed);
                removed += 1;
            }
        }
        if removed > 0 {
            self.expired_removed
                .fetch_add(removed as u64, Ordering::Relaxed);
            debug!(removed, "Swept expired entries");
        }
        removed
    }

    /// Spawns the periodic background sweep task
    ///
    /// Runs until the returned handle is aborted or the cache is dropped
    /// by all other holders.
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick of a tokio interval fires immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                cache.sweep_expired();
            }
        })
    }

    /// Number of entries currently held (live and not-yet-swept expired)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Approximate total serialized size of held values
    pub fn total_cost(&self) -> u64 {
        self.total_cost.load(Ordering::Relaxed)
    }

    /// Returns point-in-time counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expired_removed: self.expired_removed.load(Ordering::Relaxed),
        }
    }

    fn make_entry(&self, value: V, ttl: Duration) -> CacheEntry<V> {
        let now = Instant::now();
        let cost = serde_json::to_vec(&value).map(|v| v.len() as u64).unwrap_or(0);
        self.total_cost.fetch_add(cost, Ordering::Relaxed);
        CacheEntry {
            value,
            cost,
            created_at: now,
            expires_at: now + ttl,
            last_access: AtomicU64::new(self.next_tick()),
        }
    }

    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed)
    }

    /// Evicts least-recently-used entries until both budgets are met
    ///
    /// Independent of TTL expiry: a live entry is evicted if the cache is
    /// over its entry-count or byte-cost budget.
    fn enforce_budget(&self) {
        loop {
            let over_count = self.entries.len() > self.max_entries;
            let over_cost = self.total_cost.load(Ordering::Relaxed) > self.max_cost_bytes;
            if !over_count && !over_cost {
                break;
            }

            let victim = self
                .entries
                .iter()
                .min_by_key(|e| e.value().last_access.load(Ordering::Relaxed))
                .map(|e| e.key().clone());

            let Some(key) = victim else {
                break;
            };
            if let Some((_, old)) = self.entries.remove(&key) {
                self.total_cost.fetch_sub(old.cost, Ordering::Relaxed);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                trace!(key, "Evicted least-recently-used entry");
            }
        }
    }
}

impl<V> ExpiringCache<V> {
    /// Age of the entry for `key`, if present
    pub fn entry_age(&self, key: &str) -> Option<Duration> {
        self.entries.get(key).map(|e| e.created_at.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn small_cache() -> ExpiringCache<String> {
        ExpiringCache::new(100, 1024 * 1024)
    }

    const LONG: Duration = Duration::from_secs(60);
    const SHORT: Duration = Duration::from_millis(20);

    mod ttl_tests {
        use super::*;

        #[test]
        fn test_get_before_ttl_elapses() {
            let cache = small_cache();
            cache.put("k", "v".to_string(), LONG);
            assert_eq!(cache.get("k"), Some("v".to_string()));
        }

        #[test]
        fn test_get_after_ttl_is_miss_and_evicts() {
            let cache = small_cache();
            cache.put("k", "v".to_string(), SHORT);
            sleep(SHORT * 2);

            assert_eq!(cache.get("k"), None);
            // Lazily evicted on lookup
            assert!(cache.is_empty());
            assert_eq!(cache.stats().expired_removed, 1);
        }

        #[test]
        fn test_absent_key_is_miss() {
            let cache = small_cache();
            assert_eq!(cache.get("nope"), None);
            assert_eq!(cache.stats().misses, 1);
        }

        #[test]
        fn test_lazy_eviction_spares_concurrently_refreshed_entry() {
            // A put racing the expired-entry removal inside get must win:
            // the fresh value stays cached.
            let cache = Arc::new(small_cache());
            for _ in 0..100 {
                cache.put("k", "stale".to_string(), Duration::ZERO);
                let writer = {
                    let cache = Arc::clone(&cache);
                    std::thread::spawn(move || cache.put("k", "fresh".to_string(), LONG))
                };
                cache.get("k");
                writer.join().unwrap();

                assert_eq!(cache.get("k"), Some("fresh".to_string()));
                cache.invalidate_all();
            }
        }
    }

    mod put_if_absent_tests {
        use super::*;

        #[test]
        fn test_does_not_replace_live_entry() {
            let cache = small_cache();
            cache.put("k", "original".to_string(), LONG);

            assert!(!cache.put_if_absent("k", "usurper".to_string(), LONG));
            assert_eq!(cache.get("k"), Some("original".to_string()));
        }

        #[test]
        fn test_inserts_over_expired_entry() {
            let cache = small_cache();
            cache.put("k", "stale".to_string(), SHORT);
            sleep(SHORT * 2);

            assert!(cache.put_if_absent("k", "fresh".to_string(), LONG));
            assert_eq!(cache.get("k"), Some("fresh".to_string()));
        }

        #[test]
        fn test_inserts_when_vacant() {
            let cache = small_cache();
            assert!(cache.put_if_absent("k", "v".to_string(), LONG));
            assert_eq!(cache.get("k"), Some("v".to_string()));
        }
    }

    mod invalidation_tests {
        use super::*;

        #[test]
        fn test_invalidate_all() {
            let cache = small_cache();
            cache.put("a", "1".to_string(), LONG);
            cache.put("b", "2".to_string(), LONG);

            cache.invalidate_all();
            assert!(cache.is_empty());
            assert_eq!(cache.total_cost(), 0);
        }

        #[test]
        fn test_invalidate_matching_substring() {
            let cache = small_cache();
            cache.put("trip:1:remote", "a".to_string(), LONG);
            cache.put("trip:2:remote", "b".to_string(), LONG);
            cache.put("memory:1:remote", "c".to_string(), LONG);

            let removed = cache.invalidate_matching("trip:");
            assert_eq!(removed, 2);
            assert_eq!(cache.get("memory:1:remote"), Some("c".to_string()));
        }
    }

    mod sweep_tests {
        use super::*;

        #[test]
        fn test_sweep_removes_only_expired() {
            let cache = small_cache();
            cache.put("stale", "x".to_string(), SHORT);
            cache.put("live", "y".to_string(), LONG);
            sleep(SHORT * 2);

            assert_eq!(cache.sweep_expired(), 1);
            assert_eq!(cache.len(), 1);
            assert_eq!(cache.get("live"), Some("y".to_string()));
        }

        #[tokio::test]
        async fn test_background_sweeper_runs() {
            let cache = Arc::new(ExpiringCache::<String>::new(100, 1024 * 1024));
            cache.put("stale", "x".to_string(), Duration::from_millis(10));

            let handle = cache.spawn_sweeper(Duration::from_millis(25));
            tokio::time::sleep(Duration::from_millis(80)).await;
            handle.abort();

            assert!(cache.is_empty());
        }
    }

    mod budget_tests {
        use super::*;

        #[test]
        fn test_entry_count_budget_evicts_lru() {
            let cache = ExpiringCache::new(2, 1024 * 1024);
            cache.put("a", "1".to_string(), LONG);
            cache.put("b", "2".to_string(), LONG);

            // Touch "a" so "b" becomes the least recently used
            cache.get("a");
            cache.put("c", "3".to_string(), LONG);

            assert_eq!(cache.len(), 2);
            assert_eq!(cache.get("b"), None);
            assert_eq!(cache.get("a"), Some("1".to_string()));
            assert_eq!(cache.stats().evictions, 1);
        }

        #[test]
        fn test_cost_budget_evicts() {
            // Each serialized String costs its length + 2 quote bytes
            let cache = ExpiringCache::new(100, 30);
            cache.put("a", "x".repeat(10), LONG);
            cache.put("b", "y".repeat(10), LONG);
            cache.put("c", "z".repeat(10), LONG);

            assert!(cache.total_cost() <= 30);
            assert!(cache.len() < 3);
        }

        #[test]
        fn test_eviction_is_independent_of_ttl() {
            // The oldest-accessed entry is evicted even though its TTL is
            // the longest
            let cache = ExpiringCache::new(1, 1024 * 1024);
            cache.put("long_ttl", "a".to_string(), Duration::from_secs(3600));
            cache.put("short_ttl", "b".to_string(), LONG);

            assert_eq!(cache.get("long_ttl"), None);
            assert_eq!(cache.get("short_ttl"), Some("b".to_string()));
        }
    }
}
