use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

struct CacheEntry<T> {
    value: T,
    inserted_at: Instant,
}

struct CacheInner<T> {
    entries: HashMap<String, CacheEntry<T>>,
    /// Insertion order for FIFO eviction. Oldest-inserted at the front.
    order: VecDeque<String>,
}

/// TTL-bounded, size-bounded memoization of query results.
///
/// Eviction is oldest-inserted-first, not LRU: this is a short-lived
/// client-side cache, and the capacity bound matters more than recency
/// accuracy. Re-inserting an existing key refreshes its value and timestamp
/// but keeps its original queue position.
///
/// The cache itself carries no write-invalidation hook; callers that mutate
/// the underlying data are expected to [`clear`](Self::clear) it.
pub struct ResultCache<T> {
    inner: Mutex<CacheInner<T>>,
    capacity: usize,
}

impl<T> std::fmt::Debug for ResultCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

impl<T> ResultCache<T> {
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("result cache mutex poisoned")
            .entries
            .len()
    }
}

impl<T: Clone> ResultCache<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    /// Return the cached value for `key` if one exists and is younger than
    /// `ttl`. A zero TTL can never hit.
    pub fn get(&self, key: &str, ttl: Duration) -> Option<T> {
        let inner = self.inner.lock().expect("result cache mutex poisoned");
        let entry = inner.entries.get(key)?;
        if entry.inserted_at.elapsed() < ttl {
            debug!(key, "result cache hit");
            Some(entry.value.clone())
        } else {
            debug!(key, "result cache expired");
            None
        }
    }

    /// Insert or refresh an entry. Inserting a new key at capacity evicts
    /// the single oldest-inserted entry first.
    pub fn insert(&self, key: &str, value: T) {
        let mut inner = self.inner.lock().expect("result cache mutex poisoned");
        if let Some(entry) = inner.entries.get_mut(key) {
            entry.value = value;
            entry.inserted_at = Instant::now();
            return;
        }
        if inner.entries.len() >= self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
                debug!(key = %oldest, "result cache evicted oldest entry");
            }
        }
        inner.order.push_back(key.to_string());
        inner.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Return the live cached value for `key`, or invoke `compute`, store its
    /// result, and return it. `compute` runs at most once per call and not at
    /// all on a live hit; a failed compute caches nothing.
    pub fn get_or_compute<F>(&self, key: &str, ttl: Duration, compute: F) -> crate::error::Result<T>
    where
        F: FnOnce() -> crate::error::Result<T>,
    {
        if let Some(value) = self.get(key, ttl) {
            return Ok(value);
        }
        let value = compute()?;
        self.insert(key, value.clone());
        Ok(value)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner
            .lock()
            .expect("result cache mutex poisoned")
            .entries
            .contains_key(key)
    }

    /// Drop every entry. Used as a recovery action.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("result cache mutex poisoned");
        inner.entries.clear();
        inner.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    const TTL: Duration = Duration::from_secs(60);

    #[test]
    fn live_hit_skips_compute() {
        let cache: ResultCache<u32> = ResultCache::new(10);
        let calls = AtomicU32::new(0);
        let mut compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        };
        assert_eq!(cache.get_or_compute("k", TTL, &mut compute).unwrap(), 7);
        assert_eq!(cache.get_or_compute("k", TTL, &mut compute).unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_ttl_always_recomputes() {
        let cache: ResultCache<u32> = ResultCache::new(10);
        let calls = AtomicU32::new(0);
        let mut compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        };
        cache.get_or_compute("k", Duration::ZERO, &mut compute).unwrap();
        cache.get_or_compute("k", Duration::ZERO, &mut compute).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failed_compute_caches_nothing() {
        let cache: ResultCache<u32> = ResultCache::new(10);
        let err = cache.get_or_compute("k", TTL, || {
            Err(crate::error::StructuredError::new(
                crate::error::ErrorKind::Query,
                "boom",
            ))
        });
        assert!(err.is_err());
        assert!(!cache.contains("k"));
    }

    #[test]
    fn capacity_evicts_first_inserted() {
        let cache: ResultCache<u32> = ResultCache::new(3);
        for (i, key) in ["a", "b", "c"].iter().enumerate() {
            cache.insert(key, i as u32);
        }
        cache.insert("d", 3);
        assert_eq!(cache.len(), 3);
        assert!(!cache.contains("a"), "first-inserted entry must be evicted");
        assert!(cache.contains("b"));
        assert!(cache.contains("d"));
    }

    #[test]
    fn refresh_keeps_queue_position() {
        let cache: ResultCache<u32> = ResultCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("a", 10); // refresh, not reinsertion
        cache.insert("c", 3); // evicts "a" — still oldest by insertion
        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
        assert!(cache.contains("c"));
    }

    #[test]
    fn clear_empties_cache() {
        let cache: ResultCache<u32> = ResultCache::new(4);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get("a", TTL), None);
    }
}
