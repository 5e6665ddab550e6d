use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Thread-safe, capacity-bounded cache with per-entry TTL.
///
/// Shared by the symbolic index and the context builder so that eviction
/// and invalidation behave identically in both. Entries are evicted by LRU
/// order when the cache is full and ignored (lazily dropped) once older
/// than the TTL. A cache miss is never an error.
#[derive(Clone)]
pub struct TtlCache<V: Clone> {
    inner: Arc<Mutex<LruCache<String, (V, Instant)>>>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    /// # Panics
    /// Panics if capacity is 0.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let cache = LruCache::new(NonZeroUsize::new(capacity).expect("Capacity must be non-zero"));
        Self {
            inner: Arc::new(Mutex::new(cache)),
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut cache = self.inner.lock().unwrap();
        match cache.get(key) {
            Some((value, inserted_at)) if inserted_at.elapsed() < self.ttl => Some(value.clone()),
            Some(_) => {
                cache.pop(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: String, value: V) {
        let mut cache = self.inner.lock().unwrap();
        cache.put(key, (value, Instant::now()));
    }

    /// Evict every entry whose key starts with `prefix`.
    ///
    /// Keys are namespaced as `<project_id>:<operation>:<args>`, so a
    /// structural write to a project invalidates with the project prefix.
    pub fn invalidate_prefix(&self, prefix: &str) {
        let mut cache = self.inner.lock().unwrap();
        let stale: Vec<String> = cache
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            cache.pop(&key);
        }
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}

/// Stable content hash for cache keys (embedding cache, query cache).
pub fn content_key(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
