// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Memory Cache (`spec.md` §4.G): a bounded LRU with TTL and a byte budget,
//! grounded in the `Mutex<LruCache<K, V>>` shape used for thread-safe
//! in-process caches across the example pack.

use std::time::{Duration, Instant};

use lru::LruCache;

/// One cached value plus the bookkeeping needed to expire and evict it.
#[derive(Clone)]
pub struct CacheEntry {
    pub value: Vec<u8>,
    pub expiry: Instant,
    pub size: usize,
    pub accessed_at: Instant,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub bytes: usize,
}

struct Inner {
    entries: LruCache<String, CacheEntry>,
    bytes: usize,
}

/// Bounded LRU+TTL cache. `max_entries`/`max_bytes` of zero disables
/// storage entirely (every `set` is immediately evicted).
pub struct MemoryCache {
    max_entries: usize,
    max_bytes: usize,
    inner: std::sync::Mutex<Inner>,
}

impl MemoryCache {
    pub fn new(max_entries: usize, max_bytes: usize) -> Self {
        Self {
            max_entries,
            max_bytes,
            inner: std::sync::Mutex::new(Inner {
                entries: LruCache::unbounded(),
                bytes: 0,
            }),
        }
    }

    /// Returns a copy of the value on hit, moving the key to MRU. Expired
    /// entries are evicted in place and reported as a miss.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();

        let expired = match inner.entries.peek(key) {
            Some(entry) => now >= entry.expiry,
            None => {
                tracing::trace!(key, "cache.memory.miss");
                return None;
            }
        };

        if expired {
            if let Some(entry) = inner.entries.pop(key) {
                inner.bytes -= entry.size;
            }
            tracing::trace!(key, "cache.memory.miss");
            return None;
        }

        let hit = inner.entries.get_mut(key).map(|entry| {
            entry.accessed_at = now;
            entry.value.clone()
        });
        tracing::trace!(key, "cache.memory.hit");
        hit
    }

    /// Inserts or replaces `key`, then evicts LRU entries until both budgets
    /// are satisfied.
    pub fn set(&self, key: impl Into<String>, value: Vec<u8>, ttl: Duration) {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();
        let key = key.into();
        let size = value.len();

        if let Some(old) = inner.entries.peek(&key) {
            inner.bytes -= old.size;
        }

        inner.entries.put(
            key,
            CacheEntry {
                value,
                expiry: now + ttl,
                size,
                accessed_at: now,
            },
        );
        inner.bytes += size;

        Self::evict(&mut inner, self.max_entries, self.max_bytes);
    }

    pub fn delete(&self, key: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(entry) = inner.entries.pop(key) {
            inner.bytes -= entry.size;
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.clear();
        inner.bytes = 0;
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().unwrap();
        CacheStats {
            entries: inner.entries.len(),
            bytes: inner.bytes,
        }
    }

    fn evict(inner: &mut Inner, max_entries: usize, max_bytes: usize) {
        while inner.entries.len() > max_entries || inner.bytes > max_bytes {
            match inner.entries.pop_lru() {
                Some((_, entry)) => inner.bytes -= entry.size,
                None => break,
            }
        }
    }
}
