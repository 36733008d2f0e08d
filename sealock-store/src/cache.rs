//! A write-through, TTL-bounded LRU cache decorator over any
//! [`BlockStore`]. Purely advisory -- a cache miss or a dropped entry never
//! changes the result of a read, only its latency, which is what lets this
//! stay a thin wrapper instead of a second source of truth. Uses a safe
//! `HashMap` + `VecDeque` for LRU bookkeeping instead of an intrusive
//! linked list, with TTL expiry added on top.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use sealock_types::{Digest, StorageResult};

use crate::block_store::BlockStore;

struct Entry {
    data: Vec<u8>,
    inserted_at: Instant,
}

struct CacheState {
    entries: HashMap<Digest, Entry>,
    /// Most-recently-used digest at the back.
    order: VecDeque<Digest>,
}

/// Wraps an inner [`BlockStore`] with an in-memory read cache.
///
/// `capacity` bounds the number of cached entries (evicted LRU-first);
/// `ttl` bounds their age (an expired entry is treated as a miss and
/// refetched, then reinserted with a fresh timestamp).
pub struct CachedBlockStore<S> {
    inner: S,
    capacity: usize,
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl<S: BlockStore> CachedBlockStore<S> {
    pub fn new(inner: S, capacity: usize, ttl: Duration) -> Self {
        CachedBlockStore {
            inner,
            capacity,
            ttl,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    fn touch(state: &mut CacheState, digest: &Digest) {
        if let Some(pos) = state.order.iter().position(|d| d == digest) {
            state.order.remove(pos);
        }
        state.order.push_back(*digest);
    }

    fn insert(&self, state: &mut CacheState, digest: Digest, data: Vec<u8>) {
        state.entries.insert(
            digest,
            Entry {
                data,
                inserted_at: Instant::now(),
            },
        );
        Self::touch(state, &digest);

        while state.order.len() > self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.entries.remove(&oldest);
            } else {
                break;
            }
        }
    }

    fn cached_get(&self, digest: &Digest) -> Option<Vec<u8>> {
        let mut state = self.state.lock().unwrap();
        let fresh = match state.entries.get(digest) {
            Some(entry) => entry.inserted_at.elapsed() < self.ttl,
            None => return None,
        };
        if !fresh {
            state.entries.remove(digest);
            if let Some(pos) = state.order.iter().position(|d| d == digest) {
                state.order.remove(pos);
            }
            return None;
        }
        Self::touch(&mut state, digest);
        state.entries.get(digest).map(|entry| entry.data.clone())
    }

    pub fn invalidate(&self, digest: &Digest) {
        let mut state = self.state.lock().unwrap();
        state.entries.remove(digest);
        if let Some(pos) = state.order.iter().position(|d| d == digest) {
            state.order.remove(pos);
        }
    }
}

impl<S: BlockStore> BlockStore for CachedBlockStore<S> {
    fn put(&self, digest: &Digest, data: &[u8]) -> StorageResult<()> {
        self.inner.put(digest, data)?;
        let mut state = self.state.lock().unwrap();
        self.insert(&mut state, *digest, data.to_vec());
        Ok(())
    }

    fn get(&self, digest: &Digest) -> StorageResult<Vec<u8>> {
        if let Some(data) = self.cached_get(digest) {
            return Ok(data);
        }
        let data = self.inner.get(digest)?;
        let mut state = self.state.lock().unwrap();
        self.insert(&mut state, *digest, data.clone());
        Ok(data)
    }

    fn exists(&self, digest: &Digest) -> StorageResult<bool> {
        if self.cached_get(digest).is_some() {
            return Ok(true);
        }
        self.inner.exists(digest)
    }

    fn delete(&self, digest: &Digest) -> StorageResult<()> {
        self.invalidate(digest);
        self.inner.delete(digest)
    }

    fn size(&self, digest: &Digest) -> StorageResult<u64> {
        if let Some(data) = self.cached_get(digest) {
            return Ok(data.len() as u64);
        }
        self.inner.size(digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_store::LocalBlockStore;
    use crate::digest::hash_bytes;

    fn temp_cached(ttl: Duration) -> (tempfile::TempDir, CachedBlockStore<LocalBlockStore>) {
        let dir = tempfile::tempdir().unwrap();
        let inner = LocalBlockStore::open(dir.path()).unwrap();
        (dir, CachedBlockStore::new(inner, 4, ttl))
    }

    #[test]
    fn get_is_served_from_cache_after_first_read() {
        let (_dir, cache) = temp_cached(Duration::from_secs(60));
        let data = b"cached content";
        let digest = hash_bytes(data);

        cache.put(&digest, data).unwrap();
        cache.invalidate(&digest); // force the next get() to go through inner once
        assert_eq!(cache.get(&digest).unwrap(), data);
        // now served purely from the cache
        assert_eq!(cache.get(&digest).unwrap(), data);
    }

    #[test]
    fn expired_entry_is_refetched_from_inner() {
        let (_dir, cache) = temp_cached(Duration::from_millis(1));
        let data = b"short-lived";
        let digest = hash_bytes(data);

        cache.put(&digest, data).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        // a correctness-affecting bug would show up as a miss here returning
        // stale/no data; instead we just expect a transparent refetch
        assert_eq!(cache.get(&digest).unwrap(), data);
    }

    #[test]
    fn capacity_overflow_evicts_least_recently_used() {
        let (_dir, cache) = temp_cached(Duration::from_secs(60));

        let digests: Vec<_> = (0..5)
            .map(|i| {
                let data = format!("entry-{i}").into_bytes();
                let digest = hash_bytes(&data);
                cache.put(&digest, &data).unwrap();
                digest
            })
            .collect();

        // reads are still correct even though the cache capacity (4) was
        // exceeded by inserting 5 entries -- eviction only drops cache
        // residency, never the underlying block.
        for digest in &digests {
            assert!(cache.get(digest).is_ok());
        }
    }

    #[test]
    fn delete_invalidates_cache_entry() {
        let (_dir, cache) = temp_cached(Duration::from_secs(60));
        let data = b"to remove";
        let digest = hash_bytes(data);

        cache.put(&digest, data).unwrap();
        cache.delete(&digest).unwrap();
        assert!(!cache.exists(&digest).unwrap());
    }
}
