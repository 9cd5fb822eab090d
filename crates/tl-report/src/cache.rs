//! Reconstruction cache.
//!
//! Memoizes [`ReconstructedStats`] per (store, collection) with bounded LRU
//! eviction. Entries are never invalidated otherwise: rows of a closed
//! collection do not change.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tl_common::CollectionId;
use tl_config::ResultRange;
use tl_store::HistogramStore;
use tracing::debug;

use crate::error::{ReportError, Result};
use crate::reconstruct::{reconstruct, resolve_collection, ReconstructedStats};

pub use tl_config::trace::DEFAULT_CACHE_CAPACITY;

#[derive(Debug, Clone, PartialEq, Eq)]
struct CacheKey {
    store: PathBuf,
    collection: CollectionId,
}

/// Hit and miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Debug, Default)]
struct LruState {
    /// Least recently used first.
    entries: Vec<(CacheKey, Arc<ReconstructedStats>)>,
    stats: CacheStats,
}

impl LruState {
    fn get(&mut self, key: &CacheKey) -> Option<Arc<ReconstructedStats>> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        let entry = self.entries.remove(pos);
        let value = Arc::clone(&entry.1);
        self.entries.push(entry);
        Some(value)
    }

    fn insert(&mut self, key: CacheKey, value: Arc<ReconstructedStats>, capacity: usize) {
        self.entries.retain(|(k, _)| k != &key);
        while self.entries.len() >= capacity && !self.entries.is_empty() {
            let (evicted, _) = self.entries.remove(0);
            self.stats.evictions += 1;
            debug!(store = %evicted.store.display(), collection = %evicted.collection, "evicted reconstruction");
        }
        self.entries.push((key, value));
    }
}

/// Shared, bounded cache of reconstructed collections.
#[derive(Debug)]
pub struct ReconstructionCache {
    capacity: usize,
    result_range: ResultRange,
    state: Mutex<LruState>,
}

impl ReconstructionCache {
    /// A cache holding at most `capacity` collections (at least one).
    pub fn new(capacity: usize, result_range: ResultRange) -> Self {
        Self {
            capacity: capacity.max(1),
            result_range,
            state: Mutex::new(LruState::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.lock().stats
    }

    /// Reconstructed stats for `collection` in the store at `store_path`,
    /// or for its latest collection when `collection` is `None`.
    ///
    /// A hit returns the cached `Arc` without touching the database beyond
    /// resolving `None`.
    pub fn get_or_build(
        &self,
        store_path: impl AsRef<Path>,
        collection: Option<CollectionId>,
    ) -> Result<Arc<ReconstructedStats>> {
        let path = store_path.as_ref();
        let canonical = path.canonicalize().map_err(|source| ReportError::StorePath {
            path: path.to_path_buf(),
            source,
        })?;

        let mut store = None;
        let id = match collection {
            Some(id) => id,
            None => {
                let opened = store.insert(HistogramStore::open_existing(&canonical)?);
                resolve_collection(opened, None)?.id
            }
        };
        let key = CacheKey {
            store: canonical,
            collection: id,
        };

        {
            let mut state = self.lock();
            if let Some(hit) = state.get(&key) {
                state.stats.hits += 1;
                debug!(store = %key.store.display(), collection = %id, "reconstruction cache hit");
                return Ok(hit);
            }
            state.stats.misses += 1;
        }

        let mut store = match store {
            Some(store) => store,
            None => HistogramStore::open_existing(&key.store)?,
        };
        let built = Arc::new(reconstruct(&mut store, id, self.result_range)?);

        let mut state = self.lock();
        // Another caller may have built the same entry meanwhile.
        if let Some(existing) = state.get(&key) {
            return Ok(existing);
        }
        state.insert(key, Arc::clone(&built), self.capacity);
        Ok(built)
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    fn lock(&self) -> MutexGuard<'_, LruState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ReconstructionCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY, ResultRange::default())
    }
}
