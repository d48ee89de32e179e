//! A per-dataset cache of decoded chunks.
//!
//! Concurrent requests for the same chunk are collapsed: one caller decodes,
//! the others wait for it and receive the same [Arc]. Different chunks decode
//! independently.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use moka::notification::RemovalCause;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::buffer::TypedBuffer;

fn default_max_bytes() -> usize {
    1 << 20
}

fn default_max_chunks() -> usize {
    64
}

/// Budget for decoded chunks kept by one dataset.
///
/// A zero budget disables caching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkCacheConfig {
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,
}

impl Default for ChunkCacheConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            max_chunks: default_max_chunks(),
        }
    }
}

impl ChunkCacheConfig {
    pub fn disabled() -> Self {
        Self {
            max_bytes: 0,
            max_chunks: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_bytes > 0 && self.max_chunks > 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub resident_chunks: usize,
    pub resident_bytes: usize,
}

#[derive(Debug, Default)]
struct AtomicCacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

/// Least-recently-used cache of decoded chunks, keyed by chunk coordinate.
///
/// Chunks are weighed by their decoded size. Every chunk weighs at least
/// `max_bytes / max_chunks`, which keeps the chunk count within budget too.
pub struct ChunkCache {
    config: ChunkCacheConfig,
    inner: Option<Cache<Vec<u64>, Arc<TypedBuffer>>>,
    stats: Arc<AtomicCacheStats>,
}

impl std::fmt::Debug for ChunkCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkCache")
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl ChunkCache {
    pub fn new(config: ChunkCacheConfig) -> Self {
        let stats = Arc::new(AtomicCacheStats::default());
        let inner = config.is_enabled().then(|| {
            let floor = config.max_bytes / config.max_chunks;
            let evictions = Arc::clone(&stats);
            Cache::builder()
                .eviction_policy(EvictionPolicy::lru())
                .weigher(move |_coord: &Vec<u64>, chunk: &Arc<TypedBuffer>| {
                    chunk.byte_size().max(floor).min(u32::MAX as usize) as u32
                })
                .max_capacity(config.max_bytes as u64)
                .eviction_listener(move |coord: Arc<Vec<u64>>, _, cause: RemovalCause| {
                    if cause.was_evicted() {
                        evictions.evictions.fetch_add(1, Ordering::Relaxed);
                        log::trace!("evicted chunk {coord:?}");
                    }
                })
                .build()
        });
        Self {
            config,
            inner,
            stats,
        }
    }

    pub fn config(&self) -> &ChunkCacheConfig {
        &self.config
    }

    /// The cached chunk at `coord`, or the result of `load`, which is cached on success.
    ///
    /// `load` runs at most once at a time per coordinate. Callers waiting on a
    /// failed load receive the same error.
    pub fn get_or_try_insert<F>(&self, coord: &[u64], load: F) -> crate::Result<Arc<TypedBuffer>>
    where
        F: FnOnce() -> crate::Result<TypedBuffer>,
    {
        let Some(inner) = &self.inner else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            return load().map(Arc::new);
        };

        let mut loaded = false;
        let result = inner.try_get_with(coord.to_vec(), || {
            loaded = true;
            load().map(Arc::new)
        });
        let counter = if loaded {
            &self.stats.misses
        } else {
            &self.stats.hits
        };
        counter.fetch_add(1, Ordering::Relaxed);
        result.map_err(|e| Arc::try_unwrap(e).unwrap_or_else(Error::Shared))
    }

    pub fn stats(&self) -> CacheStats {
        let (resident_chunks, resident_bytes) = match &self.inner {
            Some(inner) => {
                inner.run_pending_tasks();
                inner
                    .iter()
                    .fold((0, 0), |(n, b), (_, chunk)| (n + 1, b + chunk.byte_size()))
            }
            None => (0, 0),
        };
        CacheStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            resident_chunks,
            resident_bytes,
        }
    }

    /// Drop every cached chunk. Chunks already handed out stay valid.
    pub fn clear(&self) {
        if let Some(inner) = &self.inner {
            inner.invalidate_all();
            inner.run_pending_tasks();
        }
    }
}
