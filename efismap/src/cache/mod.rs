//! Bounded in-memory store of composited tiles.
//!
//! The cache is a fixed-capacity array with a linear scan: at the
//! intended scale (a few dozen entries, four viewports' worth of tiles)
//! that beats any hash-map bookkeeping. Eviction picks the entry with
//! the oldest last-access timestamp, so tiles still referenced by the
//! current frame's patches simply outlive their slot through their
//! shared handle.

use crate::clock::Clock;
use crate::tile::{TileHandle, TileKey};

/// Hit/miss/eviction counters, reset never, snapshot on read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct CacheEntry {
    key: TileKey,
    tile: TileHandle,
    /// Last access, milliseconds on the injected clock.
    atime: u64,
}

/// Fixed-capacity tile cache with oldest-access eviction.
pub struct TileCache<C: Clock> {
    entries: Vec<CacheEntry>,
    capacity: usize,
    clock: C,
    stats: CacheStats,
}

impl<C: Clock> TileCache<C> {
    /// Creates a cache holding at most `capacity` tiles.
    pub fn new(capacity: usize, clock: C) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            clock,
            stats: CacheStats::default(),
        }
    }

    /// Looks up a tile, refreshing its access time on a hit.
    ///
    /// The returned handle is a clone; the cache keeps its own.
    pub fn get(&mut self, key: TileKey) -> Option<TileHandle> {
        let now = self.clock.now_ms();
        for entry in &mut self.entries {
            if entry.key == key {
                entry.atime = now;
                self.stats.hits += 1;
                return Some(entry.tile.clone());
            }
        }
        self.stats.misses += 1;
        None
    }

    /// Stores a tile, evicting the least recently accessed entry when
    /// the cache is full.
    pub fn add(&mut self, tile: TileHandle, key: TileKey) {
        let entry = CacheEntry {
            key,
            tile,
            atime: self.clock.now_ms(),
        };
        if self.entries.len() == self.capacity {
            let slot = self.oldest_slot();
            self.entries[slot] = entry;
            self.stats.evictions += 1;
        } else {
            self.entries.push(entry);
        }
    }

    /// Drops every cached tile.
    ///
    /// Used when the route changes: cached composites may carry a stale
    /// route overlay and must be rebuilt.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Grows the capacity to `capacity`; shrink requests are ignored.
    pub fn set_capacity(&mut self, capacity: usize) {
        if capacity > self.capacity {
            self.capacity = capacity;
            self.entries.reserve(capacity - self.entries.len());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, key: TileKey) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    fn oldest_slot(&self) -> usize {
        debug_assert!(!self.entries.is_empty());
        let mut slot = 0;
        let mut oldest = u64::MAX;
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.atime < oldest {
                oldest = entry.atime;
                slot = i;
            }
        }
        slot
    }
}
