//! Engine telemetry.
//!
//! Lock-free counters recorded by the gauge and the providers, with a
//! point-in-time [`TelemetrySnapshot`] for display layers. The engine
//! itself is single-threaded; the counters are atomic so a snapshot can
//! be taken from a UI thread without coordination.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared counters for the moving-map engine.
#[derive(Debug, Default)]
pub struct MapMetrics {
    frames: AtomicU64,
    tiles_resolved: AtomicU64,
    tiles_missing: AtomicU64,
    tile_fetches: AtomicU64,
    fetch_failures: AtomicU64,
}

impl MapMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// One `update_state` pass completed.
    pub fn frame(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    /// A visible grid cell produced a tile (from cache or providers).
    pub fn tile_resolved(&self) {
        self.tiles_resolved.fetch_add(1, Ordering::Relaxed);
    }

    /// A visible grid cell had no tile anywhere; the frame shows a gap.
    pub fn tile_missing(&self) {
        self.tiles_missing.fetch_add(1, Ordering::Relaxed);
    }

    /// A tile was downloaded and persisted.
    pub fn tile_fetched(&self) {
        self.tile_fetches.fetch_add(1, Ordering::Relaxed);
    }

    /// A download failed (non-success status or transport error).
    pub fn fetch_failed(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a point-in-time copy of all counters.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            frames: self.frames.load(Ordering::Relaxed),
            tiles_resolved: self.tiles_resolved.load(Ordering::Relaxed),
            tiles_missing: self.tiles_missing.load(Ordering::Relaxed),
            tile_fetches: self.tile_fetches.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`MapMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub frames: u64,
    pub tiles_resolved: u64,
    pub tiles_missing: u64,
    pub tile_fetches: u64,
    pub fetch_failures: u64,
}

impl fmt::Display for TelemetrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frames: {}, tiles resolved: {}, missing: {}, fetched: {}, fetch failures: {}",
            self.frames,
            self.tiles_resolved,
            self.tiles_missing,
            self.tile_fetches,
            self.fetch_failures
        )
    }
}
