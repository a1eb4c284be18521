//! Tile identity and decoded tile images.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use image::RgbaImage;

/// Side length of a map tile, in pixels.
pub const TILE_SIZE: u32 = 256;

/// Identifies one grid cell of the world map at a given zoom level.
///
/// At level `L` the grid is `2^L` tiles square; valid indices are
/// `0 <= x, y < 2^L`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub level: u8,
    pub x: i32,
    pub y: i32,
}

impl TileKey {
    pub fn new(level: u8, x: i32, y: i32) -> Self {
        Self { level, x, y }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.level, self.x, self.y)
    }
}

/// A decoded raster tile.
///
/// Tiles are immutable once built and shared between the cache and the
/// per-frame patch list through [`TileHandle`]; the image is dropped
/// when the last holder releases its handle.
///
/// `id` is process-unique and monotonically increasing, so a render
/// backend can key GPU-resident copies by tile identity and re-upload
/// only when a grid cell is recomposited into a new `Tile`.
pub struct Tile {
    id: u64,
    image: RgbaImage,
}

/// Shared-ownership handle to a [`Tile`].
pub type TileHandle = Arc<Tile>;

static NEXT_TILE_ID: AtomicU64 = AtomicU64::new(1);

impl Tile {
    /// Wraps a decoded image into a tile with a fresh identity.
    pub fn new(image: RgbaImage) -> Self {
        Self {
            id: NEXT_TILE_ID.fetch_add(1, Ordering::Relaxed),
            image,
        }
    }

    /// Wraps a decoded image into a shared handle.
    pub fn shared(image: RgbaImage) -> TileHandle {
        Arc::new(Self::new(image))
    }

    /// Process-unique tile identity.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The decoded pixels.
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

impl fmt::Debug for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tile")
            .field("id", &self.id)
            .field("width", &self.image.width())
            .field("height", &self.image.height())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_ids_are_unique() {
        let a = Tile::new(RgbaImage::new(1, 1));
        let b = Tile::new(RgbaImage::new(1, 1));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn key_display_is_level_x_y() {
        assert_eq!(TileKey::new(5, 12, 7).to_string(), "5/12/7");
    }

    #[test]
    fn handle_is_shared_not_copied() {
        let tile = Tile::shared(RgbaImage::new(2, 2));
        let other = Arc::clone(&tile);
        assert_eq!(tile.id(), other.id());
        assert_eq!(Arc::strong_count(&tile), 2);
    }
}
