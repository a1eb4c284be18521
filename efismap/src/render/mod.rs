//! Outbound rendering interface.
//!
//! The gauge does not draw anything itself: each frame it accumulates
//! [`MapPatch`]es (tile blits clipped to the viewport) plus an optional
//! marker patch, and [`crate::gauge::MapGauge::render`] replays them
//! through a [`RenderBackend`] supplied by the compositing layer.

use image::{Rgba, RgbaImage};

use crate::tile::TileHandle;

/// Axis-aligned rectangle, integer pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Overlapping region of two rectangles, `None` when disjoint or
    /// either is empty.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = (self.x + self.w).min(other.x + other.w);
        let bottom = (self.y + self.h).min(other.y + other.h);
        if right > x && bottom > y {
            Some(Rect::new(x, y, right - x, bottom - y))
        } else {
            None
        }
    }
}

/// One tile blit: `src` in tile-local coordinates, `dst` in
/// viewport-local coordinates.
#[derive(Debug, Clone)]
pub struct MapPatch {
    pub tile: TileHandle,
    pub src: Rect,
    pub dst: Rect,
}

/// Marker blit rectangles, sprite-local and viewport-local.
#[derive(Debug, Clone, Copy)]
pub struct MarkerPatch {
    pub src: Rect,
    pub dst: Rect,
}

/// Blit primitives supplied by the compositing layer.
///
/// Implementations may key GPU-resident tile copies on
/// [`crate::tile::Tile::id`].
pub trait RenderBackend {
    /// Copies `src` of the tile to `dst` of the gauge surface.
    fn blit(&mut self, tile: &TileHandle, src: Rect, dst: Rect);

    /// Draws `src` of the sprite rotated by `angle_deg` about its own
    /// center at `dst`.
    fn blit_rotated(&mut self, sprite: &RgbaImage, src: Rect, angle_deg: f32, dst: Rect);

    /// Draws a 1 px outline around the whole gauge.
    fn draw_outline(&mut self, color: Rgba<u8>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_of_overlapping_rects() {
        let a = Rect::new(0, 0, 100, 100);
        let b = Rect::new(50, 60, 100, 100);
        assert_eq!(a.intersection(&b), Some(Rect::new(50, 60, 50, 40)));
    }

    #[test]
    fn intersection_is_commutative() {
        let a = Rect::new(-10, -10, 30, 30);
        let b = Rect::new(0, 0, 5, 5);
        assert_eq!(a.intersection(&b), b.intersection(&a));
        assert_eq!(a.intersection(&b), Some(Rect::new(0, 0, 5, 5)));
    }

    #[test]
    fn disjoint_rects_do_not_intersect() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(10, 0, 10, 10);
        // Touching edges share no pixels.
        assert_eq!(a.intersection(&b), None);
        assert_eq!(a.intersection(&Rect::new(100, 100, 5, 5)), None);
    }

    #[test]
    fn empty_rect_never_intersects() {
        let a = Rect::new(0, 0, 10, 10);
        assert_eq!(a.intersection(&Rect::new(5, 5, 0, 0)), None);
    }
}
