//! Moving-map viewport controller.
//!
//! [`MapGauge`] owns the zoom level, the viewport origin in world-pixel
//! coordinates, the aircraft marker, the tile cache, and the provider
//! lists. Each frame, `update_state` determines the tile grid covering
//! the viewport, resolves every tile through
//! cache → base providers → overlays → route, and accumulates render
//! patches that `render` replays through a [`RenderBackend`].
//!
//! # Viewport state machine
//!
//! The viewport is either *centered* (following the marker) or
//! *roaming* (moved by the user). `manipulate_viewport` enters roaming;
//! after [`MANIPULATE_TIMEOUT_MS`] without further manipulation the
//! next marker update falls back to centered and re-ties the viewport
//! to the marker.

use std::sync::Arc;

use image::{imageops, Rgba, RgbaImage};
use tracing::{debug, warn};

use crate::cache::{CacheStats, TileCache};
use crate::clock::{Clock, SystemClock};
use crate::coord::{geo_to_pixel, map_size, pixel_to_geo, GeoPoint};
use crate::provider::{sort_by_priority, MapProvider, RouteProvider};
use crate::render::{MapPatch, MarkerPatch, Rect, RenderBackend};
use crate::telemetry::MapMetrics;
use crate::tile::{Tile, TileKey, TILE_SIZE};

/// Highest zoom level the gauge accepts.
///
/// A safety margin under the level-23 projection ceiling: at level 15
/// every world coordinate the gauge manipulates fits comfortably in the
/// native signed 32-bit rectangle math.
pub const MAX_GAUGE_LEVEL: u8 = 15;

/// Roaming expires this long after the last viewport manipulation.
pub const MANIPULATE_TIMEOUT_MS: u64 = 2000;

/// The viewport scrolls when the marker comes this close to its edge.
const PIX_LIMIT: i32 = 10;

/// Outline color drawn around the gauge.
const OUTLINE_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// The aircraft marker: world position, heading, and sprite.
pub struct Marker {
    /// World-pixel position of the sprite center at the current level.
    pub x: i32,
    pub y: i32,
    /// Degrees, 0 = north, clamped to 0..=360.
    pub heading: f32,
    sprite: RgbaImage,
}

impl Marker {
    fn new(sprite: RgbaImage) -> Self {
        Self {
            x: 0,
            y: 0,
            heading: 0.0,
            sprite,
        }
    }

    /// A plain white aircraft-arrow sprite for callers that do not
    /// supply artwork.
    pub fn default_sprite() -> RgbaImage {
        let size = 32i32;
        let mut sprite = RgbaImage::new(size as u32, size as u32);
        // Isoceles triangle pointing up, nose at the top center.
        for y in 0..size {
            let half_width = (y * (size / 2 - 2)) / size;
            for x in (size / 2 - half_width)..=(size / 2 + half_width) {
                sprite.put_pixel(x as u32, y as u32, Rgba([255, 255, 255, 255]));
            }
        }
        sprite
    }

    fn width(&self) -> i32 {
        self.sprite.width() as i32
    }

    fn height(&self) -> i32 {
        self.sprite.height() as i32
    }

    fn left(&self) -> i32 {
        self.x - self.width() / 2
    }

    fn top(&self) -> i32 {
        self.y - self.height() / 2
    }

    fn world_box(&self) -> Rect {
        Rect::new(self.left(), self.top(), self.width(), self.height())
    }
}

/// Centered/roaming viewport mode.
#[derive(Debug, Default)]
struct RoamState {
    roaming: bool,
    /// Clock time of the last manipulation, milliseconds.
    last_manipulation: u64,
}

/// Render patches accumulated by `update_state`.
#[derive(Default)]
struct FrameState {
    patches: Vec<MapPatch>,
    marker: Option<MarkerPatch>,
}

/// The moving-map gauge.
pub struct MapGauge<C: Clock + Clone = SystemClock> {
    width: i32,
    height: i32,
    level: u8,
    world_x: i32,
    world_y: i32,
    marker: Marker,
    roam: RoamState,
    cache: TileCache<C>,
    base_providers: Vec<Box<dyn MapProvider>>,
    overlays: Vec<Box<dyn MapProvider>>,
    route_overlay: RouteProvider,
    state: FrameState,
    dirty: bool,
    clock: C,
    metrics: Arc<MapMetrics>,
}

impl MapGauge<SystemClock> {
    /// Creates a gauge of the given pixel size on the system clock.
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_clock(width, height, SystemClock::new())
    }
}

impl<C: Clock + Clone> MapGauge<C> {
    /// Creates a gauge with an injected clock.
    ///
    /// The tile cache holds four viewports' worth of tiles (worst case
    /// is the viewport centered on the junction of four tiles), with a
    /// floor of one viewport smaller than a single tile.
    pub fn with_clock(width: u32, height: u32, clock: C) -> Self {
        let tiles_x = (width / TILE_SIZE).max(1) as usize;
        let tiles_y = (height / TILE_SIZE).max(1) as usize;
        let cache_tiles = tiles_x * tiles_y * 4;

        Self {
            width: width as i32,
            height: height as i32,
            level: 0,
            world_x: 0,
            world_y: 0,
            marker: Marker::new(Marker::default_sprite()),
            roam: RoamState::default(),
            cache: TileCache::new(cache_tiles, clock.clone()),
            base_providers: Vec::new(),
            overlays: Vec::new(),
            route_overlay: RouteProvider::new(),
            state: FrameState::default(),
            dirty: true,
            clock,
            metrics: Arc::new(MapMetrics::new()),
        }
    }

    /// Replaces the marker sprite.
    pub fn set_marker_sprite(&mut self, sprite: RgbaImage) {
        self.marker.sprite = sprite;
        self.dirty = true;
    }

    /// Shares a metrics instance with the rest of the application.
    pub fn set_metrics(&mut self, metrics: Arc<MapMetrics>) {
        self.metrics = metrics;
    }

    /// Registers a ground-tile provider; the list stays sorted
    /// ascending by priority (stable for ties).
    pub fn add_base_provider(&mut self, provider: Box<dyn MapProvider>) {
        self.base_providers.push(provider);
        sort_by_priority(&mut self.base_providers);
        self.dirty = true;
    }

    /// Registers an overlay provider, composited over the base tile in
    /// priority order.
    pub fn add_overlay(&mut self, provider: Box<dyn MapProvider>) {
        self.overlays.push(provider);
        sort_by_priority(&mut self.overlays);
        self.dirty = true;
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn viewport_origin(&self) -> (i32, i32) {
        (self.world_x, self.world_y)
    }

    pub fn marker(&self) -> &Marker {
        &self.marker
    }

    pub fn is_roaming(&self) -> bool {
        self.roam.roaming
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn metrics(&self) -> &Arc<MapMetrics> {
        &self.metrics
    }

    /// Patches accumulated by the last `update_state`.
    pub fn patches(&self) -> &[MapPatch] {
        &self.state.patches
    }

    /// Marker patch of the last `update_state`, `None` when the marker
    /// is outside the viewport.
    pub fn marker_patch(&self) -> Option<MarkerPatch> {
        self.state.marker
    }

    fn viewport(&self) -> Rect {
        Rect::new(self.world_x, self.world_y, self.width, self.height)
    }

    /// Switches the zoom level, preserving the apparent geographic
    /// area: the viewport origin and the marker are carried across
    /// levels through a geo round trip.
    ///
    /// Returns false for levels above [`MAX_GAUGE_LEVEL`].
    pub fn set_level(&mut self, level: u8) -> bool {
        if level > MAX_GAUGE_LEVEL {
            return false;
        }
        if level != self.level {
            let origin = pixel_to_geo(self.world_x as u32, self.world_y as u32, self.level);
            let new_origin = geo_to_pixel(origin.latitude, origin.longitude, level);
            let marker_geo = pixel_to_geo(self.marker.x as u32, self.marker.y as u32, self.level);

            self.level = level;
            self.set_viewport(new_origin.x as i32, new_origin.y as i32);
            self.set_marker_position(marker_geo.latitude, marker_geo.longitude);
            self.dirty = true;
        }
        true
    }

    /// Moves the marker to a geographic position.
    ///
    /// Expired roaming is resolved first: once the manipulation timeout
    /// has passed, the gauge leaves roaming and recenters. While not
    /// roaming, the viewport follows the marker.
    pub fn set_marker_position(&mut self, latitude: f64, longitude: f64) {
        if self.roam.roaming
            && self.clock.now_ms() - self.roam.last_manipulation > MANIPULATE_TIMEOUT_MS
        {
            self.roam.roaming = false;
            self.center_on_marker();
        }

        let p = geo_to_pixel(latitude, longitude, self.level);
        let (x, y) = (p.x as i32, p.y as i32);
        if x != self.marker.x || y != self.marker.y {
            self.marker.x = x;
            self.marker.y = y;
            if !self.roam.roaming {
                self.follow_marker();
            }
            self.dirty = true;
        }
    }

    /// Turns the marker; out-of-range headings are clamped to 0..=360.
    pub fn set_marker_heading(&mut self, heading: f32) {
        let heading = heading.clamp(0.0, 360.0);
        if heading != self.marker.heading {
            self.marker.heading = heading;
            self.dirty = true;
        }
    }

    /// Moves the viewport by a relative offset and enters roaming mode
    /// for the next [`MANIPULATE_TIMEOUT_MS`].
    pub fn manipulate_viewport(&mut self, dx: i32, dy: i32) {
        self.roam.last_manipulation = self.clock.now_ms();
        self.roam.roaming = true;
        self.set_viewport(self.world_x + dx, self.world_y + dy);
    }

    /// Re-ties the viewport to the marker, marker in the center.
    pub fn center_on_marker(&mut self) {
        self.set_viewport(
            self.marker.x - self.width / 2,
            self.marker.y - self.height / 2,
        );
    }

    /// Scrolls the viewport after a marker move: recenters when the
    /// marker left the viewport entirely or came within [`PIX_LIMIT`]
    /// pixels of any edge.
    fn follow_marker(&mut self) {
        let marker_box = self.marker.world_box();
        if self.viewport().intersection(&marker_box).is_none() {
            self.center_on_marker();
            return;
        }
        if marker_box.x <= self.world_x + PIX_LIMIT
            || marker_box.x + marker_box.w >= self.world_x + self.width - PIX_LIMIT
            || marker_box.y <= self.world_y + PIX_LIMIT
            || marker_box.y + marker_box.h >= self.world_y + self.height - PIX_LIMIT
        {
            self.center_on_marker();
        }
    }

    /// Moves the viewport origin to an absolute world position, clamped
    /// to `[0, map_size(level) - size]` on both axes.
    ///
    /// Returns true when the origin actually changed.
    pub fn set_viewport(&mut self, x: i32, y: i32) -> bool {
        let size = map_size(self.level) as i64;
        let max_x = (size - self.width as i64).max(0) as i32;
        let max_y = (size - self.height as i64).max(0) as i32;
        let x = x.clamp(0, max_x);
        let y = y.clamp(0, max_y);

        if x == self.world_x && y == self.world_y {
            return false;
        }
        self.world_x = x;
        self.world_y = y;
        self.dirty = true;
        true
    }

    /// Event adapter: aircraft position changed.
    pub fn location_changed(&mut self, latitude: f64, longitude: f64) {
        self.set_marker_position(latitude, longitude);
    }

    /// Event adapter: aircraft heading changed.
    pub fn attitude_changed(&mut self, heading: f32) {
        self.set_marker_heading(heading);
    }

    /// Event adapter: flight route changed.
    ///
    /// Cached tiles may contain the previous route composited in, so
    /// the whole cache is dropped.
    pub fn route_changed(&mut self, from: GeoPoint, to: GeoPoint) {
        self.route_overlay.set_route(from, to);
        self.cache.clear();
        self.dirty = true;
    }

    /// Resolves one tile: cache, then base providers in priority order
    /// (first hit wins; a negative-priority hit skips the overlays),
    /// then overlay and route compositing, then cache insertion.
    fn resolve_tile(&mut self, key: TileKey) -> Option<Arc<Tile>> {
        if let Some(tile) = self.cache.get(key) {
            return Some(tile);
        }

        let mut base = None;
        let mut skip_overlays = false;
        for provider in &mut self.base_providers {
            if let Some(image) = provider.get_tile(key) {
                skip_overlays = provider.priority() < 0;
                base = Some(image);
                break;
            }
        }
        let mut image = base?;

        if !skip_overlays {
            for overlay in &mut self.overlays {
                if let Some(top) = overlay.get_tile(key) {
                    imageops::overlay(&mut image, &top, 0, 0);
                }
            }
            // The route always composites last, independent of overlay
            // priorities.
            if let Some(route) = self.route_overlay.get_tile(key) {
                imageops::overlay(&mut image, &route, 0, 0);
            }
        }

        let tile = Tile::shared(image);
        self.cache.add(tile.clone(), key);
        Some(tile)
    }

    /// Rebuilds the frame's render patches from the current viewport.
    pub fn update_state(&mut self) {
        let tile = TILE_SIZE as i32;
        let tl_x = self.world_x / tile;
        let tl_y = self.world_y / tile;
        let br_x = (self.world_x + self.width - 1) / tile;
        let br_y = (self.world_y + self.height - 1) / tile;

        self.state.patches.clear();
        let viewport = self.viewport();

        for tile_y in tl_y..=br_y {
            for tile_x in tl_x..=br_x {
                let key = TileKey::new(self.level, tile_x, tile_y);
                let Some(handle) = self.resolve_tile(key) else {
                    debug!(tile = %key, "no provider produced this tile");
                    self.metrics.tile_missing();
                    continue;
                };

                let tile_rect = Rect::new(tile_x * tile, tile_y * tile, tile, tile);
                let Some(overlap) = viewport.intersection(&tile_rect) else {
                    warn!(tile = %key, "resolved tile does not meet the viewport");
                    continue;
                };
                self.state.patches.push(MapPatch {
                    tile: handle,
                    // Tile-local source, viewport-local destination.
                    src: Rect::new(
                        overlap.x - tile_rect.x,
                        overlap.y - tile_rect.y,
                        overlap.w,
                        overlap.h,
                    ),
                    dst: Rect::new(
                        overlap.x - self.world_x,
                        overlap.y - self.world_y,
                        overlap.w,
                        overlap.h,
                    ),
                });
                self.metrics.tile_resolved();
            }
        }

        let marker_box = self.marker.world_box();
        self.state.marker = viewport.intersection(&marker_box).map(|overlap| MarkerPatch {
            src: Rect::new(
                overlap.x - marker_box.x,
                overlap.y - marker_box.y,
                overlap.w,
                overlap.h,
            ),
            dst: Rect::new(
                overlap.x - self.world_x,
                overlap.y - self.world_y,
                overlap.w,
                overlap.h,
            ),
        });

        self.metrics.frame();
        self.dirty = false;
    }

    /// Replays the accumulated patches: tiles, then the rotated marker
    /// sprite, then the gauge outline.
    pub fn render(&self, backend: &mut dyn RenderBackend) {
        for patch in &self.state.patches {
            backend.blit(&patch.tile, patch.src, patch.dst);
        }
        if let Some(marker) = &self.state.marker {
            backend.blit_rotated(
                &self.marker.sprite,
                marker.src,
                self.marker.heading,
                marker.dst,
            );
        }
        backend.draw_outline(OUTLINE_COLOR);
    }
}
