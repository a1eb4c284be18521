//! Synthetic overlay provider drawing the flight route.
//!
//! Given a from/to geo pair, this provider answers only for the tiles
//! the segment can touch and renders each of them as a transparent
//! 256×256 overlay with an antialiased line. The endpoints are
//! projected into world-pixel space lazily and re-projected only when
//! the requested zoom level changes or the route is reset.

use image::{Rgba, RgbaImage};

use super::{MapProvider, ProviderArea};
use crate::coord::{geo_to_pixel, GeoPoint, PixelCoord};
use crate::tile::{TileKey, TILE_SIZE};

/// Route overlays composite above every other overlay regardless of
/// this value; it only matters if a route provider is ever registered
/// as an ordinary overlay.
const ROUTE_PRIORITY: i8 = 10;

/// Color and half-width of the route line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineStyle {
    pub color: Rgba<u8>,
    pub radius: f32,
}

impl Default for LineStyle {
    fn default() -> Self {
        Self {
            color: Rgba([255, 0, 0, 255]),
            radius: 2.0,
        }
    }
}

/// World-pixel projection of the route at one zoom level.
struct ProjectedRoute {
    level: u8,
    from: PixelCoord,
    to: PixelCoord,
}

/// Overlay provider rendering the from/to route segment.
pub struct RouteProvider {
    route: Option<(GeoPoint, GeoPoint)>,
    projected: Option<ProjectedRoute>,
    /// Single bounding-box area, rebuilt with the projection.
    area: [ProviderArea; 1],
    style: LineStyle,
}

impl Default for RouteProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteProvider {
    pub fn new() -> Self {
        Self {
            route: None,
            projected: None,
            area: [ProviderArea::default()],
            style: LineStyle::default(),
        }
    }

    pub fn with_style(mut self, style: LineStyle) -> Self {
        self.style = style;
        self
    }

    /// Sets the route endpoints and invalidates the cached projection.
    ///
    /// Callers must also clear the gauge's tile cache: already
    /// composited tiles may carry the previous route.
    pub fn set_route(&mut self, from: GeoPoint, to: GeoPoint) {
        self.route = Some((from, to));
        self.projected = None;
    }

    /// Drops the route; the provider answers for no tile.
    pub fn clear_route(&mut self) {
        self.route = None;
        self.projected = None;
    }

    pub fn has_route(&self) -> bool {
        self.route.is_some()
    }

    /// Projects the endpoints for `level` and rebuilds the area to the
    /// tile bounding box of the segment.
    fn project_for(&mut self, level: u8) {
        let Some((from, to)) = self.route else {
            return;
        };
        let from = geo_to_pixel(from.latitude, from.longitude, level);
        let to = geo_to_pixel(to.latitude, to.longitude, level);
        let tile = |v: u32| (v / TILE_SIZE) as i32;
        self.area[0] = ProviderArea {
            level,
            left: tile(from.x.min(to.x)),
            right: tile(from.x.max(to.x)),
            top: tile(from.y.min(to.y)),
            bottom: tile(from.y.max(to.y)),
        };
        self.projected = Some(ProjectedRoute { level, from, to });
    }

    /// Renders the segment portion crossing tile (`tx`, `ty`).
    fn render_tile(&self, projected: &ProjectedRoute, tx: i32, ty: i32) -> RgbaImage {
        let mut image = RgbaImage::new(TILE_SIZE, TILE_SIZE);

        let (ax, ay) = (projected.from.x as f32, projected.from.y as f32);
        let (bx, by) = (projected.to.x as f32, projected.to.y as f32);
        let radius = self.style.radius;
        let Rgba([r, g, b, _]) = self.style.color;

        // Tile n spans world pixels [n*256, n*256 + 255]; pad by the
        // line radius so strokes crossing the edge render fully.
        let origin_x = tx * TILE_SIZE as i32;
        let origin_y = ty * TILE_SIZE as i32;
        let pad = radius.ceil() as i32;

        for y in -pad..TILE_SIZE as i32 + pad {
            for x in -pad..TILE_SIZE as i32 + pad {
                let wx = (origin_x + x) as f32;
                let wy = (origin_y + y) as f32;
                let d = capsule_sdf(wx, wy, ax, ay, bx, by, radius);
                // ±0.5 px smoothing window around the capsule edge.
                let alpha = (0.5 - d).clamp(0.0, 1.0);
                if alpha <= 0.0 {
                    continue;
                }
                if x < 0 || y < 0 || x >= TILE_SIZE as i32 || y >= TILE_SIZE as i32 {
                    continue;
                }
                image.put_pixel(
                    x as u32,
                    y as u32,
                    Rgba([r, g, b, (alpha * 255.0) as u8]),
                );
            }
        }
        image
    }
}

/// Signed distance from (`px`, `py`) to the capsule of radius `r`
/// around segment (`ax`, `ay`)–(`bx`, `by`).
///
/// Line drawing adapted from <https://github.com/miloyip/line>.
fn capsule_sdf(px: f32, py: f32, ax: f32, ay: f32, bx: f32, by: f32, r: f32) -> f32 {
    let (pax, pay) = (px - ax, py - ay);
    let (bax, bay) = (bx - ax, by - ay);
    let len_sq = bax * bax + bay * bay;
    let h = if len_sq > 0.0 {
        ((pax * bax + pay * bay) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (dx, dy) = (pax - bax * h, pay - bay * h);
    (dx * dx + dy * dy).sqrt() - r
}

impl MapProvider for RouteProvider {
    fn priority(&self) -> i8 {
        ROUTE_PRIORITY
    }

    fn areas(&self) -> &[ProviderArea] {
        if self.projected.is_some() {
            &self.area
        } else {
            // No projection yet: expose no area so has_tile's
            // "no areas means worldwide" default does not apply.
            &self.area[..0]
        }
    }

    fn has_tile(&self, key: TileKey) -> bool {
        self.projected.is_some() && self.area[0].contains(key)
    }

    fn get_tile(&mut self, key: TileKey) -> Option<RgbaImage> {
        self.route?;

        if self
            .projected
            .as_ref()
            .map_or(true, |p| p.level != key.level)
        {
            self.project_for(key.level);
        }
        if !self.has_tile(key) {
            return None;
        }
        let projected = self.projected.take()?;
        let image = self.render_tile(&projected, key.x, key.y);
        self.projected = Some(projected);
        Some(image)
    }
}
