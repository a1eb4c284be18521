//! Geographic ⇄ world-pixel coordinate conversion.
//!
//! The map at zoom level `L` is a square of `256 · 2^L` pixels in the
//! spherical (Web) Mercator projection. These functions convert between
//! geographic coordinates (latitude/longitude in degrees) and absolute
//! pixel positions on that square.
//!
//! All conversions clamp their inputs instead of rejecting them: a
//! latitude beyond the Mercator singularity is pinned to ±85.05112878°
//! and pixel positions are pinned to the map edge. Both directions are
//! deterministic pure functions.

use std::f64::consts::PI;

/// Southernmost latitude representable in Web Mercator.
pub const MIN_LAT: f64 = -85.051_128_78;

/// Northernmost latitude representable in Web Mercator.
pub const MAX_LAT: f64 = 85.051_128_78;

/// Westernmost longitude.
pub const MIN_LON: f64 = -180.0;

/// Easternmost longitude.
pub const MAX_LON: f64 = 180.0;

/// Highest zoom level the pixel math supports.
///
/// At level 23 the map is `256 · 2^23 = 2^31` pixels square, the largest
/// size whose coordinates still fit an unsigned 32-bit value.
pub const MAX_LEVEL: u8 = 23;

/// A position in geographic coordinates, degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// An absolute pixel position on the world map at some zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelCoord {
    pub x: u32,
    pub y: u32,
}

/// Returns the side length of the world map, in pixels, at `level`.
///
/// `level` must not exceed [`MAX_LEVEL`]; level 23 saturates the `u32`
/// range exactly (`2^31`).
#[inline]
pub fn map_size(level: u8) -> u32 {
    debug_assert!(level <= MAX_LEVEL);
    256u32 << level
}

/// Converts geographic coordinates to an absolute pixel position.
///
/// Latitude is clamped to ±85.05112878° and longitude to ±180° before
/// projection; the result is clamped to `[0, map_size(level) - 1]` on
/// both axes.
#[inline]
pub fn geo_to_pixel(latitude: f64, longitude: f64, level: u8) -> PixelCoord {
    let latitude = latitude.clamp(MIN_LAT, MAX_LAT);
    let longitude = longitude.clamp(MIN_LON, MAX_LON);

    let x = (longitude + 180.0) / 360.0;
    let sin_lat = (latitude * PI / 180.0).sin();
    let y = 0.5 - ((1.0 + sin_lat) / (1.0 - sin_lat)).ln() / (4.0 * PI);

    let size = map_size(level) as f64;
    PixelCoord {
        x: (x * size + 0.5).clamp(0.0, size - 1.0) as u32,
        y: (y * size + 0.5).clamp(0.0, size - 1.0) as u32,
    }
}

/// Converts an absolute pixel position back to geographic coordinates.
///
/// Inverse of [`geo_to_pixel`]. Pixel positions beyond the map edge are
/// clamped to it first.
#[inline]
pub fn pixel_to_geo(px: u32, py: u32, level: u8) -> GeoPoint {
    let size = map_size(level) as f64;
    let x = ((px as f64).clamp(0.0, size - 1.0) / size) - 0.5;
    let y = 0.5 - ((py as f64).clamp(0.0, size - 1.0) / size);

    GeoPoint {
        latitude: 90.0 - 360.0 * (-y * 2.0 * PI).exp().atan() / PI,
        longitude: 360.0 * x,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn map_size_doubles_per_level() {
        assert_eq!(map_size(0), 256);
        assert_eq!(map_size(1), 512);
        assert_eq!(map_size(15), 8_388_608);
    }

    #[test]
    fn map_size_saturates_u32_at_max_level() {
        // 256 * 2^23 = 2^31, the documented ceiling.
        assert_eq!(map_size(MAX_LEVEL), 1u32 << 31);
    }

    #[test]
    fn greenwich_equator_maps_to_center() {
        let p = geo_to_pixel(0.0, 0.0, 4);
        let mid = map_size(4) / 2;
        assert_eq!(p.x, mid);
        assert_eq!(p.y, mid);
    }

    #[test]
    fn out_of_range_inputs_are_clamped() {
        let north_pole = geo_to_pixel(90.0, 0.0, 6);
        let clamped = geo_to_pixel(MAX_LAT, 0.0, 6);
        assert_eq!(north_pole, clamped);
        assert_eq!(north_pole.y, 0);

        let dateline = geo_to_pixel(0.0, 400.0, 6);
        assert_eq!(dateline.x, map_size(6) - 1);
    }

    #[test]
    fn new_york_city_at_level_10() {
        // 40.7128°N, 74.0060°W
        let p = geo_to_pixel(40.7128, -74.0060, 10);
        // Known tile (10, 301, 385) → pixel range 77056..77312, 98560..98816
        assert_eq!(p.x / 256, 301);
        assert_eq!(p.y / 256, 385);
    }

    #[test]
    fn round_trip_hamburg() {
        let p = geo_to_pixel(53.5511, 9.9937, 12);
        let g = pixel_to_geo(p.x, p.y, 12);
        assert!((g.latitude - 53.5511).abs() < 1e-3);
        assert!((g.longitude - 9.9937).abs() < 1e-3);
    }

    proptest! {
        /// Round trip recovers the input within one pixel's angular
        /// resolution at that level.
        #[test]
        fn round_trip_within_one_pixel(
            lat in MIN_LAT..MAX_LAT,
            lon in MIN_LON..MAX_LON,
            level in 0u8..=15,
        ) {
            let p = geo_to_pixel(lat, lon, level);
            let g = pixel_to_geo(p.x, p.y, level);

            // One pixel of longitude at this level, in degrees.
            let lon_res = 360.0 / map_size(level) as f64;
            prop_assert!((g.longitude - lon).abs() <= lon_res);

            // Latitude resolution varies with latitude; bound it by the
            // local derivative of the inverse projection (one pixel up
            // and down from the projected position).
            let above = pixel_to_geo(p.x, p.y.saturating_sub(1), level);
            let below = pixel_to_geo(p.x, (p.y + 1).min(map_size(level) - 1), level);
            let lat_res = (above.latitude - below.latitude).abs();
            prop_assert!((g.latitude - lat).abs() <= lat_res.max(lon_res));
        }

        #[test]
        fn projection_stays_in_bounds(
            lat in -90.0f64..90.0,
            lon in -200.0f64..200.0,
            level in 0u8..=15,
        ) {
            let p = geo_to_pixel(lat, lon, level);
            prop_assert!(p.x < map_size(level));
            prop_assert!(p.y < map_size(level));
        }
    }
}
