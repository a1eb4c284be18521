//! Map tile providers.
//!
//! A provider is a source of 256×256 tiles: a directory of pre-rendered
//! files with an optional network fallback ([`StaticFileProvider`]), or
//! a synthetic overlay such as the flight-route line ([`RouteProvider`]).
//!
//! Providers carry a signed priority (sorted ascending by the gauge) and
//! an optional list of tile-index areas restricting where they answer.
//! A provider with no registered areas answers for every tile.

mod config;
mod http;
mod route;
mod static_file;

pub use config::{ConfigError, ProviderConfig, UrlTemplate};
pub use http::{HttpClient, ReqwestClient};
pub use route::{LineStyle, RouteProvider};
pub use static_file::StaticFileProvider;

#[cfg(test)]
pub use http::tests::MockHttpClient;

use image::RgbaImage;
use thiserror::Error;

use crate::tile::TileKey;

/// Errors from tile retrieval.
///
/// None of these are fatal to the engine: the gauge logs them and
/// renders a gap for the affected grid cell.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level HTTP failure.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The server answered with a non-success status.
    #[error("HTTP {code} from {url}")]
    Status { code: u16, url: String },

    /// Reading or writing the on-disk tile store failed.
    #[error("tile store I/O: {0}")]
    Io(#[from] std::io::Error),

    /// The tile bytes could not be decoded as an image.
    #[error("tile decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// Inclusive tile-index bounding box restricting a provider to part of
/// one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProviderArea {
    pub level: u8,
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
}

impl ProviderArea {
    pub fn contains(&self, key: TileKey) -> bool {
        self.level == key.level
            && key.x >= self.left
            && key.x <= self.right
            && key.y >= self.top
            && key.y <= self.bottom
    }
}

/// A prioritized, area-restricted source of map tiles.
pub trait MapProvider {
    /// Sort key; base providers are queried in ascending order and a
    /// negative-priority match suppresses overlay compositing.
    fn priority(&self) -> i8;

    /// Registered area restrictions; empty means world-wide.
    fn areas(&self) -> &[ProviderArea];

    /// Whether this provider can answer for `key`.
    fn has_tile(&self, key: TileKey) -> bool {
        let areas = self.areas();
        areas.is_empty() || areas.iter().any(|a| a.contains(key))
    }

    /// Produces the tile image, or `None` when the provider has nothing
    /// for this key (out of area, not on disk, fetch failed, ...).
    ///
    /// Images are returned by value: the gauge composites overlays onto
    /// the base image before wrapping the result into a shared
    /// [`crate::tile::Tile`].
    fn get_tile(&mut self, key: TileKey) -> Option<RgbaImage>;
}

/// Sorts providers ascending by priority.
///
/// The sort is stable, so equal priorities keep their registration
/// order.
pub fn sort_by_priority(providers: &mut [Box<dyn MapProvider>]) {
    providers.sort_by_key(|p| p.priority());
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeProvider {
        priority: i8,
        areas: Vec<ProviderArea>,
    }

    impl MapProvider for FakeProvider {
        fn priority(&self) -> i8 {
            self.priority
        }

        fn areas(&self) -> &[ProviderArea] {
            &self.areas
        }

        fn get_tile(&mut self, key: TileKey) -> Option<RgbaImage> {
            self.has_tile(key).then(|| RgbaImage::new(1, 1))
        }
    }

    #[test]
    fn no_areas_means_worldwide() {
        let p = FakeProvider {
            priority: 0,
            areas: vec![],
        };
        assert!(p.has_tile(TileKey::new(9, 123, 456)));
    }

    #[test]
    fn area_restricts_by_level_and_box() {
        let p = FakeProvider {
            priority: 0,
            areas: vec![ProviderArea {
                level: 5,
                left: 0,
                right: 1,
                top: 0,
                bottom: 1,
            }],
        };
        assert!(p.has_tile(TileKey::new(5, 0, 0)));
        assert!(p.has_tile(TileKey::new(5, 1, 1)));
        assert!(!p.has_tile(TileKey::new(5, 2, 2)));
        // Same x/y at another level is outside too.
        assert!(!p.has_tile(TileKey::new(6, 0, 0)));
    }

    #[test]
    fn any_matching_area_suffices() {
        let p = FakeProvider {
            priority: 0,
            areas: vec![
                ProviderArea {
                    level: 5,
                    left: 0,
                    right: 1,
                    top: 0,
                    bottom: 1,
                },
                ProviderArea {
                    level: 5,
                    left: 10,
                    right: 12,
                    top: 10,
                    bottom: 12,
                },
            ],
        };
        assert!(p.has_tile(TileKey::new(5, 11, 11)));
        assert!(!p.has_tile(TileKey::new(5, 5, 5)));
    }

    #[test]
    fn out_of_area_returns_no_tile() {
        let mut p = FakeProvider {
            priority: 0,
            areas: vec![ProviderArea {
                level: 5,
                left: 0,
                right: 1,
                top: 0,
                bottom: 1,
            }],
        };
        assert!(p.get_tile(TileKey::new(5, 2, 2)).is_none());
        assert!(p.get_tile(TileKey::new(5, 1, 0)).is_some());
    }

    #[test]
    fn sort_is_ascending_and_stable() {
        fn boxed(priority: i8) -> Box<dyn MapProvider> {
            Box::new(FakeProvider {
                priority,
                areas: vec![],
            })
        }
        // Two priority-0 providers with distinguishable areas to track
        // their relative order.
        let first = Box::new(FakeProvider {
            priority: 0,
            areas: vec![ProviderArea {
                level: 1,
                ..Default::default()
            }],
        });
        let second = Box::new(FakeProvider {
            priority: 0,
            areas: vec![ProviderArea {
                level: 2,
                ..Default::default()
            }],
        });
        let mut providers: Vec<Box<dyn MapProvider>> = vec![boxed(5), first, second, boxed(-1)];
        sort_by_priority(&mut providers);

        let priorities: Vec<i8> = providers.iter().map(|p| p.priority()).collect();
        assert_eq!(priorities, vec![-1, 0, 0, 5]);
        assert_eq!(providers[1].areas()[0].level, 1);
        assert_eq!(providers[2].areas()[0].level, 2);
    }
}
