//! efismap - moving-map engine for an electronic flight instrument
//! display.
//!
//! The engine renders a viewport onto a tiled Web Mercator raster map:
//! a bounded cache of composited tiles, prioritized and area-restricted
//! tile providers (local file stores with a blocking download fallback,
//! synthetic route overlays), and a viewport controller that either
//! follows the aircraft marker or roams freely under user control.
//!
//! The surrounding instrument panel (widgets, fonts, input handling) is
//! out of scope: data sources feed the gauge through three event
//! adapters (`location_changed`, `attitude_changed`, `route_changed`)
//! and the compositor consumes render patches through the
//! [`render::RenderBackend`] trait.
//!
//! # Example
//!
//! ```no_run
//! use efismap::gauge::MapGauge;
//! use efismap::provider::{ReqwestClient, StaticFileProvider};
//!
//! let client = ReqwestClient::new().expect("HTTP client");
//! let mut gauge = MapGauge::new(320, 240);
//! gauge.add_base_provider(Box::new(StaticFileProvider::new(
//!     "/var/maps/osm",
//!     "png",
//!     0,
//!     client,
//! )));
//! gauge.set_level(9);
//! gauge.location_changed(48.8566, 2.3522);
//! gauge.update_state();
//! ```

pub mod cache;
pub mod clock;
pub mod coord;
pub mod gauge;
pub mod provider;
pub mod render;
pub mod telemetry;
pub mod tile;
