//! efismap CLI - headless harness for the moving-map engine.
//!
//! Runs a short scripted flight over a tile store and reports what the
//! gauge would draw each frame. Useful for checking a tile store's
//! `map.conf`, priming the on-disk cache over the network, and watching
//! the engine's telemetry without an instrument panel attached.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use efismap::coord::GeoPoint;
use efismap::gauge::MapGauge;
use efismap::provider::{ReqwestClient, StaticFileProvider};
use efismap::render::{Rect, RenderBackend};
use efismap::tile::TileHandle;

#[derive(Parser, Debug)]
#[command(name = "efismap", version, about = "Moving-map engine harness")]
struct Args {
    /// Tile store root (defaults to ~/.local/share/efismap/maps/osm)
    #[arg(long)]
    maps_home: Option<PathBuf>,

    /// Tile file extension inside the store
    #[arg(long, default_value = "png")]
    format: String,

    /// Gauge width in pixels
    #[arg(long, default_value_t = 320)]
    width: u32,

    /// Gauge height in pixels
    #[arg(long, default_value_t = 240)]
    height: u32,

    /// Zoom level (0-15)
    #[arg(long, default_value_t = 9)]
    level: u8,

    /// Flight start, "lat,lon"
    #[arg(long, default_value = "48.8566,2.3522")]
    from: String,

    /// Flight end, "lat,lon"
    #[arg(long, default_value = "50.0379,8.5622")]
    to: String,

    /// Number of simulated frames along the route
    #[arg(long, default_value_t = 20)]
    frames: u32,

    /// Verbose logging (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Render backend that narrates blits instead of drawing them.
#[derive(Default)]
struct LogBackend {
    blits: usize,
}

impl RenderBackend for LogBackend {
    fn blit(&mut self, tile: &TileHandle, src: Rect, dst: Rect) {
        self.blits += 1;
        debug!(tile = tile.id(), ?src, ?dst, "blit");
    }

    fn blit_rotated(
        &mut self,
        _sprite: &image::RgbaImage,
        _src: Rect,
        angle_deg: f32,
        dst: Rect,
    ) {
        debug!(heading = angle_deg, ?dst, "marker");
    }

    fn draw_outline(&mut self, _color: image::Rgba<u8>) {}
}

fn parse_geo(s: &str) -> Result<GeoPoint, String> {
    let (lat, lon) = s
        .split_once(',')
        .ok_or_else(|| format!("expected lat,lon, got {s:?}"))?;
    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|e| format!("bad latitude {lat:?}: {e}"))?;
    let lon: f64 = lon
        .trim()
        .parse()
        .map_err(|e| format!("bad longitude {lon:?}: {e}"))?;
    Ok(GeoPoint::new(lat, lon))
}

fn default_maps_home() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("efismap")
        .join("maps")
        .join("osm")
}

fn run(args: Args) -> Result<(), String> {
    let from = parse_geo(&args.from)?;
    let to = parse_geo(&args.to)?;
    let home = args.maps_home.unwrap_or_else(default_maps_home);
    info!(home = %home.display(), level = args.level, "starting moving-map harness");

    let client = ReqwestClient::new().map_err(|e| e.to_string())?;
    let mut gauge = MapGauge::new(args.width, args.height);
    let metrics = std::sync::Arc::clone(gauge.metrics());
    gauge.add_base_provider(Box::new(
        StaticFileProvider::new(&home, &args.format, 0, client)
            .with_metrics(std::sync::Arc::clone(&metrics)),
    ));
    if !gauge.set_level(args.level) {
        return Err(format!("zoom level {} is out of range (0-15)", args.level));
    }

    gauge.route_changed(from, to);

    let mut backend = LogBackend::default();
    let steps = args.frames.max(1);
    for frame in 0..=steps {
        let t = frame as f64 / steps as f64;
        let lat = from.latitude + (to.latitude - from.latitude) * t;
        let lon = from.longitude + (to.longitude - from.longitude) * t;
        let heading =
            (to.longitude - from.longitude).atan2(to.latitude - from.latitude).to_degrees();

        gauge.location_changed(lat, lon);
        gauge.attitude_changed(heading.rem_euclid(360.0) as f32);
        gauge.update_state();
        gauge.render(&mut backend);

        info!(
            frame,
            lat = format!("{lat:.4}"),
            lon = format!("{lon:.4}"),
            patches = gauge.patches().len(),
            marker_visible = gauge.marker_patch().is_some(),
            "frame"
        );
        if gauge.patches().is_empty() {
            warn!(frame, "no tiles available for this viewport");
        }
    }

    info!(telemetry = %metrics.snapshot(), "flight complete");
    let stats = gauge.cache_stats();
    info!(
        hits = stats.hits,
        misses = stats.misses,
        evictions = stats.evictions,
        "tile cache"
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    let default_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
