//! Tile provider backed by an on-disk tile store.
//!
//! Tiles live under `home/<level>/<x>/<y>.<format>`. When a tile is not
//! on disk and `home/map.conf` configures a `src:`/`src-tms:` URL
//! template, the provider performs a blocking HTTP GET, persists the
//! body at the tile path, and decodes it. A failed download leaves no
//! partial file (the body is only written after a successful fetch) and
//! puts the key into a retry backoff so a persistently missing tile is
//! not re-requested every frame it is visible.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbaImage;
use tracing::{debug, info, trace, warn};

use super::{HttpClient, MapProvider, ProviderArea, ProviderConfig, ProviderError};
use crate::telemetry::MapMetrics;
use crate::tile::TileKey;

/// How long a failed fetch keeps its key off the network.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(30);

/// Provider reading tiles from a local directory tree, with an optional
/// blocking download-and-persist fallback.
pub struct StaticFileProvider<C: HttpClient> {
    home: PathBuf,
    format: String,
    priority: i8,
    config: ProviderConfig,
    http_client: C,
    retry_backoff: Duration,
    /// Keys whose last fetch failed, with the failure time.
    failed: HashMap<TileKey, Instant>,
    metrics: Arc<MapMetrics>,
}

impl<C: HttpClient> StaticFileProvider<C> {
    /// Creates a provider rooted at `home`, reading `home/map.conf` for
    /// area restrictions and a download template.
    ///
    /// `format` is the tile file extension (`png`, `jpg`, ...).
    pub fn new(home: impl Into<PathBuf>, format: &str, priority: i8, http_client: C) -> Self {
        let home = home.into();
        let config = ProviderConfig::load(&home);
        if let Some(url) = &config.url {
            info!(home = %home.display(), tms = url.is_tms(), "tile store has download fallback");
        }
        Self {
            home,
            format: format.to_string(),
            priority,
            config,
            http_client,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            failed: HashMap::new(),
            metrics: Arc::new(MapMetrics::new()),
        }
    }

    /// Overrides the fetch-failure backoff.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Records fetch activity into a shared metrics instance.
    pub fn with_metrics(mut self, metrics: Arc<MapMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Path of one tile inside the store.
    fn tile_path(&self, key: TileKey) -> PathBuf {
        self.home
            .join(key.level.to_string())
            .join(key.x.to_string())
            .join(format!("{}.{}", key.y, self.format))
    }

    fn in_backoff(&self, key: TileKey) -> bool {
        self.failed
            .get(&key)
            .is_some_and(|failed_at| failed_at.elapsed() < self.retry_backoff)
    }

    /// Downloads the tile body and persists it at `path`.
    fn fetch_to_disk(&self, url: &str, path: &Path) -> Result<(), ProviderError> {
        let body = self.http_client.get(url)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, body)?;
        Ok(())
    }

    fn decode(&self, path: &Path) -> Result<RgbaImage, ProviderError> {
        Ok(image::open(path)?.to_rgba8())
    }
}

impl<C: HttpClient> MapProvider for StaticFileProvider<C> {
    fn priority(&self) -> i8 {
        self.priority
    }

    fn areas(&self) -> &[ProviderArea] {
        &self.config.areas
    }

    fn get_tile(&mut self, key: TileKey) -> Option<RgbaImage> {
        if !self.has_tile(key) {
            return None;
        }

        let path = self.tile_path(key);
        if !path.exists() {
            let Some(template) = &self.config.url else {
                trace!(tile = %key, "not on disk, no download fallback");
                return None;
            };
            if self.in_backoff(key) {
                debug!(tile = %key, "fetch suppressed by retry backoff");
                return None;
            }
            let url = template.expand(key.level, key.x, key.y);
            if let Err(e) = self.fetch_to_disk(&url, &path) {
                warn!(tile = %key, url, error = %e, "tile fetch failed");
                self.failed.insert(key, Instant::now());
                self.metrics.fetch_failed();
                return None;
            }
            self.failed.remove(&key);
            self.metrics.tile_fetched();
            debug!(tile = %key, path = %path.display(), "tile fetched and persisted");
        }

        match self.decode(&path) {
            Ok(image) => Some(image),
            Err(e) => {
                warn!(tile = %key, path = %path.display(), error = %e, "tile decode failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockHttpClient;
    use image::Rgba;
    use std::io::Cursor;
    use std::rc::Rc;

    fn tiny_png() -> Vec<u8> {
        let img = RgbaImage::from_pixel(1, 1, Rgba([10, 20, 30, 255]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn write_conf(home: &Path, contents: &str) {
        fs::write(home.join("map.conf"), contents).unwrap();
    }

    #[test]
    fn tile_path_is_home_level_x_y_ext() {
        let provider =
            StaticFileProvider::new("/maps/osm", "png", 0, MockHttpClient::not_found());
        assert_eq!(
            provider.tile_path(TileKey::new(3, 1, 2)),
            PathBuf::from("/maps/osm/3/1/2.png")
        );
    }

    #[test]
    fn missing_tile_without_template_is_absent() {
        let home = tempfile::tempdir().unwrap();
        let mut provider =
            StaticFileProvider::new(home.path(), "png", 0, MockHttpClient::not_found());
        assert!(provider.get_tile(TileKey::new(3, 1, 1)).is_none());
    }

    #[test]
    fn reads_tile_from_disk() {
        let home = tempfile::tempdir().unwrap();
        let dir = home.path().join("4").join("7");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("9.png"), tiny_png()).unwrap();

        let mut provider =
            StaticFileProvider::new(home.path(), "png", 0, MockHttpClient::not_found());
        let tile = provider.get_tile(TileKey::new(4, 7, 9)).expect("on disk");
        assert_eq!(tile.width(), 1);
    }

    #[test]
    fn fetches_persists_then_serves_from_disk() {
        let home = tempfile::tempdir().unwrap();
        write_conf(
            home.path(),
            "src: http://example/%LEVEL%/%TILE_X%/%TILE_Y%.png\n",
        );
        let client = Rc::new(MockHttpClient::ok(tiny_png()));
        let mut provider =
            StaticFileProvider::new(home.path(), "png", 0, Rc::clone(&client));

        let key = TileKey::new(3, 1, 1);
        assert!(provider.get_tile(key).is_some());
        assert_eq!(client.calls(), 1);
        assert!(home.path().join("3/1/1.png").exists());

        // Second request is served from disk, no further network call.
        assert!(provider.get_tile(key).is_some());
        assert_eq!(client.calls(), 1);
    }

    #[test]
    fn failed_fetch_writes_nothing_and_backs_off() {
        let home = tempfile::tempdir().unwrap();
        write_conf(
            home.path(),
            "src: http://example/%LEVEL%/%TILE_X%/%TILE_Y%.png\n",
        );
        let client = Rc::new(MockHttpClient::not_found());
        let mut provider =
            StaticFileProvider::new(home.path(), "png", 0, Rc::clone(&client));

        let key = TileKey::new(3, 1, 1);
        assert!(provider.get_tile(key).is_none());
        assert!(!home.path().join("3/1/1.png").exists());
        assert_eq!(client.calls(), 1);

        // Within the backoff window the key stays off the network.
        assert!(provider.get_tile(key).is_none());
        assert_eq!(client.calls(), 1);
    }

    #[test]
    fn zero_backoff_retries_immediately() {
        let home = tempfile::tempdir().unwrap();
        write_conf(
            home.path(),
            "src: http://example/%LEVEL%/%TILE_X%/%TILE_Y%.png\n",
        );
        let client = Rc::new(MockHttpClient::not_found());
        let mut provider = StaticFileProvider::new(home.path(), "png", 0, Rc::clone(&client))
            .with_retry_backoff(Duration::ZERO);

        let key = TileKey::new(3, 1, 1);
        assert!(provider.get_tile(key).is_none());
        assert!(provider.get_tile(key).is_none());
        assert_eq!(client.calls(), 2);
    }

    #[test]
    fn area_restriction_from_config_is_honored() {
        let home = tempfile::tempdir().unwrap();
        write_conf(
            home.path(),
            "area: 5 0 1 0 1\n\
             src: http://example/%LEVEL%/%TILE_X%/%TILE_Y%.png\n",
        );
        let client = Rc::new(MockHttpClient::ok(tiny_png()));
        let mut provider =
            StaticFileProvider::new(home.path(), "png", 0, Rc::clone(&client));

        // Outside the box: absent, and no fetch is even attempted.
        assert!(provider.get_tile(TileKey::new(5, 2, 2)).is_none());
        assert_eq!(client.calls(), 0);

        assert!(provider.get_tile(TileKey::new(5, 1, 1)).is_some());
        assert_eq!(client.calls(), 1);
    }

    #[test]
    fn undecodable_file_is_absent_not_fatal() {
        let home = tempfile::tempdir().unwrap();
        let dir = home.path().join("2").join("0");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("0.png"), b"not a png").unwrap();

        let mut provider =
            StaticFileProvider::new(home.path(), "png", 0, MockHttpClient::not_found());
        assert!(provider.get_tile(TileKey::new(2, 0, 0)).is_none());
    }

    #[test]
    fn fetch_metrics_are_recorded() {
        let home = tempfile::tempdir().unwrap();
        write_conf(
            home.path(),
            "src: http://example/%LEVEL%/%TILE_X%/%TILE_Y%.png\n",
        );
        let metrics = Arc::new(MapMetrics::new());
        let mut provider =
            StaticFileProvider::new(home.path(), "png", 0, MockHttpClient::ok(tiny_png()))
                .with_metrics(Arc::clone(&metrics));

        provider.get_tile(TileKey::new(3, 1, 1));
        assert_eq!(metrics.snapshot().tile_fetches, 1);
    }
}
