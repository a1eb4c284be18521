//! Provider-local `map.conf` parsing.
//!
//! The on-disk tile store of a [`super::StaticFileProvider`] may carry a
//! `map.conf` describing where the store came from and how far it
//! reaches:
//!
//! ```text
//! # OACI chart, France only
//! area: 10 514 531 353 367
//! src-tms: https://tiles.example.org/%LEVEL%/%TILE_X%/%TILE_Y%.jpg
//! ```
//!
//! Recognized directives are `area:` (zero or more, tile-index bounds
//! per level), `src:` and `src-tms:` (download URL template, the latter
//! with TMS Y-axis inversion). Malformed lines are logged and skipped;
//! the provider keeps running without the affected feature.

use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};

use super::ProviderArea;

/// A malformed `map.conf` line.
///
/// Never fatal: the offending line is skipped and the provider degrades
/// (no network fallback, or one area restriction fewer).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("area: expected 5 fields (level left right top bottom), got {0}")]
    AreaFieldCount(usize),

    #[error("area: {0:?} is not a number")]
    AreaNotANumber(String),

    #[error("url template is missing the {0} placeholder")]
    MissingPlaceholder(&'static str),

    #[error("empty url template")]
    EmptyTemplate,
}

/// A download URL template with `%LEVEL%`, `%TILE_X%`, `%TILE_Y%`
/// placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    base: String,
    tms: bool,
}

impl UrlTemplate {
    /// Validates and stores a template.
    ///
    /// `tms` selects TMS row numbering: the Y index is flipped to
    /// `(1 << level) - 1 - y` on expansion.
    pub fn parse(base: &str, tms: bool) -> Result<Self, ConfigError> {
        let base = base.trim();
        if base.is_empty() {
            return Err(ConfigError::EmptyTemplate);
        }
        for placeholder in ["%LEVEL%", "%TILE_X%", "%TILE_Y%"] {
            if !base.contains(placeholder) {
                return Err(ConfigError::MissingPlaceholder(placeholder));
            }
        }
        Ok(Self {
            base: base.to_string(),
            tms,
        })
    }

    /// Substitutes the placeholders for a concrete tile.
    ///
    /// Indices are zero-padded to the placeholder widths (level 7
    /// digits, x/y 8 digits), enough for the level-23 tile range.
    pub fn expand(&self, level: u8, x: i32, y: i32) -> String {
        let y = if self.tms {
            ((1i32 << level) - 1) - y
        } else {
            y
        };
        self.base
            .replace("%LEVEL%", &format!("{level:07}"))
            .replace("%TILE_X%", &format!("{x:08}"))
            .replace("%TILE_Y%", &format!("{y:08}"))
    }

    pub fn is_tms(&self) -> bool {
        self.tms
    }
}

/// Parsed contents of a provider's `map.conf`.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub areas: Vec<ProviderArea>,
    pub url: Option<UrlTemplate>,
}

impl ProviderConfig {
    /// Loads `<home>/map.conf`.
    ///
    /// A missing file is not an error: the provider simply has no area
    /// restriction and no network fallback.
    pub fn load(home: &Path) -> Self {
        let path = home.join("map.conf");
        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => {
                debug!(path = %path.display(), "no map.conf, provider runs unrestricted");
                return Self::default();
            }
        };
        Self::parse(&contents)
    }

    /// Parses `map.conf` text, skipping malformed lines with a warning.
    pub fn parse(contents: &str) -> Self {
        let mut config = Self::default();
        for (lineno, raw) in contents.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(rest) = line.strip_prefix("area:") {
                match parse_area(rest) {
                    Ok(area) => config.areas.push(area),
                    Err(e) => warn!(line = lineno + 1, error = %e, "skipping bad area line"),
                }
            } else if let Some(rest) = line.strip_prefix("src-tms:") {
                match UrlTemplate::parse(rest, true) {
                    Ok(url) => config.url = Some(url),
                    Err(e) => warn!(line = lineno + 1, error = %e, "skipping bad src-tms line"),
                }
            } else if let Some(rest) = line.strip_prefix("src:") {
                match UrlTemplate::parse(rest, false) {
                    Ok(url) => config.url = Some(url),
                    Err(e) => warn!(line = lineno + 1, error = %e, "skipping bad src line"),
                }
            } else {
                warn!(line = lineno + 1, content = line, "unrecognized map.conf directive");
            }
        }
        config
    }
}

fn parse_area(rest: &str) -> Result<ProviderArea, ConfigError> {
    let fields: Vec<&str> = rest.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(ConfigError::AreaFieldCount(fields.len()));
    }
    let num = |s: &str| -> Result<i32, ConfigError> {
        s.parse()
            .map_err(|_| ConfigError::AreaNotANumber(s.to_string()))
    };
    Ok(ProviderArea {
        level: num(fields[0])? as u8,
        left: num(fields[1])?,
        right: num(fields[2])?,
        top: num(fields[3])?,
        bottom: num(fields[4])?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_areas_and_src() {
        let config = ProviderConfig::parse(
            "# comment\n\
             area: 5 0 1 0 1\n\
             area: 6 0 3 0 3\n\
             src: http://example/%LEVEL%/%TILE_X%/%TILE_Y%.png\n",
        );
        assert_eq!(config.areas.len(), 2);
        assert_eq!(config.areas[0].level, 5);
        assert_eq!(config.areas[1].right, 3);
        let url = config.url.expect("src parsed");
        assert!(!url.is_tms());
    }

    #[test]
    fn src_tms_sets_flip() {
        let config =
            ProviderConfig::parse("src-tms: http://example/%LEVEL%/%TILE_X%/%TILE_Y%.jpg\n");
        assert!(config.url.expect("parsed").is_tms());
    }

    #[test]
    fn malformed_lines_are_skipped_not_fatal() {
        let config = ProviderConfig::parse(
            "area: 5 0 1 0\n\
             area: 5 a b c d\n\
             src: http://example/no-placeholders.png\n\
             area: 7 0 1 0 1\n",
        );
        // Only the well-formed area survives; the bad src leaves the
        // provider without a network fallback.
        assert_eq!(config.areas.len(), 1);
        assert_eq!(config.areas[0].level, 7);
        assert!(config.url.is_none());
    }

    #[test]
    fn template_requires_all_placeholders() {
        let err = UrlTemplate::parse("http://example/%LEVEL%/%TILE_X%.png", false).unwrap_err();
        assert_eq!(err, ConfigError::MissingPlaceholder("%TILE_Y%"));
    }

    #[test]
    fn expand_zero_pads() {
        let url =
            UrlTemplate::parse("http://example/%LEVEL%/%TILE_X%/%TILE_Y%.png", false).unwrap();
        assert_eq!(
            url.expand(3, 1, 2),
            "http://example/0000003/00000001/00000002.png"
        );
    }

    #[test]
    fn expand_tms_flips_y() {
        let url = UrlTemplate::parse("http://example/%LEVEL%/%TILE_X%/%TILE_Y%.png", true).unwrap();
        // At level 3 the grid is 8 tiles tall: row 2 becomes 5.
        assert_eq!(
            url.expand(3, 1, 2),
            "http://example/0000003/00000001/00000005.png"
        );
    }

    #[test]
    fn missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProviderConfig::load(dir.path());
        assert!(config.areas.is_empty());
        assert!(config.url.is_none());
    }
}
