//! Runtime configuration for tile fetching and plotting.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Tile server used when nothing else is configured.
pub const DEFAULT_TILE_URL: &str =
    "https://server.arcgisonline.com/ArcGIS/rest/services/World_Topo_Map/MapServer/tile/{z}/{y}/{x}";

/// Settings for a playback session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding downloaded tiles.
    pub cache_dir: PathBuf,

    /// Tile endpoint with `{z}`, `{y}` and `{x}` placeholders.
    pub tile_url_template: String,

    /// Side length of one tile in plot pixels.
    pub tile_size: u32,

    /// Extra tiles fetched around the track bounds on every side.
    pub tile_margin: u32,

    /// Per-request timeout for tile downloads.
    pub fetch_timeout_secs: u64,

    /// Upper bound on tile downloads in flight.
    pub max_concurrent_fetches: usize,

    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("./image_cache"),
            tile_url_template: DEFAULT_TILE_URL.to_string(),
            tile_size: 50,
            tile_margin: 1,
            fetch_timeout_secs: 30,
            max_concurrent_fetches: 8,
            user_agent: concat!("trackplay/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Config {
    /// Defaults overlaid with `TRACKPLAY_*` environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("TRACKPLAY_CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Ok(url) = std::env::var("TRACKPLAY_TILE_URL") {
            config.tile_url_template = url;
        }
        if let Ok(size) = std::env::var("TRACKPLAY_TILE_SIZE") {
            config.tile_size = size
                .parse()
                .map_err(|_| AppError::Config(format!("TRACKPLAY_TILE_SIZE={size}")))?;
        }
        if let Ok(secs) = std::env::var("TRACKPLAY_FETCH_TIMEOUT") {
            config.fetch_timeout_secs = secs
                .parse()
                .map_err(|_| AppError::Config(format!("TRACKPLAY_FETCH_TIMEOUT={secs}")))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON document; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> Result<Self, AppError> {
        let config: Config =
            serde_json::from_str(data).map_err(|e| AppError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.tile_size == 0 {
            return Err(AppError::Config("tile_size must be positive".to_string()));
        }
        if self.max_concurrent_fetches == 0 {
            return Err(AppError::Config(
                "max_concurrent_fetches must be positive".to_string(),
            ));
        }
        for placeholder in ["{z}", "{y}", "{x}"] {
            if !self.tile_url_template.contains(placeholder) {
                return Err(AppError::Config(format!(
                    "tile_url_template is missing {placeholder}"
                )));
            }
        }
        Ok(())
    }
}
