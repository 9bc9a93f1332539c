//! Remote tile sources.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::{config::Config, errors::AppError, geo_math::TileIndex};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Tile server responded with status {0}")]
    Status(u16),
    #[error("Image decode error: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Unsupported image format")]
    UnsupportedFormat,
    #[error("Tile store error: {0}")]
    Store(#[from] object_store::Error),
}

/// Anything that can download the raw bytes of a tile.
///
/// Implementations must not retry on their own; a failure is reported once
/// and the caller decides what to do.
#[async_trait]
pub trait TileFetcher: Send + Sync {
    async fn fetch(&self, tile: TileIndex, zoom: u8) -> Result<Bytes, FetchError>;
}

/// Fetches tiles over HTTP from a `{z}/{y}/{x}` URL template.
#[derive(Debug, Clone)]
pub struct HttpTileSource {
    client: reqwest::Client,
    url_template: String,
}

impl HttpTileSource {
    pub fn new(
        url_template: impl Into<String>,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url_template: url_template.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(
            config.tile_url_template.clone(),
            config.fetch_timeout(),
            &config.user_agent,
        )
    }

    pub fn tile_url(&self, tile: TileIndex, zoom: u8) -> String {
        self.url_template
            .replace("{z}", &zoom.to_string())
            .replace("{y}", &tile.y.to_string())
            .replace("{x}", &tile.x.to_string())
    }
}

#[async_trait]
impl TileFetcher for HttpTileSource {
    async fn fetch(&self, tile: TileIndex, zoom: u8) -> Result<Bytes, FetchError> {
        let url = self.tile_url(tile, zoom);
        tracing::debug!("Fetching tile {tile} from {url}");

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        Ok(response.bytes().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_url_template() {
        let source = HttpTileSource::new(
            "https://tiles.example/{z}/{y}/{x}",
            Duration::from_secs(5),
            "test",
        )
        .unwrap();

        assert_eq!(
            source.tile_url(TileIndex::new(65492, 43587), 17),
            "https://tiles.example/17/43587/65492"
        );
    }

    #[test]
    fn test_from_default_config() {
        let source = HttpTileSource::from_config(&Config::default()).unwrap();
        let url = source.tile_url(TileIndex::new(1, 2), 17);
        assert!(url.ends_with("/MapServer/tile/17/2/1"));
    }
}
