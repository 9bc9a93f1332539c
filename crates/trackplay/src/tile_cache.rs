//! Disk-first tile lookup with fetch-and-persist on a miss.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::{StreamExt as _, TryStreamExt as _, stream};

use crate::{
    config::Config,
    errors::AppError,
    geo_math::{GeoBounds, TileIndex, TileRect, ZOOM},
    tile_image::TileImage,
    tile_source::{HttpTileSource, TileFetcher},
    tile_store::TileStore,
};

#[derive(Clone)]
pub struct TileCache {
    store: TileStore,
    fetcher: Arc<dyn TileFetcher>,
    zoom: u8,
    margin: u32,
    max_concurrent: usize,
}

impl TileCache {
    pub fn new(store: TileStore, fetcher: Arc<dyn TileFetcher>) -> Self {
        Self {
            store,
            fetcher,
            zoom: ZOOM,
            margin: 1,
            max_concurrent: 8,
        }
    }

    /// Local disk store under `cache_dir` and the configured HTTP source.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let store = TileStore::new_local(&config.cache_dir)?;
        let fetcher = HttpTileSource::from_config(config)?;

        Ok(Self::new(store, Arc::new(fetcher))
            .with_margin(config.tile_margin)
            .with_max_concurrent(config.max_concurrent_fetches))
    }

    pub fn with_margin(mut self, margin: u32) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn store(&self) -> &TileStore {
        &self.store
    }

    /// Returns the tile, serving it from disk when present. A downloaded
    /// tile is persisted before this returns, so repeating the call never
    /// touches the network again.
    pub async fn get(&self, tile: TileIndex, zoom: u8) -> Result<TileImage, AppError> {
        if let Some(image) = self
            .store
            .load(tile, zoom)
            .await
            .map_err(|e| AppError::fetch(tile, e))?
        {
            return Ok(image);
        }

        let bytes = self.fetcher.fetch(tile, zoom).await.map_err(|e| {
            tracing::warn!("Failed to fetch tile {tile}: {e}");
            AppError::fetch(tile, e)
        })?;

        let image = TileImage::decode(bytes).map_err(|e| {
            tracing::warn!("Tile {tile} is not a usable image: {e}");
            AppError::fetch(tile, e)
        })?;

        self.store
            .save(tile, zoom, &image)
            .await
            .map_err(|e| AppError::fetch(tile, e))?;

        Ok(image)
    }

    /// Tile rectangle covering `bounds` plus the configured margin.
    pub fn tiles_for_bounds(&self, bounds: &GeoBounds) -> Result<TileRect, AppError> {
        TileRect::for_bounds(bounds, self.zoom, self.margin)
    }

    /// Resolves every tile inside `bounds` that `skip` does not reject.
    ///
    /// Tiles are fetched concurrently, but the result is only returned once
    /// all of them are available. The first failure cancels the remaining
    /// downloads and is returned as is.
    pub async fn fetch_bounds(
        &self,
        bounds: &GeoBounds,
        skip: impl Fn(&TileIndex) -> bool,
    ) -> Result<BTreeMap<TileIndex, TileImage>, AppError> {
        let rect = self.tiles_for_bounds(bounds)?;
        let wanted: Vec<TileIndex> = rect.iter().filter(|tile| !skip(tile)).collect();

        tracing::debug!(
            "Resolving {} of {} tiles in {}x{} rectangle",
            wanted.len(),
            rect.columns() * rect.rows(),
            rect.columns(),
            rect.rows()
        );

        stream::iter(wanted)
            .map(|tile| async move { self.get(tile, self.zoom).await.map(|image| (tile, image)) })
            .buffer_unordered(self.max_concurrent)
            .try_collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile_source::FetchError;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::HashSet;
    use std::io::Cursor;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn png_bytes(tile: TileIndex) -> Bytes {
        let shade = ((tile.x + tile.y) % 256) as u8;
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([shade, 0, 0]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        Bytes::from(buf)
    }

    #[derive(Default)]
    struct FakeFetcher {
        calls: AtomicUsize,
        failing: HashSet<TileIndex>,
        garbage: HashSet<TileIndex>,
        seen: Mutex<Vec<TileIndex>>,
    }

    #[async_trait]
    impl TileFetcher for FakeFetcher {
        async fn fetch(&self, tile: TileIndex, _zoom: u8) -> Result<Bytes, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(tile);
            if self.failing.contains(&tile) {
                return Err(FetchError::Status(503));
            }
            if self.garbage.contains(&tile) {
                return Ok(Bytes::from_static(b"<html/>"));
            }
            Ok(png_bytes(tile))
        }
    }

    #[tokio::test]
    async fn test_get_fetches_once_then_serves_from_store() {
        let fetcher = Arc::new(FakeFetcher::default());
        let cache = TileCache::new(TileStore::in_memory(), fetcher.clone());
        let tile = TileIndex::new(10, 20);

        let first = cache.get(tile, ZOOM).await.unwrap();
        let second = cache.get(tile, ZOOM).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_reports_fetch_failure() {
        let tile = TileIndex::new(1, 1);
        let fetcher = Arc::new(FakeFetcher {
            failing: HashSet::from([tile]),
            ..Default::default()
        });
        let cache = TileCache::new(TileStore::in_memory(), fetcher.clone());

        let err = cache.get(tile, ZOOM).await.unwrap_err();
        assert!(err.is_fetch_failure());
        assert!(matches!(
            err,
            AppError::Fetch {
                source: FetchError::Status(503),
                ..
            }
        ));

        // Not retried internally and nothing cached
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(cache.store().load(tile, ZOOM).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_undecodable_tile_is_not_cached() {
        let tile = TileIndex::new(2, 2);
        let fetcher = Arc::new(FakeFetcher {
            garbage: HashSet::from([tile]),
            ..Default::default()
        });
        let cache = TileCache::new(TileStore::in_memory(), fetcher);

        let err = cache.get(tile, ZOOM).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Fetch {
                source: FetchError::Decode(_),
                ..
            }
        ));
        assert!(cache.store().load(tile, ZOOM).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_bounds_covers_rectangle() {
        let fetcher = Arc::new(FakeFetcher::default());
        let cache = TileCache::new(TileStore::in_memory(), fetcher.clone()).with_max_concurrent(3);
        let bounds = GeoBounds::new(51.5040, -0.1180, 51.5020, -0.1200).unwrap();

        let rect = cache.tiles_for_bounds(&bounds).unwrap();
        let tiles = cache.fetch_bounds(&bounds, |_| false).await.unwrap();

        assert_eq!(tiles.len(), rect.iter().count());
        assert!(rect.iter().all(|t| tiles.contains_key(&t)));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), tiles.len());
    }

    #[tokio::test]
    async fn test_fetch_bounds_skips_known_tiles() {
        let fetcher = Arc::new(FakeFetcher::default());
        let cache = TileCache::new(TileStore::in_memory(), fetcher.clone());
        let bounds = GeoBounds::new(51.5040, -0.1180, 51.5020, -0.1200).unwrap();
        let rect = cache.tiles_for_bounds(&bounds).unwrap();
        let known: HashSet<_> = rect.iter().take(2).collect();

        let tiles = cache
            .fetch_bounds(&bounds, |t| known.contains(t))
            .await
            .unwrap();

        assert_eq!(tiles.len(), rect.iter().count() - 2);
        assert!(known.iter().all(|t| !tiles.contains_key(t)));
        assert!(
            fetcher
                .seen
                .lock()
                .unwrap()
                .iter()
                .all(|t| !known.contains(t))
        );
    }

    #[tokio::test]
    async fn test_fetch_bounds_propagates_first_failure() {
        let bounds = GeoBounds::new(51.5040, -0.1180, 51.5020, -0.1200).unwrap();
        let rect = TileRect::for_bounds(&bounds, ZOOM, 1).unwrap();
        let broken = rect.iter().nth(3).unwrap();

        let fetcher = Arc::new(FakeFetcher {
            failing: HashSet::from([broken]),
            ..Default::default()
        });
        let cache = TileCache::new(TileStore::in_memory(), fetcher);

        let err = cache.fetch_bounds(&bounds, |_| false).await.unwrap_err();
        match err {
            AppError::Fetch { tile, .. } => assert_eq!(tile, broken),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
