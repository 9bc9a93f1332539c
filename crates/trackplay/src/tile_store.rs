use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use object_store::{
    local::LocalFileSystem, memory::InMemory, path::Path, ObjectStore, PutMode, PutOptions,
};

use crate::{
    errors::AppError,
    geo_math::TileIndex,
    tile_image::{TileFormat, TileImage},
    tile_source::FetchError,
};

/// Write-once tile storage keyed by `{zoom}-{y}-{x}.{ext}`.
///
/// Entries are never expired or overwritten.
#[derive(Clone, Debug)]
pub struct TileStore {
    store: Arc<dyn ObjectStore>,
    root: Option<PathBuf>,
}

impl TileStore {
    pub fn new_local(root: impl Into<PathBuf>) -> Result<Self, AppError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;

        let store = LocalFileSystem::new_with_prefix(&root).map_err(|e| {
            AppError::Config(format!(
                "Failed to open tile cache {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(Self {
            store: Arc::new(store),
            root: Some(root),
        })
    }

    /// Store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(InMemory::new()),
            root: None,
        }
    }

    pub fn root(&self) -> Option<&FsPath> {
        self.root.as_deref()
    }

    pub fn object_name(tile: TileIndex, zoom: u8, extension: &str) -> String {
        format!("{zoom}-{}-{}.{extension}", tile.y, tile.x)
    }

    /// First cached file among the accepted extensions, if any.
    pub async fn load(&self, tile: TileIndex, zoom: u8) -> Result<Option<TileImage>, FetchError> {
        for extension in TileFormat::CACHE_EXTENSIONS {
            let path = Path::from(Self::object_name(tile, zoom, extension));

            match self.store.get(&path).await {
                Ok(result) => {
                    let bytes = result.bytes().await?;
                    tracing::debug!("Cache hit for tile {tile} ({path})");
                    return Ok(Some(TileImage::decode(bytes)?));
                }
                Err(object_store::Error::NotFound { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(None)
    }

    /// Persists a tile under the extension matching its format. An existing
    /// entry is left as it is.
    pub async fn save(&self, tile: TileIndex, zoom: u8, image: &TileImage) -> Result<(), FetchError> {
        let path = Path::from(Self::object_name(tile, zoom, image.format().extension()));
        let opts = PutOptions::from(PutMode::Create);

        match self
            .store
            .put_opts(&path, image.bytes().clone().into(), opts)
            .await
        {
            Ok(_) => {
                tracing::debug!("Cached tile {tile} as {path}");
                Ok(())
            }
            Err(object_store::Error::AlreadyExists { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
