//! The set of tiles fetched so far and the plotting space derived from it.
//!
//! Raw tiles are keyed by global slippy-map index. After every change the
//! enclosing tile rectangle, its pixel extent, its degree extent and the
//! local grid are rebuilt together from the raw set. In the local grid the
//! south-west tile is `(0, 0)` and `y` grows northward.

use std::collections::BTreeMap;

use crate::{
    errors::AppError,
    geo_math::{GeoBounds, TileIndex, TileRect, ZOOM},
    mapper::{PlotBounds, PlotFrame},
    surface::{DrawHandle, DrawingSurface, PlotRect},
    tile_image::TileImage,
};

#[derive(Debug, Clone)]
struct TileLayout {
    rect: TileRect,
    plot_bounds: PlotBounds,
    degree_bounds: GeoBounds,
    local: BTreeMap<TileIndex, TileImage>,
}

impl TileLayout {
    fn build(raw: &BTreeMap<TileIndex, TileImage>, tile_size: u32, zoom: u8) -> Option<Self> {
        let rect = TileRect::enclosing(raw.keys())?;
        let plot_bounds = PlotBounds {
            height: f64::from(rect.rows() * tile_size),
            width: f64::from(rect.columns() * tile_size),
        };

        let local = raw
            .iter()
            .map(|(idx, image)| {
                let local_idx = TileIndex::new(idx.x - rect.west, rect.south - idx.y);
                (local_idx, image.clone())
            })
            .collect();

        Some(Self {
            rect,
            plot_bounds,
            degree_bounds: rect.degree_bounds(zoom),
            local,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TileSpace {
    tile_size: u32,
    zoom: u8,
    raw: BTreeMap<TileIndex, TileImage>,
    layout: Option<TileLayout>,
}

impl TileSpace {
    pub fn new(tile_size: u32) -> Self {
        Self::with_zoom(tile_size, ZOOM)
    }

    pub fn with_zoom(tile_size: u32, zoom: u8) -> Self {
        Self {
            tile_size,
            zoom,
            raw: BTreeMap::new(),
            layout: None,
        }
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Whether the global tile index is already registered.
    pub fn contains(&self, idx: &TileIndex) -> bool {
        self.raw.contains_key(idx)
    }

    pub fn raw_tiles(&self) -> &BTreeMap<TileIndex, TileImage> {
        &self.raw
    }

    /// Merges tiles whose key is not registered yet and recomputes the
    /// layout. Images already present are never replaced. Returns how many
    /// tiles were new.
    pub fn add_images(
        &mut self,
        new_tiles: impl IntoIterator<Item = (TileIndex, TileImage)>,
    ) -> Result<usize, AppError> {
        let mut added = 0;
        for (idx, image) in new_tiles {
            if let std::collections::btree_map::Entry::Vacant(slot) = self.raw.entry(idx) {
                slot.insert(image);
                added += 1;
            }
        }

        self.recompute()?;
        if added > 0 {
            tracing::info!("Tile space grew by {added} tiles to {}", self.raw.len());
        }
        Ok(added)
    }

    /// Rebuilds the layout from the raw tile set.
    pub fn recompute(&mut self) -> Result<(), AppError> {
        let layout = TileLayout::build(&self.raw, self.tile_size, self.zoom).ok_or_else(|| {
            AppError::InvalidBounds("no tiles have been added to the tile space".to_string())
        })?;
        self.layout = Some(layout);
        Ok(())
    }

    fn layout(&self) -> Result<&TileLayout, AppError> {
        self.layout.as_ref().ok_or_else(|| {
            AppError::InvalidBounds("tile space has no bounds yet".to_string())
        })
    }

    /// Enclosing rectangle in global tile indices.
    pub fn tile_rect(&self) -> Result<TileRect, AppError> {
        Ok(self.layout()?.rect)
    }

    /// Tiles keyed by local grid index.
    pub fn local_tiles(&self) -> Result<&BTreeMap<TileIndex, TileImage>, AppError> {
        Ok(&self.layout()?.local)
    }

    pub fn plot_bounds(&self) -> Result<PlotBounds, AppError> {
        Ok(self.layout()?.plot_bounds)
    }

    pub fn degree_bounds(&self) -> Result<GeoBounds, AppError> {
        Ok(self.layout()?.degree_bounds)
    }

    pub fn frame(&self) -> Result<PlotFrame, AppError> {
        let layout = self.layout()?;
        Ok(PlotFrame::new(layout.degree_bounds, layout.plot_bounds))
    }

    /// Places every local tile on `surface`, one square of `tile_size`
    /// pixels per tile.
    pub fn plot_images<S: DrawingSurface + ?Sized>(
        &self,
        surface: &mut S,
    ) -> Result<Vec<DrawHandle>, AppError> {
        let size = f64::from(self.tile_size);
        let handles: Vec<DrawHandle> = self
            .local_tiles()?
            .iter()
            .map(|(idx, image)| {
                let (x, y) = (f64::from(idx.x), f64::from(idx.y));
                let extent = PlotRect {
                    left: x * size,
                    right: (x + 1.0) * size,
                    bottom: y * size,
                    top: (y + 1.0) * size,
                };
                surface.place_image(image, extent)
            })
            .collect();
        Ok(handles)
    }
}
