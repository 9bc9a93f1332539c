//! The playback session: tiles, athletes and everything drawn for them.
//!
//! A `MapView` is created once per session and owns all mutable state. Every
//! mutating call takes `&mut self`, so access is exclusive by construction.

use crate::{
    config::Config,
    errors::AppError,
    geo_math::{GeoBounds, LatLon, union_bounds},
    mapper::PlotFrame,
    overlay::{AthleteId, AthleteOverlay, AthleteUpdate, Marker},
    sampler::position_at,
    surface::{Colour, DrawHandle, DrawingSurface, LegendEntry, PlotPoint, PlotRect},
    tile_cache::TileCache,
    tile_space::TileSpace,
    track::Track,
};

pub const TRACK_LINE_WIDTH: f64 = 2.0;

pub struct MapView<S: DrawingSurface> {
    tile_space: TileSpace,
    tiles: TileCache,
    gpx_bounds: Option<GeoBounds>,
    athletes: Vec<AthleteOverlay>,
    tile_handles: Vec<DrawHandle>,
    surface: S,
}

impl<S: DrawingSurface> MapView<S> {
    pub fn new(tiles: TileCache, tile_size: u32, surface: S) -> Self {
        Self {
            tile_space: TileSpace::with_zoom(tile_size, tiles.zoom()),
            tiles,
            gpx_bounds: None,
            athletes: Vec::new(),
            tile_handles: Vec::new(),
            surface,
        }
    }

    /// Session backed by the on-disk cache and HTTP source in `config`.
    pub fn from_config(config: &Config, surface: S) -> Result<Self, AppError> {
        Ok(Self::new(
            TileCache::from_config(config)?,
            config.tile_size,
            surface,
        ))
    }

    pub fn tile_space(&self) -> &TileSpace {
        &self.tile_space
    }

    /// Union of the bounds of every track added so far.
    pub fn gpx_bounds(&self) -> Option<GeoBounds> {
        self.gpx_bounds
    }

    /// Overlays in insertion order.
    pub fn athletes(&self) -> &[AthleteOverlay] {
        &self.athletes
    }

    pub fn athlete(&self, id: AthleteId) -> Option<&AthleteOverlay> {
        self.athletes.iter().find(|a| a.id == id)
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    fn index_of(&self, id: AthleteId) -> Result<usize, AppError> {
        self.athletes
            .iter()
            .position(|a| a.id == id)
            .ok_or(AppError::UnknownAthlete(id))
    }

    /// Current degree and pixel extents. Stale after any tile space
    /// recompute.
    pub fn frame(&self) -> Result<PlotFrame, AppError> {
        if self.gpx_bounds.is_none() {
            return Err(AppError::InvalidBounds(
                "no athlete has been added yet".to_string(),
            ));
        }
        self.tile_space.frame()
    }

    pub fn degrees_to_plot(&self, position: LatLon) -> Result<PlotPoint, AppError> {
        self.frame()?.degrees_to_plot(position)
    }

    /// Adds an athlete and grows the map to cover its track.
    ///
    /// Missing tiles are fetched before anything changes. If any of them
    /// fails the session is left exactly as it was and the fetch error is
    /// returned; tiles that did arrive stay in the disk cache.
    pub async fn add_athlete(
        &mut self,
        display_name: impl Into<String>,
        colour: Colour,
        track: Track,
    ) -> Result<AthleteId, AppError> {
        let display_name = display_name.into();
        let bounds = union_bounds(self.gpx_bounds, Some(track.bounds())).ok_or_else(|| {
            AppError::InvalidBounds("track has no bounds".to_string())
        })?;

        let tile_space = &self.tile_space;
        let fetched = self
            .tiles
            .fetch_bounds(&bounds, |idx| tile_space.contains(idx))
            .await
            .inspect_err(|e| {
                tracing::warn!("Not adding athlete {display_name}: {e}");
            })?;

        self.tile_space.add_images(fetched)?;
        self.gpx_bounds = Some(bounds);

        let overlay = AthleteOverlay::new(display_name, colour, track);
        let id = overlay.id;
        tracing::info!(
            "Added athlete {} ({id}) with {} points",
            overlay.display_name,
            overlay.track.len()
        );
        self.athletes.push(overlay);

        self.redraw_all()?;
        self.refresh_legend();
        Ok(id)
    }

    /// Changes the name and/or colour of an athlete and redraws it.
    pub fn modify_athlete(&mut self, id: AthleteId, update: AthleteUpdate) -> Result<(), AppError> {
        let index = self.index_of(id)?;
        let frame = self.frame()?;
        let overlay = &mut self.athletes[index];

        if let Some(name) = update.display_name {
            overlay.display_name = name;
        }
        if let Some(colour) = update.colour {
            overlay.colour = colour;
        }

        redraw_overlay(&mut self.surface, &frame, overlay)?;
        self.refresh_legend();
        Ok(())
    }

    /// Removes an athlete and everything drawn for it. The map keeps its
    /// current extent.
    pub fn remove_athlete(&mut self, id: AthleteId) -> Result<AthleteOverlay, AppError> {
        let index = self.index_of(id)?;
        let mut overlay = self.athletes.remove(index);

        erase_marker(&mut self.surface, &mut overlay);
        erase_track(&mut self.surface, &mut overlay);
        self.refresh_legend();

        tracing::info!("Removed athlete {} ({id})", overlay.display_name);
        Ok(overlay)
    }

    /// Draws the full track of an athlete, replacing any earlier drawing.
    pub fn draw_track(&mut self, id: AthleteId) -> Result<(), AppError> {
        let index = self.index_of(id)?;
        let frame = self.frame()?;
        draw_track_lines(&mut self.surface, &frame, &mut self.athletes[index])
    }

    /// Places the athlete's single marker, removing the previous one.
    pub fn draw_marker(&mut self, id: AthleteId, position: LatLon, size: f64) -> Result<(), AppError> {
        let index = self.index_of(id)?;
        let frame = self.frame()?;
        place_marker(
            &mut self.surface,
            &frame,
            &mut self.athletes[index],
            position,
            size,
        )
    }

    pub fn remove_marker(&mut self, id: AthleteId) -> Result<(), AppError> {
        let index = self.index_of(id)?;
        erase_marker(&mut self.surface, &mut self.athletes[index]);
        Ok(())
    }

    /// Moves every marker to where its athlete is at `time`. Returns the
    /// positions in athlete order.
    pub fn update_markers(
        &mut self,
        time: f64,
        size: f64,
    ) -> Result<Vec<(AthleteId, LatLon)>, AppError> {
        let frame = self.frame()?;
        self.athletes
            .iter_mut()
            .map(|overlay| {
                let position = position_at(&overlay.track, time);
                place_marker(&mut self.surface, &frame, overlay, position, size)?;
                Ok::<_, AppError>((overlay.id, position))
            })
            .collect()
    }

    /// Fits the viewport around `positions`; `zoom` in `[0, 1]` widens it.
    pub fn center_viewpoint(&mut self, positions: &[LatLon], zoom: f64) -> Result<PlotRect, AppError> {
        let viewport = self.frame()?.viewport(positions, zoom)?;
        self.surface.set_viewport(viewport);
        Ok(viewport)
    }

    /// Replaces every placed tile image with the current local tiles.
    pub fn replot_tiles(&mut self) -> Result<(), AppError> {
        for handle in self.tile_handles.drain(..) {
            self.surface.remove(handle);
        }
        self.tile_handles = self.tile_space.plot_images(&mut self.surface)?;
        Ok(())
    }

    /// Recomputed bounds move every plot coordinate, so everything drawn is
    /// redrawn from degrees.
    fn redraw_all(&mut self) -> Result<(), AppError> {
        self.replot_tiles()?;

        let frame = self.frame()?;
        for overlay in &mut self.athletes {
            redraw_overlay(&mut self.surface, &frame, overlay)?;
        }
        Ok(())
    }

    fn refresh_legend(&mut self) {
        let entries: Vec<LegendEntry> = self
            .athletes
            .iter()
            .map(|a| LegendEntry {
                label: a.display_name.clone(),
                colour: a.colour,
            })
            .collect();
        self.surface.set_legend(&entries);
    }
}

fn redraw_overlay<S: DrawingSurface + ?Sized>(
    surface: &mut S,
    frame: &PlotFrame,
    overlay: &mut AthleteOverlay,
) -> Result<(), AppError> {
    draw_track_lines(surface, frame, overlay)?;
    if let Some(marker) = overlay.marker {
        place_marker(surface, frame, overlay, marker.position, marker.size)?;
    }
    Ok(())
}

fn draw_track_lines<S: DrawingSurface + ?Sized>(
    surface: &mut S,
    frame: &PlotFrame,
    overlay: &mut AthleteOverlay,
) -> Result<(), AppError> {
    let points = overlay
        .track
        .points()
        .iter()
        .map(|p| frame.degrees_to_plot(p.position))
        .collect::<Result<Vec<_>, _>>()?;

    erase_track(surface, overlay);
    let lines: Vec<DrawHandle> = points
        .windows(2)
        .map(|pair| surface.draw_line(pair[0], pair[1], overlay.colour, TRACK_LINE_WIDTH))
        .collect();
    overlay.track_lines = Some(lines);
    Ok(())
}

fn erase_track<S: DrawingSurface + ?Sized>(surface: &mut S, overlay: &mut AthleteOverlay) {
    for handle in overlay.track_lines.take().into_iter().flatten() {
        surface.remove(handle);
    }
}

fn place_marker<S: DrawingSurface + ?Sized>(
    surface: &mut S,
    frame: &PlotFrame,
    overlay: &mut AthleteOverlay,
    position: LatLon,
    size: f64,
) -> Result<(), AppError> {
    let at = frame.degrees_to_plot(position)?;
    erase_marker(surface, overlay);
    let handle = surface.draw_point(at, overlay.colour, size);
    overlay.marker = Some(Marker {
        position,
        size,
        handle,
    });
    Ok(())
}

fn erase_marker<S: DrawingSurface + ?Sized>(surface: &mut S, overlay: &mut AthleteOverlay) {
    if let Some(marker) = overlay.marker.take() {
        surface.remove(marker.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_math::TileIndex;
    use crate::surface::RecordingSurface;
    use crate::tile_source::{FetchError, TileFetcher};
    use crate::tile_store::TileStore;
    use crate::track::TrackPoint;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::io::Cursor;
    use std::sync::Arc;

    struct PngFetcher;

    #[async_trait]
    impl TileFetcher for PngFetcher {
        async fn fetch(&self, _tile: TileIndex, _zoom: u8) -> Result<Bytes, FetchError> {
            let img = image::RgbImage::from_pixel(2, 2, image::Rgb([0, 90, 0]));
            let mut buf = Vec::new();
            image::DynamicImage::ImageRgb8(img)
                .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
            Ok(Bytes::from(buf))
        }
    }

    fn view() -> MapView<RecordingSurface> {
        let cache = TileCache::new(TileStore::in_memory(), Arc::new(PngFetcher));
        MapView::new(cache, 50, RecordingSurface::new())
    }

    fn track() -> Track {
        Track::new(vec![
            TrackPoint::new(51.5000, -0.1200, 0.0, 30.0),
            TrackPoint::new(51.5010, -0.1190, 10.0, 32.0),
            TrackPoint::new(51.5020, -0.1180, 20.0, 31.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_coordinates_need_an_athlete() {
        let view = view();
        assert!(matches!(
            view.degrees_to_plot(LatLon::new(51.5, -0.12)),
            Err(AppError::InvalidBounds(_))
        ));
    }

    #[tokio::test]
    async fn test_add_athlete_draws_track_and_legend() {
        let mut view = view();
        let id = view.add_athlete("Alice", Colour::RED, track()).await.unwrap();

        let overlay = view.athlete(id).unwrap();
        assert_eq!(overlay.track_lines.as_ref().unwrap().len(), 2);
        assert_eq!(view.surface().lines().count(), 2);
        assert_eq!(view.surface().images().count(), view.tile_space().len());
        assert_eq!(view.surface().legend()[0].label, "Alice");

        let bounds = view.tile_space().degree_bounds().unwrap();
        assert!(bounds.contains_bounds(&view.gpx_bounds().unwrap()));
    }

    #[tokio::test]
    async fn test_single_marker_per_athlete() {
        let mut view = view();
        let id = view.add_athlete("Alice", Colour::RED, track()).await.unwrap();

        view.draw_marker(id, LatLon::new(51.5005, -0.1195), 4.0).unwrap();
        view.draw_marker(id, LatLon::new(51.5015, -0.1185), 4.0).unwrap();
        assert_eq!(view.surface().points().count(), 1);

        view.remove_marker(id).unwrap();
        view.remove_marker(id).unwrap();
        assert_eq!(view.surface().points().count(), 0);
        assert!(view.athlete(id).unwrap().marker.is_none());
    }

    #[tokio::test]
    async fn test_unknown_athlete() {
        let mut view = view();
        view.add_athlete("Alice", Colour::RED, track()).await.unwrap();

        let stranger = AthleteId::new();
        assert!(matches!(
            view.draw_track(stranger),
            Err(AppError::UnknownAthlete(id)) if id == stranger
        ));
        assert!(view.remove_athlete(stranger).is_err());
        assert!(view.modify_athlete(stranger, AthleteUpdate::default()).is_err());
    }

    #[tokio::test]
    async fn test_update_markers_follows_playback() {
        let mut view = view();
        let id = view.add_athlete("Alice", Colour::RED, track()).await.unwrap();

        let positions = view.update_markers(5.0, 3.0).unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].0, id);
        assert!((positions[0].1.lat - 51.5005).abs() < 1e-9);

        let marker = view.athlete(id).unwrap().marker.unwrap();
        let expected = view.degrees_to_plot(positions[0].1).unwrap();
        let (drawn, _) = view.surface().points().next().unwrap();
        assert_eq!(*drawn, expected);
        assert_eq!(marker.size, 3.0);
    }

    #[tokio::test]
    async fn test_center_viewpoint_sets_surface_viewport() {
        let mut view = view();
        view.add_athlete("Alice", Colour::RED, track()).await.unwrap();

        let positions = [LatLon::new(51.5005, -0.1195), LatLon::new(51.5015, -0.1185)];
        let viewport = view.center_viewpoint(&positions, 0.2).unwrap();
        assert_eq!(view.surface().viewport(), Some(viewport));
        assert!(viewport.contains(view.degrees_to_plot(positions[0]).unwrap()));
        assert!(viewport.contains(view.degrees_to_plot(positions[1]).unwrap()));
    }
}
