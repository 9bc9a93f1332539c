//! The boundary between the plotting core and whatever renders it.
//!
//! The core only issues primitives through [`DrawingSurface`] and keeps the
//! returned [`DrawHandle`]s so it can remove what it drew. Coordinates are
//! plot pixels with `y` growing upward.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{
    errors::AppError,
    tile_image::{TileFormat, TileImage},
};

/// Opaque reference to something drawn on a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrawHandle(u64);

impl DrawHandle {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Colour {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Colour {
    pub const BLACK: Colour = Colour::rgb(0, 0, 0);
    pub const RED: Colour = Colour::rgb(255, 0, 0);
    pub const GREEN: Colour = Colour::rgb(0, 128, 0);
    pub const BLUE: Colour = Colour::rgb(0, 0, 255);
    pub const ORANGE: Colour = Colour::rgb(255, 165, 0);
    pub const PURPLE: Colour = Colour::rgb(128, 0, 128);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Colour {
    type Err = AppError;

    /// Accepts `#rrggbb` or one of a few colour names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let named = match s.to_ascii_lowercase().as_str() {
            "black" => Some(Colour::BLACK),
            "red" => Some(Colour::RED),
            "green" => Some(Colour::GREEN),
            "blue" => Some(Colour::BLUE),
            "orange" => Some(Colour::ORANGE),
            "purple" => Some(Colour::PURPLE),
            _ => None,
        };
        if let Some(colour) = named {
            return Ok(colour);
        }

        let hex = s
            .strip_prefix('#')
            .filter(|h| h.len() == 6 && h.is_ascii())
            .ok_or_else(|| AppError::InvalidColour(s.to_string()))?;
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| AppError::InvalidColour(s.to_string()))
        };

        Ok(Colour::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotPoint {
    pub x: f64,
    pub y: f64,
}

impl PlotPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in plot pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotRect {
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
    pub top: f64,
}

impl PlotRect {
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }

    pub fn contains(&self, p: PlotPoint) -> bool {
        p.x >= self.left && p.x <= self.right && p.y >= self.bottom && p.y <= self.top
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegendEntry {
    pub label: String,
    pub colour: Colour,
}

pub trait DrawingSurface {
    /// Places a tile image over `extent`.
    fn place_image(&mut self, image: &TileImage, extent: PlotRect) -> DrawHandle;

    fn draw_line(&mut self, from: PlotPoint, to: PlotPoint, colour: Colour, width: f64)
    -> DrawHandle;

    fn draw_point(&mut self, at: PlotPoint, colour: Colour, size: f64) -> DrawHandle;

    /// Removes a primitive. Unknown handles are ignored.
    fn remove(&mut self, handle: DrawHandle);

    fn set_viewport(&mut self, viewport: PlotRect);

    /// Replaces the legend with `entries`, in order.
    fn set_legend(&mut self, entries: &[LegendEntry]);
}

#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Image {
        extent: PlotRect,
        format: TileFormat,
    },
    Line {
        from: PlotPoint,
        to: PlotPoint,
        colour: Colour,
        width: f64,
    },
    Point {
        at: PlotPoint,
        colour: Colour,
        size: f64,
    },
}

/// Headless surface that keeps every live primitive in memory.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    next_handle: u64,
    primitives: BTreeMap<DrawHandle, Primitive>,
    viewport: Option<PlotRect>,
    legend: Vec<LegendEntry>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, primitive: Primitive) -> DrawHandle {
        let handle = DrawHandle(self.next_handle);
        self.next_handle += 1;
        self.primitives.insert(handle, primitive);
        handle
    }

    pub fn get(&self, handle: DrawHandle) -> Option<&Primitive> {
        self.primitives.get(&handle)
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    pub fn images(&self) -> impl Iterator<Item = &PlotRect> {
        self.primitives.values().filter_map(|p| match p {
            Primitive::Image { extent, .. } => Some(extent),
            _ => None,
        })
    }

    pub fn lines(&self) -> impl Iterator<Item = (&PlotPoint, &PlotPoint, &Colour)> {
        self.primitives.values().filter_map(|p| match p {
            Primitive::Line {
                from, to, colour, ..
            } => Some((from, to, colour)),
            _ => None,
        })
    }

    pub fn points(&self) -> impl Iterator<Item = (&PlotPoint, &Colour)> {
        self.primitives.values().filter_map(|p| match p {
            Primitive::Point { at, colour, .. } => Some((at, colour)),
            _ => None,
        })
    }

    pub fn viewport(&self) -> Option<PlotRect> {
        self.viewport
    }

    pub fn legend(&self) -> &[LegendEntry] {
        &self.legend
    }
}

impl DrawingSurface for RecordingSurface {
    fn place_image(&mut self, image: &TileImage, extent: PlotRect) -> DrawHandle {
        self.insert(Primitive::Image {
            extent,
            format: image.format(),
        })
    }

    fn draw_line(
        &mut self,
        from: PlotPoint,
        to: PlotPoint,
        colour: Colour,
        width: f64,
    ) -> DrawHandle {
        self.insert(Primitive::Line {
            from,
            to,
            colour,
            width,
        })
    }

    fn draw_point(&mut self, at: PlotPoint, colour: Colour, size: f64) -> DrawHandle {
        self.insert(Primitive::Point { at, colour, size })
    }

    fn remove(&mut self, handle: DrawHandle) {
        self.primitives.remove(&handle);
    }

    fn set_viewport(&mut self, viewport: PlotRect) {
        self.viewport = Some(viewport);
    }

    fn set_legend(&mut self, entries: &[LegendEntry]) {
        self.legend = entries.to_vec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colour_parsing() {
        assert_eq!("#ff8000".parse::<Colour>().unwrap(), Colour::rgb(255, 128, 0));
        assert_eq!("Green".parse::<Colour>().unwrap(), Colour::GREEN);
        assert_eq!(Colour::rgb(1, 2, 255).to_string(), "#0102ff");
        assert!("#ff80".parse::<Colour>().is_err());
        assert!("#gg0000".parse::<Colour>().is_err());
        assert!("teal".parse::<Colour>().is_err());
    }

    #[test]
    fn test_recording_surface_tracks_live_primitives() {
        let mut surface = RecordingSurface::new();
        let a = surface.draw_point(PlotPoint::new(1.0, 2.0), Colour::RED, 3.0);
        let b = surface.draw_line(
            PlotPoint::new(0.0, 0.0),
            PlotPoint::new(5.0, 5.0),
            Colour::BLUE,
            2.0,
        );
        assert_ne!(a, b);
        assert_eq!(surface.len(), 2);

        surface.remove(a);
        surface.remove(a);
        assert_eq!(surface.len(), 1);
        assert_eq!(surface.points().count(), 0);
        assert_eq!(surface.lines().count(), 1);
    }

    #[test]
    fn test_plot_rect() {
        let rect = PlotRect {
            left: 0.0,
            right: 10.0,
            bottom: 2.0,
            top: 6.0,
        };
        assert_eq!(rect.width(), 10.0);
        assert_eq!(rect.height(), 4.0);
        assert!(rect.contains(PlotPoint::new(5.0, 5.0)));
        assert!(!rect.contains(PlotPoint::new(5.0, 7.0)));
    }
}
