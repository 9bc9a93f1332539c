//! Slippy-map projection helpers, bounding boxes and great-circle distance.
//!
//! Tile indices follow the OpenStreetMap convention: `x` grows eastward and
//! `y` grows southward, so the north edge of a tile rectangle is its
//! smallest `y`.

use std::f64::consts::PI;
use std::fmt;

use geo::{BoundingRect as _, Distance as _, Haversine, MultiPoint, Point, Rect};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Zoom level used for every tile in a session.
pub const ZOOM: u8 = 17;

/// Largest latitude representable in Web Mercator.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// A position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }

    fn point(self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }
}

impl From<(f64, f64)> for LatLon {
    fn from((lat, lon): (f64, f64)) -> Self {
        Self { lat, lon }
    }
}

/// Axis-aligned rectangle in (lat, lon) space. Longitude wrap-around is not
/// supported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub north: f64,
    pub east: f64,
    pub south: f64,
    pub west: f64,
}

impl GeoBounds {
    pub fn new(north: f64, east: f64, south: f64, west: f64) -> Result<Self, AppError> {
        if ![north, east, south, west].iter().all(|v| v.is_finite()) {
            return Err(AppError::InvalidBounds(
                "bounds must be finite".to_string(),
            ));
        }
        if north < south || east < west {
            return Err(AppError::InvalidBounds(format!(
                "north {north} / south {south}, east {east} / west {west} are inverted"
            )));
        }
        Ok(Self {
            north,
            east,
            south,
            west,
        })
    }

    /// Smallest rectangle containing every position, `None` for an empty
    /// iterator.
    pub fn from_positions(positions: impl IntoIterator<Item = LatLon>) -> Option<Self> {
        let points: MultiPoint<f64> = positions.into_iter().map(LatLon::point).collect();
        points.bounding_rect().map(Self::from)
    }

    /// Smallest rectangle containing both operands.
    pub fn union(&self, other: &GeoBounds) -> GeoBounds {
        GeoBounds {
            north: self.north.max(other.north),
            east: self.east.max(other.east),
            south: self.south.min(other.south),
            west: self.west.min(other.west),
        }
    }

    pub fn contains(&self, position: LatLon) -> bool {
        position.lat <= self.north
            && position.lat >= self.south
            && position.lon <= self.east
            && position.lon >= self.west
    }

    pub fn contains_bounds(&self, other: &GeoBounds) -> bool {
        other.north <= self.north
            && other.south >= self.south
            && other.east <= self.east
            && other.west >= self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    pub fn width(&self) -> f64 {
        self.east - self.west
    }
}

impl From<Rect<f64>> for GeoBounds {
    fn from(rect: Rect<f64>) -> Self {
        GeoBounds {
            north: rect.max().y,
            east: rect.max().x,
            south: rect.min().y,
            west: rect.min().x,
        }
    }
}

/// Union of two optional bounds. An absent operand yields the other one
/// unchanged.
pub fn union_bounds(a: Option<GeoBounds>, b: Option<GeoBounds>) -> Option<GeoBounds> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.union(&b)),
        (Some(only), None) | (None, Some(only)) => Some(only),
        (None, None) => None,
    }
}

/// Global slippy-map tile coordinate at [`ZOOM`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileIndex {
    pub x: u32,
    pub y: u32,
}

impl TileIndex {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Geographic centre of the tile.
    pub fn center(&self, zoom: u8) -> LatLon {
        fractional_tile_to_deg(self.x as f64 + 0.5, self.y as f64 + 0.5, zoom)
    }
}

impl fmt::Display for TileIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

fn tiles_per_side(zoom: u8) -> f64 {
    2f64.powi(zoom as i32)
}

/// Projected tile coordinates closer than this to an integer are treated as
/// lying on that tile edge.
const EDGE_EPSILON: f64 = 1e-7;

/// `floor` that puts a value sitting on a tile edge into the tile starting
/// there, so an exact corner from [`tile_to_deg`] maps back to its own tile.
fn floor_to_edge(v: f64) -> f64 {
    let nearest = v.round();
    if (v - nearest).abs() < EDGE_EPSILON {
        nearest
    } else {
        v.floor()
    }
}

/// Projects a position onto the tile containing it.
pub fn deg_to_tile(lat: f64, lon: f64, zoom: u8) -> Result<TileIndex, AppError> {
    if !lat.is_finite() || lat.abs() >= MAX_LATITUDE {
        return Err(AppError::OutOfRange(format!(
            "latitude {lat} outside the Mercator range"
        )));
    }
    if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
        return Err(AppError::OutOfRange(format!("longitude {lon}")));
    }

    let n = tiles_per_side(zoom);
    let max_index = n - 1.0;
    let lat_rad = lat.to_radians();

    let x = floor_to_edge((lon + 180.0) / 360.0 * n).min(max_index);
    let y = floor_to_edge((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).clamp(0.0, max_index);

    Ok(TileIndex::new(x as u32, y as u32))
}

/// North-west corner of tile `(x, y)` in degrees. Passing `x + 1` or
/// `y + 1` yields the far edges of a tile.
pub fn tile_to_deg(x: u32, y: u32, zoom: u8) -> LatLon {
    fractional_tile_to_deg(x as f64, y as f64, zoom)
}

fn fractional_tile_to_deg(x: f64, y: f64, zoom: u8) -> LatLon {
    let n = tiles_per_side(zoom);
    let lon = x / n * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees();
    LatLon { lat, lon }
}

/// Haversine distance in meters.
pub fn great_circle_distance(a: LatLon, b: LatLon) -> f64 {
    Haversine.distance(a.point(), b.point())
}

/// Inclusive rectangle of tile indices. `north` is the smallest `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
    pub north: u32,
    pub east: u32,
    pub south: u32,
    pub west: u32,
}

impl TileRect {
    /// Minimal rectangle covering every index.
    pub fn enclosing<'a>(indices: impl IntoIterator<Item = &'a TileIndex>) -> Option<Self> {
        indices.into_iter().fold(None, |rect, idx| {
            Some(match rect {
                None => TileRect {
                    north: idx.y,
                    east: idx.x,
                    south: idx.y,
                    west: idx.x,
                },
                Some(r) => TileRect {
                    north: r.north.min(idx.y),
                    east: r.east.max(idx.x),
                    south: r.south.max(idx.y),
                    west: r.west.min(idx.x),
                },
            })
        })
    }

    /// Tiles covering `bounds`, grown by `margin` tiles on every side and
    /// clipped to the valid index range.
    pub fn for_bounds(bounds: &GeoBounds, zoom: u8, margin: u32) -> Result<Self, AppError> {
        let south_west = deg_to_tile(bounds.south, bounds.west, zoom)?;
        let north_east = deg_to_tile(bounds.north, bounds.east, zoom)?;
        let max_index = (tiles_per_side(zoom) - 1.0) as u32;

        Ok(TileRect {
            north: north_east.y.saturating_sub(margin),
            east: north_east.x.saturating_add(margin).min(max_index),
            south: south_west.y.saturating_add(margin).min(max_index),
            west: south_west.x.saturating_sub(margin),
        })
    }

    pub fn columns(&self) -> u32 {
        self.east - self.west + 1
    }

    pub fn rows(&self) -> u32 {
        self.south - self.north + 1
    }

    pub fn contains(&self, idx: &TileIndex) -> bool {
        (self.west..=self.east).contains(&idx.x) && (self.north..=self.south).contains(&idx.y)
    }

    pub fn iter(&self) -> impl Iterator<Item = TileIndex> + use<> {
        let (west, east, north, south) = (self.west, self.east, self.north, self.south);
        (west..=east).flat_map(move |x| (north..=south).map(move |y| TileIndex::new(x, y)))
    }

    /// Degree bounds of the full rectangle area, taken from the outer
    /// corners beyond the last row and column.
    pub fn degree_bounds(&self, zoom: u8) -> GeoBounds {
        let bottom_left = tile_to_deg(self.west, self.south + 1, zoom);
        let top_right = tile_to_deg(self.east + 1, self.north, zoom);
        GeoBounds {
            north: top_right.lat,
            east: top_right.lon,
            south: bottom_left.lat,
            west: bottom_left.lon,
        }
    }
}
