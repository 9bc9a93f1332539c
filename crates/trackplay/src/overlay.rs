use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    geo_math::LatLon,
    surface::{Colour, DrawHandle},
    track::Track,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AthleteId(Uuid);

impl AthleteId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AthleteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AthleteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for AthleteId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// The live position marker of one athlete.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    pub position: LatLon,
    pub size: f64,
    pub handle: DrawHandle,
}

/// View state of one athlete. Owns whatever it has drawn: `track_lines`
/// and `marker` must be removed from the surface before they are replaced
/// or the overlay is dropped.
#[derive(Debug, Clone)]
pub struct AthleteOverlay {
    pub id: AthleteId,
    pub display_name: String,
    pub colour: Colour,
    pub track: Track,
    pub track_lines: Option<Vec<DrawHandle>>,
    pub marker: Option<Marker>,
}

impl AthleteOverlay {
    pub fn new(display_name: impl Into<String>, colour: Colour, track: Track) -> Self {
        Self {
            id: AthleteId::new(),
            display_name: display_name.into(),
            colour,
            track,
            track_lines: None,
            marker: None,
        }
    }

    pub fn has_track_drawn(&self) -> bool {
        self.track_lines.is_some()
    }
}

/// Fields of an overlay that can change after it was added. `None` leaves
/// the field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AthleteUpdate {
    pub display_name: Option<String>,
    pub colour: Option<Colour>,
}

impl AthleteUpdate {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.colour.is_none()
    }
}
