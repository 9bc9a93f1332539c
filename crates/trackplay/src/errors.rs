use thiserror::Error;

use crate::{geo_math::TileIndex, overlay::AthleteId, tile_source::FetchError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),

    #[error("Failed to fetch tile {tile}: {source}")]
    Fetch {
        tile: TileIndex,
        #[source]
        source: FetchError,
    },

    #[error("Unit conversion error: {0}")]
    UnitConversion(String),

    #[error("Track has no points")]
    EmptyTrack,

    #[error("Invalid track: {0}")]
    InvalidTrack(String),

    #[error("Value out of range: {0}")]
    OutOfRange(String),

    #[error("Invalid colour: {0}")]
    InvalidColour(String),

    #[error("Unknown athlete {0}")]
    UnknownAthlete(AthleteId),

    #[error("GPX parsing error: {0}")]
    GpxParsing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub(crate) fn fetch(tile: TileIndex, source: impl Into<FetchError>) -> Self {
        AppError::Fetch {
            tile,
            source: source.into(),
        }
    }

    /// True for failures that came from the tile pipeline rather than from
    /// caller input.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, AppError::Fetch { .. })
    }
}
