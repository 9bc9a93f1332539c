use serde::{Deserialize, Serialize};

use crate::{
    errors::AppError,
    geo_math::{GeoBounds, LatLon},
};

/// One recorded sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub position: LatLon,
    /// Seconds since the first sample of the track.
    pub relative_time: f64,
    /// Strokes (or steps) per minute.
    pub cadence: f64,
}

impl TrackPoint {
    pub fn new(lat: f64, lon: f64, relative_time: f64, cadence: f64) -> Self {
        Self {
            position: LatLon::new(lat, lon),
            relative_time,
            cadence,
        }
    }
}

/// Non-empty, time-ordered sequence of samples. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    points: Vec<TrackPoint>,
    bounds: GeoBounds,
}

impl Track {
    pub fn new(points: Vec<TrackPoint>) -> Result<Self, AppError> {
        if points.is_empty() {
            return Err(AppError::EmptyTrack);
        }

        for (i, point) in points.iter().enumerate() {
            if !point.position.is_finite() {
                return Err(AppError::InvalidTrack(format!(
                    "point {i} has a non-finite position"
                )));
            }
            if !point.relative_time.is_finite() || !point.cadence.is_finite() {
                return Err(AppError::InvalidTrack(format!(
                    "point {i} has a non-finite time or cadence"
                )));
            }
        }

        if let Some(i) = points
            .windows(2)
            .position(|w| w[1].relative_time < w[0].relative_time)
        {
            return Err(AppError::InvalidTrack(format!(
                "point {} goes back in time",
                i + 1
            )));
        }

        let bounds = GeoBounds::from_positions(points.iter().map(|p| p.position))
            .ok_or(AppError::EmptyTrack)?;

        Ok(Self { points, bounds })
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn first(&self) -> &TrackPoint {
        &self.points[0]
    }

    pub fn last(&self) -> &TrackPoint {
        &self.points[self.points.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Time of the last sample relative to the first.
    pub fn duration(&self) -> f64 {
        self.last().relative_time - self.first().relative_time
    }

    pub fn bounds(&self) -> GeoBounds {
        self.bounds
    }
}
