//! Point-in-time queries over a recorded track.
//!
//! Every query first brackets the query time between two samples and then
//! interpolates linearly between them. Times before the first sample are
//! clamped to the start of the track ("not started"), times at or after the
//! last sample to its end ("finished").

use crate::{
    geo_math::{LatLon, great_circle_distance},
    track::{Track, TrackPoint},
};

/// Where a query time falls relative to the samples of a track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bracket<'a> {
    /// Before the first sample, or a NaN time.
    NotStarted(&'a TrackPoint),
    /// `below.relative_time <= t < above.relative_time`; `index` is the
    /// position of `above` in the track.
    Between {
        below: &'a TrackPoint,
        above: &'a TrackPoint,
        index: usize,
    },
    /// No sample is later than the query time.
    Finished(&'a TrackPoint),
}

pub fn bracket_at(track: &Track, time: f64) -> Bracket<'_> {
    let points = track.points();

    if time.is_nan() || time < track.first().relative_time {
        return Bracket::NotStarted(track.first());
    }

    // First sample strictly later than `time`
    let index = points.partition_point(|p| p.relative_time <= time);
    if index == points.len() {
        return Bracket::Finished(track.last());
    }

    Bracket::Between {
        below: &points[index - 1],
        above: &points[index],
        index,
    }
}

/// Accumulates a per-point quantity along a track.
pub trait TrackMetric {
    type Score;
    fn next_point(&mut self, point: &TrackPoint);
    fn finish(&mut self) -> Self::Score;
}

/// Sum of great-circle distances between consecutive points.
#[derive(Debug, Clone, Default)]
pub struct DistanceMetric {
    total_distance: f64,
    last_position: Option<LatLon>,
}

impl TrackMetric for DistanceMetric {
    type Score = f64;

    fn next_point(&mut self, point: &TrackPoint) {
        self.total_distance += self
            .last_position
            .map_or(0.0, |prev| great_circle_distance(prev, point.position));
        self.last_position = Some(point.position);
    }

    fn finish(&mut self) -> f64 {
        self.total_distance
    }
}

fn map_range(value: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    (value - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Planar interpolation of latitude and longitude between the bracketing
/// samples.
pub fn position_at(track: &Track, time: f64) -> LatLon {
    match bracket_at(track, time) {
        Bracket::NotStarted(point) | Bracket::Finished(point) => point.position,
        Bracket::Between { below, above, .. } => {
            let (t0, t1) = (below.relative_time, above.relative_time);
            LatLon::new(
                map_range(time, t0, t1, below.position.lat, above.position.lat),
                map_range(time, t0, t1, below.position.lon, above.position.lon),
            )
        }
    }
}

/// Average speed in m/s over the bracketing interval. Constant for every
/// time inside the same bracket; zero outside the track.
pub fn speed_at(track: &Track, time: f64) -> f64 {
    match bracket_at(track, time) {
        Bracket::NotStarted(_) | Bracket::Finished(_) => 0.0,
        Bracket::Between { below, above, .. } => {
            let distance = great_circle_distance(below.position, above.position);
            distance / (above.relative_time - below.relative_time)
        }
    }
}

/// Interpolated cadence rounded to one decimal; zero outside the track.
pub fn cadence_at(track: &Track, time: f64) -> f64 {
    match bracket_at(track, time) {
        Bracket::NotStarted(_) | Bracket::Finished(_) => 0.0,
        Bracket::Between { below, above, .. } => round_to(
            map_range(
                time,
                below.relative_time,
                above.relative_time,
                below.cadence,
                above.cadence,
            ),
            1,
        ),
    }
}

fn partial_interval(time: f64, below: &TrackPoint, above: &TrackPoint) -> f64 {
    let span = great_circle_distance(below.position, above.position);
    map_range(time, below.relative_time, above.relative_time, 0.0, span)
}

/// Distance covered up to `time` in meters, rounded to two decimals.
///
/// Scans from the start of the track on every call; see
/// [`DistanceCursor`] for repeated queries with increasing times.
pub fn cumulative_distance_at(track: &Track, time: f64) -> f64 {
    let points = track.points();
    let mut metric = DistanceMetric::default();

    let travelled = match bracket_at(track, time) {
        Bracket::NotStarted(_) => 0.0,
        Bracket::Between { below, above, index } => {
            points[..index].iter().for_each(|p| metric.next_point(p));
            metric.finish() + partial_interval(time, below, above)
        }
        Bracket::Finished(_) => {
            points.iter().for_each(|p| metric.next_point(p));
            metric.finish()
        }
    };

    round_to(travelled, 2)
}

/// Length of the whole track in meters, rounded to two decimals.
pub fn total_distance(track: &Track) -> f64 {
    cumulative_distance_at(track, track.last().relative_time)
}

/// Every quantity for one athlete at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackSample {
    pub position: LatLon,
    pub speed: f64,
    pub cadence: f64,
    pub distance: f64,
    pub finished: bool,
}

pub fn sample_at(track: &Track, time: f64) -> TrackSample {
    TrackSample {
        position: position_at(track, time),
        speed: speed_at(track, time),
        cadence: cadence_at(track, time),
        distance: cumulative_distance_at(track, time),
        finished: matches!(bracket_at(track, time), Bracket::Finished(_)),
    }
}

/// Cumulative distance for monotonically increasing query times.
///
/// Keeps the distance accumulated so far and only walks the samples passed
/// since the previous query. A query earlier than the previous one restarts
/// from the first sample. Results match [`cumulative_distance_at`]
/// exactly.
#[derive(Debug, Clone)]
pub struct DistanceCursor<'a> {
    track: &'a Track,
    metric: DistanceMetric,
    consumed: usize,
    last_query: f64,
}

impl<'a> DistanceCursor<'a> {
    pub fn new(track: &'a Track) -> Self {
        Self {
            track,
            metric: DistanceMetric::default(),
            consumed: 0,
            last_query: f64::NEG_INFINITY,
        }
    }

    fn advance_to(&mut self, end: usize) {
        let points = self.track.points();
        while self.consumed < end {
            self.metric.next_point(&points[self.consumed]);
            self.consumed += 1;
        }
    }

    pub fn distance_at(&mut self, time: f64) -> f64 {
        if time.is_nan() || time < self.last_query {
            self.metric = DistanceMetric::default();
            self.consumed = 0;
        }
        self.last_query = if time.is_nan() {
            f64::NEG_INFINITY
        } else {
            time
        };

        let travelled = match bracket_at(self.track, time) {
            Bracket::NotStarted(_) => 0.0,
            Bracket::Between { below, above, index } => {
                self.advance_to(index);
                self.metric.finish() + partial_interval(time, below, above)
            }
            Bracket::Finished(_) => {
                self.advance_to(self.track.len());
                self.metric.finish()
            }
        };

        round_to(travelled, 2)
    }
}
