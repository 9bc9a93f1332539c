//! GPX file loading.

use std::path::Path;

use gpx::Gpx;
use time::OffsetDateTime;

use crate::{
    errors::AppError,
    track::{Track, TrackPoint},
};

/// A track read from a GPX document, with the name of its first `<trk>`
/// when it has one.
#[derive(Debug, Clone)]
pub struct LoadedTrack {
    pub name: Option<String>,
    pub track: Track,
}

/// Loads every point of every track and segment in a GPX file into a
/// single [`Track`].
pub fn load_file(path: impl AsRef<Path>) -> Result<LoadedTrack, AppError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let gpx = gpx::read(std::io::BufReader::new(file))
        .map_err(|e| AppError::GpxParsing(format!("{}: {e}", path.display())))?;

    let loaded = extract_track(&gpx)?;
    tracing::debug!(
        "Loaded {} points from {}",
        loaded.track.len(),
        path.display()
    );
    Ok(loaded)
}

/// Loads a GPX document held in memory.
pub fn load_bytes(data: &[u8]) -> Result<LoadedTrack, AppError> {
    let gpx = gpx::read(std::io::Cursor::new(data))
        .map_err(|e| AppError::GpxParsing(e.to_string()))?;
    extract_track(&gpx)
}

fn extract_track(gpx: &Gpx) -> Result<LoadedTrack, AppError> {
    let mut start: Option<OffsetDateTime> = None;
    let mut points = Vec::new();

    let waypoints = gpx
        .tracks
        .iter()
        .flat_map(|track| &track.segments)
        .flat_map(|segment| &segment.points);

    for (i, waypoint) in waypoints.enumerate() {
        let timestamp = waypoint
            .time
            .map(OffsetDateTime::from)
            .ok_or_else(|| AppError::GpxParsing(format!("track point {i} has no timestamp")))?;
        let start = *start.get_or_insert(timestamp);

        let position = waypoint.point();
        // The gpx crate does not surface TrackPointExtension, so there is
        // no cadence to read.
        points.push(TrackPoint::new(
            position.y(),
            position.x(),
            (timestamp - start).as_seconds_f64(),
            0.0,
        ));
    }

    if points.is_empty() {
        return Err(AppError::GpxParsing(
            "no track points found in GPX document".to_string(),
        ));
    }

    Ok(LoadedTrack {
        name: gpx.tracks.iter().find_map(|t| t.name.clone()),
        track: Track::new(points)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MORNING_ROW: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="trackplay-tests" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <name>Morning row</name>
    <trkseg>
      <trkpt lat="51.5000" lon="-0.1200"><time>2024-05-01T07:00:00Z</time></trkpt>
      <trkpt lat="51.5004" lon="-0.1195"><time>2024-05-01T07:00:04Z</time></trkpt>
    </trkseg>
    <trkseg>
      <trkpt lat="51.5009" lon="-0.1189"><time>2024-05-01T07:00:09.5Z</time></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

    #[test]
    fn test_load_bytes() {
        let loaded = load_bytes(MORNING_ROW.as_bytes()).unwrap();
        assert_eq!(loaded.name.as_deref(), Some("Morning row"));

        let points = loaded.track.points();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].relative_time, 0.0);
        assert_eq!(points[1].relative_time, 4.0);
        assert_eq!(points[2].relative_time, 9.5);
        assert_eq!(points[2].position.lat, 51.5009);
        assert_eq!(points[2].position.lon, -0.1189);
        assert!(points.iter().all(|p| p.cadence == 0.0));
    }

    #[test]
    fn test_point_without_time_rejected() {
        let data = MORNING_ROW.replace("<time>2024-05-01T07:00:04Z</time>", "");
        assert!(matches!(
            load_bytes(data.as_bytes()),
            Err(AppError::GpxParsing(msg)) if msg.contains("point 1")
        ));
    }

    #[test]
    fn test_document_without_points_rejected() {
        let data = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="trackplay-tests" xmlns="http://www.topografix.com/GPX/1/1">
</gpx>"#;
        assert!(matches!(
            load_bytes(data.as_bytes()),
            Err(AppError::GpxParsing(_))
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            load_bytes(b"not xml at all"),
            Err(AppError::GpxParsing(_))
        ));
    }

    #[test]
    fn test_load_file() {
        let path = std::env::temp_dir().join(format!("trackplay-{}.gpx", uuid::Uuid::new_v4()));
        std::fs::write(&path, MORNING_ROW).unwrap();

        let loaded = load_file(&path).unwrap();
        assert_eq!(loaded.track.len(), 3);

        std::fs::remove_file(&path).unwrap();
        assert!(matches!(load_file(&path), Err(AppError::Io(_))));
    }
}
