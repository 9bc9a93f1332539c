//! Standings of every athlete at one playback time.

use crate::{
    errors::AppError,
    overlay::{AthleteId, AthleteOverlay},
    sampler::sample_at,
    units::SpeedUnit,
};

#[derive(Debug, Clone, PartialEq)]
pub struct StandingsRow {
    pub id: AthleteId,
    pub display_name: String,
    /// Meters covered so far.
    pub distance: f64,
    pub speed: String,
    pub cadence: f64,
    pub finished: bool,
}

fn format_speed(speed: f64, unit: SpeedUnit) -> Result<String, AppError> {
    // Pace has no value while an athlete is standing still
    if unit == SpeedUnit::Pace500m && speed == 0.0 {
        return Ok("-:--.- /500m".to_string());
    }
    unit.format(speed)
}

/// Rows sorted by descending distance. Athletes on equal distance keep
/// their order in `athletes`.
pub fn standings(
    athletes: &[AthleteOverlay],
    time: f64,
    unit: SpeedUnit,
) -> Result<Vec<StandingsRow>, AppError> {
    let mut rows = athletes
        .iter()
        .map(|athlete| {
            let sample = sample_at(&athlete.track, time);
            Ok::<_, AppError>(StandingsRow {
                id: athlete.id,
                display_name: athlete.display_name.clone(),
                distance: sample.distance,
                speed: format_speed(sample.speed, unit)?,
                cadence: sample.cadence,
                finished: sample.finished,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    rows.sort_by(|a, b| b.distance.total_cmp(&a.distance));
    Ok(rows)
}

/// Fixed-width text block, one entry per athlete:
///
/// ```text
/// 1. Emmanuel
///    1001m  1:53.2 /500m   38s/m
/// ```
pub fn render_standings(rows: &[StandingsRow]) -> String {
    let distances: Vec<String> = rows
        .iter()
        .map(|row| {
            if row.finished {
                "FIN".to_string()
            } else {
                format!("{:.0}m", row.distance)
            }
        })
        .collect();
    let column = distances.iter().map(String::len).max().unwrap_or(0) + 2;

    rows.iter()
        .zip(&distances)
        .enumerate()
        .map(|(rank, (row, distance))| {
            format!(
                "{}. {}\n   {distance:<column$}{}   {}s/m\n",
                rank + 1,
                row.display_name,
                row.speed,
                row.cadence
            )
        })
        .collect()
}
