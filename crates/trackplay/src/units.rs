//! Display conversion of speeds measured in meters per second.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

const MS_TO_KMH: f64 = 3.6;
const MS_TO_MPH: f64 = 2.237;
const PACE_DISTANCE_M: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpeedUnit {
    #[serde(rename = "m/s")]
    MetersPerSecond,
    #[serde(rename = "km/h", alias = "kmh")]
    KilometersPerHour,
    #[serde(rename = "mph")]
    MilesPerHour,
    /// Time per 500 m, as shown on rowing ergometers.
    #[serde(rename = "s/500m")]
    Pace500m,
}

impl SpeedUnit {
    pub const ALL: [SpeedUnit; 4] = [
        SpeedUnit::Pace500m,
        SpeedUnit::MetersPerSecond,
        SpeedUnit::KilometersPerHour,
        SpeedUnit::MilesPerHour,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SpeedUnit::MetersPerSecond => "m/s",
            SpeedUnit::KilometersPerHour => "km/h",
            SpeedUnit::MilesPerHour => "mph",
            SpeedUnit::Pace500m => "s/500m",
        }
    }

    /// Renders `speed` (m/s) in this unit.
    pub fn format(self, speed: f64) -> Result<String, AppError> {
        if !speed.is_finite() || speed < 0.0 {
            return Err(AppError::UnitConversion(format!(
                "speed must be a finite, non-negative number, got {speed}"
            )));
        }

        match self {
            SpeedUnit::MetersPerSecond => Ok(format!("{speed} m/s")),
            SpeedUnit::KilometersPerHour => Ok(format!("{} km/h", speed * MS_TO_KMH)),
            SpeedUnit::MilesPerHour => Ok(format!("{} mph", speed * MS_TO_MPH)),
            SpeedUnit::Pace500m => {
                if speed == 0.0 {
                    return Err(AppError::UnitConversion(
                        "pace is undefined at zero speed".to_string(),
                    ));
                }
                let total = (PACE_DISTANCE_M / speed * 10.0).round() / 10.0;
                if !total.is_finite() {
                    return Err(AppError::UnitConversion(format!(
                        "speed {speed} is too slow to express as a pace"
                    )));
                }
                let minutes = (total / 60.0).floor();
                let seconds = total - minutes * 60.0;
                Ok(format!("{minutes}:{seconds:04.1} /500m"))
            }
        }
    }
}

impl fmt::Display for SpeedUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SpeedUnit {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "m/s" => Ok(SpeedUnit::MetersPerSecond),
            "km/h" | "kmh" => Ok(SpeedUnit::KilometersPerHour),
            "mph" => Ok(SpeedUnit::MilesPerHour),
            "s/500m" => Ok(SpeedUnit::Pace500m),
            other => Err(AppError::UnitConversion(format!(
                "unknown unit {other:?}, expected one of: m/s, km/h, mph, s/500m"
            ))),
        }
    }
}

/// Formats a speed in m/s using the unit named by `unit`.
pub fn convert_speed_units(speed: f64, unit: &str) -> Result<String, AppError> {
    unit.parse::<SpeedUnit>()?.format(speed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meters_per_second_round_trip() {
        for speed in [0.0, 1.0, 4.1666, 3.141592653589793, 12.3456789] {
            let text = convert_speed_units(speed, "m/s").unwrap();
            let parsed: f64 = text.strip_suffix(" m/s").unwrap().parse().unwrap();
            assert_eq!(parsed, speed);
        }
    }

    #[test]
    fn test_km_per_hour_and_mph() {
        assert_eq!(convert_speed_units(10.0, "km/h").unwrap(), "36 km/h");
        assert_eq!(convert_speed_units(10.0, "kmh").unwrap(), "36 km/h");
        assert_eq!(convert_speed_units(10.0, "mph").unwrap(), "22.37 mph");
    }

    #[test]
    fn test_pace() {
        // 500 / 4.418 = 113.17 -> 113.2s
        assert_eq!(convert_speed_units(4.418, "s/500m").unwrap(), "1:53.2 /500m");
        assert_eq!(convert_speed_units(5.0, "s/500m").unwrap(), "1:40.0 /500m");
        assert_eq!(convert_speed_units(4.95, "s/500m").unwrap(), "1:41.0 /500m");
        // Single-digit seconds are zero padded
        assert_eq!(convert_speed_units(8.0, "s/500m").unwrap(), "1:02.5 /500m");
    }

    #[test]
    fn test_pace_at_zero_speed_is_an_error() {
        assert!(matches!(
            convert_speed_units(0.0, "s/500m"),
            Err(AppError::UnitConversion(_))
        ));
    }

    #[test]
    fn test_pace_at_subnormal_speed_is_an_error() {
        let speed = f64::MIN_POSITIVE / 4.0;
        assert!(speed > 0.0);
        assert!(matches!(
            convert_speed_units(speed, "s/500m"),
            Err(AppError::UnitConversion(msg)) if msg.contains("too slow")
        ));
    }

    #[test]
    fn test_unknown_unit() {
        let err = convert_speed_units(1.0, "knots").unwrap_err();
        assert!(matches!(err, AppError::UnitConversion(msg) if msg.contains("knots")));
    }

    #[test]
    fn test_non_numeric_speed() {
        assert!(convert_speed_units(f64::NAN, "m/s").is_err());
        assert!(convert_speed_units(f64::INFINITY, "km/h").is_err());
        assert!(convert_speed_units(-1.0, "mph").is_err());
    }

    #[test]
    fn test_parse_and_display() {
        for unit in SpeedUnit::ALL {
            assert_eq!(unit.label().parse::<SpeedUnit>().unwrap(), unit);
            assert_eq!(unit.to_string(), unit.label());
        }
    }
}
