//! Degrees to plot pixels, and the zoomed viewport around live positions.

use crate::{
    errors::AppError,
    geo_math::{GeoBounds, LatLon},
    surface::{PlotPoint, PlotRect},
};

/// Smallest margin around the viewport, in pixels.
pub const MIN_VIEW_MARGIN: f64 = 5.0;

const ZOOM_BASE: f64 = 6.0;
const ZOOM_EXP_OFFSET: f64 = -2.3;
const ZOOM_EXP_SCALE: f64 = 3.7;

/// Pixel extent of the tile space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotBounds {
    pub height: f64,
    pub width: f64,
}

impl PlotBounds {
    pub fn max_extent(&self) -> f64 {
        self.height.max(self.width)
    }
}

/// Maps zoom slider position `t` in `[0, 1]` to a viewport margin in
/// pixels. Grows exponentially from [`MIN_VIEW_MARGIN`] at `t = 0` to the
/// larger plot extent at `t = 1`.
pub fn scale_zoom(t: f64, plot_bounds: PlotBounds) -> Result<f64, AppError> {
    if !t.is_finite() || !(0.0..=1.0).contains(&t) {
        return Err(AppError::OutOfRange(format!(
            "zoom must be between 0 and 1, got {t}"
        )));
    }

    let curve = |t: f64| ZOOM_BASE.powf(ZOOM_EXP_OFFSET + ZOOM_EXP_SCALE * t);
    let normalised = (curve(t) - curve(0.0)) / (curve(1.0) - curve(0.0));
    let span = (plot_bounds.max_extent() - MIN_VIEW_MARGIN).max(0.0);

    Ok(MIN_VIEW_MARGIN + normalised * span)
}

/// Degree and pixel extents of the same tile rectangle. Invalidated by
/// every tile space recompute; take a fresh one before drawing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotFrame {
    pub degree_bounds: GeoBounds,
    pub plot_bounds: PlotBounds,
}

impl PlotFrame {
    pub fn new(degree_bounds: GeoBounds, plot_bounds: PlotBounds) -> Self {
        Self {
            degree_bounds,
            plot_bounds,
        }
    }

    /// Linear rescale of a position into plot pixels: latitude along `y`,
    /// longitude along `x`.
    pub fn degrees_to_plot(&self, position: LatLon) -> Result<PlotPoint, AppError> {
        if !position.is_finite() {
            return Err(AppError::OutOfRange(format!(
                "position ({}, {}) is not finite",
                position.lat, position.lon
            )));
        }

        let b = &self.degree_bounds;
        if b.height() <= 0.0 || b.width() <= 0.0 {
            return Err(AppError::InvalidBounds(format!(
                "degree bounds {b:?} have no area"
            )));
        }

        Ok(PlotPoint {
            x: (position.lon - b.west) / b.width() * self.plot_bounds.width,
            y: (position.lat - b.south) / b.height() * self.plot_bounds.height,
        })
    }

    /// Square viewport around `positions`.
    ///
    /// The side is the larger of the two spans plus `scale_zoom(zoom_t)` on
    /// each side, centred on the middle of the positions. Each edge is then
    /// clamped to the plot area on its own, so a clamped viewport may be
    /// off-centre.
    pub fn viewport(&self, positions: &[LatLon], zoom_t: f64) -> Result<PlotRect, AppError> {
        if positions.is_empty() {
            return Err(AppError::InvalidBounds(
                "cannot centre the view on zero positions".to_string(),
            ));
        }

        let margin = scale_zoom(zoom_t, self.plot_bounds)?;
        let points = positions
            .iter()
            .map(|p| self.degrees_to_plot(*p))
            .collect::<Result<Vec<_>, _>>()?;

        let (min_x, max_x) = min_max(points.iter().map(|p| p.x));
        let (min_y, max_y) = min_max(points.iter().map(|p| p.y));

        let half = (max_x - min_x).max(max_y - min_y) / 2.0 + margin;
        let (center_x, center_y) = ((min_x + max_x) / 2.0, (min_y + max_y) / 2.0);

        Ok(PlotRect {
            left: (center_x - half).max(0.0),
            right: (center_x + half).min(self.plot_bounds.width),
            bottom: (center_y - half).max(0.0),
            top: (center_y + half).min(self.plot_bounds.height),
        })
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> PlotFrame {
        PlotFrame::new(
            GeoBounds::new(52.0, 1.0, 51.0, 0.0).unwrap(),
            PlotBounds {
                height: 200.0,
                width: 100.0,
            },
        )
    }

    #[test]
    fn test_degrees_to_plot() {
        let f = frame();
        assert_eq!(
            f.degrees_to_plot(LatLon::new(51.0, 0.0)).unwrap(),
            PlotPoint::new(0.0, 0.0)
        );
        assert_eq!(
            f.degrees_to_plot(LatLon::new(52.0, 1.0)).unwrap(),
            PlotPoint::new(100.0, 200.0)
        );
        let mid = f.degrees_to_plot(LatLon::new(51.5, 0.25)).unwrap();
        assert!((mid.x - 25.0).abs() < 1e-9);
        assert!((mid.y - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_degrees_to_plot_rejects_bad_input() {
        assert!(frame().degrees_to_plot(LatLon::new(f64::NAN, 0.0)).is_err());

        let flat = PlotFrame::new(
            GeoBounds::new(51.0, 1.0, 51.0, 0.0).unwrap(),
            PlotBounds {
                height: 10.0,
                width: 10.0,
            },
        );
        assert!(matches!(
            flat.degrees_to_plot(LatLon::new(51.0, 0.5)),
            Err(AppError::InvalidBounds(_))
        ));
    }

    #[test]
    fn test_scale_zoom_end_points() {
        let bounds = PlotBounds {
            height: 300.0,
            width: 450.0,
        };
        assert_eq!(scale_zoom(0.0, bounds).unwrap(), MIN_VIEW_MARGIN);
        assert!((scale_zoom(1.0, bounds).unwrap() - 450.0).abs() < 1e-9);

        let mut previous = 0.0;
        for step in 0..=10 {
            let value = scale_zoom(step as f64 / 10.0, bounds).unwrap();
            assert!(value > previous);
            previous = value;
        }
    }

    #[test]
    fn test_scale_zoom_rejects_out_of_range() {
        let bounds = PlotBounds {
            height: 10.0,
            width: 10.0,
        };
        assert!(scale_zoom(-0.1, bounds).is_err());
        assert!(scale_zoom(1.1, bounds).is_err());
        assert!(scale_zoom(f64::NAN, bounds).is_err());
    }

    #[test]
    fn test_viewport_is_square_and_centred() {
        let f = frame();
        // (25, 80) and (35, 120) in plot space
        let positions = [LatLon::new(51.4, 0.25), LatLon::new(51.6, 0.35)];
        let view = f.viewport(&positions, 0.0).unwrap();

        // Larger span is 40 px on y, margin 5 px
        assert!((view.bottom - 75.0).abs() < 1e-9);
        assert!((view.top - 125.0).abs() < 1e-9);
        assert!((view.left - 5.0).abs() < 1e-9);
        assert!((view.right - 55.0).abs() < 1e-9);
        assert!((view.width() - view.height()).abs() < 1e-9);
    }

    #[test]
    fn test_viewport_clamps_each_edge() {
        let f = frame();
        let view = f.viewport(&[LatLon::new(51.01, 0.01)], 0.5).unwrap();
        assert_eq!(view.left, 0.0);
        assert_eq!(view.bottom, 0.0);
        assert!(view.right <= 100.0);
        assert!(view.top <= 200.0);

        let full = f.viewport(&[LatLon::new(51.5, 0.5)], 1.0).unwrap();
        assert_eq!(
            full,
            PlotRect {
                left: 0.0,
                right: 100.0,
                bottom: 0.0,
                top: 200.0
            }
        );
    }

    #[test]
    fn test_viewport_without_positions() {
        assert!(matches!(
            frame().viewport(&[], 0.5),
            Err(AppError::InvalidBounds(_))
        ));
    }
}
