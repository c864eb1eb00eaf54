use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::boundary::LngLatBounds;

/// Berkeley, roughly the middle of the East Bay Hills.
pub const DEFAULT_CENTER: (f64, f64) = (-122.2727, 37.8715);
pub const DEFAULT_ZOOM: f64 = 11.0;
pub const FIT_PADDING_PX: f64 = 40.0;
pub const FIT_DURATION_MS: u32 = 800;
pub const MAX_FIT_ZOOM: f64 = 18.0;

/// Web mercator latitude limit.
const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Camera of one map canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportState {
    /// `(lng, lat)` in degrees.
    pub center: (f64, f64),
    pub zoom: f64,
    pub pitch: f64,
    pub bearing: f64,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
            pitch: 0.0,
            bearing: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    pub padding: f64,
    pub duration_ms: u32,
    pub max_zoom: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            padding: FIT_PADDING_PX,
            duration_ms: FIT_DURATION_MS,
            max_zoom: MAX_FIT_ZOOM,
        }
    }
}

/// Normalized web mercator `(x, y)` in `[0, 1]`, y growing southward.
pub fn project(lng: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = (lng + 180.0) / 360.0;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0;
    (x, y)
}

pub fn unproject(x: f64, y: f64) -> (f64, f64) {
    let lng = x * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y)).sinh().atan().to_degrees();
    (lng, lat)
}

/// Top-down camera that shows `bounds` inside a `canvas` of `(width, height)` px
/// with `options.padding` on every side.
///
/// Returns `None` for bounds with a non-finite or inverted side, or a canvas too
/// small to hold the padding. Zero-area bounds zoom to `options.max_zoom`.
pub fn fit_bounds(
    bounds: &LngLatBounds,
    canvas: (f64, f64),
    world_tile_size: f64,
    options: &FitOptions,
) -> Option<ViewportState> {
    if !bounds.is_valid() {
        return None;
    }
    let (canvas_w, canvas_h) = canvas;
    let usable_w = canvas_w - options.padding * 2.0;
    let usable_h = canvas_h - options.padding * 2.0;
    if !(usable_w > 0.0 && usable_h > 0.0) {
        return None;
    }

    let (x1, y1) = project(bounds.min_lng, bounds.max_lat);
    let (x2, y2) = project(bounds.max_lng, bounds.min_lat);
    let world_w = (x2 - x1) * world_tile_size;
    let world_h = (y2 - y1) * world_tile_size;

    let scale_x = if world_w > 0.0 { usable_w / world_w } else { f64::INFINITY };
    let scale_y = if world_h > 0.0 { usable_h / world_h } else { f64::INFINITY };
    let zoom = scale_x.min(scale_y).log2().min(options.max_zoom);

    Some(ViewportState {
        center: unproject((x1 + x2) / 2.0, (y1 + y2) / 2.0),
        zoom,
        pitch: 0.0,
        bearing: 0.0,
    })
}

/// Screen position of `(lng, lat)` for a top-down `view` on a canvas.
pub fn to_screen(
    view: &ViewportState,
    canvas: (f64, f64),
    world_tile_size: f64,
    lng: f64,
    lat: f64,
) -> (f64, f64) {
    let scale = world_tile_size * view.zoom.exp2();
    let (cx, cy) = project(view.center.0, view.center.1);
    let (x, y) = project(lng, lat);
    (
        canvas.0 / 2.0 + (x - cx) * scale,
        canvas.1 / 2.0 + (y - cy) * scale,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn hills() -> LngLatBounds {
        LngLatBounds {
            min_lng: -122.35,
            min_lat: 37.70,
            max_lng: -122.05,
            max_lat: 37.95,
        }
    }

    #[test]
    fn fitted_view_contains_bounds_inside_padding() {
        let canvas = (900.0, 700.0);
        let options = FitOptions::default();
        let view = fit_bounds(&hills(), canvas, 512.0, &options).expect("fit");

        let (left, top) = to_screen(&view, canvas, 512.0, -122.35, 37.95);
        let (right, bottom) = to_screen(&view, canvas, 512.0, -122.05, 37.70);
        assert!(left >= options.padding - EPS);
        assert!(top >= options.padding - EPS);
        assert!(right <= canvas.0 - options.padding + EPS);
        assert!(bottom <= canvas.1 - options.padding + EPS);

        // One axis is tight.
        let slack_x = (left - options.padding).min(canvas.0 - options.padding - right);
        let slack_y = (top - options.padding).min(canvas.1 - options.padding - bottom);
        assert!(slack_x.abs() < 1e-3 || slack_y.abs() < 1e-3);
    }

    #[test]
    fn non_finite_bounds_are_skipped() {
        let mut bounds = hills();
        bounds.max_lat = f64::INFINITY;
        assert_eq!(
            fit_bounds(&bounds, (800.0, 600.0), 512.0, &FitOptions::default()),
            None
        );
        bounds.max_lat = f64::NAN;
        assert_eq!(
            fit_bounds(&bounds, (800.0, 600.0), 256.0, &FitOptions::default()),
            None
        );
    }

    #[test]
    fn tiny_canvas_is_skipped() {
        assert_eq!(
            fit_bounds(&hills(), (60.0, 600.0), 512.0, &FitOptions::default()),
            None
        );
    }

    #[test]
    fn point_bounds_zoom_to_max() {
        let point = LngLatBounds {
            min_lng: -122.2,
            min_lat: 37.8,
            max_lng: -122.2,
            max_lat: 37.8,
        };
        let view = fit_bounds(&point, (800.0, 600.0), 256.0, &FitOptions::default())
            .expect("point fit");
        assert_eq!(view.zoom, MAX_FIT_ZOOM);
        assert!((view.center.0 + 122.2).abs() < EPS);
        assert!((view.center.1 - 37.8).abs() < EPS);
    }

    #[test]
    fn projection_round_trips_at_the_default_center() {
        let (x, y) = project(DEFAULT_CENTER.0, DEFAULT_CENTER.1);
        let (lng, lat) = unproject(x, y);
        assert!((lng - DEFAULT_CENTER.0).abs() < EPS);
        assert!((lat - DEFAULT_CENTER.1).abs() < EPS);
    }
}
