//! Coordinate conversion strategies.
//!
//! A converter is built once per request from the query's bounding box and
//! output size, then applied to every coordinate the writers emit. Converters
//! hold no mutable state after construction and are safe to share across
//! writer invocations within a request.

use crate::tile_system;
use crate::types::BoundingBox;
use std::f64::consts::PI;

/// Maps a geographic `(lon, lat)` pair into output-space coordinates.
pub trait CoordinateConverter: Send + Sync {
    fn transform(&self, x: f64, y: f64) -> (f64, f64);
}

/// Normalized (zoom-independent) Web Mercator projection: x in `[0, 1]`
/// west to east, y in `[0, 1]` north to south.
fn project(longitude: f64, latitude: f64) -> (f64, f64) {
    let x = (longitude + 180.0) / 360.0;
    let sin_latitude = (latitude * PI / 180.0).sin();
    let y = 0.5 - ((1.0 + sin_latitude) / (1.0 - sin_latitude)).ln() / (4.0 * PI);
    (x, y)
}

/// Projects geographic coordinates into integer pixel coordinates of a
/// `width` by `height` canvas showing the query viewport.
///
/// The projected viewport is expanded on whichever axis is under-represented
/// until its aspect ratio matches `width / height`, so scale stays uniform
/// and nothing inside the requested box is pushed off-canvas.
pub struct RasterConverter {
    width: f64,
    height: f64,
    min_x: f64,
    min_y: f64,
    viewport_width: f64,
    viewport_height: f64,
}

impl RasterConverter {
    pub fn new(bbox: &BoundingBox, width: u32, height: u32) -> Self {
        // Projected y grows southward, so the viewport's top edge comes from
        // the geographic maximum latitude.
        let (min_x, min_y) = project(bbox.min_x, bbox.max_y);
        let (max_x, max_y) = project(bbox.max_x, bbox.min_y);

        let mut viewport_width = max_x - min_x;
        let mut viewport_height = max_y - min_y;
        let target_ratio = width as f64 / height as f64;
        let ratio = viewport_width / viewport_height;
        if ratio > target_ratio {
            viewport_height = viewport_width / target_ratio;
        } else if ratio < target_ratio {
            viewport_width = viewport_height * target_ratio;
        }

        Self {
            width: width as f64,
            height: height as f64,
            min_x,
            min_y,
            viewport_width,
            viewport_height,
        }
    }
}

impl CoordinateConverter for RasterConverter {
    fn transform(&self, x: f64, y: f64) -> (f64, f64) {
        let (px, py) = project(x, y);
        let out_x = (self.width * (px - self.min_x) / self.viewport_width).trunc();
        let out_y = (self.height * (py - self.min_y) / self.viewport_height).trunc();
        (out_x, out_y)
    }
}

/// Rounds coordinates to the number of decimal digits distinguishable at the
/// output resolution. Never projects; only drops precision so serialized
/// output shrinks without visible loss.
pub struct PrecisionConverter {
    digits_x: u32,
    /// Fixed latitude digits when the viewport's top and bottom resolve the
    /// same; otherwise digits are derived per point from its latitude.
    digits_y: Option<u32>,
    global_map_height: f64,
}

impl PrecisionConverter {
    pub fn new(bbox: &BoundingBox, width: u32, height: u32) -> Self {
        // Virtual world-map size at which the bbox fills the output.
        let global_map_width = 360.0 * width as f64 / bbox.width();
        let global_map_height = 180.0 * height as f64 / bbox.height();

        let digits_x =
            tile_system::useful_digits(tile_system::EARTH_CIRCUMFERENCE / global_map_width);
        let digits_top = tile_system::useful_digits(tile_system::ground_resolution_for_map_size(
            bbox.max_y,
            global_map_height,
        ));
        let digits_bottom = tile_system::useful_digits(
            tile_system::ground_resolution_for_map_size(bbox.min_y, global_map_height),
        );

        Self {
            digits_x,
            digits_y: (digits_top == digits_bottom).then_some(digits_top),
            global_map_height,
        }
    }
}

fn round_to_digits(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}

impl CoordinateConverter for PrecisionConverter {
    fn transform(&self, x: f64, y: f64) -> (f64, f64) {
        let digits_y = self.digits_y.unwrap_or_else(|| {
            tile_system::useful_digits(tile_system::ground_resolution_for_map_size(
                y,
                self.global_map_height,
            ))
        });
        (
            round_to_digits(x, self.digits_x),
            round_to_digits(y, digits_y),
        )
    }
}

/// Passthrough converter for outputs that need no transform.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityConverter;

impl CoordinateConverter for IdentityConverter {
    fn transform(&self, x: f64, y: f64) -> (f64, f64) {
        (x, y)
    }
}
