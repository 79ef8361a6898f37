//! Bing-style tile coordinate math over the Web Mercator projection.
//!
//! Pure, stateless functions mapping between zoom level, tile XY, quadkey,
//! pixel XY and geographic degrees, for a fixed 256-pixel tile size.
//! Latitude is clamped to the Mercator-safe range near the poles.

use crate::error::{Result, TilemintError};
use std::f64::consts::PI;

/// Tile edge length in pixels.
pub const TILE_SIZE: u32 = 256;

/// WGS84 semi-major axis in meters.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Equatorial circumference in meters.
pub const EARTH_CIRCUMFERENCE: f64 = 2.0 * PI * EARTH_RADIUS;

/// Southernmost latitude representable on a square Mercator map.
pub const MIN_LATITUDE: f64 = -85.051_128_78;
/// Northernmost latitude representable on a square Mercator map.
pub const MAX_LATITUDE: f64 = 85.051_128_78;
pub const MIN_LONGITUDE: f64 = -180.0;
pub const MAX_LONGITUDE: f64 = 180.0;

/// Smallest zoom level served.
pub const MIN_ZOOM: u8 = 1;
/// Deepest zoom level served.
pub const MAX_ZOOM: u8 = 23;

fn clip(n: f64, min: f64, max: f64) -> f64 {
    n.max(min).min(max)
}

/// Width (and height) of the world map in pixels at `zoom`.
pub fn map_size(zoom: u8) -> u64 {
    (TILE_SIZE as u64) << zoom
}

/// Ground distance in meters covered by one pixel at `latitude` and `zoom`.
pub fn ground_resolution(latitude: f64, zoom: u8) -> f64 {
    ground_resolution_for_map_size(latitude, map_size(zoom) as f64)
}

/// Ground resolution against an explicit map width in pixels.
///
/// Used by the precision-reducing coordinate converter, which works with a
/// virtual map size derived from the viewport rather than a zoom level.
pub fn ground_resolution_for_map_size(latitude: f64, map_size_pixels: f64) -> f64 {
    let latitude = clip(latitude, MIN_LATITUDE, MAX_LATITUDE);
    (latitude * PI / 180.0).cos() * EARTH_CIRCUMFERENCE / map_size_pixels
}

/// Number of decimal digits of longitude/latitude meaningfully
/// distinguishable at the given ground resolution (meters per pixel).
pub fn useful_digits(resolution: f64) -> u32 {
    1 + (resolution * 360.0 / EARTH_CIRCUMFERENCE).log10().abs().floor() as u32
}

/// Forward Web Mercator projection to absolute pixel coordinates at `zoom`.
pub fn lat_long_to_pixel_xy(latitude: f64, longitude: f64, zoom: u8) -> (i64, i64) {
    let latitude = clip(latitude, MIN_LATITUDE, MAX_LATITUDE);
    let longitude = clip(longitude, MIN_LONGITUDE, MAX_LONGITUDE);

    let x = (longitude + 180.0) / 360.0;
    let sin_latitude = (latitude * PI / 180.0).sin();
    let y = 0.5 - ((1.0 + sin_latitude) / (1.0 - sin_latitude)).ln() / (4.0 * PI);

    let size = map_size(zoom) as f64;
    let pixel_x = clip(x * size + 0.5, 0.0, size - 1.0) as i64;
    let pixel_y = clip(y * size + 0.5, 0.0, size - 1.0) as i64;
    (pixel_x, pixel_y)
}

/// Inverse projection: absolute pixel coordinates back to (latitude, longitude).
pub fn pixel_xy_to_lat_long(pixel_x: i64, pixel_y: i64, zoom: u8) -> (f64, f64) {
    let size = map_size(zoom) as f64;
    let x = clip(pixel_x as f64, 0.0, size - 1.0) / size - 0.5;
    let y = 0.5 - clip(pixel_y as f64, 0.0, size - 1.0) / size;

    let latitude = 90.0 - 360.0 * (-y * 2.0 * PI).exp().atan() / PI;
    let longitude = 360.0 * x;
    (latitude, longitude)
}

/// Tile indices containing the given absolute pixel.
pub fn pixel_xy_to_tile_xy(pixel_x: i64, pixel_y: i64) -> (u32, u32) {
    (
        (pixel_x / TILE_SIZE as i64) as u32,
        (pixel_y / TILE_SIZE as i64) as u32,
    )
}

/// Absolute pixel coordinates of a tile's north-west corner.
pub fn tile_xy_to_pixel_xy(tile_x: u32, tile_y: u32) -> (i64, i64) {
    (
        tile_x as i64 * TILE_SIZE as i64,
        tile_y as i64 * TILE_SIZE as i64,
    )
}

/// Encode tile coordinates as a Bing Maps quadkey, one base-4 digit per
/// zoom level, most significant digit first.
pub fn tile_xy_to_quad_key(tile_x: u32, tile_y: u32, zoom: u8) -> String {
    let mut quad_key = String::with_capacity(zoom as usize);
    for i in (1..=zoom).rev() {
        let mask = 1u32 << (i - 1);
        let mut digit = b'0';
        if tile_x & mask != 0 {
            digit += 1;
        }
        if tile_y & mask != 0 {
            digit += 2;
        }
        quad_key.push(digit as char);
    }
    quad_key
}

/// Decode a quadkey into `(tile_x, tile_y, zoom)`.
///
/// Fails with [`TilemintError::InvalidQuadkey`] when the key is empty,
/// longer than [`MAX_ZOOM`] digits, or contains a character outside `0..=3`.
pub fn quad_key_to_tile_xy(quad_key: &str) -> Result<(u32, u32, u8)> {
    let zoom = quad_key.len();
    if zoom == 0 || zoom > MAX_ZOOM as usize {
        return Err(TilemintError::InvalidQuadkey(quad_key.to_string()));
    }

    let mut tile_x = 0u32;
    let mut tile_y = 0u32;
    for (i, digit) in quad_key.bytes().enumerate() {
        let mask = 1u32 << (zoom - i - 1);
        match digit {
            b'0' => {}
            b'1' => tile_x |= mask,
            b'2' => tile_y |= mask,
            b'3' => {
                tile_x |= mask;
                tile_y |= mask;
            }
            _ => return Err(TilemintError::InvalidQuadkey(quad_key.to_string())),
        }
    }
    Ok((tile_x, tile_y, zoom as u8))
}
