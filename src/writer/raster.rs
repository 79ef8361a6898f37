//! Raster geometry writer producing an RGBA tile image.

use super::{GeometryWriter, convert_path, convert_ring};
use crate::convert::CoordinateConverter;
use crate::types::{Color, LayerStyle};
use geo::{LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_line_segment_mut;

/// A rendered raster tile.
#[derive(Debug, Clone)]
pub struct TileImage {
    pub image: RgbaImage,
    /// True when every pixel is fully transparent.
    pub empty: bool,
}

impl TileImage {
    /// Fully transparent canvas, tagged empty.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
            empty: true,
        }
    }
}

fn rgba(color: Color) -> Rgba<u8> {
    Rgba([color.r, color.g, color.b, color.a])
}

/// Accumulates converted geometry and rasterizes it on [`finish`].
///
/// Sub-pixel points, stroke paths and fill rings are collected separately
/// and drawn in that order onto one canvas.
///
/// [`finish`]: GeometryWriter::finish
pub struct RasterWriter<'a> {
    converter: &'a dyn CoordinateConverter,
    style: LayerStyle,
    width: u32,
    height: u32,
    pixels: Vec<(f64, f64)>,
    strokes: Vec<Vec<(f64, f64)>>,
    /// Outer vec: polygons; middle: rings of one polygon; inner: open ring
    /// point lists. Rings of one polygon fill together so holes subtract.
    fills: Vec<Vec<Vec<(f64, f64)>>>,
}

impl<'a> RasterWriter<'a> {
    pub fn new(
        converter: &'a dyn CoordinateConverter,
        style: LayerStyle,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            converter,
            style,
            width,
            height,
            pixels: Vec::new(),
            strokes: Vec::new(),
            fills: Vec::new(),
        }
    }

    fn put_pixel(image: &mut RgbaImage, x: f64, y: f64, color: Rgba<u8>) {
        if x >= 0.0 && y >= 0.0 && (x as u32) < image.width() && (y as u32) < image.height() {
            image.put_pixel(x as u32, y as u32, color);
        }
    }

    fn draw_stroke(&self, image: &mut RgbaImage, path: &[(f64, f64)]) {
        let color = rgba(self.style.stroke);
        let thickness = self.style.stroke_width.round().max(1.0) as i32;
        for segment in path.windows(2) {
            let (x0, y0) = segment[0];
            let (x1, y1) = segment[1];
            if thickness <= 1 {
                draw_line_segment_mut(
                    image,
                    (x0 as f32, y0 as f32),
                    (x1 as f32, y1 as f32),
                    color,
                );
                continue;
            }
            // Thickness approximated by offset passes along both axes.
            for offset in 0..thickness {
                let d = (offset - thickness / 2) as f32;
                draw_line_segment_mut(
                    image,
                    (x0 as f32 + d, y0 as f32),
                    (x1 as f32 + d, y1 as f32),
                    color,
                );
                draw_line_segment_mut(
                    image,
                    (x0 as f32, y0 as f32 + d),
                    (x1 as f32, y1 as f32 + d),
                    color,
                );
            }
        }
    }

    /// Even-odd scanline fill over all rings of one polygon.
    fn fill_polygon(&self, image: &mut RgbaImage, rings: &[Vec<(f64, f64)>]) {
        let color = rgba(self.style.fill);
        for y in 0..self.height {
            let scan_y = y as f64 + 0.5;
            let mut crossings = Vec::new();
            for ring in rings {
                for i in 0..ring.len() {
                    let (x0, y0) = ring[i];
                    let (x1, y1) = ring[(i + 1) % ring.len()];
                    if (y0 <= scan_y) != (y1 <= scan_y) {
                        crossings.push(x0 + (scan_y - y0) * (x1 - x0) / (y1 - y0));
                    }
                }
            }
            crossings.sort_by(|a, b| a.total_cmp(b));
            for span in crossings.chunks_exact(2) {
                let start = (span[0] - 0.5).ceil().max(0.0) as i64;
                let end = ((span[1] - 0.5).ceil() as i64).min(self.width as i64);
                for x in start..end {
                    image.put_pixel(x as u32, y, color);
                }
            }
        }
    }

    /// Route a converted ring by its degeneracy class. Returns the ring when
    /// it has enough points to participate in a fill.
    fn route_ring(&mut self, ring: &LineString<f64>) -> Option<Vec<(f64, f64)>> {
        let points = convert_ring(self.converter, ring);
        match points.len() {
            0 => None,
            1 => {
                self.pixels.push(points[0]);
                None
            }
            2 => {
                self.strokes.push(points);
                None
            }
            _ => Some(points),
        }
    }
}

impl GeometryWriter for RasterWriter<'_> {
    type Output = TileImage;

    fn write_point(&mut self, point: &Point<f64>) {
        self.pixels.push(self.converter.transform(point.x(), point.y()));
    }

    fn write_multi_point(&mut self, points: &MultiPoint<f64>) {
        for point in &points.0 {
            self.write_point(point);
        }
    }

    fn write_line_string(&mut self, line: &LineString<f64>) {
        let points = convert_path(self.converter, line);
        match points.len() {
            0 => {}
            1 => self.pixels.push(points[0]),
            _ => self.strokes.push(points),
        }
    }

    fn write_multi_line_string(&mut self, lines: &MultiLineString<f64>) {
        for line in &lines.0 {
            self.write_line_string(line);
        }
    }

    fn write_polygon(&mut self, polygon: &Polygon<f64>) {
        let Some(exterior) = self.route_ring(polygon.exterior()) else {
            return;
        };

        let mut rings = vec![exterior];
        for interior in polygon.interiors() {
            let points = convert_ring(self.converter, interior);
            if points.len() >= 3 {
                rings.push(points);
            }
        }

        // Ring outlines stroke; closure segment added back for drawing.
        for ring in &rings {
            let mut outline = ring.clone();
            outline.push(outline[0]);
            self.strokes.push(outline);
        }
        self.fills.push(rings);
    }

    fn write_multi_polygon(&mut self, polygons: &MultiPolygon<f64>) {
        for polygon in &polygons.0 {
            self.write_polygon(polygon);
        }
    }

    fn finish(self) -> TileImage {
        let mut image = RgbaImage::new(self.width, self.height);

        let point_color = rgba(self.style.fill);
        for &(x, y) in &self.pixels {
            Self::put_pixel(&mut image, x, y, point_color);
        }
        for path in &self.strokes {
            self.draw_stroke(&mut image, path);
        }
        for rings in &self.fills {
            self.fill_polygon(&mut image, rings);
        }

        let empty = image.pixels().all(|p| p.0 == [0, 0, 0, 0]);
        TileImage { image, empty }
    }
}
