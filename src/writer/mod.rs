//! Geometry writers: visitors turning geometries into output artifacts.
//!
//! The per-type dispatch, collection recursion and the shared
//! convert-and-dedup rules live here; each variant module only implements
//! the `write_*` operations for its artifact. Writer state belongs to one
//! in-flight request and is never reused.

mod geojson;
mod passthrough;
mod raster;

pub use geojson::GeoJsonWriter;
pub use passthrough::PassthroughWriter;
pub use raster::{RasterWriter, TileImage};

use crate::convert::CoordinateConverter;
use geo::{
    Geometry, HasDimensions, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon,
};

/// One writer variant. `finish` consumes the writer and yields the artifact.
pub trait GeometryWriter {
    type Output;

    fn write_point(&mut self, point: &Point<f64>);
    fn write_multi_point(&mut self, points: &MultiPoint<f64>);
    fn write_line_string(&mut self, line: &LineString<f64>);
    fn write_multi_line_string(&mut self, lines: &MultiLineString<f64>);
    fn write_polygon(&mut self, polygon: &Polygon<f64>);
    fn write_multi_polygon(&mut self, polygons: &MultiPolygon<f64>);
    fn finish(self) -> Self::Output;
}

/// Dispatch one geometry to the matching `write_*` operation.
///
/// Empty geometries are dropped, collections recurse into their members, and
/// the degenerate `Line`/`Rect`/`Triangle` variants are normalized to their
/// line-string/polygon equivalents so writers only see the seven standard
/// shapes.
pub fn write_geometry<W: GeometryWriter>(writer: &mut W, geometry: &Geometry<f64>) {
    if geometry.is_empty() {
        return;
    }
    match geometry {
        Geometry::Point(p) => writer.write_point(p),
        Geometry::MultiPoint(mp) => writer.write_multi_point(mp),
        Geometry::Line(l) => writer.write_line_string(&LineString::from(*l)),
        Geometry::LineString(ls) => writer.write_line_string(ls),
        Geometry::MultiLineString(mls) => writer.write_multi_line_string(mls),
        Geometry::Polygon(p) => writer.write_polygon(p),
        Geometry::MultiPolygon(mp) => writer.write_multi_polygon(mp),
        Geometry::Rect(r) => writer.write_polygon(&r.to_polygon()),
        Geometry::Triangle(t) => writer.write_polygon(&t.to_polygon()),
        Geometry::GeometryCollection(gc) => {
            for member in gc {
                write_geometry(writer, member);
            }
        }
    }
}

/// Convert a coordinate path, dropping consecutive points that became
/// identical after conversion.
pub(crate) fn convert_path(
    converter: &dyn CoordinateConverter,
    line: &LineString<f64>,
) -> Vec<(f64, f64)> {
    let mut out: Vec<(f64, f64)> = Vec::with_capacity(line.0.len());
    for coord in &line.0 {
        let point = converter.transform(coord.x, coord.y);
        if out.last() != Some(&point) {
            out.push(point);
        }
    }
    out
}

/// Convert a ring, counting its closing coordinate once. The result is an
/// open point list; callers decide between skip, point, segment and ring
/// from its length (0, 1, 2, 3+).
pub(crate) fn convert_ring(
    converter: &dyn CoordinateConverter,
    ring: &LineString<f64>,
) -> Vec<(f64, f64)> {
    let mut points = convert_path(converter, ring);
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    points
}
