//! Passthrough writer returning native geometry values.

use super::GeometryWriter;
use geo::{
    Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon,
};

/// Collects the geometries handed to it, unchanged, for callers that want
/// geometry objects rather than a rendered artifact.
#[derive(Debug, Default)]
pub struct PassthroughWriter {
    geometries: Vec<Geometry<f64>>,
}

impl PassthroughWriter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GeometryWriter for PassthroughWriter {
    type Output = Vec<Geometry<f64>>;

    fn write_point(&mut self, point: &Point<f64>) {
        self.geometries.push(Geometry::Point(*point));
    }

    fn write_multi_point(&mut self, points: &MultiPoint<f64>) {
        self.geometries.push(Geometry::MultiPoint(points.clone()));
    }

    fn write_line_string(&mut self, line: &LineString<f64>) {
        self.geometries.push(Geometry::LineString(line.clone()));
    }

    fn write_multi_line_string(&mut self, lines: &MultiLineString<f64>) {
        self.geometries
            .push(Geometry::MultiLineString(lines.clone()));
    }

    fn write_polygon(&mut self, polygon: &Polygon<f64>) {
        self.geometries.push(Geometry::Polygon(polygon.clone()));
    }

    fn write_multi_polygon(&mut self, polygons: &MultiPolygon<f64>) {
        self.geometries
            .push(Geometry::MultiPolygon(polygons.clone()));
    }

    fn finish(self) -> Vec<Geometry<f64>> {
        self.geometries
    }
}
