//! GeoJSON geometry writer producing a serialized feature collection.

use super::{GeometryWriter, convert_path, convert_ring};
use crate::convert::CoordinateConverter;
use crate::error::Result;
use geo::{LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use geojson::{Feature, FeatureCollection, Value};

type Position = Vec<f64>;

fn position(point: (f64, f64)) -> Position {
    vec![point.0, point.1]
}

/// Closed GeoJSON ring from an open converted point list.
fn closed_ring(points: &[(f64, f64)]) -> Vec<Position> {
    let mut ring: Vec<Position> = points.iter().map(|&p| position(p)).collect();
    ring.push(position(points[0]));
    ring
}

/// Writes each geometry as one feature of a collection; degenerate rings
/// and paths downgrade to the lower-dimension shape they still represent.
pub struct GeoJsonWriter<'a> {
    converter: &'a dyn CoordinateConverter,
    features: Vec<Feature>,
}

impl<'a> GeoJsonWriter<'a> {
    pub fn new(converter: &'a dyn CoordinateConverter) -> Self {
        Self {
            converter,
            features: Vec::new(),
        }
    }

    fn push_value(&mut self, value: Value) {
        self.features.push(Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(value)),
            id: None,
            properties: None,
            foreign_members: None,
        });
    }

    /// Converted rings of a polygon: exterior first, then interiors with at
    /// least three points. `None` when the exterior is degenerate (it has
    /// then already been written as a point or segment).
    fn polygon_rings(&mut self, polygon: &Polygon<f64>) -> Option<Vec<Vec<Position>>> {
        let exterior = convert_ring(self.converter, polygon.exterior());
        match exterior.len() {
            0 => return None,
            1 => {
                self.push_value(Value::Point(position(exterior[0])));
                return None;
            }
            2 => {
                self.push_value(Value::LineString(vec![
                    position(exterior[0]),
                    position(exterior[1]),
                ]));
                return None;
            }
            _ => {}
        }

        let mut rings = vec![closed_ring(&exterior)];
        for interior in polygon.interiors() {
            let points = convert_ring(self.converter, interior);
            if points.len() >= 3 {
                rings.push(closed_ring(&points));
            }
        }
        Some(rings)
    }
}

impl GeometryWriter for GeoJsonWriter<'_> {
    type Output = Result<String>;

    fn write_point(&mut self, point: &Point<f64>) {
        let p = self.converter.transform(point.x(), point.y());
        self.push_value(Value::Point(position(p)));
    }

    fn write_multi_point(&mut self, points: &MultiPoint<f64>) {
        let positions: Vec<Position> = points
            .0
            .iter()
            .map(|p| position(self.converter.transform(p.x(), p.y())))
            .collect();
        if !positions.is_empty() {
            self.push_value(Value::MultiPoint(positions));
        }
    }

    fn write_line_string(&mut self, line: &LineString<f64>) {
        let points = convert_path(self.converter, line);
        match points.len() {
            0 => {}
            1 => self.push_value(Value::Point(position(points[0]))),
            _ => self.push_value(Value::LineString(
                points.into_iter().map(position).collect(),
            )),
        }
    }

    fn write_multi_line_string(&mut self, lines: &MultiLineString<f64>) {
        let mut paths = Vec::new();
        for line in &lines.0 {
            let points = convert_path(self.converter, line);
            match points.len() {
                0 => {}
                1 => self.push_value(Value::Point(position(points[0]))),
                _ => paths.push(points.into_iter().map(position).collect()),
            }
        }
        if !paths.is_empty() {
            self.push_value(Value::MultiLineString(paths));
        }
    }

    fn write_polygon(&mut self, polygon: &Polygon<f64>) {
        if let Some(rings) = self.polygon_rings(polygon) {
            self.push_value(Value::Polygon(rings));
        }
    }

    fn write_multi_polygon(&mut self, polygons: &MultiPolygon<f64>) {
        let mut members = Vec::new();
        for polygon in &polygons.0 {
            if let Some(rings) = self.polygon_rings(polygon) {
                members.push(rings);
            }
        }
        if !members.is_empty() {
            self.push_value(Value::MultiPolygon(members));
        }
    }

    fn finish(self) -> Result<String> {
        let collection = FeatureCollection {
            bbox: None,
            features: self.features,
            foreign_members: None,
        };
        Ok(serde_json::to_string(&collection)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::IdentityConverter;
    use geo::{line_string, point, polygon};

    fn parse(json: &str) -> FeatureCollection {
        json.parse::<geojson::GeoJson>()
            .unwrap()
            .try_into()
            .unwrap()
    }

    #[test]
    fn test_polygon_feature_with_one_ring() {
        let converter = IdentityConverter;
        let mut writer = GeoJsonWriter::new(&converter);
        writer.write_polygon(&polygon![
            (x: 0.0, y: 0.0),
            (x: 4.0, y: 0.0),
            (x: 4.0, y: 4.0),
            (x: 0.0, y: 0.0),
        ]);
        let collection = parse(&writer.finish().unwrap());
        assert_eq!(collection.features.len(), 1);

        let geometry = collection.features[0].geometry.as_ref().unwrap();
        match &geometry.value {
            Value::Polygon(rings) => {
                assert_eq!(rings.len(), 1);
                // Ring is closed on output.
                assert_eq!(rings[0].first(), rings[0].last());
                assert_eq!(rings[0].len(), 4);
            }
            other => panic!("expected polygon, got {other:?}"),
        }
    }

    #[test]
    fn test_degenerate_ring_becomes_line() {
        let converter = IdentityConverter;
        let mut writer = GeoJsonWriter::new(&converter);
        writer.write_polygon(&polygon![
            (x: 1.0, y: 1.0),
            (x: 5.0, y: 1.0),
            (x: 1.0, y: 1.0),
        ]);
        let collection = parse(&writer.finish().unwrap());
        assert_eq!(collection.features.len(), 1);
        let geometry = collection.features[0].geometry.as_ref().unwrap();
        assert!(matches!(&geometry.value, Value::LineString(path) if path.len() == 2));
    }

    #[test]
    fn test_point_and_line() {
        let converter = IdentityConverter;
        let mut writer = GeoJsonWriter::new(&converter);
        writer.write_point(&point!(x: 2.5, y: 3.5));
        writer.write_line_string(&line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 2.0)]);
        let collection = parse(&writer.finish().unwrap());
        assert_eq!(collection.features.len(), 2);
    }

    #[test]
    fn test_empty_writer_serializes_empty_collection() {
        let converter = IdentityConverter;
        let writer = GeoJsonWriter::new(&converter);
        let collection = parse(&writer.finish().unwrap());
        assert!(collection.features.is_empty());
    }
}
