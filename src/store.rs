//! Backing feature store abstraction.
//!
//! The renderer only ever needs two access paths: a full-table scan to
//! populate the in-memory spatial cache, and a direct bounding-box query for
//! deployments that run with the cache disabled. Anything that can serve
//! those two calls can sit behind the renderer.

use crate::error::{Result, TilemintError};
use crate::types::BoundingBox;
use geo::{BoundingRect, Geometry};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// A source of identified geometries, grouped into named tables.
pub trait FeatureStore: Send + Sync {
    /// Every feature of `table`. Used once per table to build the in-memory
    /// cache; any error aborts the load.
    fn scan(&self, table: &str) -> Result<Vec<(u64, Geometry<f64>)>>;

    /// Features of `table` whose envelope intersects `bbox`. Serves requests
    /// directly when the in-memory cache is bypassed.
    fn query_bbox(&self, table: &str, bbox: &BoundingBox) -> Result<Vec<(u64, Geometry<f64>)>>;

    /// Names of the tables this store serves.
    fn tables(&self) -> Vec<String>;
}

/// In-memory [`FeatureStore`] for tests, demos and embedding without an
/// external database.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<FxHashMap<String, Vec<(u64, Geometry<f64>)>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the table if missing; replaces nothing.
    pub fn create_table(&self, table: impl Into<String>) {
        self.tables.write().entry(table.into()).or_default();
    }

    /// Insert a feature, creating the table on first use.
    pub fn insert(&self, table: &str, id: u64, geometry: Geometry<f64>) {
        self.tables
            .write()
            .entry(table.to_string())
            .or_default()
            .push((id, geometry));
    }

    pub fn len(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, Vec::len)
    }

    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }
}

impl FeatureStore for MemoryStore {
    fn scan(&self, table: &str) -> Result<Vec<(u64, Geometry<f64>)>> {
        self.tables
            .read()
            .get(table)
            .cloned()
            .ok_or_else(|| TilemintError::UnknownTable(table.to_string()))
    }

    fn query_bbox(&self, table: &str, bbox: &BoundingBox) -> Result<Vec<(u64, Geometry<f64>)>> {
        let tables = self.tables.read();
        let features = tables
            .get(table)
            .ok_or_else(|| TilemintError::UnknownTable(table.to_string()))?;

        Ok(features
            .iter()
            .filter(|(_, geometry)| envelope_intersects(geometry, bbox))
            .cloned()
            .collect())
    }

    fn tables(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }
}

/// Envelope-overlap test used by the direct query path.
fn envelope_intersects(geometry: &Geometry<f64>, bbox: &BoundingBox) -> bool {
    match geometry.bounding_rect() {
        Some(rect) => {
            rect.min().x <= bbox.max_x
                && rect.max().x >= bbox.min_x
                && rect.min().y <= bbox.max_y
                && rect.max().y >= bbox.min_y
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{point, polygon};

    fn sample_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert("poi", 1, point!(x: 2.35, y: 48.85).into());
        store.insert("poi", 2, point!(x: 100.0, y: 10.0).into());
        store.insert(
            "land",
            7,
            polygon![
                (x: 0.0, y: 0.0),
                (x: 4.0, y: 0.0),
                (x: 4.0, y: 4.0),
                (x: 0.0, y: 4.0),
                (x: 0.0, y: 0.0),
            ]
            .into(),
        );
        store
    }

    #[test]
    fn test_scan_returns_all_features() {
        let store = sample_store();
        assert_eq!(store.scan("poi").unwrap().len(), 2);
        assert_eq!(store.scan("land").unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_table() {
        let store = sample_store();
        assert!(matches!(
            store.scan("nope"),
            Err(TilemintError::UnknownTable(_))
        ));
        assert!(
            store
                .query_bbox("nope", &BoundingBox::new(0.0, 0.0, 1.0, 1.0))
                .is_err()
        );
    }

    #[test]
    fn test_query_bbox_filters_by_envelope() {
        let store = sample_store();
        let paris = BoundingBox::new(2.0, 48.0, 3.0, 49.0);
        let hits = store.query_bbox("poi", &paris).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, 1);

        // Touching the polygon's edge still counts as intersecting.
        let edge = BoundingBox::new(4.0, 0.0, 5.0, 1.0);
        assert_eq!(store.query_bbox("land", &edge).unwrap().len(), 1);
    }

    #[test]
    fn test_create_table_is_idempotent() {
        let store = MemoryStore::new();
        store.create_table("roads");
        assert!(store.is_empty("roads"));
        store.insert("roads", 1, point!(x: 0.0, y: 0.0).into());
        store.create_table("roads");
        assert_eq!(store.len("roads"), 1);
        assert_eq!(store.tables(), vec!["roads".to_string()]);
    }
}
