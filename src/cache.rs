//! Lazily-built in-memory spatial cache.
//!
//! Each table is loaded at most once, on first use, by a full scan of the
//! backing store. The loaded snapshot is immutable and shared behind an
//! `Arc`; concurrent requests for the same table block on one load, while
//! loads of different tables proceed independently. A failed load leaves the
//! table unloaded so a later request can retry.

use crate::error::{Result, TilemintError};
use crate::store::FeatureStore;
use crate::types::BoundingBox;
use geo::{BoundingRect, Centroid, Geometry, HasDimensions, Point};
use log::{debug, warn};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use rstar::{AABB, RTree, RTreeObject};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::time::Instant;

/// A feature as held by the cache, with the per-feature values the render
/// pipeline needs precomputed at load time.
#[derive(Debug, Clone)]
pub struct CachedFeature {
    pub id: u64,
    pub geometry: Geometry<f64>,
    /// Area of the geometry's envelope in squared degrees. Zero for points.
    pub envelope_area: f64,
    pub centroid: Point<f64>,
}

/// R-tree entry: a feature id keyed by its envelope.
#[derive(Debug, Clone)]
pub struct IndexedEnvelope {
    id: u64,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Immutable loaded snapshot of one table.
#[derive(Debug)]
pub struct TableCache {
    features: FxHashMap<u64, CachedFeature>,
    index: RTree<IndexedEnvelope>,
}

impl TableCache {
    /// Build the snapshot from a full scan of `store`.
    fn load(table: &str, store: &dyn FeatureStore) -> Result<Self> {
        let started = Instant::now();
        let scanned = store
            .scan(table)
            .map_err(|e| TilemintError::cache_load(table, e))?;

        let mut features = FxHashMap::default();
        let mut entries = Vec::with_capacity(scanned.len());
        for (id, geometry) in scanned {
            if geometry.is_empty() {
                warn!("table '{table}': skipping empty geometry for feature {id}");
                continue;
            }
            let Some(rect) = geometry.bounding_rect() else {
                warn!("table '{table}': skipping feature {id} without an envelope");
                continue;
            };
            let Some(centroid) = geometry.centroid() else {
                warn!("table '{table}': skipping feature {id} without a centroid");
                continue;
            };

            entries.push(IndexedEnvelope {
                id,
                envelope: AABB::from_corners([rect.min().x, rect.min().y], [
                    rect.max().x,
                    rect.max().y,
                ]),
            });
            features.insert(id, CachedFeature {
                id,
                geometry,
                envelope_area: rect.width() * rect.height(),
                centroid,
            });
        }

        let index = RTree::bulk_load(entries);
        debug!(
            "table '{table}': cached {} features in {:?}",
            features.len(),
            started.elapsed()
        );
        Ok(Self { features, index })
    }

    /// Ids of features whose envelope intersects `bbox`.
    pub fn query(&self, bbox: &BoundingBox) -> Vec<u64> {
        let envelope = AABB::from_corners([bbox.min_x, bbox.min_y], [bbox.max_x, bbox.max_y]);
        self.index
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.id)
            .collect()
    }

    /// Look up a feature by id. Ids produced by [`TableCache::query`] are
    /// always present; a miss means the caller holds a stale id.
    pub fn get(&self, table: &str, id: u64) -> Result<&CachedFeature> {
        self.features
            .get(&id)
            .ok_or_else(|| TilemintError::FeatureNotFound {
                table: table.to_string(),
                id,
            })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Summary of what the cache currently holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub loaded_tables: usize,
    pub total_features: usize,
}

/// Registry of per-table caches.
#[derive(Default)]
pub struct GeometryCache {
    tables: Mutex<FxHashMap<String, Arc<OnceCell<Arc<TableCache>>>>>,
}

impl GeometryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the loaded snapshot for `table`, scanning `store` to build it
    /// on first use. Concurrent callers for the same table share one load;
    /// the registry lock is not held during the scan, so other tables load
    /// in parallel.
    pub fn ensure_loaded(
        &self,
        table: &str,
        store: &dyn FeatureStore,
    ) -> Result<Arc<TableCache>> {
        let cell = {
            let mut tables = self.tables.lock();
            Arc::clone(tables.entry(table.to_string()).or_default())
        };
        let cache = cell.get_or_try_init(|| TableCache::load(table, store).map(Arc::new))?;
        Ok(Arc::clone(cache))
    }

    pub fn is_loaded(&self, table: &str) -> bool {
        self.tables
            .lock()
            .get(table)
            .is_some_and(|cell| cell.get().is_some())
    }

    pub fn stats(&self) -> CacheStats {
        let tables = self.tables.lock();
        let mut stats = CacheStats::default();
        for cell in tables.values() {
            if let Some(cache) = cell.get() {
                stats.loaded_tables += 1;
                stats.total_features += cache.len();
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use geo::{LineString, line_string, point, polygon};

    fn sample_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert("mixed", 1, point!(x: 2.0, y: 48.0).into());
        store.insert(
            "mixed",
            2,
            line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 10.0)].into(),
        );
        store.insert(
            "mixed",
            3,
            polygon![
                (x: 20.0, y: 20.0),
                (x: 30.0, y: 20.0),
                (x: 30.0, y: 30.0),
                (x: 20.0, y: 20.0),
            ]
            .into(),
        );
        store
    }

    #[test]
    fn test_load_and_query() {
        let store = sample_store();
        let cache = GeometryCache::new();
        let table = cache.ensure_loaded("mixed", &store).unwrap();

        assert_eq!(table.len(), 3);
        let hits = table.query(&BoundingBox::new(-1.0, -1.0, 5.0, 49.0));
        assert_eq!(hits.len(), 2);
        assert!(hits.contains(&1));
        assert!(hits.contains(&2));

        let feature = table.get("mixed", 1).unwrap();
        assert_eq!(feature.envelope_area, 0.0);
        assert_eq!(feature.centroid, point!(x: 2.0, y: 48.0));
        assert!(matches!(
            table.get("mixed", 99),
            Err(TilemintError::FeatureNotFound { id: 99, .. })
        ));
    }

    #[test]
    fn test_empty_geometries_skipped() {
        let store = MemoryStore::new();
        store.insert("t", 1, point!(x: 1.0, y: 1.0).into());
        store.insert("t", 2, Geometry::LineString(LineString::new(vec![])));

        let cache = GeometryCache::new();
        let table = cache.ensure_loaded("t", &store).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_load_is_idempotent() {
        let store = sample_store();
        let cache = GeometryCache::new();
        let first = cache.ensure_loaded("mixed", &store).unwrap();
        // Mutating the store after the load must not be visible.
        store.insert("mixed", 4, point!(x: 0.0, y: 0.0).into());
        let second = cache.ensure_loaded("mixed", &store).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.len(), 3);
    }

    #[test]
    fn test_failed_load_allows_retry() {
        let store = MemoryStore::new();
        let cache = GeometryCache::new();
        assert!(matches!(
            cache.ensure_loaded("absent", &store),
            Err(TilemintError::CacheLoad { .. })
        ));
        assert!(!cache.is_loaded("absent"));

        store.insert("absent", 1, point!(x: 1.0, y: 1.0).into());
        let table = cache.ensure_loaded("absent", &store).unwrap();
        assert_eq!(table.len(), 1);
        assert!(cache.is_loaded("absent"));
    }

    #[test]
    fn test_stats() {
        let store = sample_store();
        let cache = GeometryCache::new();
        assert_eq!(cache.stats(), CacheStats::default());
        cache.ensure_loaded("mixed", &store).unwrap();
        assert_eq!(cache.stats(), CacheStats {
            loaded_tables: 1,
            total_features: 3,
        });
    }

    #[test]
    fn test_envelope_area_for_polygon() {
        let store = sample_store();
        let cache = GeometryCache::new();
        let table = cache.ensure_loaded("mixed", &store).unwrap();
        let feature = table.get("mixed", 3).unwrap();
        assert_eq!(feature.envelope_area, 100.0);
    }
}
