//! Render pipeline: per-table cache query, level-of-detail decision,
//! simplification and writer dispatch, for each of the three output kinds.

use crate::cache::GeometryCache;
use crate::convert::{PrecisionConverter, RasterConverter};
use crate::error::{Result, TilemintError};
use crate::metrics::{Metrics, MetricsMode};
use crate::query::{BingTileQuery, BoundingBoxQuery, TileQuery};
use crate::store::FeatureStore;
use crate::tile_store::TileStore;
use crate::tile_system;
use crate::types::{DiskCacheMode, RenderConfig};
use crate::writer::{
    GeoJsonWriter, GeometryWriter, PassthroughWriter, RasterWriter, TileImage, write_geometry,
};
use geo::{
    BoundingRect, CoordsIter, Geometry, GeometryCollection, MultiPolygon, Point, Polygon, Simplify,
};
use image::{Rgba, imageops};
use log::{debug, warn};
use std::sync::Arc;

/// Renders bounding-box and tile queries against a feature store, through
/// the lazily-built in-memory spatial cache.
pub struct Renderer {
    store: Arc<dyn FeatureStore>,
    cache: GeometryCache,
    config: RenderConfig,
}

impl Renderer {
    pub fn new(store: Arc<dyn FeatureStore>, config: RenderConfig) -> Result<Self> {
        config.validate().map_err(TilemintError::InvalidQuery)?;
        Ok(Self {
            store,
            cache: GeometryCache::new(),
            config,
        })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn cache(&self) -> &GeometryCache {
        &self.cache
    }

    /// Render a bounding-box query to a raster tile.
    ///
    /// With `errors_on_canvas` set, a failed render comes back as a
    /// half-transparent red canvas instead of an error.
    pub fn render_image(&self, query: &BoundingBoxQuery) -> Result<TileImage> {
        match self.render_image_inner(query) {
            Err(e) if self.config.errors_on_canvas => {
                warn!("painting render failure onto canvas: {e}");
                Ok(error_canvas(query.width, query.height))
            }
            other => other,
        }
    }

    fn render_image_inner(&self, query: &BoundingBoxQuery) -> Result<TileImage> {
        let mut metrics = self.request_metrics(query);
        let mut composite = TileImage::blank(query.width, query.height);

        for table in &query.tables {
            let converter = RasterConverter::new(&query.bbox, query.width, query.height);
            let mut writer = RasterWriter::new(&converter, query.style, query.width, query.height);
            self.render_table_into(table, query, &mut writer, &mut metrics)?;
            let layer = writer.finish();
            if !layer.empty {
                imageops::overlay(&mut composite.image, &layer.image, 0, 0);
                composite.empty = false;
            }
        }

        if metrics.is_enabled() {
            log_metrics(&metrics);
            draw_diagnostic_border(&mut composite.image);
            composite.empty = false;
        }
        Ok(composite)
    }

    pub fn render_image_tile(&self, query: &TileQuery) -> Result<TileImage> {
        if query.cache_mode == DiskCacheMode::None {
            return self.render_image(&BoundingBoxQuery::from_tile(query));
        }
        let quadkey = tile_system::tile_xy_to_quad_key(query.x, query.y, query.z);
        self.render_image_quadkey(&BingTileQuery {
            quadkey,
            tables: query.tables.clone(),
            style: query.style,
            cache_mode: query.cache_mode,
            bench: query.bench,
        })
    }

    /// Render a quadkey-addressed tile, consulting the disk tile cache per
    /// the query's cache mode. Each table's layer is cached independently.
    pub fn render_image_quadkey(&self, query: &BingTileQuery) -> Result<TileImage> {
        let bbox_query = BoundingBoxQuery::from_quadkey(query)?;
        if query.cache_mode == DiskCacheMode::None {
            return self.render_image(&bbox_query);
        }

        let tile_store = self.tile_store()?;
        let (x, y, zoom) = tile_system::quad_key_to_tile_xy(&query.quadkey)?;

        let mut composite = TileImage::blank(bbox_query.width, bbox_query.height);
        for table in &query.tables {
            let layer = match tile_store.get(table, zoom, x, y) {
                Some(cached) => cached,
                None => {
                    let mut single = bbox_query.clone();
                    single.tables = vec![table.clone()];
                    let rendered = self.render_image(&single)?;
                    if query.cache_mode == DiskCacheMode::ReadWrite {
                        tile_store.put(table, zoom, x, y, &rendered)?;
                    }
                    rendered
                }
            };
            if !layer.empty {
                imageops::overlay(&mut composite.image, &layer.image, 0, 0);
                composite.empty = false;
            }
        }
        Ok(composite)
    }

    /// Render a bounding-box query to a serialized GeoJSON string, with
    /// coordinate precision bounded by the output resolution. Multiple
    /// tables concatenate their feature collections.
    pub fn render_geojson(&self, query: &BoundingBoxQuery) -> Result<String> {
        let mut metrics = self.request_metrics(query);
        let converter = PrecisionConverter::new(&query.bbox, query.width, query.height);

        let mut out = String::new();
        for table in &query.tables {
            let mut writer = GeoJsonWriter::new(&converter);
            self.render_table_into(table, query, &mut writer, &mut metrics)?;
            out.push_str(&writer.finish()?);
        }
        if metrics.is_enabled() {
            log_metrics(&metrics);
        }
        Ok(out)
    }

    pub fn render_geojson_tile(&self, query: &TileQuery) -> Result<String> {
        self.render_geojson(&BoundingBoxQuery::from_tile(query))
    }

    pub fn render_geojson_quadkey(&self, query: &BingTileQuery) -> Result<String> {
        self.render_geojson(&BoundingBoxQuery::from_quadkey(query)?)
    }

    /// Render to native geometry values, for callers that post-process
    /// rather than display.
    pub fn render_geometries(&self, query: &BoundingBoxQuery) -> Result<Vec<Geometry<f64>>> {
        let mut metrics = self.request_metrics(query);

        let mut out = Vec::new();
        for table in &query.tables {
            let mut writer = PassthroughWriter::new();
            self.render_table_into(table, query, &mut writer, &mut metrics)?;
            out.extend(writer.finish());
        }
        if metrics.is_enabled() {
            log_metrics(&metrics);
        }
        Ok(out)
    }

    /// Bench queries always time, whatever the configured mode.
    fn request_metrics(&self, query: &BoundingBoxQuery) -> Metrics {
        if query.bench && self.config.metrics == MetricsMode::None {
            Metrics::new(MetricsMode::Time)
        } else {
            Metrics::new(self.config.metrics)
        }
    }

    fn tile_store(&self) -> Result<TileStore> {
        match (&self.config.tile_cache_dir, &self.config.database) {
            (Some(dir), Some(database)) => Ok(TileStore::new(dir, database)),
            _ => Err(TilemintError::InvalidQuery(
                "disk tile cache requested but tile_cache_dir/database not configured".to_string(),
            )),
        }
    }

    /// Run the per-table pipeline, handing each surviving geometry to
    /// `writer`. In bench mode the index query and feature fetch still run
    /// and are timed, but nothing is written.
    fn render_table_into<W: GeometryWriter>(
        &self,
        table: &str,
        query: &BoundingBoxQuery,
        writer: &mut W,
        metrics: &mut Metrics,
    ) -> Result<()> {
        // Geographic units per output pixel; pixel_area is an axis-aligned
        // approximation of per-pixel ground area, kept unprojected on
        // purpose for parity with how envelope areas are stored.
        let tolerance_x = query.bbox.width() / query.width as f64;
        let tolerance_y = query.bbox.height() / query.height as f64;
        let reduce_tolerance = tolerance_x.min(tolerance_y);
        let pixel_area = tolerance_x * tolerance_y;

        if self.config.use_memory_cache {
            metrics.start("cache_load");
            let table_cache = self.cache.ensure_loaded(table, self.store.as_ref())?;
            metrics.stop("cache_load");

            metrics.start("index_query");
            let ids = table_cache.query(&query.bbox);
            metrics.stop("index_query");
            debug!("table '{table}': {} features intersect {}", ids.len(), query.bbox);

            for id in ids {
                metrics.start("feature_fetch");
                let feature = table_cache.get(table, id)?;
                let geometry = feature.geometry.clone();
                let envelope_area = feature.envelope_area;
                metrics.stop("feature_fetch");
                self.write_feature(
                    geometry,
                    envelope_area,
                    pixel_area,
                    reduce_tolerance,
                    query.bench,
                    writer,
                    metrics,
                );
            }
        } else {
            metrics.start("store_query");
            let features = self.store.query_bbox(table, &query.bbox)?;
            metrics.stop("store_query");

            for (_, geometry) in features {
                let envelope_area = geometry
                    .bounding_rect()
                    .map_or(0.0, |rect| rect.width() * rect.height());
                self.write_feature(
                    geometry,
                    envelope_area,
                    pixel_area,
                    reduce_tolerance,
                    query.bench,
                    writer,
                    metrics,
                );
            }
        }
        Ok(())
    }

    /// LOD decision and writer hand-off for one feature.
    #[allow(clippy::too_many_arguments)]
    fn write_feature<W: GeometryWriter>(
        &self,
        geometry: Geometry<f64>,
        envelope_area: f64,
        pixel_area: f64,
        reduce_tolerance: f64,
        bench: bool,
        writer: &mut W,
        metrics: &mut Metrics,
    ) {
        if bench {
            return;
        }
        metrics.start("write");

        // Features whose envelope fits inside one pixel collapse to a
        // single point at their first coordinate.
        if envelope_area > 0.0 && envelope_area <= pixel_area {
            if let Some(coord) = geometry.coords_iter().next() {
                let point = Point::from(coord);
                writer.write_point(&point);
                metrics.record_geometry(&Geometry::Point(point));
            }
            metrics.stop("write");
            return;
        }

        let mut geometry = geometry;
        if self.config.geometry_reduce {
            geometry = reduce_geometry(geometry, reduce_tolerance);
        }
        if self.config.geometry_remove_artifacts {
            geometry = remove_artifacts(geometry);
        }
        metrics.record_geometry(&geometry);
        write_geometry(writer, &geometry);
        metrics.stop("write");
    }
}

/// Douglas-Peucker simplification across the geometry variants that have a
/// path to simplify; points and empty variants pass through.
fn reduce_geometry(geometry: Geometry<f64>, tolerance: f64) -> Geometry<f64> {
    match geometry {
        Geometry::LineString(ls) => Geometry::LineString(ls.simplify(tolerance)),
        Geometry::MultiLineString(mls) => Geometry::MultiLineString(mls.simplify(tolerance)),
        Geometry::Polygon(p) => Geometry::Polygon(p.simplify(tolerance)),
        Geometry::MultiPolygon(mp) => Geometry::MultiPolygon(mp.simplify(tolerance)),
        Geometry::GeometryCollection(gc) => Geometry::GeometryCollection(GeometryCollection(
            gc.0.into_iter()
                .map(|member| reduce_geometry(member, tolerance))
                .collect(),
        )),
        other => other,
    }
}

/// Collapse a geometry collection to the multipolygon of its 2-dimensional
/// members, dropping point and line remnants left by prior topological
/// operations. Non-collections pass through.
fn remove_artifacts(geometry: Geometry<f64>) -> Geometry<f64> {
    match geometry {
        Geometry::GeometryCollection(gc) => {
            let mut polygons = Vec::new();
            collect_polygons(gc, &mut polygons);
            Geometry::MultiPolygon(MultiPolygon(polygons))
        }
        other => other,
    }
}

fn collect_polygons(collection: GeometryCollection<f64>, out: &mut Vec<Polygon<f64>>) {
    for member in collection {
        match member {
            Geometry::Polygon(p) => out.push(p),
            Geometry::MultiPolygon(mp) => out.extend(mp.0),
            Geometry::Rect(r) => out.push(r.to_polygon()),
            Geometry::Triangle(t) => out.push(t.to_polygon()),
            Geometry::GeometryCollection(inner) => collect_polygons(inner, out),
            _ => {}
        }
    }
}

fn error_canvas(width: u32, height: u32) -> TileImage {
    let mut tile = TileImage::blank(width, height);
    let red = Rgba([255, 0, 0, 128]);
    for pixel in tile.image.pixels_mut() {
        *pixel = red;
    }
    tile.empty = false;
    tile
}

/// Red one-pixel frame marking a tile rendered with metrics enabled.
fn draw_diagnostic_border(image: &mut image::RgbaImage) {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return;
    }
    let red = Rgba([255, 0, 0, 255]);
    for x in 0..width {
        image.put_pixel(x, 0, red);
        image.put_pixel(x, height - 1, red);
    }
    for y in 0..height {
        image.put_pixel(0, y, red);
        image.put_pixel(width - 1, y, red);
    }
}

fn log_metrics(metrics: &Metrics) {
    for (task, duration) in metrics.task_times() {
        debug!("task '{task}' took {duration:?}");
    }
}
