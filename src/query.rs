//! Render request model.
//!
//! A request is either a [`BoundingBoxQuery`] or one of the two tile-shaped
//! forms ([`TileQuery`], [`BingTileQuery`]); tile-shaped queries are
//! canonicalized into a bounding-box query before any rendering happens.

use crate::error::Result;
use crate::tile_system;
use crate::types::{BoundingBox, DiskCacheMode, LayerStyle};

/// Default spatial reference for geographic queries (WGS84).
pub const DEFAULT_SRID: u32 = 4326;

/// A render request over an explicit geographic bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBoxQuery {
    pub bbox: BoundingBox,
    /// Output width in pixels (or precision reference for GeoJSON output).
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    pub srid: u32,
    /// Feature tables rendered bottom-to-top in this order.
    pub tables: Vec<String>,
    pub style: LayerStyle,
    pub cache_mode: DiskCacheMode,
    /// Time the query plan only; no artifact is produced.
    pub bench: bool,
}

impl BoundingBoxQuery {
    pub fn new(bbox: BoundingBox, width: u32, height: u32) -> Self {
        Self {
            bbox,
            width,
            height,
            srid: DEFAULT_SRID,
            tables: Vec::new(),
            style: LayerStyle::default(),
            cache_mode: DiskCacheMode::None,
            bench: false,
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.tables.push(table.into());
        self
    }

    pub fn with_style(mut self, style: LayerStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_cache_mode(mut self, mode: DiskCacheMode) -> Self {
        self.cache_mode = mode;
        self
    }

    pub fn with_bench(mut self, bench: bool) -> Self {
        self.bench = bench;
        self
    }

    /// Canonicalize a slippy-map tile query into a 256×256 bounding-box
    /// query covering the tile.
    pub fn from_tile(query: &TileQuery) -> Self {
        let bbox = tile_bbox(query.x, query.y, query.z);
        Self {
            bbox,
            width: tile_system::TILE_SIZE,
            height: tile_system::TILE_SIZE,
            srid: DEFAULT_SRID,
            tables: query.tables.clone(),
            style: query.style,
            cache_mode: query.cache_mode,
            bench: query.bench,
        }
    }

    /// Canonicalize a Bing quadkey query. Fails with `InvalidQuadkey` before
    /// any render work when the key is malformed.
    pub fn from_quadkey(query: &BingTileQuery) -> Result<Self> {
        let (x, y, z) = tile_system::quad_key_to_tile_xy(&query.quadkey)?;
        let bbox = tile_bbox(x, y, z);
        Ok(Self {
            bbox,
            width: tile_system::TILE_SIZE,
            height: tile_system::TILE_SIZE,
            srid: DEFAULT_SRID,
            tables: query.tables.clone(),
            style: query.style,
            cache_mode: query.cache_mode,
            bench: query.bench,
        })
    }
}

/// Geographic bounds of a tile, from its NW and SE corner pixels.
fn tile_bbox(x: u32, y: u32, z: u8) -> BoundingBox {
    let (nw_px, nw_py) = tile_system::tile_xy_to_pixel_xy(x, y);
    let (nw_lat, nw_lon) = tile_system::pixel_xy_to_lat_long(nw_px, nw_py, z);
    let (se_lat, se_lon) = tile_system::pixel_xy_to_lat_long(
        nw_px + tile_system::TILE_SIZE as i64,
        nw_py + tile_system::TILE_SIZE as i64,
        z,
    );
    BoundingBox::new(nw_lon, se_lat, se_lon, nw_lat)
}

/// A render request for one slippy-map tile (x, y, zoom).
#[derive(Debug, Clone, PartialEq)]
pub struct TileQuery {
    pub x: u32,
    pub y: u32,
    pub z: u8,
    pub tables: Vec<String>,
    pub style: LayerStyle,
    pub cache_mode: DiskCacheMode,
    pub bench: bool,
}

impl TileQuery {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self {
            x,
            y,
            z,
            tables: Vec::new(),
            style: LayerStyle::default(),
            cache_mode: DiskCacheMode::None,
            bench: false,
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.tables.push(table.into());
        self
    }

    pub fn with_style(mut self, style: LayerStyle) -> Self {
        self.style = style;
        self
    }
}

/// A render request for one Bing Maps tile, addressed by quadkey.
#[derive(Debug, Clone, PartialEq)]
pub struct BingTileQuery {
    pub quadkey: String,
    pub tables: Vec<String>,
    pub style: LayerStyle,
    pub cache_mode: DiskCacheMode,
    pub bench: bool,
}

impl BingTileQuery {
    pub fn new(quadkey: impl Into<String>) -> Self {
        Self {
            quadkey: quadkey.into(),
            tables: Vec::new(),
            style: LayerStyle::default(),
            cache_mode: DiskCacheMode::None,
            bench: false,
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.tables.push(table.into());
        self
    }

    pub fn with_style(mut self, style: LayerStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_cache_mode(mut self, mode: DiskCacheMode) -> Self {
        self.cache_mode = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_query_canonicalization() {
        let tile = TileQuery::new(0, 0, 1).with_table("land");
        let bbox_query = BoundingBoxQuery::from_tile(&tile);

        assert_eq!(bbox_query.width, 256);
        assert_eq!(bbox_query.height, 256);
        assert_eq!(bbox_query.srid, DEFAULT_SRID);
        assert_eq!(bbox_query.tables, vec!["land".to_string()]);

        // Tile (0,0) at zoom 1 is the north-west world quadrant.
        let bbox = bbox_query.bbox;
        assert!(bbox.min_x < -179.0);
        assert!(bbox.max_x.abs() < 1.0);
        assert!(bbox.max_y > 84.0);
        assert!(bbox.min_y.abs() < 1.0);
    }

    #[test]
    fn test_quadkey_canonicalization_matches_tile() {
        let tile = TileQuery::new(3, 5, 3).with_table("land");
        let quadkey = BingTileQuery::new("213").with_table("land");

        let from_tile = BoundingBoxQuery::from_tile(&tile);
        let from_key = BoundingBoxQuery::from_quadkey(&quadkey).unwrap();
        assert_eq!(from_tile.bbox, from_key.bbox);
    }

    #[test]
    fn test_malformed_quadkey_rejected() {
        let query = BingTileQuery::new("0a1");
        assert!(BoundingBoxQuery::from_quadkey(&query).is_err());
    }
}
