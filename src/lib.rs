//! Map-tile rendering service: lazily-cached spatial features rendered to
//! raster tiles, GeoJSON or native geometries, with disk tile caching and
//! batch pyramid generation.
//!
//! ```rust
//! use tilemint::{BoundingBox, BoundingBoxQuery, MemoryStore, RenderConfig, Renderer};
//! use geo::polygon;
//! use std::sync::Arc;
//!
//! let store = MemoryStore::new();
//! store.insert("land", 1, polygon![
//!     (x: -20.0, y: 30.0),
//!     (x: 20.0, y: 30.0),
//!     (x: 20.0, y: 70.0),
//!     (x: -20.0, y: 30.0),
//! ].into());
//!
//! let renderer = Renderer::new(Arc::new(store), RenderConfig::default())?;
//! let query = BoundingBoxQuery::new(BoundingBox::new(-10.0, 40.0, 10.0, 60.0), 256, 256)
//!     .with_table("land");
//! let tile = renderer.render_image(&query)?;
//! assert!(!tile.empty);
//! # Ok::<(), tilemint::TilemintError>(())
//! ```

pub mod cache;
pub mod convert;
pub mod error;
pub mod metrics;
pub mod pyramid;
pub mod query;
pub mod render;
pub mod store;
pub mod tile_store;
pub mod tile_system;
pub mod types;
pub mod writer;

pub use error::{Result, TilemintError};

pub use cache::{CacheStats, CachedFeature, GeometryCache, TableCache};

pub use convert::{CoordinateConverter, IdentityConverter, PrecisionConverter, RasterConverter};

pub use geo::{Geometry, Point, Polygon};

pub use metrics::{GeometryCounts, Metrics, MetricsMode};

pub use pyramid::{PyramidBuilder, PyramidProgress, PyramidState};

pub use query::{BingTileQuery, BoundingBoxQuery, TileQuery};

pub use render::Renderer;

pub use store::{FeatureStore, MemoryStore};

pub use tile_store::TileStore;

pub use types::{BoundingBox, Color, DiskCacheMode, LayerStyle, RenderConfig};

pub use writer::{GeoJsonWriter, GeometryWriter, PassthroughWriter, RasterWriter, TileImage};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{Renderer, Result, TilemintError};

    pub use crate::{BingTileQuery, BoundingBoxQuery, TileQuery};

    pub use crate::{BoundingBox, Color, DiskCacheMode, LayerStyle, RenderConfig};

    pub use crate::{FeatureStore, MemoryStore};

    pub use crate::{PyramidBuilder, PyramidProgress, PyramidState, TileStore};

    pub use crate::TileImage;

    pub use geo::{Geometry, Point, Polygon};
}
