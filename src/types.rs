//! Value types and configuration shared across the rendering service.

use crate::metrics::MetricsMode;
use serde::de::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// An axis-aligned geographic bounding box in degrees.
///
/// Immutable value type constructed per request; `min_y`/`max_y` are
/// latitudes, `min_x`/`max_x` longitudes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width() / self.height()
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

/// An RGBA color with 8-bit channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    /// Default layer fill, matching the historical orange-red.
    pub const ORANGE_RED: Color = Color::rgb(255, 102, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Fill and stroke styling for one rendered layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerStyle {
    pub fill: Color,
    pub stroke: Color,
    pub stroke_width: f32,
}

impl Default for LayerStyle {
    fn default() -> Self {
        Self {
            fill: Color::ORANGE_RED,
            stroke: Color::WHITE,
            stroke_width: 1.0,
        }
    }
}

impl LayerStyle {
    pub fn new(fill: Color, stroke: Color, stroke_width: f32) -> Self {
        Self {
            fill,
            stroke,
            stroke_width,
        }
    }
}

/// How a tile-shaped request interacts with the disk tile cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DiskCacheMode {
    /// Never touch the disk cache.
    #[default]
    None,
    /// Serve from disk when present, never write.
    Read,
    /// Serve from disk when present, persist fresh non-empty tiles.
    ReadWrite,
}

/// Renderer configuration.
///
/// Serializable so deployments can load it from JSON alongside the rest of
/// their settings.
///
/// # Example
///
/// ```rust
/// use tilemint::RenderConfig;
///
/// let json = r#"{
///     "use_memory_cache": true,
///     "geometry_reduce": true,
///     "metrics": "time"
/// }"#;
/// let config = RenderConfig::from_json(json).unwrap();
/// assert!(config.geometry_reduce);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Serve queries from the lazily-built in-memory spatial cache. When
    /// off, every request queries the backing store directly.
    #[serde(default = "RenderConfig::default_true")]
    pub use_memory_cache: bool,

    /// Simplify geometries to the output resolution before writing.
    #[serde(default = "RenderConfig::default_true")]
    pub geometry_reduce: bool,

    /// Collapse geometry collections to their 2-dimensional parts,
    /// discarding point/line slivers left by prior topological operations.
    #[serde(default = "RenderConfig::default_true")]
    pub geometry_remove_artifacts: bool,

    /// Per-request metrics collection.
    #[serde(default)]
    pub metrics: MetricsMode,

    /// Paint render failures onto the raster canvas instead of returning
    /// the error. Debug aid; off by default.
    #[serde(default)]
    pub errors_on_canvas: bool,

    /// Base directory of the disk tile cache. Required for any query with a
    /// [`DiskCacheMode`] other than `None` and for pyramid generation.
    #[serde(default)]
    pub tile_cache_dir: Option<PathBuf>,

    /// Logical database name used in disk tile cache paths.
    #[serde(default)]
    pub database: Option<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            use_memory_cache: true,
            geometry_reduce: true,
            geometry_remove_artifacts: true,
            metrics: MetricsMode::default(),
            errors_on_canvas: false,
            tile_cache_dir: None,
            database: None,
        }
    }
}

impl RenderConfig {
    const fn default_true() -> bool {
        true
    }

    pub fn with_memory_cache(mut self, enabled: bool) -> Self {
        self.use_memory_cache = enabled;
        self
    }

    pub fn with_geometry_reduce(mut self, enabled: bool) -> Self {
        self.geometry_reduce = enabled;
        self
    }

    pub fn with_remove_artifacts(mut self, enabled: bool) -> Self {
        self.geometry_remove_artifacts = enabled;
        self
    }

    pub fn with_metrics(mut self, mode: MetricsMode) -> Self {
        self.metrics = mode;
        self
    }

    pub fn with_errors_on_canvas(mut self, enabled: bool) -> Self {
        self.errors_on_canvas = enabled;
        self
    }

    /// Enable the disk tile cache rooted at `dir` for `database`.
    pub fn with_tile_cache(mut self, dir: impl Into<PathBuf>, database: impl Into<String>) -> Self {
        self.tile_cache_dir = Some(dir.into());
        self.database = Some(database.into());
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.tile_cache_dir.is_some() && self.database.is_none() {
            return Err("database name required when tile_cache_dir is set".to_string());
        }
        if self.database.is_some() && self.tile_cache_dir.is_none() {
            return Err("tile_cache_dir required when database is set".to_string());
        }
        Ok(())
    }

    /// Load configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: RenderConfig = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(Error::custom(e));
        }
        Ok(config)
    }

    /// Save configuration as a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
