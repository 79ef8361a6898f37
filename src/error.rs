//! Error types for tilemint.

use thiserror::Error;

/// Result type alias using [`TilemintError`].
pub type Result<T> = std::result::Result<T, TilemintError>;

/// All errors surfaced by the rendering service.
#[derive(Error, Debug)]
pub enum TilemintError {
    /// Full-table scan of the backing store failed while populating the
    /// in-memory cache. The table stays unloaded; a later `ensure_loaded`
    /// retries from scratch.
    #[error("cache load failed for table '{table}': {message}")]
    CacheLoad { table: String, message: String },

    /// An id returned by the spatial index is missing from the loaded cache.
    /// This is an invariant violation, not an expected runtime condition.
    #[error("feature {id} missing from loaded cache for table '{table}'")]
    FeatureNotFound { table: String, id: u64 },

    /// The backing store has no such table.
    #[error("unknown table '{0}'")]
    UnknownTable(String),

    /// Malformed Bing quadkey (empty, longer than 23 digits, or containing a
    /// character outside `0..=3`).
    #[error("invalid quadkey '{0}'")]
    InvalidQuadkey(String),

    /// A query cannot be rendered as given.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Writer or simplification failure mid-request.
    #[error("render failed: {0}")]
    Render(String),

    /// Disk tile cache or empty-quadkey file I/O.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// PNG encode/decode failure in the disk tile cache.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TilemintError {
    /// Wrap an arbitrary load failure with the table it concerns.
    pub(crate) fn cache_load(table: &str, err: impl std::fmt::Display) -> Self {
        TilemintError::CacheLoad {
            table: table.to_string(),
            message: err.to_string(),
        }
    }
}
