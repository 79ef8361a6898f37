//! Disk-backed tile cache.
//!
//! Tiles live under `<base>/<database>/<table>/<table>-<zoom>/<x>/<y>.png`;
//! each table additionally keeps a newline-delimited file of quadkeys known
//! to render empty. Read failures are logged and treated as "not cached" so
//! a damaged cache degrades to re-rendering instead of failing requests.

use crate::error::Result;
use crate::writer::TileImage;
use log::warn;
use rustc_hash::FxHashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const EMPTY_TILES_FILENAME: &str = "emptyTiles.txt";

/// Path mapping and PNG persistence for one database's tile cache.
#[derive(Debug, Clone)]
pub struct TileStore {
    base: PathBuf,
    database: String,
}

impl TileStore {
    pub fn new(base: impl Into<PathBuf>, database: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            database: database.into(),
        }
    }

    fn table_dir(&self, table: &str) -> PathBuf {
        self.base.join(&self.database).join(table)
    }

    pub fn tile_path(&self, table: &str, zoom: u8, x: u32, y: u32) -> PathBuf {
        self.table_dir(table)
            .join(format!("{table}-{zoom}"))
            .join(x.to_string())
            .join(format!("{y}.png"))
    }

    fn empty_quadkeys_path(&self, table: &str) -> PathBuf {
        self.table_dir(table).join(EMPTY_TILES_FILENAME)
    }

    /// Decode a cached tile. Absent files, unreadable files and undecodable
    /// PNGs all come back as `None`.
    pub fn get(&self, table: &str, zoom: u8, x: u32, y: u32) -> Option<TileImage> {
        let path = self.tile_path(table, zoom, x, y);
        if !path.exists() {
            return None;
        }
        match image::open(&path) {
            Ok(decoded) => Some(TileImage {
                image: decoded.into_rgba8(),
                empty: false,
            }),
            Err(e) => {
                warn!("discarding unreadable cached tile {}: {e}", path.display());
                None
            }
        }
    }

    /// Persist a rendered tile. Empty tiles are never written; the empty
    /// quadkey set records them instead.
    pub fn put(&self, table: &str, zoom: u8, x: u32, y: u32, tile: &TileImage) -> Result<()> {
        if tile.empty {
            return Ok(());
        }
        let path = self.tile_path(table, zoom, x, y);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        tile.image.save(&path)?;
        Ok(())
    }

    /// Load the known-empty quadkey set for `table`. A missing file means no
    /// tile is known empty yet.
    pub fn load_empty_quadkeys(&self, table: &str) -> FxHashSet<String> {
        let path = self.empty_quadkeys_path(table);
        match fs::read_to_string(&path) {
            Ok(contents) => contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            Err(e) => {
                if path.exists() {
                    warn!("could not read {}: {e}", path.display());
                }
                FxHashSet::default()
            }
        }
    }

    /// Persist the known-empty quadkey set, sorted for stable diffs.
    pub fn save_empty_quadkeys(&self, table: &str, quadkeys: &FxHashSet<String>) -> Result<()> {
        let dir = self.table_dir(table);
        fs::create_dir_all(&dir)?;

        let mut sorted: Vec<&str> = quadkeys.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        let mut contents = sorted.join("\n");
        if !contents.is_empty() {
            contents.push('\n');
        }
        fs::write(dir.join(EMPTY_TILES_FILENAME), contents)?;
        Ok(())
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn database(&self) -> &str {
        &self.database
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;
    use tempfile::TempDir;

    fn sample_tile() -> TileImage {
        let mut image = RgbaImage::new(8, 8);
        image.put_pixel(2, 3, image::Rgba([255, 102, 0, 255]));
        TileImage {
            image,
            empty: false,
        }
    }

    #[test]
    fn test_path_layout() {
        let store = TileStore::new("/cache", "world");
        assert_eq!(store.base(), Path::new("/cache"));
        assert_eq!(store.database(), "world");
        assert_eq!(
            store.tile_path("land", 5, 12, 9),
            PathBuf::from("/cache/world/land/land-5/12/9.png")
        );
    }

    #[test]
    fn test_put_get_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = TileStore::new(dir.path(), "world");
        let tile = sample_tile();

        store.put("land", 3, 1, 2, &tile).unwrap();
        let cached = store.get("land", 3, 1, 2).unwrap();
        assert_eq!(cached.image.get_pixel(2, 3).0, [255, 102, 0, 255]);
        assert!(!cached.empty);
    }

    #[test]
    fn test_empty_tile_not_persisted() {
        let dir = TempDir::new().unwrap();
        let store = TileStore::new(dir.path(), "world");
        store.put("land", 3, 1, 2, &TileImage::blank(8, 8)).unwrap();
        assert!(!store.tile_path("land", 3, 1, 2).exists());
        assert!(store.get("land", 3, 1, 2).is_none());
    }

    #[test]
    fn test_missing_tile_is_none() {
        let dir = TempDir::new().unwrap();
        let store = TileStore::new(dir.path(), "world");
        assert!(store.get("land", 1, 0, 0).is_none());
    }

    #[test]
    fn test_empty_quadkeys_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = TileStore::new(dir.path(), "world");

        assert!(store.load_empty_quadkeys("land").is_empty());

        let mut quadkeys = FxHashSet::default();
        quadkeys.insert("03".to_string());
        quadkeys.insert("121".to_string());
        store.save_empty_quadkeys("land", &quadkeys).unwrap();

        let loaded = store.load_empty_quadkeys("land");
        assert_eq!(loaded, quadkeys);

        let raw = std::fs::read_to_string(
            dir.path().join("world").join("land").join(EMPTY_TILES_FILENAME),
        )
        .unwrap();
        assert_eq!(raw, "03\n121\n");
    }
}
