//! Batch tile pyramid generation.
//!
//! Walks a zoom range ascending, rendering every tile of one table through
//! the renderer's quadkey path and pruning subtrees whose ancestor already
//! rendered empty. The empty-quadkey set is loaded at job start and saved on
//! every exit path, completed or cancelled.

use crate::error::{Result, TilemintError};
use crate::query::BingTileQuery;
use crate::render::Renderer;
use crate::tile_store::TileStore;
use crate::tile_system;
use crate::types::{DiskCacheMode, LayerStyle};
use log::{info, warn};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

/// Lifecycle of one builder. A builder runs at most one job at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PyramidState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

/// Cumulative counts, reported once per tile row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PyramidProgress {
    /// Zoom level currently being generated.
    pub zoom: u8,
    pub generated: u64,
    pub empty: u64,
    pub skipped: u64,
}

/// Drives the render pipeline across a zoom range for one table, persisting
/// tiles through the renderer's disk cache.
pub struct PyramidBuilder {
    renderer: Arc<Renderer>,
    tile_store: TileStore,
    table: String,
    style: LayerStyle,
    state: Mutex<PyramidState>,
    cancelled: AtomicBool,
}

impl PyramidBuilder {
    pub fn new(renderer: Arc<Renderer>, tile_store: TileStore, table: impl Into<String>) -> Self {
        Self {
            renderer,
            tile_store,
            table: table.into(),
            style: LayerStyle::default(),
            state: Mutex::new(PyramidState::Idle),
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn with_style(mut self, style: LayerStyle) -> Self {
        self.style = style;
        self
    }

    pub fn state(&self) -> PyramidState {
        *self.state.lock()
    }

    /// Request cooperative cancellation; honored between tiles and rows.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Generate all tiles in `[min_zoom, max_zoom]`, clamped to the
    /// serviceable zoom range. Blocks until completed or cancelled;
    /// `progress` is invoked once per finished tile row with cumulative
    /// counts.
    pub fn run<F>(&self, min_zoom: u8, max_zoom: u8, mut progress: F) -> Result<PyramidProgress>
    where
        F: FnMut(&PyramidProgress),
    {
        {
            let mut state = self.state.lock();
            if *state == PyramidState::Running {
                return Err(TilemintError::InvalidQuery(
                    "pyramid job already running".to_string(),
                ));
            }
            *state = PyramidState::Running;
        }
        self.cancelled.store(false, Ordering::Relaxed);

        let min_zoom = min_zoom.clamp(tile_system::MIN_ZOOM, tile_system::MAX_ZOOM);
        let max_zoom = max_zoom.clamp(min_zoom, tile_system::MAX_ZOOM);

        let mut empty_quadkeys = self.tile_store.load_empty_quadkeys(&self.table);
        let mut totals = PyramidProgress::default();
        info!(
            "pyramid start: table '{}', zoom {min_zoom}..={max_zoom}, {} known-empty quadkeys",
            self.table,
            empty_quadkeys.len()
        );

        'job: for zoom in min_zoom..=max_zoom {
            totals.zoom = zoom;
            let tiles_per_axis = 1u32 << zoom;
            for y in 0..tiles_per_axis {
                for x in 0..tiles_per_axis {
                    if self.cancelled.load(Ordering::Relaxed) {
                        break 'job;
                    }
                    self.generate_tile(x, y, zoom, &mut empty_quadkeys, &mut totals);
                }
                progress(&totals);
                if self.cancelled.load(Ordering::Relaxed) {
                    break 'job;
                }
            }
        }

        // The set is saved whether the job finished or was cut short. The
        // terminal state is published even when the save fails, so a later
        // run is never rejected as still running.
        let save_result = self
            .tile_store
            .save_empty_quadkeys(&self.table, &empty_quadkeys);

        let final_state = if self.cancelled.load(Ordering::Relaxed) {
            PyramidState::Cancelled
        } else {
            PyramidState::Completed
        };
        *self.state.lock() = final_state;
        info!(
            "pyramid {:?}: {} generated, {} empty, {} skipped",
            final_state, totals.generated, totals.empty, totals.skipped
        );
        save_result?;
        Ok(totals)
    }

    /// Run on a new thread. The builder is shared so the caller keeps
    /// `cancel` and `state` access while the job runs.
    pub fn spawn<F>(
        self: &Arc<Self>,
        min_zoom: u8,
        max_zoom: u8,
        progress: F,
    ) -> JoinHandle<Result<PyramidProgress>>
    where
        F: FnMut(&PyramidProgress) + Send + 'static,
    {
        let builder = Arc::clone(self);
        std::thread::spawn(move || builder.run(min_zoom, max_zoom, progress))
    }

    fn generate_tile(
        &self,
        x: u32,
        y: u32,
        zoom: u8,
        empty_quadkeys: &mut FxHashSet<String>,
        totals: &mut PyramidProgress,
    ) {
        let quadkey = tile_system::tile_xy_to_quad_key(x, y, zoom);
        if has_empty_ancestor(empty_quadkeys, &quadkey) {
            totals.skipped += 1;
            return;
        }

        let query = BingTileQuery {
            quadkey: quadkey.clone(),
            tables: vec![self.table.clone()],
            style: self.style,
            cache_mode: DiskCacheMode::ReadWrite,
            bench: false,
        };
        match self.renderer.render_image_quadkey(&query) {
            Ok(tile) if tile.empty => {
                empty_quadkeys.insert(quadkey);
                totals.empty += 1;
            }
            Ok(_) => totals.generated += 1,
            // A failed tile is "not generated"; the job moves on.
            Err(e) => warn!("tile {quadkey} failed: {e}"),
        }
    }
}

/// True when the quadkey or any of its prefixes is known empty. The key
/// itself counts: a tile already recorded empty is never re-rendered.
fn has_empty_ancestor(empty_quadkeys: &FxHashSet<String>, quadkey: &str) -> bool {
    (1..=quadkey.len()).any(|len| empty_quadkeys.contains(&quadkey[..len]))
}
