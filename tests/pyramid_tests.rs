//! Pyramid builder jobs over a disk tile cache in a temp directory.

use std::sync::Arc;

use geo::polygon;
use tilemint::{
    MemoryStore, PyramidBuilder, PyramidState, RenderConfig, Renderer, TileStore,
};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn renderer_with_cache(store: MemoryStore, dir: &std::path::Path) -> Arc<Renderer> {
    Arc::new(
        Renderer::new(
            Arc::new(store),
            RenderConfig::default().with_tile_cache(dir, "world"),
        )
        .unwrap(),
    )
}

#[test]
fn test_empty_table_prunes_descendants() {
    init_logs();
    let dir = tempfile::TempDir::new().unwrap();
    let store = MemoryStore::new();
    store.create_table("void");
    let renderer = renderer_with_cache(store, dir.path());
    let tile_store = TileStore::new(dir.path(), "world");

    // Seed one known-empty quadkey; its whole subtree must be skipped.
    let mut seeded = rustc_hash::FxHashSet::default();
    seeded.insert("03".to_string());
    tile_store.save_empty_quadkeys("void", &seeded).unwrap();

    let builder = PyramidBuilder::new(renderer, tile_store.clone(), "void");
    let totals = builder.run(2, 3, |_| {}).unwrap();

    // Zoom 2: 16 tiles, one pre-seeded skip, 15 render empty. Zoom 3: every
    // tile now has an empty parent, so all 64 are skipped.
    assert_eq!(totals.generated, 0);
    assert_eq!(totals.empty, 15);
    assert_eq!(totals.skipped, 65);
    assert_eq!(builder.state(), PyramidState::Completed);

    let saved = tile_store.load_empty_quadkeys("void");
    assert_eq!(saved.len(), 16);
    assert!(saved.contains("03"));

    // Empty tiles never produce files.
    let table_dir = dir.path().join("world").join("void");
    assert!(!table_dir.join("void-2").exists());
    assert!(!table_dir.join("void-3").exists());
}

#[test]
fn test_generates_tiles_for_covered_area() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = MemoryStore::new();
    store.insert(
        "land",
        1,
        polygon![
            (x: -20.0, y: 30.0),
            (x: 20.0, y: 30.0),
            (x: 20.0, y: 70.0),
            (x: -20.0, y: 70.0),
            (x: -20.0, y: 30.0),
        ]
        .into(),
    );
    let renderer = renderer_with_cache(store, dir.path());
    let tile_store = TileStore::new(dir.path(), "world");

    let builder = PyramidBuilder::new(renderer, tile_store.clone(), "land");
    let mut rows = 0;
    let totals = builder.run(1, 1, |_| rows += 1).unwrap();

    // The polygon sits in the northern hemisphere, so only the two northern
    // zoom-1 tiles generate.
    assert_eq!(totals.generated, 2);
    assert_eq!(totals.empty, 2);
    assert_eq!(totals.skipped, 0);
    assert_eq!(rows, 2);

    assert!(tile_store.tile_path("land", 1, 0, 0).exists());
    assert!(tile_store.tile_path("land", 1, 1, 0).exists());
    assert!(!tile_store.tile_path("land", 1, 0, 1).exists());

    let empty = tile_store.load_empty_quadkeys("land");
    assert!(empty.contains("2"));
    assert!(empty.contains("3"));
}

#[test]
fn test_cancellation_saves_empty_set() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = MemoryStore::new();
    store.create_table("void");
    let renderer = renderer_with_cache(store, dir.path());
    let tile_store = TileStore::new(dir.path(), "world");

    let builder = Arc::new(PyramidBuilder::new(renderer, tile_store.clone(), "void"));
    let handle = Arc::clone(&builder);
    let totals = builder.run(1, 3, move |_| handle.cancel()).unwrap();

    assert_eq!(builder.state(), PyramidState::Cancelled);
    // Cancelled after the first row of zoom 1.
    assert_eq!(totals.empty, 2);

    let saved = tile_store.load_empty_quadkeys("void");
    assert_eq!(saved.len(), 2);
}

#[test]
fn test_spawned_job_completes() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = MemoryStore::new();
    store.create_table("void");
    let renderer = renderer_with_cache(store, dir.path());
    let tile_store = TileStore::new(dir.path(), "world");

    let builder = Arc::new(PyramidBuilder::new(renderer, tile_store, "void"));
    let handle = builder.spawn(1, 2, |_| {});
    let totals = handle.join().unwrap().unwrap();

    // Zoom 1 renders empty everywhere; zoom 2 is pruned wholesale.
    assert_eq!(totals.empty, 4);
    assert_eq!(totals.skipped, 16);
    assert_eq!(builder.state(), PyramidState::Completed);
}

#[test]
fn test_failed_save_still_reaches_terminal_state() {
    let dir = tempfile::TempDir::new().unwrap();
    // The cache base is a plain file, so saving the empty set cannot
    // create its directories.
    let base = dir.path().join("cache");
    std::fs::write(&base, b"not a directory").unwrap();

    let store = MemoryStore::new();
    store.create_table("void");
    let renderer = renderer_with_cache(store, &base);
    let tile_store = TileStore::new(&base, "world");

    let builder = PyramidBuilder::new(renderer, tile_store, "void");
    let result = builder.run(1, 1, |_| {});
    assert!(result.is_err());
    assert_eq!(builder.state(), PyramidState::Completed);

    // The failed save does not wedge the builder; a later job starts.
    assert!(builder.run(1, 1, |_| {}).is_err());
    assert_eq!(builder.state(), PyramidState::Completed);
}

#[test]
fn test_zoom_range_clamped() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = MemoryStore::new();
    store.create_table("void");
    let renderer = renderer_with_cache(store, dir.path());
    let tile_store = TileStore::new(dir.path(), "world");

    // Zoom 0 clamps up to 1: exactly the four zoom-1 tiles.
    let builder = PyramidBuilder::new(renderer, tile_store, "void");
    let totals = builder.run(0, 1, |_| {}).unwrap();
    assert_eq!(totals.empty, 4);
}
