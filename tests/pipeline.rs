//! End-to-end pipeline tests through the public API

use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::Vec3;

use lodestream::core::StreamingConfig;
use lodestream::mesh::BlockFaceMesher;
use lodestream::streaming::LevelTerrainManager;
use lodestream::terrain::NoiseTerrainSource;
use lodestream::world::{Bounds, Coordinate, Level, Resolution, CHUNK_DIAMETER, EMPTY_VOXEL};

fn config(workers: usize) -> StreamingConfig {
    StreamingConfig {
        load_radius: 2,
        load_height_radius: 2,
        mesh_radius: 1,
        mesh_height_radius: 1,
        visibility_radius: 1,
        visibility_height_radius: 1,
        executor_workers: workers,
        focus_sample_interval_ms: 5,
        ..StreamingConfig::default()
    }
}

fn new_level() -> Arc<Level> {
    Arc::new(Level::new(
        Bounds::new(Coordinate::new(-16, -4, -16), Coordinate::new(16, 4, 16)),
        Some(128),
    ))
}

fn new_manager(level: Arc<Level>, workers: usize) -> LevelTerrainManager {
    LevelTerrainManager::new(
        level,
        Arc::new(NoiseTerrainSource::new(7)),
        Arc::new(BlockFaceMesher),
        config(workers),
    )
    .expect("manager construction")
}

/// Tick until the pipeline is fully quiescent
fn settle(manager: &mut LevelTerrainManager) {
    let deadline = Instant::now() + Duration::from_secs(30);
    loop {
        manager.tick();
        if manager.is_idle() {
            return;
        }
        assert!(Instant::now() < deadline, "pipeline never settled");
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn inline_pipeline_reaches_visible_around_focus() {
    let level = new_level();
    level.add_focus(Vec3::ZERO);
    let mut manager = new_manager(level.clone(), 0);
    manager.initialize();
    settle(&mut manager);

    // Every chunk in the visibility box climbed the whole ladder
    for coord in Bounds::around(Coordinate::ZERO, 1, 1).iter() {
        let chunk = level.store().get(coord).expect("chunk created");
        let guard = chunk.lock().unwrap();
        assert_eq!(guard.resolution(), Resolution::Visible, "{:?}", coord);
        assert!(!guard.is_locked(), "{:?} still holds its lock", coord);
    }

    // The surface chunk produced real geometry and an active controller
    let controller = manager
        .controller_for(Coordinate::ZERO)
        .expect("surface chunk bound");
    assert!(controller.is_active());
    assert!(controller.has_collision());
    assert!(controller.mesh().is_some_and(|m| !m.is_empty()));

    // The chunk journal narrates the climb
    let chunk = level.store().get(Coordinate::ZERO).unwrap();
    let entries: Vec<String> = chunk
        .lock()
        .unwrap()
        .journal()
        .all()
        .map(str::to_owned)
        .collect();
    assert!(entries.iter().any(|e| e.contains("loaded")));
    assert!(entries.iter().any(|e| e.contains("meshed")));
    assert!(entries.iter().any(|e| e.contains("made visible")));
}

#[test]
fn edits_survive_eviction_and_reload() {
    let level = new_level();
    let focus = level.add_focus(Vec3::ZERO);
    let mut manager = new_manager(level.clone(), 0);
    manager.initialize();
    settle(&mut manager);

    // Stamp a recognizable voxel into the focus chunk
    let world = Coordinate::new(8, 1, 8);
    assert!(level.set_voxel(world, 5));
    settle(&mut manager);

    // Walk far enough away that the chunk is evicted to persistence
    level.move_focus(
        focus.id(),
        Vec3::new(12.0 * CHUNK_DIAMETER as f32, 0.0, 0.0),
    );
    settle(&mut manager);
    {
        let chunk = level.store().get(Coordinate::ZERO).expect("chunk resident");
        assert_eq!(chunk.lock().unwrap().resolution(), Resolution::Unloaded);
    }
    // Unloaded chunks read as empty until they come back
    assert_eq!(level.voxel(world), EMPTY_VOXEL);

    // Walk back: the reload restores the edit, not fresh generation
    level.move_focus(focus.id(), Vec3::ZERO);
    settle(&mut manager);
    assert_eq!(level.voxel(world), 5);
    assert!(manager
        .controller_for(Coordinate::ZERO)
        .is_some_and(|c| c.is_active()));
}

#[test]
fn dirty_edit_rebuilds_visible_mesh() {
    let level = new_level();
    level.add_focus(Vec3::ZERO);
    let mut manager = new_manager(level.clone(), 0);
    manager.initialize();
    settle(&mut manager);

    let before = manager
        .controller_for(Coordinate::ZERO)
        .and_then(|c| c.mesh())
        .map(|m| m.triangle_count())
        .expect("mesh bound before the edit");

    let world = Coordinate::new(4, 1, 4);
    assert_ne!(level.voxel(world), EMPTY_VOXEL);
    assert!(level.set_voxel(world, EMPTY_VOXEL));
    settle(&mut manager);

    let controller = manager.controller_for(Coordinate::ZERO).unwrap();
    assert_ne!(controller.mesh().map(|m| m.triangle_count()), Some(before));
    assert!(controller.is_active());
    assert!(controller.has_collision());
}

#[test]
fn threaded_pipeline_with_focus_tracker() {
    let level = new_level();
    let focus = level.add_focus(Vec3::ZERO);
    let mut manager = new_manager(level.clone(), 2);
    manager.initialize();
    manager.start_focus_tracking().expect("tracker start");
    settle(&mut manager);
    assert!(manager
        .controller_for(Coordinate::ZERO)
        .is_some_and(|c| c.is_active()));

    // Wander a few chunks; only the tracker reports these moves
    for step in 1..=4 {
        focus.set_position(Vec3::new(step as f32 * CHUNK_DIAMETER as f32, 0.0, 0.0));
        let deadline = Instant::now() + Duration::from_secs(20);
        loop {
            manager.tick();
            let arrived = manager
                .controller_for(Coordinate::new(step, 0, 0))
                .is_some_and(|c| c.is_active());
            if arrived && manager.is_idle() {
                break;
            }
            assert!(Instant::now() < deadline, "step {} never streamed in", step);
            std::thread::sleep(Duration::from_millis(2));
        }
    }
    manager.stop_focus_tracking();

    let stats = manager.stats();
    assert!(stats.jobs_submitted > 0);
    assert_eq!(stats.jobs_submitted, stats.jobs_completed);
    assert!(stats.meshes_bound >= stats.meshes_released);
}