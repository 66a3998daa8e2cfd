//! Lodestream - progressive level-of-detail streaming for chunked voxel terrain
//!
//! The crate manages the lifecycle of fixed-size terrain chunks as one or
//! more foci (cameras/players) move through a world: voxel data is loaded,
//! meshed, and made visible around each focus, and torn back down behind it.
//!
//! The core pieces:
//! - [`world::Chunk`] — the per-chunk state machine and its exclusive lock
//! - [`streaming::Aperture`] — per-resolution-stage work queues
//! - [`streaming::FocusLens`] — the aperture stack serving one focus
//! - [`streaming::LevelTerrainManager`] — controller pool + render-side tick

pub mod core;
pub mod world;
pub mod streaming;
pub mod terrain;
pub mod mesh;
