//! World model: coordinates, chunks, the chunk store, foci, and the level

pub mod coord;
pub mod chunk;
pub mod store;
pub mod focus;
pub mod level;

pub use chunk::{Chunk, ChunkJournal, Resolution, CHUNK_DIAMETER, CHUNK_VOLUME, EMPTY_VOXEL};
pub use coord::{Bounds, Coordinate};
pub use focus::{Focus, FocusId};
pub use level::{Level, LevelEvent};
pub use store::{ChunkStore, SharedChunk};
