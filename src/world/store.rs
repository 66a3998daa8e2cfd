//! Chunk store: lazily-created, shared chunk ownership

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::world::chunk::Chunk;
use crate::world::coord::Coordinate;

/// A chunk shared between the scheduler and worker jobs. The mutex guards
/// memory access; the chunk's own resolution lock guards the lifecycle.
pub type SharedChunk = Arc<Mutex<Chunk>>;

/// Owns every chunk of a level.
///
/// Chunks are created lazily on first access and never removed: an evicted
/// chunk returns to `Unloaded` in place and stays resident as a
/// placeholder entry.
pub struct ChunkStore {
    chunks: RwLock<HashMap<Coordinate, SharedChunk>>,
    journal_capacity: Option<usize>,
}

impl ChunkStore {
    pub fn new(journal_capacity: Option<usize>) -> Self {
        Self {
            chunks: RwLock::new(HashMap::new()),
            journal_capacity,
        }
    }

    /// The chunk at `id`, if it has ever been accessed
    pub fn get(&self, id: Coordinate) -> Option<SharedChunk> {
        self.chunks
            .read()
            .expect("chunk map poisoned")
            .get(&id)
            .cloned()
    }

    /// The chunk at `id`, created unloaded on first access
    pub fn get_or_create(&self, id: Coordinate) -> SharedChunk {
        if let Some(chunk) = self.get(id) {
            return chunk;
        }
        let mut map = self.chunks.write().expect("chunk map poisoned");
        map.entry(id)
            .or_insert_with(|| {
                log::trace!("chunk {:?}: created", id);
                Arc::new(Mutex::new(Chunk::new(id, self.journal_capacity)))
            })
            .clone()
    }

    pub fn contains(&self, id: Coordinate) -> bool {
        self.chunks
            .read()
            .expect("chunk map poisoned")
            .contains_key(&id)
    }

    /// Number of resident chunk entries
    pub fn len(&self) -> usize {
        self.chunks.read().expect("chunk map poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
