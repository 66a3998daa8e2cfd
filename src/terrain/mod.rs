//! Terrain-generation/persistence collaborator interface
//!
//! The pipeline asks this collaborator for voxel data when a chunk loads
//! and hands data back when a chunk is evicted. The byte layout of real
//! persistence lives outside this crate; [`NoiseTerrainSource`] pairs a
//! procedural heightfield with an in-memory save map so the pipeline can
//! round-trip end to end.

use std::collections::HashMap;
use std::sync::RwLock;

use noise::{Fbm, NoiseFn, Perlin};
use rayon::prelude::*;

use crate::world::chunk::{CHUNK_DIAMETER, CHUNK_VOLUME, EMPTY_VOXEL};
use crate::world::coord::Coordinate;

/// Voxel data plus its solid count, as exchanged with the collaborator
pub type VoxelPayload = (Option<Box<[u8]>>, u32);

/// Terrain-generation and persistence collaborator.
///
/// `generate_or_load` prefers a previously persisted save over fresh
/// generation; `persist` stores data surrendered by an evicted chunk.
pub trait TerrainSource: Send + Sync {
    fn generate_or_load(&self, chunk: Coordinate) -> VoxelPayload;
    fn persist(&self, chunk: Coordinate, voxels: Option<Box<[u8]>>, solid_count: u32);
    fn chunk_save_exists(&self, chunk: Coordinate) -> bool;
}

/// Default terrain source: an Fbm heightfield over Perlin noise, with an
/// in-memory persistence map.
pub struct NoiseTerrainSource {
    fbm: Fbm<Perlin>,
    frequency: f64,
    amplitude: f64,
    base_height: f64,
    saves: RwLock<HashMap<Coordinate, (Option<Box<[u8]>>, u32)>>,
}

impl NoiseTerrainSource {
    pub fn new(seed: u32) -> Self {
        Self {
            fbm: Fbm::<Perlin>::new(seed),
            frequency: 0.01,
            amplitude: 24.0,
            base_height: 8.0,
            saves: RwLock::new(HashMap::new()),
        }
    }

    /// Terrain height at a world-space column
    pub fn height_at(&self, x: f64, z: f64) -> f64 {
        self.base_height
            + self.fbm.get([x * self.frequency, z * self.frequency]) * self.amplitude
    }

    fn generate(&self, chunk: Coordinate) -> VoxelPayload {
        let d = CHUNK_DIAMETER;
        let origin_x = (chunk.x * d as i32) as f64;
        let origin_y = (chunk.y * d as i32) as f64;
        let origin_z = (chunk.z * d as i32) as f64;

        let mut buf = vec![EMPTY_VOXEL; CHUNK_VOLUME].into_boxed_slice();

        // Each y-slab of the buffer is independent; fill them in parallel.
        let solid: u32 = buf
            .par_chunks_mut(d * d)
            .enumerate()
            .map(|(y, slab)| {
                let world_y = origin_y + y as f64;
                let mut count = 0u32;
                for z in 0..d {
                    for x in 0..d {
                        let height = self.height_at(origin_x + x as f64, origin_z + z as f64);
                        if world_y <= height {
                            slab[z * d + x] = 1;
                            count += 1;
                        }
                    }
                }
                count
            })
            .sum();

        if solid == 0 {
            (None, 0)
        } else {
            (Some(buf), solid)
        }
    }
}

impl TerrainSource for NoiseTerrainSource {
    fn generate_or_load(&self, chunk: Coordinate) -> VoxelPayload {
        if let Some((voxels, count)) = self
            .saves
            .read()
            .expect("save map poisoned")
            .get(&chunk)
            .map(|(v, c)| (v.clone(), *c))
        {
            log::trace!("chunk {:?}: loaded from save ({} solid)", chunk, count);
            return (voxels, count);
        }
        let (voxels, count) = self.generate(chunk);
        log::trace!("chunk {:?}: generated ({} solid)", chunk, count);
        (voxels, count)
    }

    fn persist(&self, chunk: Coordinate, voxels: Option<Box<[u8]>>, solid_count: u32) {
        self.saves
            .write()
            .expect("save map poisoned")
            .insert(chunk, (voxels, solid_count));
    }

    fn chunk_save_exists(&self, chunk: Coordinate) -> bool {
        self.saves
            .read()
            .expect("save map poisoned")
            .contains_key(&chunk)
    }
}
