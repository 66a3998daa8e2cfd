//! Chunk jobs: lock-guarded mutations carried to the executor
//!
//! A job is built by an aperture after it has already acquired the
//! chunk's resolution lock; running the job performs the mutation,
//! releases the lock, and emits any event the orchestrator needs. Jobs
//! never hold two chunk mutexes at once: neighbor voxel data is
//! snapshotted one chunk at a time before the main chunk is locked.

use crate::mesh::ChunkSnapshot;
use crate::streaming::adjustment::{Adjustment, AdjustmentKind};
use crate::streaming::events::TerrainEvent;
use crate::streaming::StreamingDeps;
use crate::world::chunk::{Chunk, Resolution, CHUNK_VOLUME, EMPTY_VOXEL};
use crate::world::store::SharedChunk;

/// What a job does to its chunk
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobWork {
    /// Load from persistence or generate, then install voxel data
    Load,
    /// Surrender voxel data to persistence and regress to Unloaded
    PersistAndEvict,
    /// Build (or rebuild, for Dirty) the chunk's mesh
    GenerateMesh,
    /// Discard the mesh and announce its removal
    RemoveMesh,
    /// Flip visibility on or off
    SetVisible(bool),
}

/// A unit of scheduled work holding its chunk's resolution lock
pub struct ChunkJob {
    pub adjustment: Adjustment,
    /// Resolution stage of the aperture that built the job (the lock target)
    pub stage: Resolution,
    pub chunk: SharedChunk,
    pub work: JobWork,
}

/// Record of a finished job, handed back to the owning aperture
#[derive(Clone, Copy, Debug)]
pub struct CompletedJob {
    pub adjustment: Adjustment,
    pub stage: Resolution,
    pub work: JobWork,
}

/// Result of asking an aperture to build a job for a locked chunk
pub enum JobOutcome {
    /// A job to schedule
    Job(ChunkJob),
    /// The aperture completed the work inline under the lock (shortcut
    /// paths); the lock has already been released
    CompletedInline,
}

impl ChunkJob {
    /// Execute the job, release the chunk lock, and emit events.
    pub fn run(self, deps: &StreamingDeps) -> CompletedJob {
        let adj = self.adjustment;
        match self.work {
            JobWork::Load => {
                let (voxels, count) = deps.terrain.generate_or_load(adj.chunk);
                let mut chunk = self.chunk.lock().expect("chunk mutex poisoned");
                let (voxels, count) = merge_preload_edits(&chunk, voxels, count);
                chunk.set_voxel_data(voxels, count);
                chunk.unlock(self.stage, adj.kind);
            }
            JobWork::PersistAndEvict => {
                let (voxels, count) = {
                    let mut chunk = self.chunk.lock().expect("chunk mutex poisoned");
                    let payload = chunk.clear_voxel_data();
                    chunk.unlock(self.stage, adj.kind);
                    payload
                };
                deps.terrain.persist(adj.chunk, voxels, count);
            }
            JobWork::GenerateMesh => {
                let neighbors = snapshot_neighbors(deps, adj.chunk);
                let mut chunk = self.chunk.lock().expect("chunk mutex poisoned");
                let mesh = deps.mesher.generate_mesh(&chunk, &neighbors);
                log::trace!(
                    "chunk {:?}: meshed, {} triangles",
                    adj.chunk,
                    mesh.triangle_count()
                );
                if chunk.resolution() >= Resolution::Meshed {
                    // Dirty rebuild of an existing mesh; resolution unchanged
                    chunk.replace_mesh(mesh);
                } else {
                    chunk.set_mesh(mesh);
                }
                chunk.unlock(self.stage, adj.kind);
                let _ = deps.events.send(TerrainEvent::MeshReady(adj));
            }
            JobWork::RemoveMesh => {
                let mut chunk = self.chunk.lock().expect("chunk mutex poisoned");
                chunk.clear_mesh();
                chunk.unlock(self.stage, adj.kind);
                let _ = deps.events.send(TerrainEvent::RemoveMesh(adj));
            }
            JobWork::SetVisible(visible) => {
                let mut chunk = self.chunk.lock().expect("chunk mutex poisoned");
                chunk.set_visible(visible);
                chunk.unlock(self.stage, adj.kind);
                let event = if visible {
                    TerrainEvent::SetVisible(adj)
                } else {
                    TerrainEvent::SetInvisible(adj)
                };
                let _ = deps.events.send(event);
            }
        }
        CompletedJob {
            adjustment: adj,
            stage: self.stage,
            work: self.work,
        }
    }
}

/// Solid voxels written into a chunk before its load arrived win over
/// generated or persisted content. Carved-empty edits cannot be told
/// apart from untouched voxels and do not survive a load.
fn merge_preload_edits(
    chunk: &Chunk,
    voxels: Option<Box<[u8]>>,
    count: u32,
) -> (Option<Box<[u8]>>, u32) {
    if chunk.is_uniformly_empty() {
        return (voxels, count);
    }
    let mut buf =
        voxels.unwrap_or_else(|| vec![EMPTY_VOXEL; CHUNK_VOLUME].into_boxed_slice());
    for index in 0..CHUNK_VOLUME {
        let edited = chunk.voxel(index);
        if edited != EMPTY_VOXEL {
            buf[index] = edited;
        }
    }
    let merged = buf.iter().filter(|&&v| v != EMPTY_VOXEL).count() as u32;
    (Some(buf), merged)
}

/// Snapshot the chunks a mesh build depends on, locking each briefly.
/// Neighbors outside the level bounds can never load and count as
/// uniformly empty.
fn snapshot_neighbors(
    deps: &StreamingDeps,
    chunk: crate::world::Coordinate,
) -> Vec<ChunkSnapshot> {
    deps.mesher
        .required_neighbors(chunk)
        .into_iter()
        .map(|coord| {
            if !deps.level_bounds.contains(coord) {
                return ChunkSnapshot::uniformly_empty(coord);
            }
            let neighbor = deps.store.get_or_create(coord);
            let guard = neighbor.lock().expect("chunk mutex poisoned");
            ChunkSnapshot::from_chunk(&guard)
        })
        .collect()
}

impl CompletedJob {
    /// True for a load-stage completion that should chain mesh work
    pub fn chains_mesh_stage(&self) -> bool {
        self.work == JobWork::Load && self.adjustment.kind == AdjustmentKind::InFocus
    }
}
