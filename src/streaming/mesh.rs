//! Meshed-stage aperture: building and tearing down chunk meshes

use crate::mesh::MeshData;
use crate::streaming::adjustment::{Adjustment, AdjustmentKind};
use crate::streaming::aperture::{Aperture, ApertureState};
use crate::streaming::job::{ChunkJob, JobOutcome, JobWork};
use crate::streaming::StreamingDeps;
use crate::world::chunk::{Chunk, Resolution};
use crate::world::SharedChunk;

/// Moves chunks across the Loaded/Meshed boundary and rebuilds meshes for
/// Dirty entries. A mesh build waits until every required neighbor has
/// voxel data resident, so surface extraction can suppress faces against
/// loaded solid neighbors instead of guessing.
pub struct MeshGenerationAperture {
    state: ApertureState,
}

impl MeshGenerationAperture {
    pub fn new(state: ApertureState) -> Self {
        debug_assert_eq!(state.resolution(), Resolution::Meshed);
        Self { state }
    }

    fn neighbors_loaded(&self, adj: &Adjustment, deps: &StreamingDeps) -> bool {
        deps.mesher.required_neighbors(adj.chunk).iter().all(|n| {
            if !deps.level_bounds.contains(*n) {
                // Can never load; treated as uniformly empty
                return true;
            }
            deps.store.get(*n).is_some_and(|shared| {
                shared.lock().expect("chunk mutex poisoned").resolution() >= Resolution::Loaded
            })
        })
    }
}

impl Aperture for MeshGenerationAperture {
    fn state(&self) -> &ApertureState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ApertureState {
        &mut self.state
    }

    fn is_valid(&self, adj: &Adjustment, chunk: &Chunk) -> bool {
        match adj.kind {
            // Stays queued while the chunk is still climbing toward a mesh
            AdjustmentKind::InFocus => chunk.resolution() < Resolution::Meshed,
            AdjustmentKind::OutOfFocus => chunk.resolution() >= Resolution::Meshed,
            // A dirty chunk below Meshed has no mesh to rebuild; the
            // edit is covered by the ordinary in-focus promotion
            AdjustmentKind::Dirty => chunk.resolution() >= Resolution::Meshed,
        }
    }

    fn is_ready(&self, adj: &Adjustment, chunk: &Chunk, deps: &StreamingDeps) -> bool {
        match adj.kind {
            // Voxel data must be resident, and so must the neighbors a
            // surface extraction reads. An empty chunk meshes empty
            // whatever its neighbors hold, so the inline shortcut never
            // waits on them.
            AdjustmentKind::InFocus => {
                chunk.resolution() == Resolution::Loaded
                    && (chunk.is_uniformly_empty() || self.neighbors_loaded(adj, deps))
            }
            AdjustmentKind::Dirty => {
                chunk.is_uniformly_empty() || self.neighbors_loaded(adj, deps)
            }
            // Visibility must be withdrawn before the mesh goes away
            AdjustmentKind::OutOfFocus => chunk.resolution() == Resolution::Meshed,
        }
    }

    fn build_job(&self, adj: Adjustment, chunk: SharedChunk, _deps: &StreamingDeps) -> JobOutcome {
        match adj.kind {
            AdjustmentKind::InFocus => {
                let mut guard = chunk.lock().expect("chunk mutex poisoned");
                if guard.is_uniformly_empty() {
                    // Nothing to extract: install the empty mesh inline
                    guard.set_mesh(MeshData::empty());
                    guard.unlock(Resolution::Meshed, adj.kind);
                    return JobOutcome::CompletedInline;
                }
                drop(guard);
                JobOutcome::Job(ChunkJob {
                    adjustment: adj,
                    stage: Resolution::Meshed,
                    chunk,
                    work: JobWork::GenerateMesh,
                })
            }
            AdjustmentKind::Dirty => JobOutcome::Job(ChunkJob {
                adjustment: adj,
                stage: Resolution::Meshed,
                chunk,
                work: JobWork::GenerateMesh,
            }),
            AdjustmentKind::OutOfFocus => {
                let mut guard = chunk.lock().expect("chunk mutex poisoned");
                if guard.mesh_is_empty() {
                    // No renderable ever existed; drop the mesh quietly
                    guard.clear_mesh();
                    guard.unlock(Resolution::Meshed, adj.kind);
                    return JobOutcome::CompletedInline;
                }
                drop(guard);
                JobOutcome::Job(ChunkJob {
                    adjustment: adj,
                    stage: Resolution::Meshed,
                    chunk,
                    work: JobWork::RemoveMesh,
                })
            }
        }
    }
}
