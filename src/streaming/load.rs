//! Loaded-stage aperture: voxel data in and out of memory

use crate::streaming::adjustment::{Adjustment, AdjustmentKind};
use crate::streaming::aperture::{Aperture, ApertureState};
use crate::streaming::job::{ChunkJob, CompletedJob, JobOutcome, JobWork};
use crate::streaming::StreamingDeps;
use crate::world::chunk::{Chunk, Resolution};
use crate::world::SharedChunk;

/// Moves chunks across the Unloaded/Loaded boundary: InFocus entries
/// load or generate voxel data, OutOfFocus entries surrender it to
/// persistence. A completed InFocus load chains mesh-stage adjustments
/// for the chunk itself and for any loaded neighbor whose mesh samples
/// it, so terrain that was waiting on this load meshes without a focus
/// event.
pub struct VoxelDataLoadAperture {
    state: ApertureState,
}

impl VoxelDataLoadAperture {
    pub fn new(state: ApertureState) -> Self {
        debug_assert_eq!(state.resolution(), Resolution::Loaded);
        Self { state }
    }
}

impl Aperture for VoxelDataLoadAperture {
    fn state(&self) -> &ApertureState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ApertureState {
        &mut self.state
    }

    fn is_valid(&self, adj: &Adjustment, chunk: &Chunk) -> bool {
        match adj.kind {
            // A load only makes sense for a chunk still unloaded
            AdjustmentKind::InFocus => chunk.resolution() == Resolution::Unloaded,
            // An eviction stays relevant while any data is resident
            AdjustmentKind::OutOfFocus => chunk.resolution() >= Resolution::Loaded,
            // Dirty work belongs to the mesh stage
            AdjustmentKind::Dirty => false,
        }
    }

    fn is_ready(&self, adj: &Adjustment, chunk: &Chunk, _deps: &StreamingDeps) -> bool {
        match adj.kind {
            AdjustmentKind::InFocus => true,
            // The mesh must be torn down before voxel data can leave
            AdjustmentKind::OutOfFocus => chunk.resolution() == Resolution::Loaded,
            AdjustmentKind::Dirty => false,
        }
    }

    fn build_job(&self, adj: Adjustment, chunk: SharedChunk, _deps: &StreamingDeps) -> JobOutcome {
        let work = match adj.kind {
            AdjustmentKind::InFocus => JobWork::Load,
            AdjustmentKind::OutOfFocus => JobWork::PersistAndEvict,
            AdjustmentKind::Dirty => unreachable!("dirty entries never pass is_valid here"),
        };
        JobOutcome::Job(ChunkJob {
            adjustment: adj,
            stage: Resolution::Loaded,
            chunk,
            work,
        })
    }

    fn on_job_complete(&mut self, job: &CompletedJob, deps: &StreamingDeps) -> Vec<Adjustment> {
        if !job.chains_mesh_stage() {
            return Vec::new();
        }
        let adj = job.adjustment;
        let mut chained = vec![Adjustment::new(
            adj.chunk,
            AdjustmentKind::InFocus,
            Resolution::Meshed,
            adj.focus,
        )];
        // Loaded neighbors whose meshes sample this chunk may have been
        // waiting on it; give them a turn at the mesh stage too
        for coord in deps.mesher.dirtied_neighbors(adj.chunk) {
            let waiting = deps.store.get(coord).is_some_and(|shared| {
                shared.lock().expect("chunk mutex poisoned").resolution() == Resolution::Loaded
            });
            if waiting {
                chained.push(Adjustment::new(
                    coord,
                    AdjustmentKind::InFocus,
                    Resolution::Meshed,
                    adj.focus,
                ));
            }
        }
        chained
    }
}
