//! Visible-stage aperture: showing and hiding meshed chunks

use crate::streaming::adjustment::{Adjustment, AdjustmentKind};
use crate::streaming::aperture::{Aperture, ApertureState};
use crate::streaming::job::{ChunkJob, JobOutcome, JobWork};
use crate::streaming::StreamingDeps;
use crate::world::chunk::{Chunk, Resolution};
use crate::world::SharedChunk;

/// Moves chunks across the Meshed/Visible boundary. Chunks whose mesh is
/// empty cross it inline in both directions: there is nothing to render,
/// so no controller work and no event is warranted, but the resolution
/// ladder still advances one stage at a time.
pub struct ChunkVisibilityAperture {
    state: ApertureState,
}

impl ChunkVisibilityAperture {
    pub fn new(state: ApertureState) -> Self {
        debug_assert_eq!(state.resolution(), Resolution::Visible);
        Self { state }
    }
}

impl Aperture for ChunkVisibilityAperture {
    fn is_valid(&self, adj: &Adjustment, chunk: &Chunk) -> bool {
        match adj.kind {
            // Stays queued while the chunk is still climbing toward Visible
            AdjustmentKind::InFocus => chunk.resolution() < Resolution::Visible,
            AdjustmentKind::OutOfFocus => chunk.resolution() == Resolution::Visible,
            AdjustmentKind::Dirty => false,
        }
    }

    fn is_ready(&self, adj: &Adjustment, chunk: &Chunk, _deps: &StreamingDeps) -> bool {
        match adj.kind {
            AdjustmentKind::InFocus => chunk.resolution() == Resolution::Meshed,
            AdjustmentKind::OutOfFocus | AdjustmentKind::Dirty => true,
        }
    }

    fn build_job(&self, adj: Adjustment, chunk: SharedChunk, _deps: &StreamingDeps) -> JobOutcome {
        let visible = adj.kind == AdjustmentKind::InFocus;
        let mut guard = chunk.lock().expect("chunk mutex poisoned");
        if guard.mesh_is_empty() {
            guard.set_visible(visible);
            guard.unlock(Resolution::Visible, adj.kind);
            return JobOutcome::CompletedInline;
        }
        drop(guard);
        JobOutcome::Job(ChunkJob {
            adjustment: adj,
            stage: Resolution::Visible,
            chunk,
            work: JobWork::SetVisible(visible),
        })
    }

    fn state(&self) -> &ApertureState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ApertureState {
        &mut self.state
    }
}
