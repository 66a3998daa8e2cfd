//! Focus lens: the aperture stack serving one focus

use std::sync::Arc;

use crate::core::StreamingConfig;
use crate::streaming::adjustment::Adjustment;
use crate::streaming::aperture::{Aperture, ApertureState};
use crate::streaming::executor::JobExecutor;
use crate::streaming::job::CompletedJob;
use crate::streaming::load::VoxelDataLoadAperture;
use crate::streaming::mesh::MeshGenerationAperture;
use crate::streaming::visibility::ChunkVisibilityAperture;
use crate::streaming::StreamingDeps;
use crate::world::chunk::Resolution;
use crate::world::coord::{Bounds, Coordinate};
use crate::world::focus::{Focus, FocusId};

/// One aperture per promotable resolution stage, stacked for a single
/// focus. Apertures are held in ascending stage order; scheduling walks
/// them descending so visibility work (cheap, latency-sensitive) beats
/// mesh work, and mesh work beats bulk loading.
pub struct FocusLens {
    focus: Arc<Focus>,
    apertures: Vec<Box<dyn Aperture>>,
}

impl FocusLens {
    pub fn new(focus: Arc<Focus>, config: &StreamingConfig, level_bounds: Bounds) -> Self {
        let id = focus.id();
        let state = |resolution, radius, height_radius| {
            ApertureState::new(
                resolution,
                id,
                radius,
                height_radius,
                config.vertical_weight,
                config.scan_budget,
                level_bounds,
            )
        };
        let apertures: Vec<Box<dyn Aperture>> = vec![
            Box::new(VoxelDataLoadAperture::new(state(
                Resolution::Loaded,
                config.load_radius,
                config.load_height_radius,
            ))),
            Box::new(MeshGenerationAperture::new(state(
                Resolution::Meshed,
                config.mesh_radius,
                config.mesh_height_radius,
            ))),
            Box::new(ChunkVisibilityAperture::new(state(
                Resolution::Visible,
                config.visibility_radius,
                config.visibility_height_radius,
            ))),
        ];
        Self { focus, apertures }
    }

    pub fn focus(&self) -> &Arc<Focus> {
        &self.focus
    }

    pub fn focus_id(&self) -> FocusId {
        self.focus.id()
    }

    /// Start managing every aperture around the focus's current position.
    /// Returns the number of chunks the mesh stage keeps resident, the
    /// upper bound on renderables this lens can demand at once.
    pub fn initialize(&mut self) -> usize {
        for aperture in &mut self.apertures {
            aperture.manage(&self.focus);
        }
        self.mesh_capacity()
    }

    /// Chunks the mesh stage currently manages
    pub fn mesh_capacity(&self) -> usize {
        self.apertures
            .iter()
            .find(|a| a.state().resolution() == Resolution::Meshed)
            .and_then(|a| a.state().managed_bounds())
            .map_or(0, |b| b.volume())
    }

    /// Re-center every aperture after the focus moved
    pub fn refresh(&mut self) {
        for aperture in &mut self.apertures {
            aperture.refresh(&self.focus);
        }
    }

    /// Queue an immediate mesh rebuild for an edited chunk
    pub fn add_dirty(&mut self, chunk: Coordinate) {
        let focus = self.focus.clone();
        if let Some(aperture) = self.aperture_for(Resolution::Meshed) {
            aperture.add_dirty(chunk, &focus);
        }
    }

    /// Scheduling priority of an adjustment, computed by the aperture for
    /// its resolution stage
    pub fn priority(&self, adj: &Adjustment) -> f32 {
        self.apertures
            .iter()
            .find(|a| a.state().resolution() == adj.resolution)
            .map_or(0.0, |a| a.priority(adj, &self.focus))
    }

    /// Submit the single highest-stage schedulable job, if any. Walking
    /// the stack once per tick keeps chunks already near completion
    /// finishing ahead of fresh loads. Returns the number of jobs
    /// submitted (0 or 1).
    pub fn schedule_next(&mut self, executor: &mut JobExecutor, deps: &StreamingDeps) -> usize {
        for aperture in self.apertures.iter_mut().rev() {
            if let Some(job) = aperture.try_next_job(deps) {
                executor.submit(job, deps);
                return 1;
            }
        }
        0
    }

    /// Hand completed jobs back to their apertures and enqueue whatever
    /// next-stage adjustments they chain. Jobs for other foci are ignored.
    pub fn absorb_completions(&mut self, completed: &[CompletedJob], deps: &StreamingDeps) {
        for job in completed {
            if job.adjustment.focus != self.focus.id() {
                continue;
            }
            let chained = match self.aperture_for(job.stage) {
                Some(aperture) => aperture.on_job_complete(job, deps),
                None => continue,
            };
            for adj in chained {
                if let Some(aperture) = self.aperture_for(adj.resolution) {
                    aperture.enqueue_front(adj);
                }
            }
        }
    }

    /// Total queued adjustments across all stages
    pub fn pending(&self) -> usize {
        self.apertures.iter().map(|a| a.state().queue_len()).sum()
    }

    fn aperture_for(&mut self, resolution: Resolution) -> Option<&mut Box<dyn Aperture>> {
        self.apertures
            .iter_mut()
            .find(|a| a.state().resolution() == resolution)
    }
}
