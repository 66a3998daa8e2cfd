//! The chunk resolution pipeline
//!
//! Apertures own per-stage work queues, a lens stacks the apertures
//! serving one focus, jobs carry lock-guarded chunk mutations to the
//! executor, and the terrain manager maps completed work onto a bounded
//! pool of renderable controllers.

pub mod adjustment;
pub mod aperture;
pub mod events;
pub mod executor;
pub mod job;
pub mod lens;
pub mod load;
pub mod manager;
pub mod mesh;
pub mod visibility;

use std::sync::Arc;

use crate::core::StreamingConfig;
use crate::mesh::ChunkMesher;
use crate::terrain::TerrainSource;
use crate::world::{Bounds, ChunkStore};

pub use adjustment::{Adjustment, AdjustmentKind};
pub use aperture::{Aperture, ApertureState};
pub use events::{TerrainEvent, TerrainEventReceiver, TerrainEventSender};
pub use executor::JobExecutor;
pub use job::{ChunkJob, CompletedJob, JobOutcome, JobWork};
pub use lens::FocusLens;
pub use load::VoxelDataLoadAperture;
pub use manager::{LevelTerrainManager, StreamingStats, TerrainController};
pub use mesh::MeshGenerationAperture;
pub use visibility::ChunkVisibilityAperture;

/// Shared collaborators every aperture, job, and lens works against.
#[derive(Clone)]
pub struct StreamingDeps {
    pub store: Arc<ChunkStore>,
    pub terrain: Arc<dyn TerrainSource>,
    pub mesher: Arc<dyn ChunkMesher>,
    pub events: TerrainEventSender,
    pub level_bounds: Bounds,
    pub config: StreamingConfig,
}
