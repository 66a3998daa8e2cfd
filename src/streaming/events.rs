//! Events the pipeline emits toward the rendering orchestrator

use tokio::sync::mpsc;

use crate::streaming::adjustment::Adjustment;

/// Terrain lifecycle events consumed by the
/// [`LevelTerrainManager`](crate::streaming::LevelTerrainManager)
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TerrainEvent {
    /// A chunk's mesh is ready; it needs a controller and an upload
    MeshReady(Adjustment),
    /// A chunk reached Visible; its controller should be activated
    SetVisible(Adjustment),
    /// A chunk regressed from Visible; its controller should be hidden
    SetInvisible(Adjustment),
    /// A chunk's mesh was removed; its controller should be released
    RemoveMesh(Adjustment),
}

impl TerrainEvent {
    /// The adjustment that produced this event
    pub fn adjustment(&self) -> &Adjustment {
        match self {
            TerrainEvent::MeshReady(a)
            | TerrainEvent::SetVisible(a)
            | TerrainEvent::SetInvisible(a)
            | TerrainEvent::RemoveMesh(a) => a,
        }
    }
}

pub type TerrainEventSender = mpsc::UnboundedSender<TerrainEvent>;
pub type TerrainEventReceiver = mpsc::UnboundedReceiver<TerrainEvent>;

/// Create the event channel connecting the pipeline to the orchestrator
pub fn channel() -> (TerrainEventSender, TerrainEventReceiver) {
    mpsc::unbounded_channel()
}
