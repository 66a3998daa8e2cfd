//! Level terrain manager: the single owner of the streaming pipeline
//!
//! The manager pumps the whole system from one thread: level events in,
//! jobs out to the executor, terrain events onto the controller queues,
//! and one queue step per tick. Only the background focus tracker runs
//! elsewhere, and it does nothing but sample focus positions and send
//! [`LevelEvent::FocusMoved`] back over the level's channel.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use glam::Vec3;

use crate::core::{Error, StreamingConfig};
use crate::mesh::{ChunkMesher, MeshData};
use crate::streaming::adjustment::Adjustment;
use crate::streaming::events::{self, TerrainEvent, TerrainEventReceiver};
use crate::streaming::executor::JobExecutor;
use crate::streaming::lens::FocusLens;
use crate::streaming::StreamingDeps;
use crate::terrain::TerrainSource;
use crate::world::coord::Coordinate;
use crate::world::focus::{Focus, FocusId};
use crate::world::level::{Level, LevelEvent, LevelEventReceiver};

/// A renderable slot in the fixed controller pool.
///
/// Stands in for an engine-side scene node: it holds the mesh uploaded
/// for one chunk, a baked-collision flag, and an active (drawn) flag.
#[derive(Debug)]
pub struct TerrainController {
    id: usize,
    chunk: Option<Coordinate>,
    mesh: Option<MeshData>,
    collision_baked: bool,
    active: bool,
}

impl TerrainController {
    fn new(id: usize) -> Self {
        Self {
            id,
            chunk: None,
            mesh: None,
            collision_baked: false,
            active: false,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn chunk(&self) -> Option<Coordinate> {
        self.chunk
    }

    pub fn mesh(&self) -> Option<&MeshData> {
        self.mesh.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn has_collision(&self) -> bool {
        self.collision_baked
    }

    fn bind(&mut self, chunk: Coordinate, mesh: MeshData) {
        self.chunk = Some(chunk);
        self.mesh = Some(mesh);
        self.collision_baked = false;
    }

    fn release(&mut self) {
        self.chunk = None;
        self.mesh = None;
        self.collision_baked = false;
        self.active = false;
    }
}

/// Counters the manager accumulates across ticks
#[derive(Clone, Copy, Debug, Default)]
pub struct StreamingStats {
    pub ticks: u64,
    pub jobs_submitted: u64,
    pub jobs_completed: u64,
    pub meshes_bound: u64,
    pub meshes_released: u64,
    pub collision_bakes: u64,
    pub activations: u64,
    pub deactivations: u64,
    pub dirty_edits: u64,
    /// Bind attempts deferred because the pool had no free controller
    pub controller_starvation: u64,
}

/// A controller-queue entry: the adjustment that raised the event plus
/// the priority its lens computed when the event arrived.
#[derive(Clone, Copy, Debug)]
struct QueuedWork {
    adjustment: Adjustment,
    priority: f32,
}

/// Background thread that samples focus positions and reports chunk
/// crossings over the level's event channel. It never touches queues or
/// chunk state itself.
struct FocusTracker {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FocusTracker {
    fn spawn(level: Arc<Level>, interval: Duration) -> Result<Self, Error> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let sender = level.event_sender();
        let handle = std::thread::Builder::new()
            .name("focus-tracker".into())
            .spawn(move || {
                let mut last: HashMap<FocusId, Coordinate> = HashMap::new();
                while flag.load(Ordering::Relaxed) {
                    for focus in level.foci() {
                        let coord = focus.chunk_coord();
                        if last.get(&focus.id()) != Some(&coord) {
                            last.insert(focus.id(), coord);
                            if sender.send(LevelEvent::FocusMoved(focus.id())).is_err() {
                                return;
                            }
                        }
                    }
                    std::thread::sleep(interval);
                }
            })
            .map_err(Error::Io)?;
        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for FocusTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Orchestrates streaming for one level: lenses per focus, the job
/// executor, and a fixed pool of terrain controllers fed by five queues.
/// Each queue advances by at most one entry per tick; entries that cannot
/// advance yet go back to their queue rather than blocking it.
pub struct LevelTerrainManager {
    level: Arc<Level>,
    deps: StreamingDeps,
    executor: JobExecutor,
    lenses: Vec<FocusLens>,
    level_events: LevelEventReceiver,
    terrain_events: TerrainEventReceiver,

    controllers: Vec<TerrainController>,
    free: Vec<usize>,
    assigned: HashMap<Coordinate, usize>,

    awaiting_controller: VecDeque<QueuedWork>,
    ready_to_render: VecDeque<QueuedWork>,
    activate: VecDeque<QueuedWork>,
    deactivate: VecDeque<QueuedWork>,
    release: VecDeque<QueuedWork>,

    stats: StreamingStats,
    tracker: Option<FocusTracker>,
}

impl LevelTerrainManager {
    pub fn new(
        level: Arc<Level>,
        terrain: Arc<dyn TerrainSource>,
        mesher: Arc<dyn ChunkMesher>,
        config: StreamingConfig,
    ) -> Result<Self, Error> {
        config.validate()?;
        let level_events = level.take_event_receiver().ok_or_else(|| {
            Error::Streaming("level event receiver already taken".into())
        })?;
        let (events_tx, terrain_events) = events::channel();
        let deps = StreamingDeps {
            store: level.store().clone(),
            terrain,
            mesher,
            events: events_tx,
            level_bounds: level.bounds(),
            config: config.clone(),
        };
        let executor = JobExecutor::new(config.executor_workers)?;
        Ok(Self {
            level,
            deps,
            executor,
            lenses: Vec::new(),
            level_events,
            terrain_events,
            controllers: Vec::new(),
            free: Vec::new(),
            assigned: HashMap::new(),
            awaiting_controller: VecDeque::new(),
            ready_to_render: VecDeque::new(),
            activate: VecDeque::new(),
            deactivate: VecDeque::new(),
            release: VecDeque::new(),
            stats: StreamingStats::default(),
            tracker: None,
        })
    }

    /// Build a lens for every focus already registered on the level and
    /// size the controller pool to the worst case they can demand.
    pub fn initialize(&mut self) {
        for focus in self.level.foci() {
            self.add_lens(focus);
        }
        log::info!(
            "terrain manager initialized: {} lenses, {} controllers",
            self.lenses.len(),
            self.controllers.len()
        );
    }

    /// Register a new focus with the level and start streaming around it
    pub fn add_focus(&mut self, position: Vec3) -> Arc<Focus> {
        let focus = self.level.add_focus(position);
        self.add_lens(focus.clone());
        focus
    }

    fn add_lens(&mut self, focus: Arc<Focus>) {
        let mut lens = FocusLens::new(focus, &self.deps.config, self.level.bounds());
        let capacity = lens.initialize();
        for _ in 0..capacity {
            let id = self.controllers.len();
            self.controllers.push(TerrainController::new(id));
            self.free.push(id);
        }
        self.lenses.push(lens);
    }

    /// Start the background focus tracker
    pub fn start_focus_tracking(&mut self) -> Result<(), Error> {
        if self.tracker.is_none() {
            let interval = Duration::from_millis(self.deps.config.focus_sample_interval_ms);
            self.tracker = Some(FocusTracker::spawn(self.level.clone(), interval)?);
        }
        Ok(())
    }

    /// Stop the background focus tracker, joining its thread
    pub fn stop_focus_tracking(&mut self) {
        if let Some(mut tracker) = self.tracker.take() {
            tracker.stop();
        }
    }

    /// One pump of the pipeline: drain events, schedule and absorb jobs,
    /// then advance each controller queue by one entry.
    pub fn tick(&mut self) {
        self.stats.ticks += 1;
        self.drain_level_events();

        for lens in &mut self.lenses {
            self.stats.jobs_submitted += lens.schedule_next(&mut self.executor, &self.deps) as u64;
        }
        let completed = self.executor.poll_completed();
        self.stats.jobs_completed += completed.len() as u64;
        for lens in &mut self.lenses {
            lens.absorb_completions(&completed, &self.deps);
        }

        self.drain_terrain_events();
        self.step_awaiting_controller();
        self.step_ready_to_render();
        self.step_activate();
        self.step_deactivate();
        self.step_release();
    }

    /// True when no work is queued, in flight, or pending anywhere
    pub fn is_idle(&self) -> bool {
        self.executor.in_flight() == 0
            && self.lenses.iter().all(|l| l.pending() == 0)
            && self.awaiting_controller.is_empty()
            && self.ready_to_render.is_empty()
            && self.activate.is_empty()
            && self.deactivate.is_empty()
            && self.release.is_empty()
    }

    pub fn stats(&self) -> StreamingStats {
        self.stats
    }

    pub fn level(&self) -> &Arc<Level> {
        &self.level
    }

    /// Controllers currently bound to a chunk
    pub fn controllers_in_use(&self) -> usize {
        self.assigned.len()
    }

    /// The controller rendering `chunk`, if any
    pub fn controller_for(&self, chunk: Coordinate) -> Option<&TerrainController> {
        self.assigned.get(&chunk).map(|&i| &self.controllers[i])
    }

    /// Scheduling priority of an adjustment, delegated to the lens of its
    /// originating focus
    pub fn priority_for(&self, adj: &Adjustment) -> f32 {
        self.lenses
            .iter()
            .find(|l| l.focus_id() == adj.focus)
            .map_or(0.0, |l| l.priority(adj))
    }

    // --- Event intake ---

    fn drain_level_events(&mut self) {
        while let Ok(event) = self.level_events.try_recv() {
            match event {
                LevelEvent::FocusMoved(id) => {
                    if let Some(lens) = self.lenses.iter_mut().find(|l| l.focus_id() == id) {
                        lens.refresh();
                    }
                }
                LevelEvent::ChunkDirtied(chunk) => {
                    self.stats.dirty_edits += 1;
                    for lens in &mut self.lenses {
                        lens.add_dirty(chunk);
                    }
                }
            }
        }
    }

    fn drain_terrain_events(&mut self) {
        while let Ok(event) = self.terrain_events.try_recv() {
            let adjustment = *event.adjustment();
            let entry = QueuedWork {
                adjustment,
                priority: self.priority_for(&adjustment),
            };
            let queue = match event {
                TerrainEvent::MeshReady(_) => &mut self.awaiting_controller,
                TerrainEvent::SetVisible(_) => &mut self.activate,
                TerrainEvent::SetInvisible(_) => &mut self.deactivate,
                TerrainEvent::RemoveMesh(_) => &mut self.release,
            };
            Self::enqueue(queue, entry);
        }
    }

    /// Insert ordered by priority, after existing entries of the same
    /// priority
    fn enqueue(queue: &mut VecDeque<QueuedWork>, entry: QueuedWork) {
        let at = queue
            .iter()
            .position(|q| q.priority > entry.priority)
            .unwrap_or(queue.len());
        queue.insert(at, entry);
    }

    // --- Queue steps (one pop per tick each) ---

    fn current_mesh(&self, chunk: Coordinate) -> Option<MeshData> {
        let shared = self.deps.store.get(chunk)?;
        let guard = shared.lock().expect("chunk mutex poisoned");
        guard.mesh().cloned()
    }

    /// Bind a freshly meshed chunk to a controller, or refresh the mesh
    /// of one already bound (dirty rebuilds). Binds forward to the
    /// ready_to_render queue for their collision bake.
    fn step_awaiting_controller(&mut self) {
        let Some(entry) = self.awaiting_controller.pop_front() else {
            return;
        };
        let chunk = entry.adjustment.chunk;
        // The mesh may have been torn down since the event was sent
        let Some(mesh) = self.current_mesh(chunk) else {
            return;
        };
        if let Some(&index) = self.assigned.get(&chunk) {
            let controller = &mut self.controllers[index];
            controller.mesh = Some(mesh);
            controller.collision_baked = false;
            self.ready_to_render.push_back(entry);
            return;
        }
        let Some(index) = self.free.pop() else {
            // Pool exhausted; try again next tick
            self.stats.controller_starvation += 1;
            self.awaiting_controller.push_back(entry);
            return;
        };
        self.controllers[index].bind(chunk, mesh);
        self.assigned.insert(chunk, index);
        self.stats.meshes_bound += 1;
        self.ready_to_render.push_back(entry);
    }

    /// Bake collision for a bound mesh. Activation waits on this.
    fn step_ready_to_render(&mut self) {
        let Some(entry) = self.ready_to_render.pop_front() else {
            return;
        };
        let chunk = entry.adjustment.chunk;
        if let Some(&index) = self.assigned.get(&chunk) {
            self.controllers[index].collision_baked = true;
            self.stats.collision_bakes += 1;
            log::trace!("chunk {:?}: collision baked", chunk);
        }
    }

    fn step_activate(&mut self) {
        let Some(entry) = self.activate.pop_front() else {
            return;
        };
        let chunk = entry.adjustment.chunk;
        match self.assigned.get(&chunk) {
            Some(&index) if self.controllers[index].collision_baked => {
                self.controllers[index].active = true;
                self.stats.activations += 1;
            }
            // Binding or baking has not caught up yet; try again next
            // tick while the chunk still has a mesh to show. A chunk
            // torn down in the meantime is dropped.
            _ => {
                if self.current_mesh(chunk).is_some() {
                    self.activate.push_back(entry);
                }
            }
        }
    }

    fn step_deactivate(&mut self) {
        let Some(entry) = self.deactivate.pop_front() else {
            return;
        };
        if let Some(&index) = self.assigned.get(&entry.adjustment.chunk) {
            self.controllers[index].active = false;
            self.stats.deactivations += 1;
        }
    }

    fn step_release(&mut self) {
        let Some(entry) = self.release.pop_front() else {
            return;
        };
        if let Some(index) = self.assigned.remove(&entry.adjustment.chunk) {
            self.controllers[index].release();
            self.free.push(index);
            self.stats.meshes_released += 1;
        }
    }
}

impl Drop for LevelTerrainManager {
    fn drop(&mut self) {
        self.stop_focus_tracking();
    }
}
