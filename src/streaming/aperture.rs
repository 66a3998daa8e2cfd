//! Resolution apertures: per-stage queue managers and gatekeepers
//!
//! An aperture owns the pending-adjustment queue for one resolution stage
//! of one focus. It answers three questions before any work starts: is
//! the adjustment still inside the managed region, is the chunk in a
//! state ready for this operation, and can the resolution lock be
//! acquired. The shared queue discipline lives in the trait's provided
//! methods; the three concrete apertures supply `is_valid`, `is_ready`,
//! and `build_job`.

use std::collections::VecDeque;

use crate::streaming::adjustment::{Adjustment, AdjustmentKind};
use crate::streaming::job::{ChunkJob, CompletedJob, JobOutcome};
use crate::streaming::StreamingDeps;
use crate::world::chunk::{Chunk, Resolution};
use crate::world::coord::{Bounds, Coordinate};
use crate::world::focus::{Focus, FocusId};

/// Queue, managed bounds, and tuning shared by every aperture kind
pub struct ApertureState {
    resolution: Resolution,
    focus: FocusId,
    radius: i32,
    height_radius: i32,
    vertical_weight: f32,
    scan_budget: usize,
    level_bounds: Bounds,
    bounds: Option<Bounds>,
    queue: VecDeque<Adjustment>,
}

impl ApertureState {
    pub fn new(
        resolution: Resolution,
        focus: FocusId,
        radius: i32,
        height_radius: i32,
        vertical_weight: f32,
        scan_budget: usize,
        level_bounds: Bounds,
    ) -> Self {
        Self {
            resolution,
            focus,
            radius,
            height_radius,
            vertical_weight,
            scan_budget,
            level_bounds,
            bounds: None,
            queue: VecDeque::new(),
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn focus_id(&self) -> FocusId {
        self.focus
    }

    /// The coordinate box currently kept resident, if managing has begun
    pub fn managed_bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Pending adjustments in priority order (diagnostics/tests)
    pub fn queued(&self) -> impl Iterator<Item = &Adjustment> {
        self.queue.iter()
    }

    /// Worst in-range distance, used to invert out-of-focus priorities
    fn max_distance(&self) -> f32 {
        Coordinate::ZERO.distance_to(
            Coordinate::new(self.radius + 1, self.height_radius + 1, self.radius + 1),
            self.vertical_weight,
        )
    }

    /// Scheduling priority: lower sorts first.
    ///
    /// Dirty is always 0. InFocus ranks by weighted distance from the
    /// focus chunk (closest first); OutOfFocus ranks by how far past the
    /// managed region the chunk already is (farthest torn down first).
    pub fn priority_of(&self, adj: &Adjustment, focus_chunk: Coordinate) -> f32 {
        match adj.kind {
            AdjustmentKind::Dirty => 0.0,
            AdjustmentKind::InFocus => focus_chunk.distance_to(adj.chunk, self.vertical_weight),
            AdjustmentKind::OutOfFocus => {
                let distance = focus_chunk.distance_to(adj.chunk, self.vertical_weight);
                (self.max_distance() - distance).max(0.0)
            }
        }
    }

    /// Stable full re-sort by priority; run after each bulk enqueue.
    /// Stability keeps front-inserted Dirty entries ahead of ties.
    fn resort(&mut self, focus_chunk: Coordinate) {
        let mut entries: Vec<Adjustment> = self.queue.drain(..).collect();
        entries.sort_by(|a, b| {
            self.priority_of(a, focus_chunk)
                .total_cmp(&self.priority_of(b, focus_chunk))
        });
        self.queue.extend(entries);
    }
}

/// A per-resolution-stage queue manager.
///
/// The provided methods implement the shared queue discipline; concrete
/// apertures supply eligibility and job construction.
pub trait Aperture: Send {
    fn state(&self) -> &ApertureState;
    fn state_mut(&mut self) -> &mut ApertureState;

    /// Is this adjustment still worth keeping, given the chunk's current
    /// resolution? Stale entries are dropped from the queue.
    fn is_valid(&self, adj: &Adjustment, chunk: &Chunk) -> bool;

    /// Can the operation run right now? Transient `false` means the entry
    /// is requeued in place, never an error.
    fn is_ready(&self, adj: &Adjustment, chunk: &Chunk, deps: &StreamingDeps) -> bool;

    /// Build the job for a chunk whose resolution lock this aperture has
    /// just acquired. Shortcut paths may complete inline (releasing the
    /// lock) and return [`JobOutcome::CompletedInline`].
    fn build_job(
        &self,
        adj: Adjustment,
        chunk: crate::world::SharedChunk,
        deps: &StreamingDeps,
    ) -> JobOutcome;

    /// Hook invoked when one of this aperture's jobs finishes. Returns
    /// adjustments to chain into the *next* resolution stage.
    fn on_job_complete(&mut self, _job: &CompletedJob, _deps: &StreamingDeps) -> Vec<Adjustment> {
        Vec::new()
    }

    /// Start managing a region around the focus: set the managed bounds
    /// and enqueue one InFocus adjustment per chunk inside.
    fn manage(&mut self, focus: &Focus) {
        let center = focus.chunk_coord();
        let state = self.state_mut();
        let bounds = Bounds::around(center, state.radius, state.height_radius)
            .clipped_to(&state.level_bounds);
        let (resolution, focus_id) = (state.resolution, state.focus);
        for coord in bounds.iter() {
            state.queue.push_back(Adjustment::new(
                coord,
                AdjustmentKind::InFocus,
                resolution,
                focus_id,
            ));
        }
        state.bounds = Some(bounds);
        state.resort(center);
        log::debug!(
            "aperture {:?}/focus {}: managing {} chunks",
            resolution,
            focus_id,
            bounds.volume()
        );
    }

    /// Recompute bounds after focus movement and enqueue the difference:
    /// InFocus for newly covered chunks, OutOfFocus for newly uncovered
    /// ones. Entries for unaffected chunks are left untouched.
    fn refresh(&mut self, focus: &Focus) {
        let Some(old) = self.state().bounds else {
            self.manage(focus);
            return;
        };
        let center = focus.chunk_coord();
        let state = self.state_mut();
        let new = Bounds::around(center, state.radius, state.height_radius)
            .clipped_to(&state.level_bounds);
        if new == old {
            return;
        }
        let (resolution, focus_id) = (state.resolution, state.focus);
        for coord in new.iter().filter(|c| !old.contains(*c)) {
            state.queue.push_back(Adjustment::new(
                coord,
                AdjustmentKind::InFocus,
                resolution,
                focus_id,
            ));
        }
        for coord in old.iter().filter(|c| !new.contains(*c)) {
            state.queue.push_back(Adjustment::new(
                coord,
                AdjustmentKind::OutOfFocus,
                resolution,
                focus_id,
            ));
        }
        state.bounds = Some(new);
        state.resort(center);
    }

    /// Insert a Dirty adjustment at the front of the queue
    fn add_dirty(&mut self, chunk: Coordinate, focus: &Focus) {
        let state = self.state_mut();
        let adj = Adjustment::new(chunk, AdjustmentKind::Dirty, state.resolution, focus.id());
        state.queue.push_front(adj);
    }

    /// Enqueue a chained adjustment at the front (used when an upstream
    /// stage completes and the next stage should run immediately)
    fn enqueue_front(&mut self, adj: Adjustment) {
        self.state_mut().queue.push_front(adj);
    }

    /// Scheduling priority of an adjustment for this aperture's focus
    fn priority(&self, adj: &Adjustment, focus: &Focus) -> f32 {
        self.state().priority_of(adj, focus.chunk_coord())
    }

    /// Scan the queue in priority order for the first schedulable entry.
    ///
    /// Examines at most the configured scan budget of entries: drops
    /// entries that left the managed region (or re-entered it, for
    /// OutOfFocus) or failed `is_valid`; requeues in place entries whose
    /// chunk is locked or not ready; locks and builds a job for the first
    /// eligible entry. Returns None if nothing within the budget is
    /// schedulable.
    fn try_next_job(&mut self, deps: &StreamingDeps) -> Option<ChunkJob> {
        let budget = self.state().scan_budget;
        let mut index = 0;
        let mut scanned = 0;
        while scanned < budget {
            let Some(&adj) = self.state().queue.get(index) else {
                break;
            };
            scanned += 1;

            let in_bounds = self
                .state()
                .bounds
                .is_some_and(|b| b.contains(adj.chunk));
            let keep = match adj.kind {
                AdjustmentKind::OutOfFocus => !in_bounds,
                AdjustmentKind::InFocus | AdjustmentKind::Dirty => in_bounds,
            };
            if !keep {
                self.state_mut().queue.remove(index);
                continue;
            }

            let chunk_arc = deps.store.get_or_create(adj.chunk);
            let acquired = {
                let mut chunk = chunk_arc.lock().expect("chunk mutex poisoned");
                if !self.is_valid(&adj, &chunk) {
                    drop(chunk);
                    self.state_mut().queue.remove(index);
                    continue;
                }
                if chunk.is_locked() || !self.is_ready(&adj, &chunk, deps) {
                    // Transient: leave the entry where it is
                    index += 1;
                    continue;
                }
                chunk.try_lock(self.state().resolution, adj.kind)
            };
            if !acquired {
                index += 1;
                continue;
            }

            self.state_mut().queue.remove(index);
            match self.build_job(adj, chunk_arc, deps) {
                JobOutcome::Job(job) => return Some(job),
                JobOutcome::CompletedInline => continue,
            }
        }
        None
    }
}
