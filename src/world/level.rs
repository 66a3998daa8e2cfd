//! Level: the bounded world a terrain manager streams

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use glam::Vec3;
use tokio::sync::mpsc;

use crate::world::chunk::EMPTY_VOXEL;
use crate::world::coord::{Bounds, Coordinate};
use crate::world::focus::{Focus, FocusId};
use crate::world::store::ChunkStore;

/// Something the terrain manager should react to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LevelEvent {
    /// A focus changed chunks since it was last sampled
    FocusMoved(FocusId),
    /// A voxel edit invalidated this chunk's mesh
    ChunkDirtied(Coordinate),
}

pub type LevelEventSender = mpsc::UnboundedSender<LevelEvent>;
pub type LevelEventReceiver = mpsc::UnboundedReceiver<LevelEvent>;

/// A bounded box of streamable terrain, its chunk store, and the foci
/// moving through it.
///
/// Game code talks to the level: registering foci, moving them, and
/// editing voxels. The level turns those into [`LevelEvent`]s for the
/// manager thread, which holds the single event receiver.
pub struct Level {
    bounds: Bounds,
    store: Arc<ChunkStore>,
    foci: RwLock<Vec<Arc<Focus>>>,
    next_focus_id: AtomicU32,
    events_tx: LevelEventSender,
    events_rx: Mutex<Option<LevelEventReceiver>>,
}

impl Level {
    /// Create a level spanning `bounds` (in chunk coordinates)
    pub fn new(bounds: Bounds, journal_capacity: Option<usize>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            bounds,
            store: Arc::new(ChunkStore::new(journal_capacity)),
            foci: RwLock::new(Vec::new()),
            next_focus_id: AtomicU32::new(0),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn store(&self) -> &Arc<ChunkStore> {
        &self.store
    }

    // --- Foci ---

    /// Register a new focus at `position`
    pub fn add_focus(&self, position: Vec3) -> Arc<Focus> {
        let id = self.next_focus_id.fetch_add(1, Ordering::Relaxed);
        let focus = Arc::new(Focus::new(id, position));
        self.foci.write().expect("focus list poisoned").push(focus.clone());
        focus
    }

    pub fn foci(&self) -> Vec<Arc<Focus>> {
        self.foci.read().expect("focus list poisoned").clone()
    }

    pub fn focus(&self, id: FocusId) -> Option<Arc<Focus>> {
        self.foci
            .read()
            .expect("focus list poisoned")
            .iter()
            .find(|f| f.id() == id)
            .cloned()
    }

    /// Move a focus and notify the manager immediately, without waiting
    /// for the background tracker's next sample
    pub fn move_focus(&self, id: FocusId, position: Vec3) {
        if let Some(focus) = self.focus(id) {
            focus.set_position(position);
            let _ = self.events_tx.send(LevelEvent::FocusMoved(id));
        }
    }

    // --- Events ---

    /// A sender for level events (cloned by the focus tracker thread)
    pub fn event_sender(&self) -> LevelEventSender {
        self.events_tx.clone()
    }

    /// Take the event receiver. The manager thread calls this once; the
    /// level keeps no way to get it back.
    pub fn take_event_receiver(&self) -> Option<LevelEventReceiver> {
        self.events_rx.lock().expect("event receiver poisoned").take()
    }

    // --- Voxel access by world voxel coordinate ---

    /// Read a voxel. Chunks that were never touched read as empty.
    pub fn voxel(&self, world: Coordinate) -> u8 {
        let chunk_coord = world.voxel_to_chunk();
        match self.store.get(chunk_coord) {
            Some(chunk) => chunk
                .lock()
                .expect("chunk mutex poisoned")
                .voxel(world.voxel_local_index()),
            None => EMPTY_VOXEL,
        }
    }

    /// Write a voxel and dirty every chunk whose mesh samples it.
    ///
    /// Writes outside the level bounds are ignored, as are empty writes
    /// to chunks that were never created. Returns whether a write
    /// happened.
    pub fn set_voxel(&self, world: Coordinate, value: u8) -> bool {
        let chunk_coord = world.voxel_to_chunk();
        if !self.bounds.contains(chunk_coord) {
            return false;
        }
        if value == EMPTY_VOXEL && self.store.get(chunk_coord).is_none() {
            return false;
        }
        let shared = self.store.get_or_create(chunk_coord);
        {
            let mut chunk = shared.lock().expect("chunk mutex poisoned");
            if chunk.voxel(world.voxel_local_index()) == value {
                return false;
            }
            chunk.set_voxel(world.voxel_local_index(), value);
        }
        for dirtied in self.dirtied_by(world, chunk_coord) {
            let _ = self.events_tx.send(LevelEvent::ChunkDirtied(dirtied));
        }
        true
    }

    /// The negative-axis neighbors whose meshes own the faces on this
    /// chunk's negative boundaries (when the edit sits on one), then the
    /// edited chunk itself. Neighbors emit first: each event is
    /// front-inserted on receipt, so the last-emitted target chunk is
    /// dequeued first.
    fn dirtied_by(&self, world: Coordinate, chunk_coord: Coordinate) -> Vec<Coordinate> {
        let d = crate::world::chunk::CHUNK_DIAMETER as i32;
        let mut dirtied = Vec::new();
        if world.x.rem_euclid(d) == 0 {
            dirtied.push(chunk_coord.offset(-1, 0, 0));
        }
        if world.y.rem_euclid(d) == 0 {
            dirtied.push(chunk_coord.offset(0, -1, 0));
        }
        if world.z.rem_euclid(d) == 0 {
            dirtied.push(chunk_coord.offset(0, 0, -1));
        }
        dirtied.push(chunk_coord);
        dirtied.retain(|c| self.bounds.contains(*c));
        dirtied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::chunk::CHUNK_DIAMETER;

    fn level() -> Level {
        Level::new(
            Bounds::new(Coordinate::new(-4, -4, -4), Coordinate::new(4, 4, 4)),
            None,
        )
    }

    fn drain_events(rx: &mut LevelEventReceiver) -> Vec<LevelEvent> {
        let mut events = Vec::new();
        while let Ok(e) = rx.try_recv() {
            events.push(e);
        }
        events
    }

    #[test]
    fn test_focus_ids_are_unique() {
        let level = level();
        let a = level.add_focus(Vec3::ZERO);
        let b = level.add_focus(Vec3::new(50.0, 0.0, 0.0));
        assert_ne!(a.id(), b.id());
        assert_eq!(level.foci().len(), 2);
        assert!(level.focus(a.id()).is_some());
        assert!(level.focus(99).is_none());
    }

    #[test]
    fn test_event_receiver_taken_once() {
        let level = level();
        assert!(level.take_event_receiver().is_some());
        assert!(level.take_event_receiver().is_none());
    }

    #[test]
    fn test_empty_write_to_untouched_chunk_is_noop() {
        let level = level();
        let world = Coordinate::new(3, 3, 3);
        assert!(!level.set_voxel(world, EMPTY_VOXEL));
        // No chunk was created just to hold emptiness
        assert!(level.store().get(world.voxel_to_chunk()).is_none());
        assert_eq!(level.voxel(world), EMPTY_VOXEL);
    }

    #[test]
    fn test_write_read_round_trip_creates_chunk() {
        let level = level();
        let world = Coordinate::new(5, 2, 7);
        assert!(level.set_voxel(world, 9));
        assert_eq!(level.voxel(world), 9);
        assert!(level.store().contains(world.voxel_to_chunk()));
    }

    #[test]
    fn test_write_outside_bounds_is_ignored() {
        let level = level();
        let world = Coordinate::new(100 * CHUNK_DIAMETER as i32, 0, 0);
        assert!(!level.set_voxel(world, 1));
        assert_eq!(level.voxel(world), EMPTY_VOXEL);
    }

    #[test]
    fn test_interior_edit_dirties_one_chunk() {
        let level = level();
        let mut rx = level.take_event_receiver().unwrap();

        let world = Coordinate::new(5, 5, 5);
        level.set_voxel(world, 1);
        assert_eq!(
            drain_events(&mut rx),
            vec![LevelEvent::ChunkDirtied(Coordinate::ZERO)]
        );

        // Writing the same value again changes nothing and dirties nothing
        level.set_voxel(world, 1);
        assert!(drain_events(&mut rx).is_empty());
    }

    #[test]
    fn test_negative_boundary_edit_dirties_neighbors() {
        let level = level();
        let mut rx = level.take_event_receiver().unwrap();

        // Local (0, 5, 0) within chunk (0,0,0): the -x and -z neighbors
        // own faces against this voxel. The edited chunk emits last so
        // front-inserting consumers dequeue it first.
        level.set_voxel(Coordinate::new(0, 5, 0), 1);
        let events = drain_events(&mut rx);
        assert_eq!(
            events,
            vec![
                LevelEvent::ChunkDirtied(Coordinate::new(-1, 0, 0)),
                LevelEvent::ChunkDirtied(Coordinate::new(0, 0, -1)),
                LevelEvent::ChunkDirtied(Coordinate::ZERO),
            ]
        );
    }

    #[test]
    fn test_move_focus_emits_event() {
        let level = level();
        let mut rx = level.take_event_receiver().unwrap();
        let focus = level.add_focus(Vec3::ZERO);

        level.move_focus(focus.id(), Vec3::new(64.0, 0.0, 0.0));
        assert_eq!(
            drain_events(&mut rx),
            vec![LevelEvent::FocusMoved(focus.id())]
        );
        assert_eq!(focus.chunk_coord(), Coordinate::new(4, 0, 0));
    }

}
