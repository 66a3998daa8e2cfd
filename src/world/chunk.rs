//! Chunk state machine
//!
//! A chunk is the atomic unit of streaming: a fixed-size cube of voxels
//! that climbs the resolution ladder `Unloaded -> Loaded -> Meshed ->
//! Visible` (and back down) one stage at a time. All resolution-affecting
//! mutations are guarded by a non-blocking, single-owner lock keyed by the
//! (target resolution, adjustment kind) pair that scheduled the work.
//! Lock misuse and out-of-order transitions indicate scheduler bugs and
//! panic immediately rather than returning errors.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::mesh::MeshData;
use crate::streaming::adjustment::AdjustmentKind;
use crate::world::coord::Coordinate;

/// Voxels per chunk side
pub const CHUNK_DIAMETER: usize = 16;

/// Voxels per chunk
pub const CHUNK_VOLUME: usize = CHUNK_DIAMETER * CHUNK_DIAMETER * CHUNK_DIAMETER;

/// The empty voxel value; a chunk whose voxels are all empty stores no buffer
pub const EMPTY_VOXEL: u8 = 0;

/// Lifecycle stage of a chunk, totally ordered
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Resolution {
    Unloaded,
    Loaded,
    Meshed,
    Visible,
}

impl Resolution {
    /// The next stage up the ladder, if any
    pub fn next(self) -> Option<Resolution> {
        match self {
            Resolution::Unloaded => Some(Resolution::Loaded),
            Resolution::Loaded => Some(Resolution::Meshed),
            Resolution::Meshed => Some(Resolution::Visible),
            Resolution::Visible => None,
        }
    }

    /// The next stage down the ladder, if any
    pub fn prev(self) -> Option<Resolution> {
        match self {
            Resolution::Unloaded => None,
            Resolution::Loaded => Some(Resolution::Unloaded),
            Resolution::Meshed => Some(Resolution::Loaded),
            Resolution::Visible => Some(Resolution::Meshed),
        }
    }
}

/// The holder of a chunk's resolution lock
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkLock {
    /// Resolution stage of the aperture that acquired the lock
    pub target: Resolution,
    /// Adjustment kind that scheduled the work
    pub kind: AdjustmentKind,
}

/// Timestamped human-readable audit log of chunk mutations.
///
/// Diagnostics only; entries have no behavioral effect. A bounded journal
/// discards its oldest entries once the capacity is reached.
#[derive(Debug)]
pub struct ChunkJournal {
    entries: VecDeque<String>,
    capacity: Option<usize>,
}

impl ChunkJournal {
    /// Journal that keeps every entry
    pub fn unbounded() -> Self {
        Self { entries: VecDeque::new(), capacity: None }
    }

    /// Journal that keeps the most recent `capacity` entries
    pub fn bounded(capacity: usize) -> Self {
        Self { entries: VecDeque::with_capacity(capacity), capacity: Some(capacity) }
    }

    fn record(&mut self, message: impl AsRef<str>) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let entry = format!("[{}.{:03}s] {}", now.as_secs(), now.subsec_millis(), message.as_ref());
        if let Some(cap) = self.capacity {
            while self.entries.len() >= cap.max(1) {
                self.entries.pop_front();
            }
        }
        self.entries.push_back(entry);
    }

    /// All entries, oldest first
    pub fn all(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// The most recent `n` entries, oldest first
    pub fn last(&self, n: usize) -> impl Iterator<Item = &str> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).map(String::as_str)
    }

    /// Number of retained entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been recorded (or retained)
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A fixed-size cube of voxel terrain and its lifecycle state.
///
/// Owned exclusively by the [`ChunkStore`](crate::world::ChunkStore);
/// apertures and jobs hold references and must go through the lock
/// protocol to mutate resolution-affecting fields.
#[derive(Debug)]
pub struct Chunk {
    id: Coordinate,
    resolution: Resolution,
    /// Dense voxel buffer; `None` means uniformly empty.
    /// Invariant: `solid_voxel_count == 0` exactly when this is `None`.
    voxels: Option<Box<[u8]>>,
    solid_voxel_count: u32,
    mesh: Option<MeshData>,
    lock: Option<ChunkLock>,
    journal: ChunkJournal,
}

impl Chunk {
    /// Create an unloaded chunk
    pub fn new(id: Coordinate, journal_capacity: Option<usize>) -> Self {
        Self {
            id,
            resolution: Resolution::Unloaded,
            voxels: None,
            solid_voxel_count: 0,
            mesh: None,
            lock: None,
            journal: match journal_capacity {
                Some(cap) => ChunkJournal::bounded(cap),
                None => ChunkJournal::unbounded(),
            },
        }
    }

    // --- Read-only probes ---

    pub fn id(&self) -> Coordinate {
        self.id
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }

    pub fn lock_holder(&self) -> Option<ChunkLock> {
        self.lock
    }

    pub fn solid_voxel_count(&self) -> u32 {
        self.solid_voxel_count
    }

    /// True when every voxel is empty
    pub fn is_uniformly_empty(&self) -> bool {
        self.solid_voxel_count == 0
    }

    /// True when every voxel is solid
    pub fn is_uniformly_solid(&self) -> bool {
        self.solid_voxel_count as usize == CHUNK_VOLUME
    }

    pub fn mesh(&self) -> Option<&MeshData> {
        self.mesh.as_ref()
    }

    /// True when a mesh is present and carries no geometry
    pub fn mesh_is_empty(&self) -> bool {
        self.mesh.as_ref().is_some_and(MeshData::is_empty)
    }

    pub fn journal(&self) -> &ChunkJournal {
        &self.journal
    }

    // --- Lock protocol ---

    /// Acquire the resolution lock. Non-blocking compare-and-set
    /// semantics: succeeds only if the chunk is currently unlocked.
    pub fn try_lock(&mut self, target: Resolution, kind: AdjustmentKind) -> bool {
        if self.lock.is_some() {
            return false;
        }
        self.lock = Some(ChunkLock { target, kind });
        self.journal.record(format!("locked for {:?}/{:?}", target, kind));
        true
    }

    /// Release the resolution lock.
    ///
    /// # Panics
    /// If the chunk is unlocked or held for a different (target, kind)
    /// pair — a mismatched unlock is a scheduler bug, not a retryable
    /// condition.
    pub fn unlock(&mut self, target: Resolution, kind: AdjustmentKind) {
        let expected = ChunkLock { target, kind };
        match self.lock {
            Some(held) if held == expected => {
                self.lock = None;
                self.journal.record(format!("unlocked {:?}/{:?}", target, kind));
            }
            other => panic!(
                "chunk {:?}: unlock({:?}, {:?}) but lock holder is {:?}",
                self.id, target, kind, other
            ),
        }
    }

    fn require_lock(&self, target: Resolution, op: &str) {
        match self.lock {
            Some(held) if held.target == target => {}
            other => panic!(
                "chunk {:?}: {} requires lock ({:?}, _) but holder is {:?}",
                self.id, op, target, other
            ),
        }
    }

    fn require_resolution(&self, expected: Resolution, op: &str) {
        if self.resolution != expected {
            panic!(
                "chunk {:?}: {} requires resolution {:?} but chunk is {:?}",
                self.id, op, expected, self.resolution
            );
        }
    }

    // --- Lock-guarded stage transitions ---

    /// Install loaded voxel data, advancing `Unloaded -> Loaded`.
    ///
    /// Requires the lock held for the `Loaded` stage.
    pub fn set_voxel_data(&mut self, voxels: Option<Box<[u8]>>, solid_count: u32) {
        self.require_lock(Resolution::Loaded, "set_voxel_data");
        self.require_resolution(Resolution::Unloaded, "set_voxel_data");
        match &voxels {
            Some(buf) => {
                assert_eq!(buf.len(), CHUNK_VOLUME, "voxel buffer has wrong size");
                assert!(solid_count > 0, "non-empty buffer with zero solid count");
            }
            None => assert_eq!(solid_count, 0, "absent buffer with nonzero solid count"),
        }
        self.voxels = voxels;
        self.solid_voxel_count = solid_count;
        self.resolution = Resolution::Loaded;
        self.journal
            .record(format!("loaded ({} solid voxels)", solid_count));
    }

    /// Surrender the voxel buffer for persistence, regressing
    /// `Loaded -> Unloaded`. Requires the lock held for the `Loaded` stage.
    pub fn clear_voxel_data(&mut self) -> (Option<Box<[u8]>>, u32) {
        self.require_lock(Resolution::Loaded, "clear_voxel_data");
        self.require_resolution(Resolution::Loaded, "clear_voxel_data");
        let voxels = self.voxels.take();
        let count = self.solid_voxel_count;
        self.solid_voxel_count = 0;
        self.resolution = Resolution::Unloaded;
        self.journal
            .record(format!("evicted ({} solid voxels surrendered)", count));
        (voxels, count)
    }

    /// Install a mesh, advancing `Loaded -> Meshed`.
    /// Requires the lock held for the `Meshed` stage.
    pub fn set_mesh(&mut self, mesh: MeshData) {
        self.require_lock(Resolution::Meshed, "set_mesh");
        self.require_resolution(Resolution::Loaded, "set_mesh");
        self.journal
            .record(format!("meshed ({} vertices)", mesh.vertex_count()));
        self.mesh = Some(mesh);
        self.resolution = Resolution::Meshed;
    }

    /// Replace the mesh of an already-meshed chunk after a dirty edit.
    /// Resolution is unchanged. Requires the lock held for the `Meshed`
    /// stage and resolution at least `Meshed`.
    pub fn replace_mesh(&mut self, mesh: MeshData) {
        self.require_lock(Resolution::Meshed, "replace_mesh");
        if self.resolution < Resolution::Meshed {
            panic!(
                "chunk {:?}: replace_mesh requires resolution >= Meshed but chunk is {:?}",
                self.id, self.resolution
            );
        }
        self.journal
            .record(format!("remeshed ({} vertices)", mesh.vertex_count()));
        self.mesh = Some(mesh);
    }

    /// Discard the mesh, regressing `Meshed -> Loaded`.
    /// Requires the lock held for the `Meshed` stage.
    pub fn clear_mesh(&mut self) {
        self.require_lock(Resolution::Meshed, "clear_mesh");
        self.require_resolution(Resolution::Meshed, "clear_mesh");
        self.mesh = None;
        self.resolution = Resolution::Loaded;
        self.journal.record("mesh cleared");
    }

    /// Flip visibility: `Meshed -> Visible` or `Visible -> Meshed`.
    /// Requires the lock held for the `Visible` stage.
    pub fn set_visible(&mut self, visible: bool) {
        self.require_lock(Resolution::Visible, "set_visible");
        if visible {
            self.require_resolution(Resolution::Meshed, "set_visible(true)");
            self.resolution = Resolution::Visible;
            self.journal.record("made visible");
        } else {
            self.require_resolution(Resolution::Visible, "set_visible(false)");
            self.resolution = Resolution::Meshed;
            self.journal.record("made invisible");
        }
    }

    // --- Voxel access by local index ---

    /// Read a voxel by local index
    pub fn voxel(&self, index: usize) -> u8 {
        debug_assert!(index < CHUNK_VOLUME);
        match &self.voxels {
            Some(buf) => buf[index],
            None => EMPTY_VOXEL,
        }
    }

    /// Write a voxel by local index, maintaining `solid_voxel_count` and
    /// the buffer-presence invariant: the buffer is allocated lazily on
    /// the first non-empty write and freed when the count returns to zero.
    pub fn set_voxel(&mut self, index: usize, value: u8) {
        debug_assert!(index < CHUNK_VOLUME);
        let old = self.voxel(index);
        if old == value {
            return;
        }
        if self.voxels.is_none() {
            if value == EMPTY_VOXEL {
                return;
            }
            self.voxels = Some(vec![EMPTY_VOXEL; CHUNK_VOLUME].into_boxed_slice());
        }
        if let Some(buf) = &mut self.voxels {
            buf[index] = value;
        }
        match (old == EMPTY_VOXEL, value == EMPTY_VOXEL) {
            (true, false) => self.solid_voxel_count += 1,
            (false, true) => {
                self.solid_voxel_count -= 1;
                if self.solid_voxel_count == 0 {
                    self.voxels = None;
                }
            }
            _ => {}
        }
        self.journal
            .record(format!("voxel {} set to {}", index, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locked_chunk(target: Resolution, kind: AdjustmentKind) -> Chunk {
        let mut chunk = Chunk::new(Coordinate::new(0, 0, 0), None);
        assert!(chunk.try_lock(target, kind));
        chunk
    }

    fn load(chunk: &mut Chunk, solid: u32) {
        assert!(chunk.try_lock(Resolution::Loaded, AdjustmentKind::InFocus));
        if solid == 0 {
            chunk.set_voxel_data(None, 0);
        } else {
            let mut buf = vec![EMPTY_VOXEL; CHUNK_VOLUME].into_boxed_slice();
            for v in buf.iter_mut().take(solid as usize) {
                *v = 1;
            }
            chunk.set_voxel_data(Some(buf), solid);
        }
        chunk.unlock(Resolution::Loaded, AdjustmentKind::InFocus);
    }

    #[test]
    fn test_try_lock_is_single_owner() {
        let mut chunk = Chunk::new(Coordinate::ZERO, None);
        assert!(chunk.try_lock(Resolution::Loaded, AdjustmentKind::InFocus));
        // Second acquisition fails regardless of key
        assert!(!chunk.try_lock(Resolution::Loaded, AdjustmentKind::InFocus));
        assert!(!chunk.try_lock(Resolution::Meshed, AdjustmentKind::Dirty));
        chunk.unlock(Resolution::Loaded, AdjustmentKind::InFocus);
        assert!(chunk.try_lock(Resolution::Meshed, AdjustmentKind::Dirty));
    }

    #[test]
    #[should_panic(expected = "unlock")]
    fn test_mismatched_unlock_panics() {
        let mut chunk = locked_chunk(Resolution::Loaded, AdjustmentKind::InFocus);
        chunk.unlock(Resolution::Loaded, AdjustmentKind::OutOfFocus);
    }

    #[test]
    #[should_panic(expected = "unlock")]
    fn test_unlock_while_unlocked_panics() {
        let mut chunk = Chunk::new(Coordinate::ZERO, None);
        chunk.unlock(Resolution::Loaded, AdjustmentKind::InFocus);
    }

    #[test]
    fn test_load_round_trip_restores_exact_bytes() {
        let mut chunk = Chunk::new(Coordinate::new(1, 2, 3), None);

        let mut buf = vec![EMPTY_VOXEL; CHUNK_VOLUME].into_boxed_slice();
        buf[0] = 7;
        buf[100] = 3;
        let original = buf.clone();

        assert!(chunk.try_lock(Resolution::Loaded, AdjustmentKind::InFocus));
        chunk.set_voxel_data(Some(buf), 2);
        assert_eq!(chunk.resolution(), Resolution::Loaded);
        chunk.unlock(Resolution::Loaded, AdjustmentKind::InFocus);

        assert!(chunk.try_lock(Resolution::Loaded, AdjustmentKind::OutOfFocus));
        let (returned, count) = chunk.clear_voxel_data();
        chunk.unlock(Resolution::Loaded, AdjustmentKind::OutOfFocus);

        assert_eq!(chunk.resolution(), Resolution::Unloaded);
        assert_eq!(count, 2);
        assert_eq!(returned.unwrap(), original);
        assert_eq!(chunk.solid_voxel_count(), 0);
    }

    #[test]
    #[should_panic(expected = "set_voxel_data")]
    fn test_set_voxel_data_without_lock_panics() {
        let mut chunk = Chunk::new(Coordinate::ZERO, None);
        chunk.set_voxel_data(None, 0);
    }

    #[test]
    #[should_panic(expected = "requires resolution")]
    fn test_stage_skip_panics() {
        // Meshing an unloaded chunk would skip the Loaded stage
        let mut chunk = locked_chunk(Resolution::Meshed, AdjustmentKind::InFocus);
        chunk.set_mesh(MeshData::default());
    }

    #[test]
    fn test_full_ladder_one_stage_at_a_time() {
        let mut chunk = Chunk::new(Coordinate::ZERO, None);
        load(&mut chunk, 5);
        assert_eq!(chunk.resolution(), Resolution::Loaded);

        assert!(chunk.try_lock(Resolution::Meshed, AdjustmentKind::InFocus));
        chunk.set_mesh(MeshData::default());
        chunk.unlock(Resolution::Meshed, AdjustmentKind::InFocus);
        assert_eq!(chunk.resolution(), Resolution::Meshed);
        assert!(chunk.mesh_is_empty());

        assert!(chunk.try_lock(Resolution::Visible, AdjustmentKind::InFocus));
        chunk.set_visible(true);
        chunk.unlock(Resolution::Visible, AdjustmentKind::InFocus);
        assert_eq!(chunk.resolution(), Resolution::Visible);

        // And back down
        assert!(chunk.try_lock(Resolution::Visible, AdjustmentKind::OutOfFocus));
        chunk.set_visible(false);
        chunk.unlock(Resolution::Visible, AdjustmentKind::OutOfFocus);
        assert_eq!(chunk.resolution(), Resolution::Meshed);

        assert!(chunk.try_lock(Resolution::Meshed, AdjustmentKind::OutOfFocus));
        chunk.clear_mesh();
        chunk.unlock(Resolution::Meshed, AdjustmentKind::OutOfFocus);
        assert_eq!(chunk.resolution(), Resolution::Loaded);
        assert!(chunk.mesh().is_none());
    }

    #[test]
    fn test_voxel_writes_maintain_count_and_buffer() {
        let mut chunk = Chunk::new(Coordinate::ZERO, None);
        assert!(chunk.is_uniformly_empty());

        // First non-empty write allocates lazily
        chunk.set_voxel(10, 4);
        assert_eq!(chunk.solid_voxel_count(), 1);
        assert_eq!(chunk.voxel(10), 4);

        // Overwriting solid with solid leaves the count alone
        chunk.set_voxel(10, 9);
        assert_eq!(chunk.solid_voxel_count(), 1);

        chunk.set_voxel(11, 1);
        assert_eq!(chunk.solid_voxel_count(), 2);

        // Clearing back to zero frees the buffer
        chunk.set_voxel(10, EMPTY_VOXEL);
        chunk.set_voxel(11, EMPTY_VOXEL);
        assert_eq!(chunk.solid_voxel_count(), 0);
        assert!(chunk.is_uniformly_empty());
        assert_eq!(chunk.voxel(10), EMPTY_VOXEL);
    }

    #[test]
    fn test_resolution_order_and_steps() {
        assert!(Resolution::Unloaded < Resolution::Loaded);
        assert!(Resolution::Meshed < Resolution::Visible);
        assert_eq!(Resolution::Loaded.next(), Some(Resolution::Meshed));
        assert_eq!(Resolution::Loaded.prev(), Some(Resolution::Unloaded));
        assert_eq!(Resolution::Visible.next(), None);
        assert_eq!(Resolution::Unloaded.prev(), None);
    }

    #[test]
    fn test_journal_bounded_retention() {
        let mut chunk = Chunk::new(Coordinate::ZERO, Some(3));
        for i in 0..10 {
            chunk.set_voxel(i, 1);
        }
        assert_eq!(chunk.journal().len(), 3);

        let last_two: Vec<_> = chunk.journal().last(2).collect();
        assert_eq!(last_two.len(), 2);
        assert!(last_two[1].contains("voxel 9"));
        assert!(last_two[0].contains("voxel 8"));
    }

    #[test]
    fn test_journal_records_lifecycle() {
        let mut chunk = Chunk::new(Coordinate::ZERO, None);
        load(&mut chunk, 1);
        let entries: Vec<_> = chunk.journal().all().collect();
        assert!(entries.iter().any(|e| e.contains("locked")));
        assert!(entries.iter().any(|e| e.contains("loaded")));
        assert!(entries.iter().any(|e| e.contains("unlocked")));
    }
}
