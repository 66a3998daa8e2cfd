//! Foci: moving points of interest chunks stream around

use std::sync::Mutex;

use glam::Vec3;

use crate::world::coord::Coordinate;

/// Identifier of a focus within its level
pub type FocusId = u32;

/// A camera/player position the streaming pipeline keeps terrain resident
/// around. The position is written by game code and sampled by the
/// manager's background tracking thread.
pub struct Focus {
    id: FocusId,
    position: Mutex<Vec3>,
}

impl Focus {
    pub fn new(id: FocusId, position: Vec3) -> Self {
        Self {
            id,
            position: Mutex::new(position),
        }
    }

    pub fn id(&self) -> FocusId {
        self.id
    }

    pub fn position(&self) -> Vec3 {
        *self.position.lock().expect("focus position poisoned")
    }

    pub fn set_position(&self, position: Vec3) {
        *self.position.lock().expect("focus position poisoned") = position;
    }

    /// The chunk currently containing this focus
    pub fn chunk_coord(&self) -> Coordinate {
        Coordinate::from_world_pos(self.position())
    }
}
