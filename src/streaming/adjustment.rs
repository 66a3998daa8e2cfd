//! Adjustments: units of requested chunk work

use crate::world::coord::Coordinate;
use crate::world::chunk::Resolution;
use crate::world::focus::FocusId;

/// Why a chunk needs attention at a resolution stage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AdjustmentKind {
    /// The chunk entered a focus's managed region and should advance
    InFocus,
    /// The chunk left a focus's managed region and should regress
    OutOfFocus,
    /// The chunk's content changed and downstream state is stale
    Dirty,
}

impl AdjustmentKind {
    /// Flip InFocus and OutOfFocus; Dirty has no opposite
    pub fn opposite(self) -> AdjustmentKind {
        match self {
            AdjustmentKind::InFocus => AdjustmentKind::OutOfFocus,
            AdjustmentKind::OutOfFocus => AdjustmentKind::InFocus,
            AdjustmentKind::Dirty => AdjustmentKind::Dirty,
        }
    }
}

/// A requested state change for one chunk at one resolution stage,
/// on behalf of one focus
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Adjustment {
    pub chunk: Coordinate,
    pub kind: AdjustmentKind,
    pub resolution: Resolution,
    pub focus: FocusId,
}

impl Adjustment {
    pub fn new(
        chunk: Coordinate,
        kind: AdjustmentKind,
        resolution: Resolution,
        focus: FocusId,
    ) -> Self {
        Self { chunk, kind, resolution, focus }
    }

    /// The same adjustment with the focus direction flipped
    pub fn opposite(self) -> Self {
        Self { kind: self.kind.opposite(), ..self }
    }
}
