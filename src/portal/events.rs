//! Host notifications consumed by the portal zone systems.

use bevy::prelude::*;

use super::bounds::{CellPos, ColumnPos};
use super::types::DimensionId;

// ============================================================================
// World lifecycle
// ============================================================================

/// The host joined, left or switched worlds. `None` means no world.
///
/// Written after [`super::world::ActiveWorld`] has been updated to `current`.
#[derive(Event, Message, Debug, Clone, PartialEq, Eq)]
pub struct WorldChanged {
    pub previous: Option<DimensionId>,
    pub current: Option<DimensionId>,
}

// ============================================================================
// Block data
// ============================================================================

/// A 16×16 column finished loading in the active world.
#[derive(Event, Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLoaded(pub ColumnPos);

/// A single block changed in the active world.
#[derive(Event, Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockChanged {
    pub cell: CellPos,
    /// Whether the new block is a portal marker.
    pub is_marker: bool,
}
