use std::collections::VecDeque;

use rustc_hash::FxHashSet;

use crate::portal::bounds::{CellPos, PortalBounds};
use crate::portal::world::{VerticalBounds, WorldAccess};

/// Marker cell that the fill may step onto.
fn is_walkable(world: &dyn WorldAccess, vertical: VerticalBounds, cell: CellPos) -> bool {
    vertical.contains(cell.y) && world.marker_if_loaded(cell).unwrap_or(false)
}

/// Breadth-first fill over face-connected marker cells starting at `start`.
///
/// Every reached cell is added to `visited`, which the caller shares between
/// seeds of one column pass so a component is only reported once. Returns the
/// bounding box of the component, or `None` if `start` is not a usable marker
/// or was already visited.
pub(crate) fn explore_component(
    world: &dyn WorldAccess,
    start: CellPos,
    visited: &mut FxHashSet<CellPos>,
) -> Option<PortalBounds> {
    let vertical = world.vertical_bounds();
    if visited.contains(&start) || !is_walkable(world, vertical, start) {
        return None;
    }

    let mut bounds = PortalBounds::from_cell(start);
    let mut queue = VecDeque::new();
    visited.insert(start);
    queue.push_back(start);

    while let Some(cell) = queue.pop_front() {
        bounds = bounds.including(cell);
        for next in cell.neighbors() {
            if visited.contains(&next) || !is_walkable(world, vertical, next) {
                continue;
            }
            visited.insert(next);
            queue.push_back(next);
        }
    }

    Some(bounds)
}
