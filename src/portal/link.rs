//! Link preview for a portal the player is about to build.
//!
//! A new portal P in dimension D is *linked* from an existing portal Q in the
//! other dimension when some cell of Q, mapped into D, resolves to P rather
//! than to any portal already in D. The forward direction (where P itself
//! would lead) uses the opposite link.

use bevy::math::DVec3;

use super::bounds::{CellPos, PortalBounds};
use super::config::DimensionLink;
use super::registry::PortalRegistry;
use super::types::{Argb, DimensionId, PortalId};
use super::world::WorldBorder;
use super::zones::{nearest_candidate, Candidate, CellTransform};

const PORTAL_WIDTH: i32 = 2;
const PORTAL_HEIGHT: i32 = 3;

/// Horizontal direction the player is looking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facing {
    North,
    South,
    East,
    West,
}

impl Facing {
    /// Unit step on x/z.
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Facing::North => (0, -1),
            Facing::South => (0, 1),
            Facing::East => (1, 0),
            Facing::West => (-1, 0),
        }
    }

    pub const fn rotate_counterclockwise(self) -> Facing {
        match self {
            Facing::North => Facing::West,
            Facing::West => Facing::South,
            Facing::South => Facing::East,
            Facing::East => Facing::North,
        }
    }

    pub const fn rotate_clockwise(self) -> Facing {
        match self {
            Facing::North => Facing::East,
            Facing::East => Facing::South,
            Facing::South => Facing::West,
            Facing::West => Facing::North,
        }
    }

    /// The portal plane is perpendicular to the facing, so a north/south
    /// facing builds a portal spanning x.
    pub const fn spans_x(self) -> bool {
        matches!(self, Facing::North | Facing::South)
    }

    /// Closest cardinal direction to a yaw in degrees (0 = south, 90 = west).
    pub fn from_yaw(yaw: f64) -> Facing {
        let quadrant = ((yaw / 90.0).round() as i64).rem_euclid(4);
        match quadrant {
            0 => Facing::South,
            1 => Facing::West,
            2 => Facing::North,
            _ => Facing::East,
        }
    }
}

/// Where a portal would go and the frame around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub bounds: PortalBounds,
    pub frame: Vec<CellPos>,
}

/// Everything shown while previewing a placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPreview {
    pub placement: PortalBounds,
    pub frame: Vec<CellPos>,
    /// Portals of the other dimension that would lead into the placement.
    pub linked: Vec<PortalId>,
    /// Portal of the other dimension the placement would lead to.
    pub destination: Option<PortalId>,
    pub two_way: bool,
}

/// 2 wide, 3 tall portal at the player's feet, extended sideways toward the
/// half of the block the player stands in.
pub fn compute_placement(position: DVec3, facing: Facing) -> Placement {
    let base = CellPos::new(position.x.floor() as i32, position.y.floor() as i32, position.z.floor() as i32);
    let left = facing.rotate_counterclockwise();
    let right = facing.rotate_clockwise();

    let (left_x, left_z) = left.offset();
    let offset_x = position.x - (base.x as f64 + 0.5);
    let offset_z = position.z - (base.z as f64 + 0.5);
    let left_side = offset_x * left_x as f64 + offset_z * left_z as f64 >= 0.0;

    let (step_x, step_z) = if left_side { left.offset() } else { right.offset() };
    let other = base.offset(step_x * (PORTAL_WIDTH - 1), 0, step_z * (PORTAL_WIDTH - 1));
    let top = base.offset(0, PORTAL_HEIGHT - 1, 0);

    let bounds = PortalBounds::new(base.x, base.y, base.z, other.x, top.y, other.z);
    Placement { bounds, frame: frame_cells(&bounds, facing) }
}

/// One-cell ring around `bounds` in the portal plane.
pub fn frame_cells(bounds: &PortalBounds, facing: Facing) -> Vec<CellPos> {
    let (min_y, max_y) = (bounds.min_y() - 1, bounds.max_y() + 1);
    let mut frame = Vec::new();
    if facing.spans_x() {
        let (min_x, max_x, z) = (bounds.min_x() - 1, bounds.max_x() + 1, bounds.min_z());
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                if x == min_x || x == max_x || y == min_y || y == max_y {
                    frame.push(CellPos::new(x, y, z));
                }
            }
        }
    } else {
        let (min_z, max_z, x) = (bounds.min_z() - 1, bounds.max_z() + 1, bounds.min_x());
        for y in min_y..=max_y {
            for z in min_z..=max_z {
                if z == min_z || z == max_z || y == min_y || y == max_y {
                    frame.push(CellPos::new(x, y, z));
                }
            }
        }
    }
    frame
}

fn candidates_with_placement(registry: &PortalRegistry, dimension: &DimensionId, placement: &PortalBounds) -> Vec<Candidate> {
    let mut candidates = vec![Candidate::new(PortalId::nil(), *placement, Argb::FALLBACK, "")];
    candidates.extend(
        registry
            .entries_in(dimension)
            .map(|e| Candidate::new(e.id(), e.bounds(), e.color(), e.label())),
    );
    candidates
}

/// Portals of the dimension linking into `dimension` whose cells would resolve
/// to `placement` once it exists.
pub fn find_linked_portals(
    registry: &PortalRegistry,
    links: &[DimensionLink],
    dimension: &DimensionId,
    placement: &PortalBounds,
    border: WorldBorder,
    epsilon: f64,
) -> Vec<PortalId> {
    let Some(link) = links.iter().find(|link| &link.to == dimension) else {
        return Vec::new();
    };
    let transform = CellTransform::new(link.scale, border, epsilon);
    let candidates = candidates_with_placement(registry, dimension, placement);

    registry
        .entries_in(&link.from)
        .filter(|source| {
            source.bounds().cells().any(|cell| {
                nearest_candidate(&candidates, 0..candidates.len(), transform.apply(cell), link.search_radius) == Some(0)
            })
        })
        .map(|source| source.id())
        .collect()
}

/// Existing portal of the linked dimension that `placement` would lead to.
pub fn find_destination(
    registry: &PortalRegistry,
    links: &[DimensionLink],
    dimension: &DimensionId,
    placement: &PortalBounds,
    border: WorldBorder,
    epsilon: f64,
) -> Option<PortalId> {
    let link = links.iter().find(|link| &link.from == dimension)?;
    let transform = CellTransform::new(link.scale, border, epsilon);
    let candidates: Vec<Candidate> = registry
        .entries_in(&link.to)
        .map(|e| Candidate::new(e.id(), e.bounds(), e.color(), e.label()))
        .collect();

    placement
        .cells()
        .find_map(|cell| nearest_candidate(&candidates, 0..candidates.len(), transform.apply(cell), link.search_radius))
        .map(|index| candidates[index].id)
}

/// Placement, frame and link state for a player standing at `position`.
/// `None` in a dimension without links.
pub fn compute_preview(
    registry: &PortalRegistry,
    links: &[DimensionLink],
    dimension: &DimensionId,
    position: DVec3,
    facing: Facing,
    border: WorldBorder,
    epsilon: f64,
) -> Option<LinkPreview> {
    if !links.iter().any(|link| &link.from == dimension || &link.to == dimension) {
        return None;
    }
    let Placement { bounds, frame } = compute_placement(position, facing);
    let linked = find_linked_portals(registry, links, dimension, &bounds, border, epsilon);
    let destination = find_destination(registry, links, dimension, &bounds, border, epsilon);
    let two_way = destination.is_some_and(|id| linked.contains(&id));
    Some(LinkPreview { placement: bounds, frame, linked, destination, two_way })
}
