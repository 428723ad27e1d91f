//! Snapshot of everything the partition needs to resolve a cell's owner.

use crate::portal::bounds::{CellPos, PortalBounds};
use crate::portal::config::DimensionLink;
use crate::portal::fixed_math::{self, FixedNum};
use crate::portal::registry::PortalRegistry;
use crate::portal::types::{Argb, DimensionId, PortalId};
use crate::portal::world::{VerticalBounds, WorldAccess, WorldBorder};

/// Maps source cells to target cells: `floor(clamp((c + 0.5) * scale))` on x/z,
/// y unchanged. The clamp keeps results inside the source world's border.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellTransform {
    scale: FixedNum,
    west: FixedNum,
    east: FixedNum,
    north: FixedNum,
    south: FixedNum,
}

impl CellTransform {
    pub fn new(scale: f64, border: WorldBorder, epsilon: f64) -> Self {
        let epsilon = fixed_math::from_f64(epsilon).max(FixedNum::DELTA);
        let west = fixed_math::from_f64(border.west);
        let north = fixed_math::from_f64(border.north);
        // A border narrower than epsilon collapses to its west/north edge.
        let east = (fixed_math::from_f64(border.east) - epsilon).max(west);
        let south = (fixed_math::from_f64(border.south) - epsilon).max(north);
        Self { scale: fixed_math::from_f64(scale), west, east, north, south }
    }

    pub fn scale(&self) -> FixedNum {
        self.scale
    }

    fn scaled(&self, cell: i32) -> FixedNum {
        fixed_math::cell_center(cell).saturating_mul(self.scale)
    }

    pub fn dest_x(&self, x: i32) -> i32 {
        fixed_math::floor_i32(self.scaled(x).clamp(self.west, self.east))
    }

    pub fn dest_z(&self, z: i32) -> i32 {
        fixed_math::floor_i32(self.scaled(z).clamp(self.north, self.south))
    }

    pub fn apply(&self, cell: CellPos) -> CellPos {
        CellPos::new(self.dest_x(cell.x), cell.y, self.dest_z(cell.z))
    }

    /// Smallest and largest source coordinate whose unclamped image lies in
    /// `[dest_min, dest_max]`. `None` when no source coordinate maps there.
    pub fn preimage(&self, dest_min: i64, dest_max: i64) -> Option<(i32, i32)> {
        if self.scale <= FixedNum::ZERO || dest_min > dest_max {
            return None;
        }
        let half = FixedNum::lit("0.5");
        let to_fixed = |v: i64| FixedNum::saturating_from_num(v);
        let image = |x: i32| fixed_math::floor_i32(self.scaled(x)) as i64;

        let mut lo = fixed_math::ceil_i32(to_fixed(dest_min).saturating_div(self.scale) - half);
        let mut hi = fixed_math::ceil_i32(to_fixed(dest_max + 1).saturating_div(self.scale) - half).saturating_sub(1);

        // Division rounding can be off by one for scales that are not powers of two.
        while lo > i32::MIN && image(lo - 1) >= dest_min {
            lo -= 1;
        }
        while lo < i32::MAX && image(lo) < dest_min {
            lo += 1;
        }
        while hi < i32::MAX && image(hi + 1) <= dest_max {
            hi += 1;
        }
        while hi > i32::MIN && image(hi) > dest_max {
            hi -= 1;
        }

        (lo <= hi).then_some((lo, hi))
    }
}

/// A portal of the target dimension competing for source cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: PortalId,
    pub bounds: PortalBounds,
    pub color: Argb,
    pub label: String,
}

impl Candidate {
    pub fn new(id: PortalId, bounds: PortalBounds, color: Argb, label: impl Into<String>) -> Self {
        Self { id, bounds, color, label: label.into() }
    }

    pub fn is_outside_search_square(&self, dest_x: i32, dest_z: i32, radius: i32) -> bool {
        let (dx, dz, r) = (dest_x as i64, dest_z as i64, radius as i64);
        (self.bounds.max_x() as i64) < dx - r
            || (self.bounds.min_x() as i64) > dx + r
            || (self.bounds.max_z() as i64) < dz - r
            || (self.bounds.min_z() as i64) > dz + r
    }

    /// Squared distance from `dest` to the closest footprint point at the anchor height.
    pub fn distance_sq(&self, dest: CellPos) -> i64 {
        let b = &self.bounds;
        let dx = dest.x.clamp(b.min_x(), b.max_x()) as i64 - dest.x as i64;
        let dy = b.min_y() as i64 - dest.y as i64;
        let dz = dest.z.clamp(b.min_z(), b.max_z()) as i64 - dest.z as i64;
        dx * dx + dy * dy + dz * dz
    }
}

/// Owner of the transformed point `dest` among `members`.
///
/// Candidates whose search square misses `dest` are skipped. The smallest
/// distance wins; ties go to the lower anchor y, then to the lower index.
pub fn nearest_candidate(
    candidates: &[Candidate],
    members: impl IntoIterator<Item = usize>,
    dest: CellPos,
    radius: i32,
) -> Option<usize> {
    let mut best: Option<(i64, i32, usize)> = None;
    for index in members {
        let Some(candidate) = candidates.get(index) else {
            continue;
        };
        if candidate.is_outside_search_square(dest.x, dest.z, radius) {
            continue;
        }
        let key = (candidate.distance_sq(dest), candidate.bounds.min_y(), index);
        if best.is_none_or(|b| key < b) {
            best = Some(key);
        }
    }
    best.map(|(_, _, index)| index)
}

/// Candidates, their influence boxes, and the transform for one source dimension.
#[derive(Debug, Clone)]
pub struct PartitionContext {
    pub source: DimensionId,
    pub target: DimensionId,
    pub transform: CellTransform,
    pub search_radius: i32,
    pub vertical: VerticalBounds,
    pub candidates: Vec<Candidate>,
    /// Source-space box outside of which candidate `i` can never own a cell.
    /// `None` when no source cell maps into its search square.
    pub influences: Vec<Option<PortalBounds>>,
}

impl PartitionContext {
    pub fn build(registry: &PortalRegistry, world: &dyn WorldAccess, link: &DimensionLink, epsilon: f64) -> Self {
        let vertical = world.vertical_bounds();
        let transform = CellTransform::new(link.scale, world.world_border(), epsilon);
        let candidates: Vec<Candidate> = registry
            .entries_in(&link.to)
            .map(|entry| Candidate::new(entry.id(), entry.bounds(), entry.color(), entry.label()))
            .collect();

        let mut context = Self {
            source: world.dimension().clone(),
            target: link.to.clone(),
            transform,
            search_radius: link.search_radius,
            vertical,
            candidates,
            influences: Vec::new(),
        };
        context.influences = context.candidates.iter().map(|c| context.influence_of(c)).collect();
        context
    }

    fn influence_of(&self, candidate: &Candidate) -> Option<PortalBounds> {
        let r = self.search_radius as i64;
        let b = &candidate.bounds;
        let (min_x, max_x) = self.transform.preimage(b.min_x() as i64 - r, b.max_x() as i64 + r)?;
        let (min_z, max_z) = self.transform.preimage(b.min_z() as i64 - r, b.max_z() as i64 + r)?;
        Some(PortalBounds::new(min_x, self.vertical.min_y, min_z, max_x, self.vertical.max_y, max_z))
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn index_of(&self, id: PortalId) -> Option<usize> {
        self.candidates.iter().position(|c| c.id == id)
    }

    /// Whether `cell` falls inside candidate `index`'s vertical range and search square.
    pub fn within_influence(&self, index: usize, cell: CellPos) -> bool {
        if !self.vertical.contains(cell.y) {
            return false;
        }
        let Some(candidate) = self.candidates.get(index) else {
            return false;
        };
        let dest = self.transform.apply(cell);
        !candidate.is_outside_search_square(dest.x, dest.z, self.search_radius)
    }

    /// Owner of `cell` among `members`, or `None` when unowned.
    pub fn resolve(&self, cell: CellPos, members: &[usize]) -> Option<usize> {
        if !self.vertical.contains(cell.y) {
            return None;
        }
        nearest_candidate(&self.candidates, members.iter().copied(), self.transform.apply(cell), self.search_radius)
    }

    /// Owner of `cell` among all candidates.
    pub fn owner_at(&self, cell: CellPos) -> Option<usize> {
        if !self.vertical.contains(cell.y) {
            return None;
        }
        nearest_candidate(&self.candidates, 0..self.candidates.len(), self.transform.apply(cell), self.search_radius)
    }
}
