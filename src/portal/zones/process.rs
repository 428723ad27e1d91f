//! Boundary extraction for one work group.
//!
//! Both paths work on an x/z grid padded by one cell on every side so that
//! neighbour tests never need a special case at the edge of the box.

use rustc_hash::{FxHashMap, FxHashSet};

use super::context::{nearest_candidate, PartitionContext};
use super::groups::WorkGroup;
use crate::portal::bounds::{CellPos, PortalBounds};

/// Padded x/z grid over a box with the transformed coordinate of every row and column.
struct PaddedGrid {
    origin_x: i32,
    origin_z: i32,
    width: usize,
    depth: usize,
    dest_x: Vec<i32>,
    dest_z: Vec<i32>,
}

impl PaddedGrid {
    fn new(ctx: &PartitionContext, bounds: &PortalBounds) -> Self {
        let origin_x = bounds.min_x().saturating_sub(1);
        let origin_z = bounds.min_z().saturating_sub(1);
        let end_x = bounds.max_x().saturating_add(1);
        let end_z = bounds.max_z().saturating_add(1);
        let dest_x: Vec<i32> = (origin_x..=end_x).map(|x| ctx.transform.dest_x(x)).collect();
        let dest_z: Vec<i32> = (origin_z..=end_z).map(|z| ctx.transform.dest_z(z)).collect();
        Self { origin_x, origin_z, width: dest_x.len(), depth: dest_z.len(), dest_x, dest_z }
    }

    fn len(&self) -> usize {
        self.width * self.depth
    }

    /// Indices of interior (non-padding) cells with their world x/z.
    fn interior(&self) -> impl Iterator<Item = (usize, i32, i32)> + '_ {
        (1..self.depth.saturating_sub(1)).flat_map(move |zi| {
            (1..self.width.saturating_sub(1)).map(move |xi| {
                (zi * self.width + xi, self.origin_x + xi as i32, self.origin_z + zi as i32)
            })
        })
    }
}

/// Boundary cells of a candidate that shares its influence box with nobody.
///
/// A cell belongs to the candidate when it is inside the vertical bounds and
/// its image is inside the search square; it is a boundary cell when one of
/// its six neighbours does not belong. Membership only depends on x/z inside
/// the vertical range, so the test is done once per column.
pub fn process_isolated(ctx: &PartitionContext, index: usize) -> FxHashSet<CellPos> {
    let mut cells = FxHashSet::default();
    let (Some(Some(influence)), Some(candidate)) = (ctx.influences.get(index), ctx.candidates.get(index)) else {
        return cells;
    };

    let grid = PaddedGrid::new(ctx, influence);
    let mut inside = vec![false; grid.len()];
    for zi in 0..grid.depth {
        for xi in 0..grid.width {
            inside[zi * grid.width + xi] =
                !candidate.is_outside_search_square(grid.dest_x[xi], grid.dest_z[zi], ctx.search_radius);
        }
    }

    let vertical = ctx.vertical;
    for (i, x, z) in grid.interior() {
        if !inside[i] {
            continue;
        }
        let side_exposed = !inside[i - 1] || !inside[i + 1] || !inside[i - grid.width] || !inside[i + grid.width];
        if side_exposed {
            cells.extend((vertical.min_y..=vertical.max_y).map(|y| CellPos::new(x, y, z)));
        } else {
            cells.insert(CellPos::new(x, vertical.min_y, z));
            cells.insert(CellPos::new(x, vertical.max_y, z));
        }
    }

    cells
}

/// Layer entry for a cell no group member owns.
const UNOWNED: u32 = u32::MAX;

/// Boundary cells of every member of an overlapping group, keyed by candidate index.
///
/// Owners are resolved one y layer at a time and kept for three layers, so each
/// cell of the group box is resolved exactly once.
pub fn process_group(ctx: &PartitionContext, group: &WorkGroup) -> FxHashMap<usize, FxHashSet<CellPos>> {
    let mut result: FxHashMap<usize, FxHashSet<CellPos>> = FxHashMap::default();
    let grid = PaddedGrid::new(ctx, &group.bounds);

    let resolve_layer = |y: Option<i32>, layer: &mut Vec<u32>| {
        layer.clear();
        match y.filter(|y| ctx.vertical.contains(*y)) {
            None => layer.resize(grid.len(), UNOWNED),
            Some(y) => {
                for zi in 0..grid.depth {
                    for xi in 0..grid.width {
                        let dest = CellPos::new(grid.dest_x[xi], y, grid.dest_z[zi]);
                        let owner = nearest_candidate(&ctx.candidates, group.members.iter().copied(), dest, ctx.search_radius);
                        layer.push(owner.map_or(UNOWNED, |index| index as u32));
                    }
                }
            }
        }
    };

    let (min_y, max_y) = (group.bounds.min_y(), group.bounds.max_y());
    let mut below = Vec::with_capacity(grid.len());
    let mut current = Vec::with_capacity(grid.len());
    let mut above = Vec::with_capacity(grid.len());
    resolve_layer(min_y.checked_sub(1), &mut below);
    resolve_layer(Some(min_y), &mut current);

    for y in min_y..=max_y {
        resolve_layer(y.checked_add(1), &mut above);

        for (i, x, z) in grid.interior() {
            let owner = current[i];
            if owner == UNOWNED {
                continue;
            }
            let boundary = current[i - 1] != owner
                || current[i + 1] != owner
                || current[i - grid.width] != owner
                || current[i + grid.width] != owner
                || below[i] != owner
                || above[i] != owner;
            if boundary {
                result.entry(owner as usize).or_default().insert(CellPos::new(x, y, z));
            }
        }

        std::mem::swap(&mut below, &mut current);
        std::mem::swap(&mut current, &mut above);
    }

    result
}
