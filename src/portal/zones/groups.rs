use fixedbitset::FixedBitSet;
use smallvec::SmallVec;

use crate::portal::bounds::PortalBounds;

/// Candidates whose influence boxes overlap, directly or through a chain, and
/// therefore have to be resolved against each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkGroup {
    /// Candidate indices, ascending.
    pub members: SmallVec<[usize; 4]>,
    /// Union of the members' influence boxes.
    pub bounds: PortalBounds,
}

impl WorkGroup {
    pub fn is_isolated(&self) -> bool {
        self.members.len() == 1
    }
}

/// Connected components of the influence intersection graph.
///
/// Candidates without an influence box are left out. Groups come out in order
/// of their lowest member index.
pub fn build_work_groups(influences: &[Option<PortalBounds>]) -> Vec<WorkGroup> {
    let count = influences.len();
    let mut visited = FixedBitSet::with_capacity(count);
    let mut groups = Vec::new();
    let mut stack = Vec::new();

    for seed in 0..count {
        if visited.contains(seed) {
            continue;
        }
        let Some(seed_bounds) = influences[seed] else {
            visited.insert(seed);
            continue;
        };

        let mut members: SmallVec<[usize; 4]> = SmallVec::new();
        let mut bounds = seed_bounds;
        visited.insert(seed);
        stack.push(seed);

        while let Some(index) = stack.pop() {
            members.push(index);
            let Some(influence) = influences[index] else {
                continue;
            };
            bounds = bounds.union(&influence);

            for other in 0..count {
                if visited.contains(other) {
                    continue;
                }
                if influences[other].is_some_and(|o| influence.intersects(&o)) {
                    visited.insert(other);
                    stack.push(other);
                }
            }
        }

        members.sort_unstable();
        groups.push(WorkGroup { members, bounds });
    }

    groups
}
