//! Column scan queue and marker detection.
//!
//! Columns are queued when they load or when a relevant block changes, then
//! drained a few per tick. Each scan flood-fills the marker blocks of one
//! column and hands the resulting boxes to the registry.

mod flood_fill;

use std::collections::VecDeque;

use bevy::prelude::*;
use rustc_hash::FxHashSet;

use super::bounds::{CellPos, ColumnPos, COLUMN_SIZE};
use super::config::ZoneConfig;
use super::registry::{Detection, PortalRegistry};
use super::types::DimensionId;
use super::world::WorldAccess;

/// Summary of one [`PortalScanner::tick`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub columns_scanned: usize,
    pub detections: usize,
    pub added: usize,
    pub moved: usize,
    pub removed: usize,
}

#[derive(Resource, Debug)]
pub struct PortalScanner {
    queue: VecDeque<ColumnPos>,
    queued: FxHashSet<ColumnPos>,
    scans_per_tick: usize,
    vertical_stride: usize,
}

impl Default for PortalScanner {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl PortalScanner {
    pub fn new(scans_per_tick: usize, vertical_stride: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            queued: FxHashSet::default(),
            scans_per_tick: scans_per_tick.max(1),
            vertical_stride: vertical_stride.max(1),
        }
    }

    pub fn from_config(config: &ZoneConfig) -> Self {
        Self::new(config.scans_per_tick, config.vertical_stride)
    }

    /// Number of columns waiting to be scanned.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_queued(&self, column: ColumnPos) -> bool {
        self.queued.contains(&column)
    }

    pub fn reset(&mut self) {
        self.queue.clear();
        self.queued.clear();
    }

    fn enqueue(&mut self, column: ColumnPos) -> bool {
        if !self.queued.insert(column) {
            return false;
        }
        self.queue.push_back(column);
        true
    }

    /// Returns whether the column was newly queued.
    pub fn on_column_loaded(&mut self, column: ColumnPos, registry: &PortalRegistry) -> bool {
        if !registry.settings().scanning_enabled() {
            return false;
        }
        self.enqueue(column)
    }

    /// Only marker placements and changes inside tracked portals queue a rescan.
    pub fn on_block_changed(&mut self, dimension: &DimensionId, cell: CellPos, is_marker: bool, registry: &PortalRegistry) -> bool {
        if !registry.settings().scanning_enabled() {
            return false;
        }
        if !is_marker && !registry.intersects_tracked_portal(dimension, cell) {
            return false;
        }
        self.enqueue(cell.column())
    }

    /// Scans up to `scans_per_tick` queued columns. Without a world the queue
    /// is kept for later.
    pub fn tick(&mut self, world: Option<&dyn WorldAccess>, registry: &mut PortalRegistry) -> ScanReport {
        let mut report = ScanReport::default();
        let Some(world) = world else {
            return report;
        };
        if !registry.settings().scanning_enabled() {
            return report;
        }

        for _ in 0..self.scans_per_tick {
            let Some(column) = self.queue.pop_front() else {
                break;
            };
            self.queued.remove(&column);

            let detections = self.scan_column(world, column);
            let outcome = registry.update_from_detections(world.dimension(), column, &detections, Some(world));

            report.columns_scanned += 1;
            report.detections += detections.len();
            report.added += outcome.added.len();
            report.moved += outcome.moved.len();
            report.removed += outcome.removed.len();
        }

        report
    }

    /// Flood-fills every marker component with a seed cell inside `column`.
    ///
    /// Seeds are sampled every `vertical_stride` layers; components are still
    /// followed across layers and into neighbouring loaded columns.
    pub fn scan_column(&self, world: &dyn WorldAccess, column: ColumnPos) -> Vec<Detection> {
        let mut detections = Vec::new();
        if !world.is_column_loaded(column) {
            return detections;
        }

        let vertical = world.vertical_bounds();
        let mut visited: FxHashSet<CellPos> = FxHashSet::default();
        let mut y = vertical.min_y;
        while y <= vertical.max_y {
            for dz in 0..COLUMN_SIZE {
                for dx in 0..COLUMN_SIZE {
                    let seed = CellPos::new(column.min_x() + dx, y, column.min_z() + dz);
                    if let Some(bounds) = flood_fill::explore_component(world, seed, &mut visited) {
                        detections.push(Detection::new(bounds));
                    }
                }
            }
            y = match y.checked_add(self.vertical_stride as i32) {
                Some(next) => next,
                None => break,
            };
        }

        detections
    }
}
