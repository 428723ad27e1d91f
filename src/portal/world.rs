//! World access seam.
//!
//! The scanner and the registry's removal probe only ever *ask* the world
//! questions through [`WorldAccess`]; the host decides what "loaded" means.
//! [`SparseWorld`] is a small in-memory implementation used by the headless
//! harness and the tests.

use bevy::prelude::*;
use rustc_hash::FxHashSet;

use super::bounds::{CellPos, ColumnPos, PortalBounds};
use super::types::DimensionId;

/// Inclusive vertical extent of a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerticalBounds {
    pub min_y: i32,
    pub max_y: i32,
}

impl VerticalBounds {
    pub fn new(min_y: i32, max_y: i32) -> Self {
        Self { min_y: min_y.min(max_y), max_y: min_y.max(max_y) }
    }

    pub const fn contains(&self, y: i32) -> bool {
        y >= self.min_y && y <= self.max_y
    }
}

impl Default for VerticalBounds {
    fn default() -> Self {
        Self::new(-64, 319)
    }
}

/// World border rectangle in the world's own coordinates.
///
/// `east` and `south` are exclusive: a point exactly on them is outside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBorder {
    pub west: f64,
    pub east: f64,
    pub north: f64,
    pub south: f64,
}

impl WorldBorder {
    pub const DEFAULT_RADIUS: f64 = 29_999_984.0;

    pub fn centered(radius: f64) -> Self {
        Self { west: -radius, east: radius, north: -radius, south: radius }
    }
}

impl Default for WorldBorder {
    fn default() -> Self {
        Self::centered(Self::DEFAULT_RADIUS)
    }
}

/// Queries the core needs from the host world.
pub trait WorldAccess {
    fn dimension(&self) -> &DimensionId;

    fn is_column_loaded(&self, column: ColumnPos) -> bool;

    /// Whether the cell holds a marker (portal) block. Callers check
    /// [`WorldAccess::is_column_loaded`] first; unloaded cells may answer anything.
    fn is_marker_block(&self, cell: CellPos) -> bool;

    fn vertical_bounds(&self) -> VerticalBounds;

    fn world_border(&self) -> WorldBorder;

    /// `None` when the owning column is not loaded.
    fn marker_if_loaded(&self, cell: CellPos) -> Option<bool> {
        if !self.is_column_loaded(cell.column()) {
            return None;
        }
        Some(self.is_marker_block(cell))
    }
}

/// Marker blocks and loaded columns held in hash sets.
#[derive(Debug, Clone)]
pub struct SparseWorld {
    dimension: DimensionId,
    markers: FxHashSet<CellPos>,
    loaded: FxHashSet<ColumnPos>,
    vertical: VerticalBounds,
    border: WorldBorder,
}

impl SparseWorld {
    pub fn new(dimension: DimensionId) -> Self {
        Self {
            dimension,
            markers: FxHashSet::default(),
            loaded: FxHashSet::default(),
            vertical: VerticalBounds::default(),
            border: WorldBorder::default(),
        }
    }

    pub fn with_vertical_bounds(mut self, min_y: i32, max_y: i32) -> Self {
        self.vertical = VerticalBounds::new(min_y, max_y);
        self
    }

    pub fn with_border(mut self, border: WorldBorder) -> Self {
        self.border = border;
        self
    }

    pub fn set_marker(&mut self, cell: CellPos, marker: bool) {
        if marker {
            self.markers.insert(cell);
        } else {
            self.markers.remove(&cell);
        }
    }

    /// Places marker blocks over the whole box.
    pub fn fill_markers(&mut self, bounds: PortalBounds) {
        self.markers.extend(bounds.cells());
    }

    pub fn clear_markers(&mut self, bounds: PortalBounds) {
        for cell in bounds.cells() {
            self.markers.remove(&cell);
        }
    }

    pub fn load_column(&mut self, column: ColumnPos) -> bool {
        self.loaded.insert(column)
    }

    pub fn unload_column(&mut self, column: ColumnPos) -> bool {
        self.loaded.remove(&column)
    }

    /// Loads every column in the inclusive column rectangle.
    pub fn load_columns(&mut self, from: ColumnPos, to: ColumnPos) -> Vec<ColumnPos> {
        let mut newly_loaded = Vec::new();
        for z in from.z.min(to.z)..=from.z.max(to.z) {
            for x in from.x.min(to.x)..=from.x.max(to.x) {
                let column = ColumnPos::new(x, z);
                if self.load_column(column) {
                    newly_loaded.push(column);
                }
            }
        }
        newly_loaded
    }

    pub fn loaded_columns(&self) -> impl Iterator<Item = ColumnPos> + '_ {
        self.loaded.iter().copied()
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }
}

impl WorldAccess for SparseWorld {
    fn dimension(&self) -> &DimensionId {
        &self.dimension
    }

    fn is_column_loaded(&self, column: ColumnPos) -> bool {
        self.loaded.contains(&column)
    }

    fn is_marker_block(&self, cell: CellPos) -> bool {
        self.markers.contains(&cell)
    }

    fn vertical_bounds(&self) -> VerticalBounds {
        self.vertical
    }

    fn world_border(&self) -> WorldBorder {
        self.border
    }
}

/// The world the host currently has loaded, if any.
///
/// Hosts replace this resource on world changes and then write a
/// [`WorldChanged`](super::events::WorldChanged) message.
#[derive(Resource, Default)]
pub struct ActiveWorld {
    pub world: Option<Box<dyn WorldAccess + Send + Sync>>,
    /// Name used for the registry's storage file (server or save name).
    pub save_name: String,
}

impl ActiveWorld {
    pub fn new(world: impl WorldAccess + Send + Sync + 'static, save_name: impl Into<String>) -> Self {
        Self { world: Some(Box::new(world)), save_name: save_name.into() }
    }

    pub fn get(&self) -> Option<&dyn WorldAccess> {
        self.world.as_deref().map(|w| w as &dyn WorldAccess)
    }

    pub fn dimension(&self) -> Option<&DimensionId> {
        self.world.as_ref().map(|w| w.dimension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unloaded_column_reports_none() {
        let mut world = SparseWorld::new(DimensionId::overworld());
        let cell = CellPos::new(3, 64, 3);
        world.set_marker(cell, true);
        assert_eq!(world.marker_if_loaded(cell), None);

        world.load_column(cell.column());
        assert_eq!(world.marker_if_loaded(cell), Some(true));
        assert_eq!(world.marker_if_loaded(cell.offset(1, 0, 0)), Some(false));
    }

    #[test]
    fn test_load_columns_reports_only_new_columns() {
        let mut world = SparseWorld::new(DimensionId::nether());
        world.load_column(ColumnPos::new(0, 0));
        let loaded = world.load_columns(ColumnPos::new(1, 1), ColumnPos::new(0, 0));
        assert_eq!(loaded.len(), 3);
        assert_eq!(world.loaded_columns().count(), 4);
    }
}
