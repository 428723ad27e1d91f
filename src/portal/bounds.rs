use serde::{Deserialize, Serialize};

/// Width of a chunk column in cells, along both x and z.
pub const COLUMN_SIZE: i32 = 16;

/// Integer cell position in one dimension's coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct CellPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl CellPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Column owning this cell (floor division by [`COLUMN_SIZE`]).
    pub const fn column(self) -> ColumnPos {
        ColumnPos::new(self.x >> 4, self.z >> 4)
    }

    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// The six face-adjacent neighbours: +x, -x, +y, -y, +z, -z.
    pub const fn neighbors(self) -> [CellPos; 6] {
        [
            self.offset(1, 0, 0),
            self.offset(-1, 0, 0),
            self.offset(0, 1, 0),
            self.offset(0, -1, 0),
            self.offset(0, 0, 1),
            self.offset(0, 0, -1),
        ]
    }
}

/// A 16×16 chunk column, addressed in column units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ColumnPos {
    pub x: i32,
    pub z: i32,
}

impl ColumnPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub const fn min_x(self) -> i32 {
        self.x * COLUMN_SIZE
    }

    pub const fn min_z(self) -> i32 {
        self.z * COLUMN_SIZE
    }

    pub const fn max_x(self) -> i32 {
        self.min_x() + COLUMN_SIZE - 1
    }

    pub const fn max_z(self) -> i32 {
        self.min_z() + COLUMN_SIZE - 1
    }

    pub const fn contains(self, cell: CellPos) -> bool {
        cell.x >= self.min_x() && cell.x <= self.max_x() && cell.z >= self.min_z() && cell.z <= self.max_z()
    }
}

/// Axis-aligned integer box, inclusive on both ends.
///
/// Construction normalizes every axis so `min <= max` regardless of the order
/// the corners are given in. The value is immutable; "moving" a portal means
/// replacing its bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortalBounds {
    min_x: i32,
    min_y: i32,
    min_z: i32,
    max_x: i32,
    max_y: i32,
    max_z: i32,
}

impl PortalBounds {
    pub fn new(x1: i32, y1: i32, z1: i32, x2: i32, y2: i32, z2: i32) -> Self {
        Self {
            min_x: x1.min(x2),
            min_y: y1.min(y2),
            min_z: z1.min(z2),
            max_x: x1.max(x2),
            max_y: y1.max(y2),
            max_z: z1.max(z2),
        }
    }

    pub fn from_corners(a: CellPos, b: CellPos) -> Self {
        Self::new(a.x, a.y, a.z, b.x, b.y, b.z)
    }

    pub fn from_cell(cell: CellPos) -> Self {
        Self::from_corners(cell, cell)
    }

    pub const fn min_x(&self) -> i32 { self.min_x }
    pub const fn min_y(&self) -> i32 { self.min_y }
    pub const fn min_z(&self) -> i32 { self.min_z }
    pub const fn max_x(&self) -> i32 { self.max_x }
    pub const fn max_y(&self) -> i32 { self.max_y }
    pub const fn max_z(&self) -> i32 { self.max_z }

    pub const fn min_cell(&self) -> CellPos {
        CellPos::new(self.min_x, self.min_y, self.min_z)
    }

    pub const fn max_cell(&self) -> CellPos {
        CellPos::new(self.max_x, self.max_y, self.max_z)
    }

    pub const fn intersects(&self, other: &PortalBounds) -> bool {
        self.max_x >= other.min_x && self.min_x <= other.max_x &&
        self.max_y >= other.min_y && self.min_y <= other.max_y &&
        self.max_z >= other.min_z && self.min_z <= other.max_z
    }

    /// True if the box overlaps the column's 16×16 footprint at any height.
    pub const fn intersects_column(&self, column: ColumnPos) -> bool {
        self.max_x >= column.min_x() && self.min_x <= column.max_x() &&
        self.max_z >= column.min_z() && self.min_z <= column.max_z()
    }

    pub const fn contains(&self, cell: CellPos) -> bool {
        cell.x >= self.min_x && cell.x <= self.max_x &&
        cell.y >= self.min_y && cell.y <= self.max_y &&
        cell.z >= self.min_z && cell.z <= self.max_z
    }

    pub fn union(&self, other: &PortalBounds) -> PortalBounds {
        PortalBounds {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            min_z: self.min_z.min(other.min_z),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
            max_z: self.max_z.max(other.max_z),
        }
    }

    /// Grows the box to include `cell`.
    pub fn including(&self, cell: CellPos) -> PortalBounds {
        self.union(&PortalBounds::from_cell(cell))
    }

    pub fn size_x(&self) -> i64 { self.max_x as i64 - self.min_x as i64 + 1 }
    pub fn size_y(&self) -> i64 { self.max_y as i64 - self.min_y as i64 + 1 }
    pub fn size_z(&self) -> i64 { self.max_z as i64 - self.min_z as i64 + 1 }

    pub fn volume(&self) -> i64 {
        self.size_x() * self.size_y() * self.size_z()
    }

    /// Squared horizontal distance from a point to the box footprint (0 inside).
    pub fn horizontal_distance_sq(&self, x: f64, z: f64) -> f64 {
        let clamped_x = x.clamp(self.min_x as f64, self.max_x as f64);
        let clamped_z = z.clamp(self.min_z as f64, self.max_z as f64);
        let dx = x - clamped_x;
        let dz = z - clamped_z;
        dx * dx + dz * dz
    }

    /// Iterates every cell, y-major then z then x.
    pub fn cells(&self) -> impl Iterator<Item = CellPos> + '_ {
        let b = *self;
        (b.min_y..=b.max_y).flat_map(move |y| {
            (b.min_z..=b.max_z).flat_map(move |z| (b.min_x..=b.max_x).map(move |x| CellPos::new(x, y, z)))
        })
    }
}
