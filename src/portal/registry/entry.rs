use crate::portal::bounds::PortalBounds;
use crate::portal::types::{Argb, DimensionId, PortalId};

/// One tracked portal. Only the registry mutates entries.
#[derive(Debug, Clone, PartialEq)]
pub struct PortalEntry {
    id: PortalId,
    dimension: DimensionId,
    bounds: PortalBounds,
    alias: String,
    color: Argb,
}

impl PortalEntry {
    pub fn new(id: PortalId, dimension: DimensionId, bounds: PortalBounds, alias: impl Into<String>, color: Argb) -> Self {
        Self { id, dimension, bounds, alias: alias.into(), color }
    }

    pub fn id(&self) -> PortalId { self.id }
    pub fn dimension(&self) -> &DimensionId { &self.dimension }
    pub fn bounds(&self) -> PortalBounds { self.bounds }
    pub fn alias(&self) -> &str { &self.alias }
    pub fn color(&self) -> Argb { self.color }

    pub(super) fn set_bounds(&mut self, bounds: PortalBounds) {
        self.bounds = bounds;
    }

    pub(super) fn set_alias(&mut self, alias: String) {
        self.alias = alias;
    }

    pub(super) fn set_color(&mut self, color: Argb) {
        self.color = color;
    }

    /// First eight hex digits of the id, upper-case.
    pub fn short_id(&self) -> String {
        let mut buf = uuid::Uuid::encode_buffer();
        let simple = self.id.simple().encode_upper(&mut buf);
        simple[..8].to_string()
    }

    /// `"minX minY minZ"`
    pub fn display_coords(&self) -> String {
        format!("{} {} {}", self.bounds.min_x(), self.bounds.min_y(), self.bounds.min_z())
    }

    /// Alias when set, otherwise the short id.
    pub fn label(&self) -> String {
        if self.alias.trim().is_empty() {
            self.short_id()
        } else {
            self.alias.clone()
        }
    }
}
