use bevy::math::DVec3;
use bevy::prelude::*;
use rustc_hash::FxHashSet;

use crate::portal::bounds::{CellPos, PortalBounds};
use crate::portal::settings::RenderStyle;
use crate::portal::types::{Argb, PortalId};

/// Per-candidate render bookkeeping. Recreated on every context rebuild.
#[derive(Debug, Clone, PartialEq)]
pub struct PortalRenderCache {
    pub index: usize,
    pub portal_id: PortalId,
    pub color: Argb,
    pub label: String,
    pub influence: Option<PortalBounds>,
    /// Cells changed since the renderer last accepted them.
    pub geometry_dirty: bool,
    /// Colour, label or style changed; cells did not.
    pub style_dirty: bool,
    /// The renderer holds uploaded geometry for this portal.
    pub ready: bool,
    pub in_range: bool,
}

impl PortalRenderCache {
    pub fn new(index: usize, portal_id: PortalId, color: Argb, label: String, influence: Option<PortalBounds>) -> Self {
        Self {
            index,
            portal_id,
            color,
            label,
            influence,
            geometry_dirty: true,
            style_dirty: true,
            ready: false,
            in_range: true,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.geometry_dirty || self.style_dirty
    }

    /// Needs a submit: in range and dirty, or never accepted.
    pub fn needs_submit(&self) -> bool {
        self.in_range && (self.is_dirty() || !self.ready)
    }

    /// 2D distance check against the influence box; a cache without one is always in range.
    pub fn is_in_range(&self, x: f64, z: f64, max_range_sq: f64) -> bool {
        match &self.influence {
            Some(influence) => influence.horizontal_distance_sq(x, z) <= max_range_sq,
            None => true,
        }
    }
}

/// One portal's zone as handed to the renderer.
#[derive(Debug, Clone, Copy)]
pub struct ZoneDraw<'a> {
    pub portal_id: PortalId,
    pub index: usize,
    pub cells: &'a FxHashSet<CellPos>,
    pub color: Argb,
    pub label: &'a str,
    pub style: RenderStyle,
}

impl ZoneDraw<'_> {
    /// Colour with the style's alpha applied.
    pub fn draw_color(&self) -> Argb {
        self.color.with_alpha(self.style.alpha())
    }
}

/// Consumer of finished zone geometry (mesh upload, debug output, ...).
pub trait ZoneRenderer: Send + Sync {
    /// Returns `true` once the geometry is uploaded and the cache can be marked clean.
    fn submit(&mut self, draw: &ZoneDraw<'_>) -> bool;

    /// Drops anything held for `portal`.
    fn release(&mut self, portal: PortalId);
}

/// Optional renderer installed by the host.
#[derive(Resource, Default)]
pub struct ZoneRendererSlot(pub Option<Box<dyn ZoneRenderer>>);

impl ZoneRendererSlot {
    pub fn new(renderer: impl ZoneRenderer + 'static) -> Self {
        Self(Some(Box::new(renderer)))
    }
}

/// Where the zones are looked at from.
#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct ZoneViewer {
    pub position: DVec3,
    pub view_distance_chunks: u32,
}

impl Default for ZoneViewer {
    fn default() -> Self {
        Self { position: DVec3::ZERO, view_distance_chunks: 12 }
    }
}

impl ZoneViewer {
    pub fn new(position: DVec3, view_distance_chunks: u32) -> Self {
        Self { position, view_distance_chunks }
    }

    pub fn max_range(&self, multiplier: f64) -> f64 {
        self.view_distance_chunks as f64 * 16.0 * multiplier
    }
}
