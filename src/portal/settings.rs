use serde::{Deserialize, Serialize};

/// Zone display toggles persisted alongside the portal list.
///
/// Every field is optional in the stored document; missing fields keep their
/// default (`false`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneSettings {
    pub show_zone_borders: bool,
    pub render_lines: bool,
    pub render_through: bool,
    pub render_letters: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub portal_scanning_disabled: bool,
}

impl ZoneSettings {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn toggle_show_zone_borders(&mut self) {
        self.show_zone_borders = !self.show_zone_borders;
    }

    pub fn toggle_render_lines(&mut self) {
        self.render_lines = !self.render_lines;
    }

    pub fn toggle_render_through(&mut self) {
        self.render_through = !self.render_through;
    }

    pub fn toggle_render_letters(&mut self) {
        self.render_letters = !self.render_letters;
    }

    pub fn scanning_enabled(&self) -> bool {
        !self.portal_scanning_disabled
    }

    pub fn render_style(&self) -> RenderStyle {
        RenderStyle {
            lines: self.render_lines,
            through: self.render_through,
            letters: self.render_letters,
        }
    }
}

/// How the renderer should draw zone cells. Changing any of these never
/// requires recomputing the partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderStyle {
    /// Outlines instead of translucent faces.
    pub lines: bool,
    /// Draw without depth testing.
    pub through: bool,
    /// Draw the portal label over its zone.
    pub letters: bool,
}

impl RenderStyle {
    /// Face alpha used for translucent quads; outlines are opaque.
    pub fn alpha(&self) -> u8 {
        if self.lines { 0xFF } else { 0x4C }
    }
}
