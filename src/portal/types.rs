use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a tracked portal.
pub type PortalId = uuid::Uuid;

/// Identifier of one of the two linked coordinate spaces (e.g. `minecraft:nether`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DimensionId(String);

impl DimensionId {
    pub const OVERWORLD: &'static str = "minecraft:overworld";
    pub const NETHER: &'static str = "minecraft:the_nether";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn overworld() -> Self {
        Self::new(Self::OVERWORLD)
    }

    pub fn nether() -> Self {
        Self::new(Self::NETHER)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DimensionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DimensionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Packed 0xAARRGGBB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Argb(pub u32);

impl Argb {
    /// Colour used for persisted entries that carry no colour.
    pub const FALLBACK: Argb = Argb(0xFF00_A0FF);

    pub const fn alpha(self) -> u8 { (self.0 >> 24) as u8 }
    pub const fn red(self) -> u8 { (self.0 >> 16) as u8 }
    pub const fn green(self) -> u8 { (self.0 >> 8) as u8 }
    pub const fn blue(self) -> u8 { self.0 as u8 }

    /// The persisted form is a signed 32-bit integer.
    pub const fn to_signed(self) -> i32 {
        self.0 as i32
    }

    /// Accepts both the signed and the unsigned spelling of the same bits.
    pub const fn from_persisted(value: i64) -> Argb {
        Argb(value as u32)
    }

    pub fn with_alpha(self, alpha: u8) -> Argb {
        Argb((self.0 & 0x00FF_FFFF) | ((alpha as u32) << 24))
    }

    /// Normalized RGBA components for renderers.
    pub fn to_rgba_f32(self) -> [f32; 4] {
        [
            self.red() as f32 / 255.0,
            self.green() as f32 / 255.0,
            self.blue() as f32 / 255.0,
            self.alpha() as f32 / 255.0,
        ]
    }
}
