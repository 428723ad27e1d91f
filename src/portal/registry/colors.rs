use crate::portal::bounds::PortalBounds;
use crate::portal::types::Argb;

const SATURATION: f32 = 0.6;
const BRIGHTNESS: f32 = 1.0;

/// Deterministic colour for a newly discovered portal, derived from its min corner.
pub fn default_color(bounds: &PortalBounds) -> Argb {
    let hash = 31i32
        .wrapping_mul(bounds.min_x())
        .wrapping_add(37i32.wrapping_mul(bounds.min_y()))
        .wrapping_add(41i32.wrapping_mul(bounds.min_z()));
    let hue = (hash & 0xFFFF) as f32 / 65535.0;
    let rgb = hsb_to_rgb(hue, SATURATION, BRIGHTNESS);
    Argb(0xFF00_0000 | (rgb & 0x00FF_FFFF))
}

/// HSB → packed RGB, hue in turns.
///
/// Channels are `(v * 255 + 0.5)` truncated; persisted default colours
/// depend on this rounding.
pub fn hsb_to_rgb(hue: f32, saturation: f32, brightness: f32) -> u32 {
    let channel = |v: f32| (v * 255.0 + 0.5) as u32;
    if saturation == 0.0 {
        let v = channel(brightness);
        return (v << 16) | (v << 8) | v;
    }

    let h = (hue - hue.floor()) * 6.0;
    let f = h - h.floor();
    let p = brightness * (1.0 - saturation);
    let q = brightness * (1.0 - saturation * f);
    let t = brightness * (1.0 - saturation * (1.0 - f));

    let (r, g, b) = match h as u32 {
        0 => (brightness, t, p),
        1 => (q, brightness, p),
        2 => (p, brightness, t),
        3 => (p, q, brightness),
        4 => (t, p, brightness),
        _ => (brightness, p, q),
    };
    (channel(r) << 16) | (channel(g) << 8) | channel(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_hues() {
        assert_eq!(hsb_to_rgb(0.0, 1.0, 1.0), 0xFF0000);
        assert_eq!(hsb_to_rgb(1.0 / 3.0, 1.0, 1.0), 0x00FF00);
        assert_eq!(hsb_to_rgb(0.5, 0.0, 1.0), 0xFFFFFF);
    }

    #[test]
    fn test_half_channel_rounds_up() {
        // 0.5 * 255 = 127.5
        assert_eq!(hsb_to_rgb(0.0, 0.0, 0.5), 0x808080);
        assert_eq!(hsb_to_rgb(0.0, 1.0, 0.5), 0x800000);
    }

    #[test]
    fn test_origin_portal_is_opaque_red_tint() {
        // hash 0 -> hue 0 -> (255, 102, 102)
        let color = default_color(&PortalBounds::new(0, 0, 0, 1, 2, 0));
        assert_eq!(color, Argb(0xFFFF_6666));
    }

    #[test]
    fn test_default_color_depends_only_on_min_corner() {
        let a = default_color(&PortalBounds::new(10, 64, -20, 11, 66, -20));
        let b = default_color(&PortalBounds::new(10, 64, -20, 40, 90, -5));
        let c = default_color(&PortalBounds::new(11, 64, -20, 12, 66, -20));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.alpha(), 0xFF);
    }
}
