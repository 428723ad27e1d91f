//! Deterministic fixed-point helpers for the cross-dimension coordinate transform.
//!
//! Every float → integer conversion in the partition engine goes through this
//! module so that cell seams between candidates land on the same cell no matter
//! which code path (isolated portal, overlap group, link preview) asks.

use fixed::types::I48F16;

/// Fixed-point number type used for coordinate transforms.
///
/// I48F16: 48 integer bits, 16 fractional bits (precision ~0.000015).
/// Scale factors of 8 and 1/8 are exact in this representation.
pub type FixedNum = I48F16;

/// Converts a float to fixed point, saturating at the representable range.
pub fn from_f64(value: f64) -> FixedNum {
    if value.is_nan() {
        return FixedNum::ZERO;
    }
    FixedNum::saturating_from_num(value)
}

/// Floor to the containing integer cell.
pub fn floor_i32(value: FixedNum) -> i32 {
    value.floor().saturating_to_num::<i32>()
}

/// Smallest integer greater than or equal to `value`.
pub fn ceil_i32(value: FixedNum) -> i32 {
    value.saturating_ceil().saturating_to_num::<i32>()
}

/// Centre of an integer cell: `cell + 0.5`.
pub fn cell_center(cell: i32) -> FixedNum {
    FixedNum::from_num(cell) + FixedNum::lit("0.5")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_and_ceil_of_negative_values() {
        let v = from_f64(-2.25);
        assert_eq!(floor_i32(v), -3);
        assert_eq!(ceil_i32(v), -2);
    }

    #[test]
    fn test_eighth_scale_is_exact() {
        let scale = from_f64(0.125);
        let x = cell_center(15) * scale;
        assert_eq!(x, from_f64(1.9375));
        assert_eq!(floor_i32(x), 1);
    }

    #[test]
    fn test_nan_saturates_to_zero() {
        assert_eq!(from_f64(f64::NAN), FixedNum::ZERO);
        assert_eq!(floor_i32(from_f64(1.0e300)), i32::MAX);
    }
}
