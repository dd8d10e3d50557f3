/// Smallest allowed layer scale.
pub const MIN_SCALE: f64 = 0.1;
/// Largest allowed layer scale.
pub const MAX_SCALE: f64 = 5.0;

/// Clamp a canvas percentage coordinate to `[0, 100]`.
pub fn clamp_percent(v: f64) -> f64 {
    if v.is_nan() { 50.0 } else { v.clamp(0.0, 100.0) }
}

/// Clamp a layer scale to `[MIN_SCALE, MAX_SCALE]`.
pub fn clamp_scale(v: f64) -> f64 {
    if v.is_nan() {
        1.0
    } else {
        v.clamp(MIN_SCALE, MAX_SCALE)
    }
}

/// Normalize degrees into `[0, 360)`.
pub fn wrap_degrees(v: f64) -> f64 {
    if !v.is_finite() {
        return 0.0;
    }
    let r = v.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if r >= 360.0 { 0.0 } else { r }
}

pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

pub(crate) fn mul_div255_u8(x: u16, y: u16) -> u8 {
    mul_div255_u16(x, y) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
