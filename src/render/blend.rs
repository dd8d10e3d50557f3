use crate::{
    foundation::math::{mul_div255_u8, mul_div255_u16},
    studio::layer::BlendMode,
};

/// One premultiplied RGBA8 pixel.
pub type PremulRgba8 = [u8; 4];

pub fn premultiply(px: [u8; 4]) -> PremulRgba8 {
    let a = u16::from(px[3]);
    [
        mul_div255_u8(u16::from(px[0]), a),
        mul_div255_u8(u16::from(px[1]), a),
        mul_div255_u8(u16::from(px[2]), a),
        px[3],
    ]
}

pub fn unpremultiply(px: PremulRgba8) -> [u8; 4] {
    let a = u32::from(px[3]);
    if a == 0 {
        return [0, 0, 0, 0];
    }
    let un = |c: u8| ((u32::from(c) * 255 + a / 2) / a).min(255) as u8;
    [un(px[0]), un(px[1]), un(px[2]), px[3]]
}

/// Composite `src` onto `dst` with the layer's blend mode.
pub fn blend(mode: BlendMode, dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    if src[3] == 0 {
        return dst;
    }
    match mode {
        BlendMode::Normal => over(dst, src),
        BlendMode::Multiply => multiply(dst, src),
        BlendMode::Screen => screen(dst, src),
    }
}

/// Source-over.
pub fn over(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    let sa = src[3];
    if sa == 0 {
        return dst;
    }
    let inv = 255u16 - u16::from(sa);
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = src[i].saturating_add(mul_div255_u8(u16::from(dst[i]), inv));
    }
    out
}

/// `co = s*(1-da) + d*(1-sa) + s*d`; opaque white leaves `dst` unchanged.
pub fn multiply(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    let sa = u16::from(src[3]);
    let da = u16::from(dst[3]);
    let mut out = [0u8; 4];
    for i in 0..3 {
        let s = u16::from(src[i]);
        let d = u16::from(dst[i]);
        let c = mul_div255_u16(s, 255 - da) + mul_div255_u16(d, 255 - sa) + mul_div255_u16(s, d);
        out[i] = c.min(255) as u8;
    }
    out[3] = union_alpha(sa, da);
    out
}

/// `co = s + d - s*d`; black leaves `dst` unchanged.
pub fn screen(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    let mut out = [0u8; 4];
    for i in 0..3 {
        let s = u16::from(src[i]);
        let d = u16::from(dst[i]);
        out[i] = (s + d - mul_div255_u16(s, d)).min(255) as u8;
    }
    out[3] = union_alpha(u16::from(src[3]), u16::from(dst[3]));
    out
}

fn union_alpha(sa: u16, da: u16) -> u8 {
    (sa + da - mul_div255_u16(sa, da)).min(255) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/render/blend.rs"]
mod tests;
