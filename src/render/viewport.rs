use kurbo::{Rect, Size};

use crate::foundation::error::{StudioError, StudioResult};

/// Largest output dimension sent to the provider.
pub const CAPTURE_MAX_DIM: u32 = 1280;

/// Source-pixel rectangle left visible by a "cover" fit of `source` into `viewport`.
///
/// Wider viewports crop the source height, narrower ones crop the width; the crop is always
/// centered.
pub fn cover_crop(source: Size, viewport: Size) -> StudioResult<Rect> {
    if !is_positive(source) || !is_positive(viewport) {
        return Err(StudioError::validation(format!(
            "cover crop needs positive sizes (source {source:?}, viewport {viewport:?})"
        )));
    }
    let viewport_aspect = viewport.width / viewport.height;
    let source_aspect = source.width / source.height;
    if viewport_aspect > source_aspect {
        let crop_h = source.width / viewport_aspect;
        let sy = (source.height - crop_h) / 2.0;
        Ok(Rect::new(0.0, sy, source.width, sy + crop_h))
    } else {
        let crop_w = source.height * viewport_aspect;
        let sx = (source.width - crop_w) / 2.0;
        Ok(Rect::new(sx, 0.0, sx + crop_w, source.height))
    }
}

/// Pixel size for a region scaled down (never up) so its longer side fits `max_dim`.
pub fn output_size(region: Size, max_dim: u32) -> (u32, u32) {
    let longest = region.width.max(region.height);
    let factor = if longest > f64::from(max_dim) {
        f64::from(max_dim) / longest
    } else {
        1.0
    };
    let px = |v: f64| ((v * factor).round() as u32).max(1);
    (px(region.width), px(region.height))
}

fn is_positive(s: Size) -> bool {
    s.width.is_finite() && s.height.is_finite() && s.width > 0.0 && s.height > 0.0
}

#[cfg(test)]
#[path = "../../tests/unit/render/viewport.rs"]
mod tests;
