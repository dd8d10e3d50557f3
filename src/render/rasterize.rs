use image::{RgbaImage, imageops::FilterType};
use kurbo::{Affine, Point, Rect, Size};
use tracing::debug;

use crate::{
    assets::{decode::decode_blob, decode::encode_jpeg, store::AssetStore},
    foundation::error::{StudioError, StudioResult},
    gateway::wire::ImageBlob,
    render::{
        blend::{blend, over, premultiply},
        viewport::{CAPTURE_MAX_DIM, cover_crop, output_size},
    },
    studio::layer::PlacedLayer,
};

/// Overlay width at scale 1, as a fraction of the canvas width.
pub const OVERLAY_BASELINE: f64 = 0.25;
/// JPEG quality of captured frames.
pub const JPEG_QUALITY: u8 = 85;

/// A layer with its decoded overlay image.
#[derive(Clone, Debug)]
pub struct Sprite {
    pub layer: PlacedLayer,
    /// Straight-alpha RGBA8.
    pub image: RgbaImage,
}

/// Decode the overlay of every layer whose asset still exists, preserving stacking order.
pub fn load_sprites(layers: &[PlacedLayer], assets: &dyn AssetStore) -> StudioResult<Vec<Sprite>> {
    let mut sprites = Vec::with_capacity(layers.len());
    for layer in layers {
        let Some(asset) = assets.get(&layer.asset_id) else {
            debug!(asset = %layer.asset_id, "skipping layer with missing asset");
            continue;
        };
        sprites.push(Sprite {
            layer: layer.clone(),
            image: decode_blob(&asset.image)?,
        });
    }
    Ok(sprites)
}

/// Capture what the user sees: the cover-cropped region of a camera frame shown in `viewport`,
/// downscaled to the capture cap, with every sprite drawn on top. Returns a JPEG.
pub fn capture_frame(frame: &RgbaImage, viewport: Size, sprites: &[Sprite]) -> StudioResult<ImageBlob> {
    let canvas = render_frame(frame, viewport, sprites)?;
    encode_jpeg(&canvas, JPEG_QUALITY)
}

/// [`capture_frame`] without the JPEG step.
pub fn render_frame(frame: &RgbaImage, viewport: Size, sprites: &[Sprite]) -> StudioResult<RgbaImage> {
    let source = Size::new(f64::from(frame.width()), f64::from(frame.height()));
    let crop = cover_crop(source, viewport)?;
    let (x, y, w, h) = pixel_rect(crop, frame.width(), frame.height());
    let visible = image::imageops::crop_imm(frame, x, y, w, h).to_image();
    let (ow, oh) = output_size(Size::new(f64::from(w), f64::from(h)), CAPTURE_MAX_DIM);
    debug!(crop_x = x, crop_y = y, crop_w = w, crop_h = h, ow, oh, "frame crop");
    Ok(compose(&visible, (ow, oh), sprites))
}

/// Capture a still product photo at its own aspect (no crop), with sprites on top. Returns a
/// JPEG.
pub fn capture_still(product: &RgbaImage, sprites: &[Sprite]) -> StudioResult<ImageBlob> {
    let canvas = render_still(product, sprites)?;
    encode_jpeg(&canvas, JPEG_QUALITY)
}

/// [`capture_still`] without the JPEG step.
pub fn render_still(product: &RgbaImage, sprites: &[Sprite]) -> StudioResult<RgbaImage> {
    if product.width() == 0 || product.height() == 0 {
        return Err(StudioError::validation("product image is empty"));
    }
    let size = Size::new(f64::from(product.width()), f64::from(product.height()));
    Ok(compose(product, output_size(size, CAPTURE_MAX_DIM), sprites))
}

/// Scale `background` to `size` on an opaque white canvas, then draw sprites bottom to top.
fn compose(background: &RgbaImage, size: (u32, u32), sprites: &[Sprite]) -> RgbaImage {
    let (w, h) = size;
    let scaled = if background.dimensions() == size {
        background.clone()
    } else {
        image::imageops::resize(background, w, h, FilterType::Triangle)
    };
    let mut canvas = RgbaImage::from_pixel(w, h, image::Rgba([255, 255, 255, 255]));
    for (dst, src) in canvas.pixels_mut().zip(scaled.pixels()) {
        dst.0 = over(dst.0, premultiply(src.0));
    }
    for sprite in sprites {
        draw_sprite(&mut canvas, sprite);
    }
    // opaque canvas: premultiplied and straight alpha coincide
    canvas
}

/// Placement of a sprite on a `canvas`-sized surface: source pixels to canvas pixels.
///
/// The sprite is scaled to `OVERLAY_BASELINE * canvas_width * scale` wide (aspect preserved),
/// rotated clockwise about its own center, and centered on the layer's percentage position.
pub fn sprite_transform(layer: &PlacedLayer, sprite: Size, canvas: Size) -> Affine {
    let target_w = OVERLAY_BASELINE * canvas.width * layer.scale;
    let factor = if sprite.width > 0.0 {
        target_w / sprite.width
    } else {
        0.0
    };
    let center = Point::new(layer.x / 100.0 * canvas.width, layer.y / 100.0 * canvas.height);
    Affine::translate(center.to_vec2())
        * Affine::rotate(layer.rotation.to_radians())
        * Affine::scale(factor)
        * Affine::translate((-sprite.width / 2.0, -sprite.height / 2.0))
}

/// Draw one sprite into an opaque canvas with nearest-neighbour sampling.
pub fn draw_sprite(canvas: &mut RgbaImage, sprite: &Sprite) {
    let (sw, sh) = sprite.image.dimensions();
    if sw == 0 || sh == 0 {
        return;
    }
    let canvas_size = Size::new(f64::from(canvas.width()), f64::from(canvas.height()));
    let sprite_size = Size::new(f64::from(sw), f64::from(sh));
    let xf = sprite_transform(&sprite.layer, sprite_size, canvas_size);
    if xf.determinant().abs() < 1e-12 {
        return;
    }
    let inv = xf.inverse();
    let bbox = xf
        .transform_rect_bbox(Rect::from_origin_size(Point::ORIGIN, sprite_size))
        .intersect(Rect::from_origin_size(Point::ORIGIN, canvas_size));
    if bbox.is_zero_area() {
        return;
    }

    let x0 = bbox.x0.floor().max(0.0) as u32;
    let y0 = bbox.y0.floor().max(0.0) as u32;
    let x1 = (bbox.x1.ceil() as u32).min(canvas.width());
    let y1 = (bbox.y1.ceil() as u32).min(canvas.height());
    for py in y0..y1 {
        for px in x0..x1 {
            let p = inv * Point::new(f64::from(px) + 0.5, f64::from(py) + 0.5);
            if p.x < 0.0 || p.y < 0.0 || p.x >= sprite_size.width || p.y >= sprite_size.height {
                continue;
            }
            let src = premultiply(sprite.image.get_pixel(p.x as u32, p.y as u32).0);
            let dst = canvas.get_pixel_mut(px, py);
            dst.0 = blend(sprite.layer.blend_mode, dst.0, src);
        }
    }
}

/// Round a crop to whole source pixels inside the frame.
fn pixel_rect(crop: Rect, frame_w: u32, frame_h: u32) -> (u32, u32, u32, u32) {
    let x = (crop.x0.round().max(0.0) as u32).min(frame_w.saturating_sub(1));
    let y = (crop.y0.round().max(0.0) as u32).min(frame_h.saturating_sub(1));
    let w = (crop.width().round() as u32).clamp(1, frame_w - x);
    let h = (crop.height().round() as u32).clamp(1, frame_h - y);
    (x, y, w, h)
}

#[cfg(test)]
#[path = "../../tests/unit/render/rasterize.rs"]
mod tests;
