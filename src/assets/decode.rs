use std::io::Cursor;

use anyhow::Context;

use crate::{StudioResult, gateway::wire::ImageBlob};

/// Decode encoded image bytes into straight-alpha RGBA8.
pub fn decode_rgba(bytes: &[u8]) -> StudioResult<image::RgbaImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    Ok(dyn_img.to_rgba8())
}

/// Decode an [`ImageBlob`] into straight-alpha RGBA8.
pub fn decode_blob(blob: &ImageBlob) -> StudioResult<image::RgbaImage> {
    let dyn_img = image::load_from_memory(&blob.data)
        .with_context(|| format!("decode {} blob", blob.mime_type))?;
    Ok(dyn_img.to_rgba8())
}

/// Encode RGBA8 as PNG, keeping transparency.
pub fn encode_png(img: &image::RgbaImage) -> StudioResult<ImageBlob> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .context("encode png")?;
    Ok(ImageBlob::new("image/png", buf))
}

/// Encode RGBA8 as JPEG at `quality` (1..=100). Alpha is dropped.
pub fn encode_jpeg(img: &image::RgbaImage, quality: u8) -> StudioResult<ImageBlob> {
    let rgb = image::DynamicImage::ImageRgba8(img.clone()).to_rgb8();
    let mut buf = Vec::new();
    let encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder).context("encode jpeg")?;
    Ok(ImageBlob::new("image/jpeg", buf))
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
