/// Premultiplied pixel blending.
pub mod blend;
/// Frame capture and layer rasterization.
pub mod rasterize;
/// Cover-fit crop math.
pub mod viewport;
