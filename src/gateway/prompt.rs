use std::fmt::Write as _;

use crate::{
    assets::store::{Asset, AssetKind},
    foundation::config::StudioConfig,
    gateway::{
        command::LayerContext,
        wire::{GenerateRequest, ImageBlob, Part},
    },
    studio::layer::{BlendMode, LayerId, PlacedLayer},
};

const PRODUCT_STYLE: &str = "Professional studio product photograph. Plain, evenly lit light-grey \
background, soft shadows, product centered and fully in frame, photorealistic, no text, no \
watermark.";

const LOGO_STYLE: &str = "Clean flat vector logo artwork. Bold simple shapes, limited palette, \
centered on a solid white background, no mockup, no photograph, no extra text unless requested.";

const COMPOSITE_SYSTEM: &str = "You are a product mockup compositor. You receive a base product \
photo followed by one or more design images. Apply every design onto the product surface so it \
looks physically printed: follow fabric folds, curvature, lighting and shadows. Never change the \
product itself, the background or the camera framing. Return only the final image.";

/// Coarse screen region for a percentage position, e.g. `"top left"` or `"center"`.
pub fn region_label(x: f64, y: f64) -> String {
    let vertical = band(y, "top", "bottom");
    let horizontal = band(x, "left", "right");
    match (vertical, horizontal) {
        ("center", "center") => "center".to_string(),
        (v, h) => format!("{v} {h}"),
    }
}

fn band(v: f64, low: &'static str, high: &'static str) -> &'static str {
    if v < 33.0 {
        low
    } else if v < 66.0 {
        "center"
    } else {
        high
    }
}

/// How a blend mode should look once printed.
pub fn blend_description(mode: BlendMode) -> &'static str {
    match mode {
        BlendMode::Normal => "normal: print the design opaquely as shown",
        BlendMode::Multiply => {
            "multiply: ink-like darkening; white areas of the design are fully transparent and \
             the fabric texture shows through the ink"
        }
        BlendMode::Screen => {
            "screen: light-on-dark printing; black areas of the design are fully transparent and \
             only the light parts are printed"
        }
    }
}

/// A layer plus the image and name it resolves to.
#[derive(Clone, Copy, Debug)]
pub struct Overlay<'a> {
    pub layer: &'a PlacedLayer,
    pub image: &'a ImageBlob,
    pub name: &'a str,
}

/// Pair layers with their assets, skipping layers whose asset no longer exists.
pub fn resolve_overlays<'a>(layers: &'a [PlacedLayer], assets: &'a [Asset]) -> Vec<Overlay<'a>> {
    layers
        .iter()
        .filter_map(|layer| {
            let asset = assets.iter().find(|a| a.id == layer.asset_id)?;
            Some(Overlay {
                layer,
                image: &asset.image,
                name: &asset.name,
            })
        })
        .collect()
}

/// Builds provider requests for every gateway operation. Pure; no I/O.
#[derive(Clone, Debug)]
pub struct PromptBuilder {
    image_model: String,
    text_model: String,
}

impl PromptBuilder {
    pub fn new(image_model: impl Into<String>, text_model: impl Into<String>) -> Self {
        Self {
            image_model: image_model.into(),
            text_model: text_model.into(),
        }
    }

    pub fn from_config(config: &StudioConfig) -> Self {
        Self::new(config.image_model.clone(), config.text_model.clone())
    }

    pub fn image_model(&self) -> &str {
        &self.image_model
    }

    pub fn text_model(&self) -> &str {
        &self.text_model
    }

    /// Text-to-image asset creation with a style hint per kind.
    pub fn generate_asset(&self, prompt: &str, kind: AssetKind) -> GenerateRequest {
        let style = match kind {
            AssetKind::Product => PRODUCT_STYLE,
            AssetKind::Logo => LOGO_STYLE,
        };
        let text = format!("{}\n\nStyle: {style}", prompt.trim());
        GenerateRequest::user(&self.image_model, vec![Part::text(text)]).expect_image()
    }

    /// Product photo plus overlays (bottom to top) composited into one image.
    pub fn composite(
        &self,
        product: &ImageBlob,
        overlays: &[Overlay<'_>],
        instruction: &str,
    ) -> GenerateRequest {
        let mut parts = Vec::with_capacity(overlays.len() + 2);
        parts.push(Part::image(product));
        parts.extend(overlays.iter().map(|o| Part::image(o.image)));
        parts.push(Part::text(composite_text(overlays, instruction)));
        GenerateRequest::user(&self.image_model, parts)
            .with_system(COMPOSITE_SYSTEM)
            .expect_image()
    }

    /// Cut the subject out onto a plain background.
    pub fn remove_background(&self, image: &ImageBlob) -> GenerateRequest {
        let text = "Remove the background from this image. Keep the main subject exactly as it \
                    is, with clean edges, on a pure white background. Do not alter the subject.";
        GenerateRequest::user(&self.image_model, vec![Part::image(image), Part::text(text)])
            .expect_image()
    }

    /// Edit an existing image by instruction.
    pub fn refine(&self, image: &ImageBlob, instruction: &str) -> GenerateRequest {
        let text = format!(
            "Edit this image: {}\nKeep everything not mentioned unchanged.",
            instruction.trim()
        );
        GenerateRequest::user(&self.image_model, vec![Part::image(image), Part::text(text)])
            .expect_image()
    }

    /// Ask for a short name and a product/logo classification as JSON.
    pub fn analyze(&self, image: &ImageBlob) -> GenerateRequest {
        let text = "Look at this image and reply with JSON only: \
                    {\"name\": string, \"type\": \"product\" | \"logo\"}. \
                    name is 2-4 words describing the item (e.g. \"White Cotton T-Shirt\"). \
                    Use \"product\" for physical goods to print on and \"logo\" for graphics, \
                    icons or artwork.";
        GenerateRequest::user(&self.text_model, vec![Part::image(image), Part::text(text)])
            .expect_json()
    }

    /// Map a spoken/typed command onto one canvas action, given the current layers.
    pub fn command(
        &self,
        instruction: &str,
        layers: &[LayerContext],
        active: Option<&LayerId>,
    ) -> GenerateRequest {
        let mut text = String::new();
        let _ = writeln!(text, "Canvas layers (x/y are percent of the canvas):");
        if layers.is_empty() {
            let _ = writeln!(text, "- none");
        }
        for l in layers {
            let _ = writeln!(
                text,
                "- id={} name=\"{}\" x={:.1} y={:.1} scale={:.2} rotation={:.0}",
                l.id, l.name, l.x, l.y, l.scale, l.rotation
            );
        }
        match active {
            Some(id) => {
                let _ = writeln!(text, "Active layer id: {id}");
            }
            None => {
                let _ = writeln!(text, "No active layer; name the target in \"target\".");
            }
        }
        let _ = write!(
            text,
            "\nPositions: center=(50,50), left chest=(65,30), right chest=(35,30), top=(50,20), \
             bottom=(50,80), left=(25,50), right=(75,50). Sizes: small=0.5, large=1.5. \
             Scale range 0.1-5, rotation degrees clockwise.\n\
             Reply with JSON only: {{\"action\": \"update\"|\"delete\"|\"clear\"|\"unknown\", \
             \"layerId\": string?, \"target\": string?, \"updates\": {{\"x\"?, \"y\"?, \
             \"scale\"?, \"rotation\"?, \"blendMode\"?: \"normal\"|\"multiply\"|\"screen\", \
             \"anchor\"?: string, \"size\"?: \"small\"|\"large\"}}}}.\n\
             Command: {}",
            instruction.trim()
        );
        GenerateRequest::user(&self.text_model, vec![Part::text(text)]).expect_json()
    }

    /// Photoreal pass over a captured camera frame with overlays already drawn in place.
    pub fn realtime(&self, frame: &ImageBlob, instruction: &str) -> GenerateRequest {
        let mut text = String::from(
            "This camera frame shows a real product with design overlays drawn roughly in place. \
             Re-render it so the designs look genuinely printed on the product at exactly the \
             positions, sizes and rotations shown. Keep the scene, pose and framing unchanged.",
        );
        if !instruction.trim().is_empty() {
            let _ = write!(text, "\nAdditional direction: {}", instruction.trim());
        }
        GenerateRequest::user(&self.image_model, vec![Part::image(frame), Part::text(text)])
            .with_system(COMPOSITE_SYSTEM)
            .expect_image()
    }
}

fn composite_text(overlays: &[Overlay<'_>], instruction: &str) -> String {
    let mut text = String::new();
    let _ = writeln!(
        text,
        "Image 1 is the base product. Images 2..{} are designs, listed bottom to top; later \
         designs are stacked above earlier ones where they overlap.",
        overlays.len() + 1
    );
    for (i, o) in overlays.iter().enumerate() {
        let l = o.layer;
        let _ = writeln!(
            text,
            "- Image {} \"{}\": {} of the product, center at x={:.1}% y={:.1}%, scale {:.2}, \
             rotated {:.0} degrees clockwise, blend {}.",
            i + 2,
            o.name,
            region_label(l.x, l.y),
            l.x,
            l.y,
            l.scale,
            l.rotation,
            blend_description(l.blend_mode)
        );
    }
    let instruction = instruction.trim();
    if !instruction.is_empty() {
        let _ = write!(text, "Additional direction: {instruction}");
    }
    text
}

#[cfg(test)]
#[path = "../../tests/unit/gateway/prompt.rs"]
mod tests;
