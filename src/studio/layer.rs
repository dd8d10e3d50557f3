use crate::{
    assets::store::AssetId,
    foundation::math::{clamp_percent, clamp_scale, wrap_degrees},
};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
/// Unique id of a placed layer.
pub struct LayerId(pub String);

impl LayerId {
    /// Fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow as `&str`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LayerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
/// How a layer mixes with what is beneath it.
pub enum BlendMode {
    /// Plain source-over.
    #[default]
    Normal,
    /// Ink-like darkening; white behaves as transparent.
    Multiply,
    /// Light-on-dark printing; black behaves as transparent.
    Screen,
}

impl BlendMode {
    /// Lowercase name used in prompts and JSON.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Multiply => "multiply",
            Self::Screen => "screen",
        }
    }

    /// Lenient parse; unknown names yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" | "none" | "" => Some(Self::Normal),
            "multiply" => Some(Self::Multiply),
            "screen" => Some(Self::Screen),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
/// An overlay placed on the studio canvas.
///
/// `x`/`y` are the layer center in percent of the canvas, `scale` multiplies the baseline size
/// and `rotation` is clockwise degrees in `[0, 360)`.
pub struct PlacedLayer {
    /// Layer id.
    pub uid: LayerId,
    /// Referenced asset; may dangle after the asset is deleted.
    pub asset_id: AssetId,
    /// Horizontal center, percent.
    pub x: f64,
    /// Vertical center, percent.
    pub y: f64,
    /// Size multiplier in `[0.1, 5]`.
    pub scale: f64,
    /// Clockwise rotation in degrees.
    pub rotation: f64,
    /// Blend mode; absent in stored JSON means normal.
    #[serde(default)]
    pub blend_mode: BlendMode,
}

impl PlacedLayer {
    /// Layer centered on the canvas at natural size.
    pub fn new(asset_id: AssetId) -> Self {
        Self {
            uid: LayerId::generate(),
            asset_id,
            x: 50.0,
            y: 50.0,
            scale: 1.0,
            rotation: 0.0,
            blend_mode: BlendMode::Normal,
        }
    }

    /// Apply a patch with range clamping. Returns whether any field changed.
    pub fn apply(&mut self, patch: &LayerPatch) -> bool {
        let before = self.clone();
        if let Some(x) = patch.x {
            self.x = clamp_percent(x);
        }
        if let Some(y) = patch.y {
            self.y = clamp_percent(y);
        }
        if let Some(scale) = patch.scale {
            self.scale = clamp_scale(scale);
        }
        if let Some(rotation) = patch.rotation {
            self.rotation = wrap_degrees(rotation);
        }
        if let Some(mode) = patch.blend_mode {
            self.blend_mode = mode;
        }
        *self != before
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
/// Partial update of a layer's geometry and blend mode.
pub struct LayerPatch {
    /// New horizontal center.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    /// New vertical center.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    /// New scale.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    /// New rotation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    /// New blend mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blend_mode: Option<BlendMode>,
}

impl LayerPatch {
    /// Move to a position.
    pub fn position(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    /// Whether the patch sets nothing.
    pub fn is_empty(&self) -> bool {
        self.x.is_none()
            && self.y.is_none()
            && self.scale.is_none()
            && self.rotation.is_none()
            && self.blend_mode.is_none()
    }
}
