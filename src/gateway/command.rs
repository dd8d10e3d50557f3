use tracing::{debug, warn};

use crate::{
    foundation::math::{clamp_percent, clamp_scale, wrap_degrees},
    studio::layer::{BlendMode, LayerId, LayerPatch, PlacedLayer},
};

/// What the command interpreter knows about one layer.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerContext {
    pub id: LayerId,
    /// Name of the referenced asset, used for fuzzy target matching.
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub scale: f64,
    pub rotation: f64,
}

impl LayerContext {
    pub fn from_layer(layer: &PlacedLayer, name: impl Into<String>) -> Self {
        Self {
            id: layer.uid.clone(),
            name: name.into(),
            x: layer.x,
            y: layer.y,
            scale: layer.scale,
            rotation: layer.rotation,
        }
    }
}

/// One canvas action derived from free text.
#[derive(Clone, Debug, PartialEq)]
pub enum CanvasCommand {
    /// Patch one layer's geometry or blend mode.
    Update { layer: LayerId, patch: LayerPatch },
    /// Remove one layer.
    Delete { layer: LayerId },
    /// Remove every layer.
    Clear,
    /// Nothing actionable was understood.
    Unrecognized,
}

/// Named canvas positions in percent.
pub fn anchor_position(name: &str) -> Option<(f64, f64)> {
    let norm = normalize(name);
    let pos = match norm.as_str() {
        "center" | "centre" | "middle" => (50.0, 50.0),
        "left chest" => (65.0, 30.0),
        "right chest" => (35.0, 30.0),
        "top" => (50.0, 20.0),
        "bottom" => (50.0, 80.0),
        "left" => (25.0, 50.0),
        "right" => (75.0, 50.0),
        _ => return None,
    };
    Some(pos)
}

/// Named sizes as absolute scale values.
pub fn size_scale(name: &str) -> Option<f64> {
    match normalize(name).as_str() {
        "small" | "smaller" | "tiny" => Some(0.5),
        "large" | "larger" | "big" | "bigger" => Some(1.5),
        "normal" | "default" | "original" => Some(1.0),
        _ => None,
    }
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawCommand {
    action: String,
    layer_id: Option<String>,
    target: Option<String>,
    updates: RawUpdates,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawUpdates {
    x: Option<f64>,
    y: Option<f64>,
    scale: Option<f64>,
    rotation: Option<f64>,
    blend_mode: Option<String>,
    anchor: Option<String>,
    size: Option<String>,
}

/// Turn the model's JSON reply into a [`CanvasCommand`].
///
/// The target layer is, in order: a valid `layerId` from the reply, the active layer, the best
/// fuzzy match of `target` against layer names, or the only layer on the canvas. Replies that
/// cannot be parsed or resolved are [`CanvasCommand::Unrecognized`].
pub fn parse_command(
    reply: &str,
    layers: &[LayerContext],
    active: Option<&LayerId>,
) -> CanvasCommand {
    let raw: RawCommand = match serde_json::from_str(strip_fences(reply)) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(error = %err, "command reply is not valid JSON");
            return CanvasCommand::Unrecognized;
        }
    };

    let action = normalize(&raw.action);
    if matches!(action.as_str(), "clear" | "clear all" | "reset") {
        return CanvasCommand::Clear;
    }

    let Some(layer) = resolve_target(&raw, layers, active) else {
        debug!(action = %action, "command has no resolvable layer");
        return CanvasCommand::Unrecognized;
    };

    match action.as_str() {
        "delete" | "remove" => CanvasCommand::Delete { layer },
        "update" | "move" | "resize" | "rotate" | "scale" | "blend" => {
            let patch = build_patch(&raw.updates);
            if patch.is_empty() {
                CanvasCommand::Unrecognized
            } else {
                CanvasCommand::Update { layer, patch }
            }
        }
        _ => CanvasCommand::Unrecognized,
    }
}

fn resolve_target(
    raw: &RawCommand,
    layers: &[LayerContext],
    active: Option<&LayerId>,
) -> Option<LayerId> {
    let known = |id: &str| layers.iter().find(|l| l.id.as_str() == id).map(|l| l.id.clone());

    if let Some(id) = raw.layer_id.as_deref().and_then(known) {
        return Some(id);
    }
    if let Some(id) = active.and_then(|a| known(a.as_str())) {
        return Some(id);
    }
    if let Some(hit) = raw.target.as_deref().and_then(|t| fuzzy_match(t, layers)) {
        return Some(hit.id.clone());
    }
    match layers {
        [only] => Some(only.id.clone()),
        _ => None,
    }
}

fn build_patch(u: &RawUpdates) -> LayerPatch {
    let anchor = u.anchor.as_deref().and_then(anchor_position);
    let x = u.x.or(anchor.map(|a| a.0));
    let y = u.y.or(anchor.map(|a| a.1));
    let scale = u.scale.or_else(|| u.size.as_deref().and_then(size_scale));
    LayerPatch {
        x: x.filter(|v| v.is_finite()).map(clamp_percent),
        y: y.filter(|v| v.is_finite()).map(clamp_percent),
        scale: scale.filter(|v| v.is_finite()).map(clamp_scale),
        rotation: u.rotation.filter(|v| v.is_finite()).map(wrap_degrees),
        blend_mode: u.blend_mode.as_deref().and_then(BlendMode::parse),
    }
}

/// Best layer whose name matches `target`.
///
/// Case-insensitive containment in either direction wins; otherwise the layer sharing the most
/// words with the target, if any.
pub fn fuzzy_match<'a>(target: &str, layers: &'a [LayerContext]) -> Option<&'a LayerContext> {
    let needle = normalize(target);
    if needle.is_empty() {
        return None;
    }
    if let Some(hit) = layers.iter().find(|l| {
        let name = normalize(&l.name);
        !name.is_empty() && (name.contains(&needle) || needle.contains(&name))
    }) {
        return Some(hit);
    }

    let wanted = words(&needle);
    layers
        .iter()
        .map(|l| {
            let name = normalize(&l.name);
            let have = words(&name);
            let overlap = wanted.iter().filter(|w| have.contains(w)).count();
            (overlap, l)
        })
        .filter(|(overlap, _)| *overlap > 0)
        .max_by_key(|(overlap, _)| *overlap)
        .map(|(_, l)| l)
}

const STOP_WORDS: &[&str] = &["the", "a", "an", "this", "that", "layer", "image", "my", "on"];

fn words(s: &str) -> Vec<&str> {
    s.split_whitespace()
        .filter(|w| w.len() > 1 && !STOP_WORDS.contains(w))
        .collect()
}

fn normalize(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip Markdown code fences and surrounding prose from a JSON reply.
pub fn strip_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/gateway/command.rs"]
mod tests;
