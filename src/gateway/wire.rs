//! Request/response shapes for the `generateContent` REST surface, plus response validation.

use base64::{Engine as _, engine::general_purpose};

use crate::foundation::error::{StudioError, StudioResult};

/// Finish reason of a normally completed candidate.
pub const FINISH_STOP: &str = "STOP";

/// Self-describing encoded image (mime type plus encoded bytes).
#[derive(Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageBlob {
    /// IANA media type, e.g. `image/png`.
    pub mime_type: String,
    /// Encoded image bytes.
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl std::fmt::Debug for ImageBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageBlob")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

impl ImageBlob {
    /// Wrap encoded bytes with an explicit media type.
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Wrap encoded bytes, sniffing the media type from the header.
    pub fn from_bytes(data: Vec<u8>) -> StudioResult<Self> {
        let format = image::guess_format(&data)
            .map_err(|e| StudioError::validation(format!("unrecognized image data: {e}")))?;
        Ok(Self::new(format.to_mime_type(), data))
    }

    /// Standard base64 of the bytes.
    pub fn base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.data)
    }

    /// `data:` URL form used by web views.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64())
    }

    /// Parse a `data:<mime>;base64,<payload>` URL.
    pub fn from_data_url(url: &str) -> StudioResult<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| StudioError::validation("not a data URL"))?;
        let (meta, payload) = rest
            .split_once(',')
            .ok_or_else(|| StudioError::validation("data URL without payload"))?;
        let mime = meta
            .strip_suffix(";base64")
            .ok_or_else(|| StudioError::validation("data URL is not base64"))?;
        let data = general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| StudioError::validation(format!("bad base64 payload: {e}")))?;
        Ok(Self::new(mime, data))
    }

    fn to_part(&self) -> Part {
        Part::InlineData {
            inline_data: InlineData {
                mime_type: self.mime_type.clone(),
                data: self.base64(),
            },
        }
    }
}

mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose};
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&general_purpose::STANDARD.encode(bytes))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(d)?;
        general_purpose::STANDARD
            .decode(raw)
            .map_err(serde::de::Error::custom)
    }
}

/// Output modality requested from the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    /// Text parts.
    Text,
    /// Inline image parts.
    Image,
}

/// Inline base64 payload.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    /// Media type.
    pub mime_type: String,
    /// Standard base64 payload.
    pub data: String,
}

/// One content part.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Part {
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
    /// Inline binary data.
    InlineData {
        /// The payload.
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    /// Any part kind this crate does not interpret (thoughts, function calls, ...).
    Other(serde_json::Value),
}

impl Part {
    /// Text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Inline image part.
    pub fn image(blob: &ImageBlob) -> Self {
        blob.to_part()
    }
}

/// A role-tagged list of parts.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Content {
    /// `user` or `model`; absent on system instructions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Ordered parts.
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// Generation knobs.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Requested output modalities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<Modality>>,
    /// Requested MIME type for text output (`application/json` for structured answers).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Full request; `model` selects the endpoint and is not part of the body.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// Target model name.
    #[serde(skip)]
    pub model: String,
    /// Optional system instruction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    /// Conversation turns (a single user turn here).
    pub contents: Vec<Content>,
    /// Generation configuration.
    pub generation_config: GenerationConfig,
}

impl GenerateRequest {
    /// Single user turn with the given parts.
    pub fn user(model: impl Into<String>, parts: Vec<Part>) -> Self {
        Self {
            model: model.into(),
            system_instruction: None,
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: GenerationConfig::default(),
        }
    }

    /// Attach a system instruction.
    pub fn with_system(mut self, text: impl Into<String>) -> Self {
        self.system_instruction = Some(Content {
            role: None,
            parts: vec![Part::text(text)],
        });
        self
    }

    /// Ask for image output.
    pub fn expect_image(mut self) -> Self {
        self.generation_config.response_modalities = Some(vec![Modality::Image, Modality::Text]);
        self
    }

    /// Ask for a JSON text answer.
    pub fn expect_json(mut self) -> Self {
        self.generation_config.response_mime_type = Some("application/json".to_string());
        self
    }

    /// Number of inline image parts carried by the request.
    pub fn image_part_count(&self) -> usize {
        self.contents
            .iter()
            .flat_map(|c| c.parts.iter())
            .filter(|p| matches!(p, Part::InlineData { .. }))
            .count()
    }

    /// Concatenated text parts of the user turn.
    pub fn prompt_text(&self) -> String {
        self.contents
            .iter()
            .flat_map(|c| c.parts.iter())
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Upfront prompt rejection details.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    /// Present when the prompt itself was blocked.
    #[serde(default)]
    pub block_reason: Option<String>,
}

/// One generated candidate.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Generated content.
    #[serde(default)]
    pub content: Option<Content>,
    /// Why generation ended.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Provider response.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    /// Candidates, usually one.
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    /// Prompt-level feedback.
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

impl GenerateResponse {
    /// Response with one image part and a `STOP` finish.
    pub fn with_image(blob: &ImageBlob) -> Self {
        Self::with_parts(vec![blob.to_part()])
    }

    /// Response with one text part and a `STOP` finish.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::with_parts(vec![Part::text(text)])
    }

    /// Response whose prompt was blocked upfront.
    pub fn blocked(reason: impl Into<String>) -> Self {
        Self {
            candidates: Vec::new(),
            prompt_feedback: Some(PromptFeedback {
                block_reason: Some(reason.into()),
            }),
        }
    }

    /// Response ending with a non-standard finish reason.
    pub fn finished(reason: impl Into<String>) -> Self {
        Self {
            candidates: vec![Candidate {
                content: None,
                finish_reason: Some(reason.into()),
            }],
            prompt_feedback: None,
        }
    }

    fn with_parts(parts: Vec<Part>) -> Self {
        Self {
            candidates: vec![Candidate {
                content: Some(Content {
                    role: Some("model".to_string()),
                    parts,
                }),
                finish_reason: Some(FINISH_STOP.to_string()),
            }],
            prompt_feedback: None,
        }
    }

    fn parts(&self) -> impl Iterator<Item = &Part> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
    }
}

/// Reject blocked responses: an upfront block reason or a non-`STOP` finish reason.
pub fn check_blocked(resp: &GenerateResponse) -> StudioResult<()> {
    if let Some(reason) = resp
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        return Err(StudioError::blocked(format!("prompt blocked ({reason})")));
    }
    if let Some(reason) = resp
        .candidates
        .first()
        .and_then(|c| c.finish_reason.as_deref())
        .filter(|r| *r != FINISH_STOP)
    {
        return Err(StudioError::blocked(format!("generation stopped ({reason})")));
    }
    Ok(())
}

/// Pull the first inline image out of a response.
pub fn extract_image(resp: &GenerateResponse) -> StudioResult<ImageBlob> {
    check_blocked(resp)?;
    let inline = resp
        .parts()
        .find_map(|p| match p {
            Part::InlineData { inline_data } if inline_data.mime_type.starts_with("image/") => {
                Some(inline_data)
            }
            _ => None,
        })
        .ok_or_else(|| StudioError::malformed("response contained no image"))?;
    let data = general_purpose::STANDARD
        .decode(inline.data.as_bytes())
        .map_err(|e| StudioError::malformed(format!("image payload is not base64: {e}")))?;
    Ok(ImageBlob::new(inline.mime_type.clone(), data))
}

/// Join the non-empty text parts of a response.
pub fn extract_text(resp: &GenerateResponse) -> StudioResult<String> {
    check_blocked(resp)?;
    let text = resp
        .parts()
        .filter_map(|p| match p {
            Part::Text { text } if !text.trim().is_empty() => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n");
    if text.is_empty() {
        return Err(StudioError::malformed("response contained no text"));
    }
    Ok(text)
}

#[cfg(test)]
#[path = "../../tests/unit/gateway/wire.rs"]
mod tests;
