use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::foundation::error::{StudioError, StudioResult};

/// Default REST endpoint for the generative provider.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Default model for image-producing operations.
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
/// Default model for text/JSON operations.
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";

/// Runtime configuration for the studio core.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    /// Provider credentials, deduplicated in first-seen order.
    pub api_keys: Vec<String>,
    /// Provider REST base URL.
    pub base_url: String,
    /// Model used for image generation/editing.
    pub image_model: String,
    /// Model used for analysis and command interpretation.
    pub text_model: String,
    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,
    /// Pause between non-quota retries.
    pub retry_backoff_ms: u64,
    /// Directory for the durable key-value file.
    pub data_dir: PathBuf,
    /// Balance granted when the credit ledger is first created.
    pub starting_credits: i64,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            request_timeout_secs: 90,
            retry_backoff_ms: 1_000,
            data_dir: PathBuf::from(".mockforge"),
            starting_credits: 10,
        }
    }
}

impl StudioConfig {
    /// Build a config from the process environment.
    pub fn from_env() -> StudioResult<Self> {
        Self::default().with_overrides(|k| std::env::var(k).ok())
    }

    /// Load a JSON config file, then apply environment overrides.
    pub fn from_json_file(path: &Path) -> StudioResult<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        let mut base: Self = serde_json::from_str(&raw)?;
        base.api_keys = dedupe_keys(base.api_keys);
        base.with_overrides(|k| std::env::var(k).ok())
    }

    /// Apply overrides from an arbitrary key lookup (the environment in production).
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> StudioResult<Self> {
        let mut keys = std::mem::take(&mut self.api_keys);
        keys.extend(collect_keys(&lookup));
        self.api_keys = dedupe_keys(keys);

        if let Some(v) = lookup("MOCKFORGE_BASE_URL") {
            self.base_url = v.trim().trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("MOCKFORGE_IMAGE_MODEL") {
            self.image_model = v.trim().to_string();
        }
        if let Some(v) = lookup("MOCKFORGE_TEXT_MODEL") {
            self.text_model = v.trim().to_string();
        }
        if let Some(v) = lookup("MOCKFORGE_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_num("MOCKFORGE_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("MOCKFORGE_DATA_DIR") {
            self.data_dir = PathBuf::from(v.trim());
        }
        if let Some(v) = lookup("MOCKFORGE_STARTING_CREDITS") {
            self.starting_credits = parse_num("MOCKFORGE_STARTING_CREDITS", &v)?;
        }
        Ok(self)
    }
}

fn parse_num<T: std::str::FromStr>(name: &str, raw: &str) -> StudioResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| StudioError::validation(format!("{name} must be a number, got '{raw}'")))
}

/// Gather credential values from a list key plus singleton keys.
///
/// `GEMINI_API_KEYS` may hold several values separated by commas or whitespace; the singleton
/// keys `GEMINI_API_KEY`, `API_KEY` and `GEMINI_API_KEY_1..=9` contribute one value each.
pub fn collect_keys(lookup: impl Fn(&str) -> Option<String>) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(list) = lookup("GEMINI_API_KEYS") {
        out.extend(
            list.split(|c: char| c == ',' || c.is_whitespace())
                .map(str::to_string),
        );
    }
    for name in ["GEMINI_API_KEY", "API_KEY"] {
        if let Some(v) = lookup(name) {
            out.push(v);
        }
    }
    for i in 1..=9 {
        if let Some(v) = lookup(&format!("GEMINI_API_KEY_{i}")) {
            out.push(v);
        }
    }
    out
}

/// Trim, drop empties and remove duplicates while keeping first-seen order.
pub fn dedupe_keys(keys: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for k in keys {
        let k = k.trim();
        if k.is_empty() || out.iter().any(|seen| seen == k) {
            continue;
        }
        out.push(k.to_string());
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/config.rs"]
mod tests;
