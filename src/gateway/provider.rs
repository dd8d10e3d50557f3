use std::{collections::VecDeque, sync::Mutex, time::Duration};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{
    foundation::error::{StudioError, StudioResult},
    gateway::wire::{GenerateRequest, GenerateResponse},
    keys::pool::Credential,
};

/// A generative-image backend reachable with one credential per call.
#[async_trait]
pub trait GenerativeProvider: Send + Sync + std::fmt::Debug {
    /// Run one request. Transport and HTTP failures map onto the [`StudioError`] taxonomy;
    /// a successful body is returned unvalidated.
    async fn generate(
        &self,
        credential: &Credential,
        request: &GenerateRequest,
    ) -> StudioResult<GenerateResponse>;
}

/// REST client for the `generateContent` endpoint.
#[derive(Clone, Debug)]
pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
}

impl GeminiProvider {
    /// Client with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> StudioResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StudioError::provider(None, format!("build http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl GenerativeProvider for GeminiProvider {
    async fn generate(
        &self,
        credential: &Credential,
        request: &GenerateRequest,
    ) -> StudioResult<GenerateResponse> {
        debug!(
            model = %request.model,
            key = %credential.masked(),
            images = request.image_part_count(),
            "provider request"
        );

        let response = self
            .client
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", credential.secret())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                warn!(timeout = e.is_timeout(), connect = e.is_connect(), "provider request failed to send");
                StudioError::provider(None, format!("request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (message, provider_status) = summarize_error_body(&body);
            warn!(status = status.as_u16(), %message, "provider returned an error");
            if status.as_u16() == 429 || provider_status.as_deref() == Some("RESOURCE_EXHAUSTED") {
                return Err(StudioError::quota(message));
            }
            return Err(StudioError::provider(Some(status.as_u16()), message));
        }

        response
            .json::<GenerateResponse>()
            .await
            .map_err(|e| StudioError::malformed(format!("undecodable response body: {e}")))
    }
}

/// Pull `error.message` / `error.status` out of an error body, falling back to a truncated body.
pub fn summarize_error_body(body: &str) -> (String, Option<String>) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return ("empty response body".to_string(), None);
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let status = value
            .pointer("/error/status")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        if let Some(message) = message {
            return (message, status);
        }
        return (truncate(&value.to_string(), 500), status);
    }
    (truncate(trimmed, 500), None)
}

fn truncate(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let head: String = value.chars().take(limit).collect();
    format!("{head}... (truncated)")
}

/// One recorded call against a [`ScriptedProvider`].
#[derive(Clone, Debug)]
pub struct RecordedCall {
    /// Secret of the credential used.
    pub credential: String,
    /// The request as sent.
    pub request: GenerateRequest,
}

/// Offline provider that replays queued outcomes in order and records every call. Used by tests
/// and dry runs; not re-exported at the crate root.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<StudioResult<GenerateResponse>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedProvider {
    /// Empty script; every call fails until outcomes are queued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next outcome.
    pub fn push(&self, outcome: StudioResult<GenerateResponse>) -> &Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(outcome);
        }
        self
    }

    /// Calls received so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl GenerativeProvider for ScriptedProvider {
    async fn generate(
        &self,
        credential: &Credential,
        request: &GenerateRequest,
    ) -> StudioResult<GenerateResponse> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                credential: credential.secret().to_string(),
                request: request.clone(),
            });
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        next.unwrap_or_else(|| Err(StudioError::provider(None, "script exhausted")))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/gateway/provider.rs"]
mod tests;
