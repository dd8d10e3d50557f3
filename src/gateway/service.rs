use std::{sync::Arc, time::Duration};

use tracing::{info, warn};

use crate::{
    assets::store::AssetKind,
    credits::ledger::CreditLedger,
    foundation::{
        clock::SharedClock,
        config::StudioConfig,
        error::{StudioError, StudioResult},
    },
    gateway::{
        command::{CanvasCommand, LayerContext, parse_command, strip_fences},
        invoker::ResilientInvoker,
        prompt::{Overlay, PromptBuilder},
        provider::{GeminiProvider, GenerativeProvider},
        wire::{GenerateRequest, GenerateResponse, ImageBlob, extract_image, extract_text},
    },
    keys::pool::KeyPool,
    storage::kv::SharedStore,
    studio::layer::LayerId,
};

/// Name and classification suggested for an uploaded image.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AssetAnalysis {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AssetKind,
}

/// Parse an analysis reply. A missing or unknown type reads as a product.
pub fn parse_analysis(reply: &str) -> StudioResult<AssetAnalysis> {
    let value: serde_json::Value = serde_json::from_str(strip_fences(reply))
        .map_err(|e| StudioError::malformed(format!("analysis reply is not JSON: {e}")))?;
    let name = value
        .get("name")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| StudioError::malformed("analysis reply has no name"))?;
    let kind = match value.get("type").and_then(|v| v.as_str()) {
        Some(t) if t.trim().eq_ignore_ascii_case("logo") => AssetKind::Logo,
        _ => AssetKind::Product,
    };
    Ok(AssetAnalysis {
        name: name.to_string(),
        kind,
    })
}

/// Every AI operation the studio exposes.
///
/// Each call debits one credit, runs through the [`ResilientInvoker`], validates the response,
/// and refunds the credit on any failure.
#[derive(Debug)]
pub struct AiGateway {
    invoker: ResilientInvoker,
    provider: Arc<dyn GenerativeProvider>,
    prompts: PromptBuilder,
    credits: Arc<CreditLedger>,
}

impl AiGateway {
    pub fn new(
        invoker: ResilientInvoker,
        provider: Arc<dyn GenerativeProvider>,
        prompts: PromptBuilder,
        credits: Arc<CreditLedger>,
    ) -> Self {
        Self {
            invoker,
            provider,
            prompts,
            credits,
        }
    }

    /// Wire the live provider, key pool and ledger from configuration.
    pub fn from_config(
        config: &StudioConfig,
        store: SharedStore,
        clock: SharedClock,
    ) -> StudioResult<Self> {
        let provider = GeminiProvider::new(
            config.base_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )?;
        let pool = Arc::new(KeyPool::new(
            config.api_keys.clone(),
            store.clone(),
            clock.clone(),
        ));
        let invoker =
            ResilientInvoker::with_backoff(pool, Duration::from_millis(config.retry_backoff_ms));
        let credits = Arc::new(CreditLedger::new(store, clock, config.starting_credits));
        Ok(Self::new(
            invoker,
            Arc::new(provider),
            PromptBuilder::from_config(config),
            credits,
        ))
    }

    pub fn pool(&self) -> &Arc<KeyPool> {
        self.invoker.pool()
    }

    pub fn credits(&self) -> &Arc<CreditLedger> {
        &self.credits
    }

    pub fn prompts(&self) -> &PromptBuilder {
        &self.prompts
    }

    /// Create a product photo or logo from a text prompt.
    #[tracing::instrument(level = "info", skip(self, prompt))]
    pub async fn generate_asset(&self, prompt: &str, kind: AssetKind) -> StudioResult<ImageBlob> {
        require_text("prompt", prompt)?;
        let request = self.prompts.generate_asset(prompt, kind);
        self.charged("generate_asset", request, extract_image).await
    }

    /// Print overlays onto a product photo.
    #[tracing::instrument(level = "info", skip_all, fields(overlays = overlays.len()))]
    pub async fn generate_composite(
        &self,
        product: &ImageBlob,
        overlays: &[Overlay<'_>],
        instruction: &str,
    ) -> StudioResult<ImageBlob> {
        let request = self.prompts.composite(product, overlays, instruction);
        self.charged("generate_composite", request, extract_image).await
    }

    #[tracing::instrument(level = "info", skip_all)]
    pub async fn remove_background(&self, image: &ImageBlob) -> StudioResult<ImageBlob> {
        let request = self.prompts.remove_background(image);
        self.charged("remove_background", request, extract_image).await
    }

    /// Edit an image by instruction.
    #[tracing::instrument(level = "info", skip_all)]
    pub async fn refine(&self, image: &ImageBlob, instruction: &str) -> StudioResult<ImageBlob> {
        require_text("instruction", instruction)?;
        let request = self.prompts.refine(image, instruction);
        self.charged("refine", request, extract_image).await
    }

    /// Suggest a name and classify an image as product or logo.
    #[tracing::instrument(level = "info", skip_all)]
    pub async fn analyze(&self, image: &ImageBlob) -> StudioResult<AssetAnalysis> {
        let request = self.prompts.analyze(image);
        self.charged("analyze", request, |resp| parse_analysis(&extract_text(resp)?))
            .await
    }

    /// Interpret a free-text canvas command against the current layers.
    #[tracing::instrument(level = "info", skip_all, fields(layers = layers.len()))]
    pub async fn interpret_command(
        &self,
        instruction: &str,
        layers: &[LayerContext],
        active: Option<&LayerId>,
    ) -> StudioResult<CanvasCommand> {
        require_text("command", instruction)?;
        let request = self.prompts.command(instruction, layers, active);
        self.charged("interpret_command", request, |resp| {
            Ok(parse_command(&extract_text(resp)?, layers, active))
        })
        .await
    }

    /// Photoreal pass over a captured camera frame with overlays drawn in.
    #[tracing::instrument(level = "info", skip_all)]
    pub async fn realtime_composite(
        &self,
        frame: &ImageBlob,
        instruction: &str,
    ) -> StudioResult<ImageBlob> {
        let request = self.prompts.realtime(frame, instruction);
        self.charged("realtime_composite", request, extract_image).await
    }

    async fn send(&self, request: &GenerateRequest) -> StudioResult<GenerateResponse> {
        let provider = &self.provider;
        self.invoker
            .invoke(|credential| async move { provider.generate(&credential, request).await })
            .await
    }

    /// Spend one credit, run `request`, validate with `extract`; refund on any failure.
    async fn charged<T>(
        &self,
        operation: &str,
        request: GenerateRequest,
        extract: impl FnOnce(&GenerateResponse) -> StudioResult<T>,
    ) -> StudioResult<T> {
        let charge = self.credits.spend(operation)?;
        let result = match self.send(&request).await {
            Ok(resp) => extract(&resp),
            Err(err) => Err(err),
        };
        match result {
            Ok(value) => {
                charge.commit();
                info!(operation, "ai operation succeeded");
                Ok(value)
            }
            Err(err) => {
                if let Err(refund_err) = charge.refund() {
                    warn!(operation, error = %refund_err, "refund failed");
                }
                warn!(operation, error = %err, category = ?err.user_category(), "ai operation failed");
                Err(err)
            }
        }
    }
}

fn require_text(field: &str, value: &str) -> StudioResult<()> {
    if value.trim().is_empty() {
        return Err(StudioError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/gateway/service.rs"]
mod tests;
