//! The uniform model contract every provider adapter implements.

use crate::capability::{Capability, CapabilitySet, ModerationMode};
use crate::config::AdapterConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::request::{ChatMessage, GenerationOptions};
use crate::response::{
    ChatResponse, EmbeddingResponse, Envelope, ImageAnalysisResponse, Metadata,
    ModerationResponse, ResponseFormatter, TextResponse,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Discovery information about a configured adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Provider display name
    pub provider: String,
    /// Model identifier
    pub model: String,
    /// Kind of model, e.g. "Large Language Model"
    #[serde(rename = "type")]
    pub model_type: String,
    /// Declared capabilities
    pub capabilities: CapabilitySet,
    /// Variant-specific extras
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

impl ModelInfo {
    /// Create model info
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        model_type: impl Into<String>,
        capabilities: CapabilitySet,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            model_type: model_type.into(),
            capabilities,
            details: Map::new(),
        }
    }

    /// Attach an extra detail
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// A provider adapter.
///
/// Adapters are constructed uninitialized, configured once through
/// [`AIModel::initialize`] while still exclusively owned, and only then shared.
/// Every operation other than `initialize` fails with
/// [`GatewayError::NotInitialized`] until initialization succeeded.
///
/// Provider-side failures come back as [`Envelope::Failure`]; the `Err` path
/// is reserved for contract violations (not initialized, unsupported
/// capability, bad configuration).
#[async_trait]
pub trait AIModel: Send + Sync {
    /// Short provider name used in errors and logs
    fn provider_name(&self) -> &str;

    /// Build the backing client from configuration
    fn initialize(&mut self, config: &AdapterConfig) -> GatewayResult<()>;

    /// Whether `initialize` has succeeded
    fn is_initialized(&self) -> bool;

    /// Capability snapshot
    fn capabilities(&self) -> CapabilitySet;

    /// How `moderate_content` behaves
    fn moderation_mode(&self) -> ModerationMode {
        ModerationMode::from_capabilities(&self.capabilities())
    }

    /// Discovery information
    fn model_info(&self) -> ModelInfo;

    /// Fail unless the adapter declares `capability`
    fn check_capability(&self, capability: Capability) -> GatewayResult<()> {
        if self.capabilities().supports(capability) {
            Ok(())
        } else {
            Err(GatewayError::unsupported(self.provider_name(), capability))
        }
    }

    /// Fail unless `initialize` has succeeded
    fn check_initialized(&self) -> GatewayResult<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(GatewayError::not_initialized(self.provider_name()))
        }
    }

    /// Generate text from a single prompt
    async fn generate_text(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> GatewayResult<Envelope<TextResponse>>;

    /// Generate the next assistant turn of a conversation
    async fn generate_chat_response(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> GatewayResult<Envelope<ChatResponse>>;

    /// Embed text
    async fn embed_text(
        &self,
        _text: &str,
        _options: &GenerationOptions,
    ) -> GatewayResult<Envelope<EmbeddingResponse>> {
        self.check_capability(Capability::Embeddings)?;
        Err(GatewayError::internal(format!(
            "{} declares embeddings but does not implement them",
            self.provider_name()
        )))
    }

    /// Describe or answer a question about an image
    async fn analyze_image(
        &self,
        _image: &[u8],
        _prompt: Option<&str>,
        _options: &GenerationOptions,
    ) -> GatewayResult<Envelope<ImageAnalysisResponse>> {
        self.check_capability(Capability::ImageAnalysis)?;
        Err(GatewayError::internal(format!(
            "{} declares image analysis but does not implement it",
            self.provider_name()
        )))
    }

    /// Check content against the provider's moderation policy
    async fn moderate_content(
        &self,
        _text: &str,
        _options: &GenerationOptions,
    ) -> GatewayResult<Envelope<ModerationResponse>> {
        match self.moderation_mode() {
            ModerationMode::Degraded => {
                self.check_initialized()?;
                Ok(Envelope::Success(degraded_moderation(
                    &self.model_info().model,
                    self.provider_name(),
                )))
            }
            ModerationMode::Unsupported => Err(GatewayError::unsupported(
                self.provider_name(),
                Capability::Moderation,
            )),
            ModerationMode::Native => Err(GatewayError::internal(format!(
                "{} declares native moderation but does not implement it",
                self.provider_name()
            ))),
        }
    }
}

/// Unflagged moderation envelope for providers without a moderation facility
#[must_use]
pub fn degraded_moderation(model: &str, provider: &str) -> ModerationResponse {
    let mut metadata = Metadata::new();
    metadata.insert(
        "note".to_string(),
        Value::from(format!("Content moderation is not supported by {provider}")),
    );

    ResponseFormatter::format_moderation_response(
        false,
        BTreeSet::new(),
        BTreeMap::new(),
        model,
        Some(metadata),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub {
        ready: bool,
        mode: ModerationMode,
    }

    #[async_trait]
    impl AIModel for Stub {
        fn provider_name(&self) -> &str {
            "stub"
        }

        fn initialize(&mut self, _config: &AdapterConfig) -> GatewayResult<()> {
            self.ready = true;
            Ok(())
        }

        fn is_initialized(&self) -> bool {
            self.ready
        }

        fn capabilities(&self) -> CapabilitySet {
            CapabilitySet::text_and_chat()
        }

        fn moderation_mode(&self) -> ModerationMode {
            self.mode
        }

        fn model_info(&self) -> ModelInfo {
            ModelInfo::new("Stub", "stub-1", "Test Model", self.capabilities())
        }

        async fn generate_text(
            &self,
            prompt: &str,
            _options: &GenerationOptions,
        ) -> GatewayResult<Envelope<TextResponse>> {
            self.check_initialized()?;
            Ok(Envelope::Success(ResponseFormatter::format_text_response(
                prompt, "stub-1", None, None,
            )))
        }

        async fn generate_chat_response(
            &self,
            _messages: &[ChatMessage],
            _options: &GenerationOptions,
        ) -> GatewayResult<Envelope<ChatResponse>> {
            Err(GatewayError::internal("not used"))
        }
    }

    #[tokio::test]
    async fn test_default_embed_is_capability_error() {
        let stub = Stub {
            ready: true,
            mode: ModerationMode::Unsupported,
        };

        let err = stub
            .embed_text("hello", &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::CapabilityUnsupported {
                capability: Capability::Embeddings,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_degraded_moderation_is_unflagged_with_note() {
        let stub = Stub {
            ready: true,
            mode: ModerationMode::Degraded,
        };

        let envelope = stub
            .moderate_content("anything", &GenerationOptions::default())
            .await
            .unwrap();
        let body = envelope.success().unwrap();

        assert!(!body.flagged);
        assert!(body.categories.is_empty());
        assert_eq!(
            body.metadata["note"],
            "Content moderation is not supported by stub"
        );
    }

    #[tokio::test]
    async fn test_not_initialized_before_initialize() {
        let mut stub = Stub {
            ready: false,
            mode: ModerationMode::Unsupported,
        };

        let err = stub
            .generate_text("hi", &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotInitialized { .. }));

        stub.initialize(&AdapterConfig::new()).unwrap();
        assert!(stub
            .generate_text("hi", &GenerationOptions::default())
            .await
            .unwrap()
            .is_success());
    }

    #[test]
    fn test_model_info_serializes_type_key() {
        let info = ModelInfo::new("OpenAI", "gpt-4", "Large Language Model", CapabilitySet::none())
            .with_detail("image_model", "dall-e-3");
        let json = serde_json::to_value(&info).unwrap();

        assert_eq!(json["type"], "Large Language Model");
        assert_eq!(json["details"]["image_model"], "dall-e-3");
    }
}
