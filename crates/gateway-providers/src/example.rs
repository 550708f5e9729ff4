//! Minimal network-free adapter.
//!
//! Echoes its input and derives embeddings from character buckets. Useful as a
//! template for new adapters and for running the gateway without credentials.

use async_trait::async_trait;
use gateway_core::{
    AIModel, AdapterConfig, CapabilitySet, ChatMessage, ChatResponse, EmbeddingResponse, Envelope,
    GatewayError, GatewayResult, GenerationOptions, ModelInfo, ResponseFormatter,
    TextResponse, Usage,
};
use tracing::debug;

const PROVIDER: &str = "example";

/// Model name when none is configured
pub const DEFAULT_MODEL: &str = "default-model";
/// Embedding width when none is configured
pub const DEFAULT_DIMENSIONS: usize = 8;

const CAPABILITIES: CapabilitySet = CapabilitySet {
    text_generation: true,
    chat: true,
    embeddings: true,
    image_analysis: false,
    moderation: false,
    image_generation: false,
};

struct ExampleSettings {
    model: String,
    dimensions: usize,
}

/// Example adapter
#[derive(Default)]
pub struct ExampleAdapter {
    settings: Option<ExampleSettings>,
}

impl ExampleAdapter {
    /// Create an uninitialized adapter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn settings(&self) -> GatewayResult<&ExampleSettings> {
        self.settings
            .as_ref()
            .ok_or_else(|| GatewayError::not_initialized(PROVIDER))
    }

    fn usage(input: &str, output: &str) -> Usage {
        let prompt_tokens = input.split_whitespace().count() as u64;
        let completion_tokens = output.split_whitespace().count() as u64;
        Usage::from([
            ("prompt_tokens".to_string(), prompt_tokens),
            ("completion_tokens".to_string(), completion_tokens),
            ("total_tokens".to_string(), prompt_tokens + completion_tokens),
        ])
    }
}

/// Unit-length vector of per-bucket character counts
fn bucket_embedding(text: &str, dimensions: usize) -> Vec<f32> {
    let mut embedding = vec![0.0_f32; dimensions];
    for c in text.chars() {
        embedding[c as usize % dimensions] += 1.0;
    }

    let norm = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut embedding {
            *value /= norm;
        }
    } else {
        embedding[0] = 1.0;
    }
    embedding
}

#[async_trait]
impl AIModel for ExampleAdapter {
    fn provider_name(&self) -> &str {
        PROVIDER
    }

    fn initialize(&mut self, config: &AdapterConfig) -> GatewayResult<()> {
        let dimensions = match config.get_u64("dimensions")? {
            Some(0) => {
                return Err(GatewayError::configuration(
                    "dimensions",
                    "dimensions must be at least 1",
                ))
            }
            Some(n) => n as usize,
            None => DEFAULT_DIMENSIONS,
        };

        let settings = ExampleSettings {
            model: config
                .get_str_any(&["model_name", "model"])
                .unwrap_or(DEFAULT_MODEL)
                .to_string(),
            dimensions,
        };

        debug!(provider = PROVIDER, model = %settings.model, "Initialized adapter");
        self.settings = Some(settings);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.settings.is_some()
    }

    fn capabilities(&self) -> CapabilitySet {
        CAPABILITIES
    }

    fn model_info(&self) -> ModelInfo {
        let (model, dimensions) = self
            .settings
            .as_ref()
            .map_or((DEFAULT_MODEL, DEFAULT_DIMENSIONS), |s| {
                (s.model.as_str(), s.dimensions)
            });
        ModelInfo::new("Example", model, "Example Model", CAPABILITIES)
            .with_detail("dimensions", dimensions)
    }

    async fn generate_text(
        &self,
        prompt: &str,
        _options: &GenerationOptions,
    ) -> GatewayResult<Envelope<TextResponse>> {
        let settings = self.settings()?;
        let text = format!("Example response to: {prompt}");
        let usage = Self::usage(prompt, &text);

        Ok(Envelope::Success(ResponseFormatter::format_text_response(
            text,
            settings.model.as_str(),
            Some(usage),
            None,
        )))
    }

    async fn generate_chat_response(
        &self,
        messages: &[ChatMessage],
        _options: &GenerationOptions,
    ) -> GatewayResult<Envelope<ChatResponse>> {
        let settings = self.settings()?;
        let last = messages.last().map_or("", |m| m.content.as_str());
        let response = format!("Example response to: {last}");
        let usage = Self::usage(last, &response);

        Ok(Envelope::Success(ResponseFormatter::format_chat_response(
            messages.to_vec(),
            response,
            settings.model.as_str(),
            Some(usage),
            None,
        )))
    }

    async fn embed_text(
        &self,
        text: &str,
        _options: &GenerationOptions,
    ) -> GatewayResult<Envelope<EmbeddingResponse>> {
        let settings = self.settings()?;

        Ok(Envelope::Success(
            ResponseFormatter::format_embedding_response(
                bucket_embedding(text, settings.dimensions),
                settings.model.as_str(),
                None,
            ),
        ))
    }
}
