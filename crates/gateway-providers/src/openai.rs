//! OpenAI provider adapter.
//!
//! Speaks the OpenAI REST API:
//! - `POST {base}/chat/completions` for text, chat and vision
//! - `POST {base}/embeddings`
//! - `POST {base}/moderations`

use crate::http;
use async_trait::async_trait;
use gateway_core::image::data_url;
use gateway_core::{
    AIModel, AdapterConfig, CapabilitySet, ChatMessage, ChatResponse,
    EmbeddingResponse, Envelope, GatewayError, GatewayResult, GenerationOptions,
    ImageAnalysisResponse, ModelInfo, ModerationResponse, ResponseFormatter, TextResponse, Usage,
};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

const PROVIDER: &str = "openai";

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// Default chat model
pub const DEFAULT_MODEL: &str = "gpt-4";
/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
/// Default vision model
pub const DEFAULT_VISION_MODEL: &str = "gpt-4-vision-preview";
/// Image generation model reported in model info
pub const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";

const DEFAULT_IMAGE_PROMPT: &str = "What's in this image?";
const IMAGE_ANALYSIS_MAX_TOKENS: u64 = 300;
const MODERATION_MODEL: &str = "text-moderation-latest";

const CAPABILITIES: CapabilitySet = CapabilitySet {
    text_generation: true,
    chat: true,
    embeddings: true,
    image_analysis: true,
    moderation: true,
    image_generation: true,
};

/// Resolved OpenAI settings plus the HTTP client
struct OpenAIClient {
    http: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    embedding_model: String,
    vision_model: String,
    image_model: String,
}

/// OpenAI adapter
#[derive(Default)]
pub struct OpenAIAdapter {
    client: Option<OpenAIClient>,
}

impl OpenAIAdapter {
    /// Create an uninitialized adapter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self) -> GatewayResult<&OpenAIClient> {
        self.client
            .as_ref()
            .ok_or_else(|| GatewayError::not_initialized(PROVIDER))
    }

    async fn chat_completion(
        client: &OpenAIClient,
        request: &OpenAIChatRequest<'_>,
    ) -> GatewayResult<OpenAIChatResponse> {
        debug!(provider = PROVIDER, model = %request.model, "Sending chat completion request");

        http::execute(
            PROVIDER,
            client
                .http
                .post(format!("{}/chat/completions", client.base_url))
                .bearer_auth(client.api_key.expose_secret())
                .json(request),
        )
        .await
    }

    fn transform_messages(messages: &[ChatMessage]) -> Vec<OpenAIMessage<'_>> {
        messages
            .iter()
            .map(|message| OpenAIMessage {
                role: message.role.as_str(),
                content: OpenAIContent::Text(&message.content),
            })
            .collect()
    }
}

#[async_trait]
impl AIModel for OpenAIAdapter {
    fn provider_name(&self) -> &str {
        PROVIDER
    }

    fn initialize(&mut self, config: &AdapterConfig) -> GatewayResult<()> {
        let api_key = config.require_secret("api_key")?;
        let client = OpenAIClient {
            http: http::build_client(config)?,
            api_key,
            base_url: http::base_url(config, "base_url", DEFAULT_BASE_URL),
            model: config
                .get_str_any(&["model", "model_name"])
                .unwrap_or(DEFAULT_MODEL)
                .to_string(),
            embedding_model: config
                .get_str("embedding_model")
                .unwrap_or(DEFAULT_EMBEDDING_MODEL)
                .to_string(),
            vision_model: config
                .get_str("vision_model")
                .unwrap_or(DEFAULT_VISION_MODEL)
                .to_string(),
            image_model: config
                .get_str("image_model")
                .unwrap_or(DEFAULT_IMAGE_MODEL)
                .to_string(),
        };

        debug!(provider = PROVIDER, model = %client.model, "Initialized adapter");
        self.client = Some(client);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.client.is_some()
    }

    fn capabilities(&self) -> CapabilitySet {
        CAPABILITIES
    }

    fn model_info(&self) -> ModelInfo {
        let (model, image_model) = self.client.as_ref().map_or(
            (DEFAULT_MODEL, DEFAULT_IMAGE_MODEL),
            |c| (c.model.as_str(), c.image_model.as_str()),
        );

        ModelInfo::new("OpenAI", model, "Large Language Model", CAPABILITIES)
            .with_detail("image_model", image_model)
    }

    async fn generate_text(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> GatewayResult<Envelope<TextResponse>> {
        let client = self.client()?;
        let request = OpenAIChatRequest {
            model: &client.model,
            messages: vec![OpenAIMessage {
                role: "user",
                content: OpenAIContent::Text(prompt),
            }],
            options: *options,
        };

        let result = Self::chat_completion(client, &request)
            .await
            .and_then(|response| {
                let (text, model, usage) = response.into_parts()?;
                Ok(ResponseFormatter::format_text_response(
                    text,
                    model.unwrap_or_else(|| client.model.clone()),
                    Some(usage),
                    None,
                ))
            });

        Ok(Envelope::capture(&client.model, result))
    }

    async fn generate_chat_response(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> GatewayResult<Envelope<ChatResponse>> {
        let client = self.client()?;
        let request = OpenAIChatRequest {
            model: &client.model,
            messages: Self::transform_messages(messages),
            options: *options,
        };

        let result = Self::chat_completion(client, &request)
            .await
            .and_then(|response| {
                let (text, model, usage) = response.into_parts()?;
                Ok(ResponseFormatter::format_chat_response(
                    messages.to_vec(),
                    text,
                    model.unwrap_or_else(|| client.model.clone()),
                    Some(usage),
                    None,
                ))
            });

        Ok(Envelope::capture(&client.model, result))
    }

    async fn embed_text(
        &self,
        text: &str,
        _options: &GenerationOptions,
    ) -> GatewayResult<Envelope<EmbeddingResponse>> {
        let client = self.client()?;
        debug!(provider = PROVIDER, model = %client.embedding_model, "Sending embedding request");

        let result = http::execute::<OpenAIEmbeddingResponse>(
            PROVIDER,
            client
                .http
                .post(format!("{}/embeddings", client.base_url))
                .bearer_auth(client.api_key.expose_secret())
                .json(&OpenAIEmbeddingRequest {
                    model: &client.embedding_model,
                    input: text,
                }),
        )
        .await
        .and_then(|response| {
            let data = response.data.into_iter().next().ok_or_else(|| {
                GatewayError::provider(PROVIDER, "No embedding in response", None)
            })?;
            Ok(ResponseFormatter::format_embedding_response(
                data.embedding,
                response.model.unwrap_or_else(|| client.embedding_model.clone()),
                None,
            ))
        });

        Ok(Envelope::capture(&client.embedding_model, result))
    }

    async fn analyze_image(
        &self,
        image: &[u8],
        prompt: Option<&str>,
        options: &GenerationOptions,
    ) -> GatewayResult<Envelope<ImageAnalysisResponse>> {
        let client = self.client()?;
        let url = data_url(image);
        let mut options = *options;
        options.max_tokens.get_or_insert(IMAGE_ANALYSIS_MAX_TOKENS);

        let request = OpenAIChatRequest {
            model: &client.vision_model,
            messages: vec![OpenAIMessage {
                role: "user",
                content: OpenAIContent::Parts(vec![
                    OpenAIContentPart::Text {
                        text: prompt.unwrap_or(DEFAULT_IMAGE_PROMPT),
                    },
                    OpenAIContentPart::ImageUrl {
                        image_url: OpenAIImageUrl { url: &url },
                    },
                ]),
            }],
            options,
        };

        let result = Self::chat_completion(client, &request)
            .await
            .and_then(|response| {
                let (text, model, _) = response.into_parts()?;
                Ok(ResponseFormatter::format_image_analysis_response(
                    text,
                    model.unwrap_or_else(|| client.vision_model.clone()),
                    None,
                    None,
                ))
            });

        Ok(Envelope::capture(&client.vision_model, result))
    }

    async fn moderate_content(
        &self,
        text: &str,
        _options: &GenerationOptions,
    ) -> GatewayResult<Envelope<ModerationResponse>> {
        let client = self.client()?;
        debug!(provider = PROVIDER, "Sending moderation request");

        let result = http::execute::<OpenAIModerationResponse>(
            PROVIDER,
            client
                .http
                .post(format!("{}/moderations", client.base_url))
                .bearer_auth(client.api_key.expose_secret())
                .json(&OpenAIModerationRequest { input: text }),
        )
        .await
        .and_then(|response| {
            let model = response.model;
            let verdict = response.results.into_iter().next().ok_or_else(|| {
                GatewayError::provider(PROVIDER, "No moderation result in response", None)
            })?;
            let categories: BTreeSet<String> = verdict
                .categories
                .into_iter()
                .filter_map(|(name, hit)| hit.then_some(name))
                .collect();

            Ok(ResponseFormatter::format_moderation_response(
                verdict.flagged,
                categories,
                verdict.category_scores,
                model.unwrap_or_else(|| MODERATION_MODEL.to_string()),
                None,
            ))
        });

        Ok(Envelope::capture(MODERATION_MODEL, result))
    }
}

impl OpenAIChatResponse {
    /// First choice text, reported model, usage
    fn into_parts(self) -> GatewayResult<(String, Option<String>, Usage)> {
        let choice = self.choices.into_iter().next().ok_or_else(|| {
            GatewayError::provider(PROVIDER, "No choices in response", None)
        })?;
        let usage = ResponseFormatter::usage_from_json(self.usage.as_ref());

        Ok((choice.message.content.unwrap_or_default(), self.model, usage))
    }
}

// OpenAI API Types

#[derive(Debug, Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
    #[serde(flatten)]
    options: GenerationOptions,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage<'a> {
    role: &'a str,
    content: OpenAIContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum OpenAIContent<'a> {
    Text(&'a str),
    Parts(Vec<OpenAIContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OpenAIContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: OpenAIImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct OpenAIImageUrl<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAIChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct OpenAIEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct OpenAIModerationRequest<'a> {
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAIModerationResponse {
    #[serde(default)]
    model: Option<String>,
    results: Vec<OpenAIModerationResult>,
}

#[derive(Debug, Deserialize)]
struct OpenAIModerationResult {
    flagged: bool,
    #[serde(default)]
    categories: BTreeMap<String, bool>,
    #[serde(default)]
    category_scores: BTreeMap<String, f64>,
}
