//! Google Gemini provider adapter.
//!
//! Uses the Google AI Studio API:
//! - `POST {base}/models/{model}:generateContent` for text, chat and vision
//! - `POST {base}/models/{model}:embedContent`
//!
//! Gemini has no moderation endpoint; moderation degrades to an unflagged
//! envelope with an explanatory note.

use crate::http;
use async_trait::async_trait;
use gateway_core::image::{encode_base64, sniff_media_type};
use gateway_core::{
    degraded_moderation, AIModel, AdapterConfig, CapabilitySet, ChatMessage, ChatResponse,
    EmbeddingResponse, Envelope, GatewayError, GatewayResult, GenerationOptions,
    ImageAnalysisResponse, MessageRole, ModelInfo, ModerationMode, ModerationResponse,
    ResponseFormatter, TextResponse, Usage,
};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

const PROVIDER: &str = "gemini";

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Default text model
pub const DEFAULT_MODEL: &str = "gemini-pro";
/// Default vision model
pub const DEFAULT_VISION_MODEL: &str = "gemini-pro-vision";
/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "embedding-001";

/// Header carrying the API key; kept out of the URL so it never shows up in errors
const API_KEY_HEADER: &str = "x-goog-api-key";

const DEFAULT_IMAGE_PROMPT: &str = "What's in this image?";

const CAPABILITIES: CapabilitySet = CapabilitySet {
    text_generation: true,
    chat: true,
    embeddings: true,
    image_analysis: true,
    moderation: false,
    image_generation: false,
};

struct GeminiClient {
    http: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    vision_model: String,
    embedding_model: String,
}

impl GeminiClient {
    fn endpoint_url(&self, model: &str, action: &str) -> String {
        format!("{}/models/{model}:{action}", self.base_url)
    }
}

/// Google Gemini adapter
#[derive(Default)]
pub struct GeminiAdapter {
    client: Option<GeminiClient>,
}

impl GeminiAdapter {
    /// Create an uninitialized adapter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self) -> GatewayResult<&GeminiClient> {
        self.client
            .as_ref()
            .ok_or_else(|| GatewayError::not_initialized(PROVIDER))
    }

    async fn generate_content(
        client: &GeminiClient,
        model: &str,
        request: &GeminiRequest,
    ) -> GatewayResult<GeminiResponse> {
        debug!(provider = PROVIDER, model = %model, "Sending generateContent request");

        http::execute(
            PROVIDER,
            client
                .http
                .post(client.endpoint_url(model, "generateContent"))
                .header(API_KEY_HEADER, client.api_key.expose_secret().as_str())
                .json(request),
        )
        .await
    }

    fn generation_config(options: &GenerationOptions) -> Option<GeminiGenerationConfig> {
        (!options.is_empty()).then(|| GeminiGenerationConfig {
            temperature: options.temperature,
            top_p: options.top_p,
            max_output_tokens: options.max_tokens,
            frequency_penalty: options.frequency_penalty,
            presence_penalty: options.presence_penalty,
        })
    }

    /// System turns become `systemInstruction`; assistant turns use the
    /// `model` role.
    fn transform_messages(messages: &[ChatMessage]) -> (Option<GeminiContent>, Vec<GeminiContent>) {
        let mut system: Vec<&str> = Vec::new();
        let mut contents = Vec::with_capacity(messages.len());

        for message in messages {
            let role = match message.role {
                MessageRole::System => {
                    system.push(&message.content);
                    continue;
                }
                MessageRole::User => "user",
                MessageRole::Assistant => "model",
            };
            contents.push(GeminiContent::text(Some(role), &message.content));
        }

        let system_instruction =
            (!system.is_empty()).then(|| GeminiContent::text(None, &system.join("\n\n")));
        (system_instruction, contents)
    }
}

#[async_trait]
impl AIModel for GeminiAdapter {
    fn provider_name(&self) -> &str {
        PROVIDER
    }

    fn initialize(&mut self, config: &AdapterConfig) -> GatewayResult<()> {
        let api_key = config.require_secret("api_key")?;
        let client = GeminiClient {
            http: http::build_client(config)?,
            api_key,
            base_url: http::base_url(config, "base_url", DEFAULT_BASE_URL),
            model: config
                .get_str_any(&["model", "model_name"])
                .unwrap_or(DEFAULT_MODEL)
                .to_string(),
            vision_model: config
                .get_str("vision_model")
                .unwrap_or(DEFAULT_VISION_MODEL)
                .to_string(),
            embedding_model: config
                .get_str("embedding_model")
                .unwrap_or(DEFAULT_EMBEDDING_MODEL)
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

    fn moderation_mode(&self) -> ModerationMode {
        ModerationMode::Degraded
    }

    fn model_info(&self) -> ModelInfo {
        let model = self
            .client
            .as_ref()
            .map_or(DEFAULT_MODEL, |c| c.model.as_str());
        ModelInfo::new("Google", model, "Large Language Model", CAPABILITIES)
    }

    async fn generate_text(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> GatewayResult<Envelope<TextResponse>> {
        let client = self.client()?;
        let request = GeminiRequest {
            contents: vec![GeminiContent::text(Some("user"), prompt)],
            system_instruction: None,
            generation_config: Self::generation_config(options),
        };

        let result = Self::generate_content(client, &client.model, &request)
            .await
            .and_then(|response| {
                let (text, usage) = response.into_parts()?;
                Ok(ResponseFormatter::format_text_response(
                    text,
                    client.model.as_str(),
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
        let (system_instruction, contents) = Self::transform_messages(messages);
        let request = GeminiRequest {
            contents,
            system_instruction,
            generation_config: Self::generation_config(options),
        };

        let result = Self::generate_content(client, &client.model, &request)
            .await
            .and_then(|response| {
                let (text, usage) = response.into_parts()?;
                Ok(ResponseFormatter::format_chat_response(
                    messages.to_vec(),
                    text,
                    client.model.as_str(),
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
        let model = &client.embedding_model;
        debug!(provider = PROVIDER, model = %model, "Sending embedContent request");

        let result = http::execute::<GeminiEmbedResponse>(
            PROVIDER,
            client
                .http
                .post(client.endpoint_url(model, "embedContent"))
                .header(API_KEY_HEADER, client.api_key.expose_secret().as_str())
                .json(&GeminiEmbedRequest {
                    model: format!("models/{model}"),
                    content: GeminiContent::text(None, text),
                }),
        )
        .await
        .map(|response| {
            ResponseFormatter::format_embedding_response(
                response.embedding.values,
                model.as_str(),
                None,
            )
        });

        Ok(Envelope::capture(model, result))
    }

    async fn analyze_image(
        &self,
        image: &[u8],
        prompt: Option<&str>,
        options: &GenerationOptions,
    ) -> GatewayResult<Envelope<ImageAnalysisResponse>> {
        let client = self.client()?;
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user"),
                parts: vec![
                    GeminiPart::Text {
                        text: prompt.unwrap_or(DEFAULT_IMAGE_PROMPT).to_string(),
                    },
                    GeminiPart::InlineData {
                        inline_data: GeminiInlineData {
                            mime_type: sniff_media_type(image),
                            data: encode_base64(image),
                        },
                    },
                ],
            }],
            system_instruction: None,
            generation_config: Self::generation_config(options),
        };

        let result = Self::generate_content(client, &client.vision_model, &request)
            .await
            .and_then(|response| {
                let (text, _) = response.into_parts()?;
                Ok(ResponseFormatter::format_image_analysis_response(
                    text,
                    client.vision_model.as_str(),
                    None,
                    None,
                ))
            });

        Ok(Envelope::capture(&client.vision_model, result))
    }

    async fn moderate_content(
        &self,
        _text: &str,
        _options: &GenerationOptions,
    ) -> GatewayResult<Envelope<ModerationResponse>> {
        let client = self.client()?;
        Ok(Envelope::Success(degraded_moderation(&client.model, "Gemini")))
    }
}

impl GeminiResponse {
    fn into_parts(self) -> GatewayResult<(String, Usage)> {
        let candidate = self.candidates.into_iter().next().ok_or_else(|| {
            GatewayError::provider(PROVIDER, "No candidates in response", None)
        })?;

        let text = candidate
            .content
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect::<Vec<_>>()
            .join("");

        let usage = self
            .usage_metadata
            .map(|u| {
                [
                    ("prompt_tokens", u.prompt_token_count),
                    ("completion_tokens", u.candidates_token_count),
                    ("total_tokens", u.total_token_count),
                ]
                .into_iter()
                .filter_map(|(key, count)| count.map(|count| (key.to_string(), count)))
                .collect()
            })
            .unwrap_or_default();

        Ok((text, usage))
    }
}

// Google API Types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart>,
}

impl GeminiContent {
    fn text(role: Option<&'static str>, text: &str) -> Self {
        Self {
            role,
            parts: vec![GeminiPart::Text {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiResponseContent,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: Option<u64>,
    #[serde(default)]
    candidates_token_count: Option<u64>,
    #[serde(default)]
    total_token_count: Option<u64>,
}

#[derive(Debug, Serialize)]
struct GeminiEmbedRequest {
    model: String,
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
struct GeminiEmbedResponse {
    embedding: GeminiEmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct GeminiEmbeddingValues {
    values: Vec<f32>,
}
