//! Anthropic Claude provider adapter.
//!
//! Uses the Messages API (`POST {base}/messages`). Claude has no embedding
//! endpoint and no moderation endpoint; moderation is done by prompting the
//! model for a JSON verdict which is parsed structurally.

use crate::http;
use async_trait::async_trait;
use gateway_core::image::{encode_base64, sniff_media_type};
use gateway_core::{
    AIModel, AdapterConfig, CapabilitySet, ChatMessage, ChatResponse, Envelope, GatewayError,
    GatewayResult, GenerationOptions, ImageAnalysisResponse, MessageRole, Metadata, ModelInfo,
    ModerationResponse, ResponseFormatter, TextResponse, Usage,
};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

const PROVIDER: &str = "claude";

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
/// Default model
pub const DEFAULT_MODEL: &str = "claude-3-opus-20240229";
/// Anthropic API version header value
pub const API_VERSION: &str = "2023-06-01";

const DEFAULT_TEMPERATURE: f64 = 0.7;
const DEFAULT_MAX_TOKENS: u64 = 1024;
const DEFAULT_IMAGE_PROMPT: &str = "Please describe this image in detail.";

const MODERATION_PROMPT: &str = "Analyze the following content for policy violations \
such as hate speech, explicit content, violence or harassment. Respond with only a JSON \
object with the keys \"is_flagged\" (boolean), \"categories\" (list of violated category \
names) and \"explanation\" (short string).\n\nContent to analyze: ";

const CAPABILITIES: CapabilitySet = CapabilitySet {
    text_generation: true,
    chat: true,
    embeddings: false,
    image_analysis: true,
    moderation: true,
    image_generation: false,
};

struct ClaudeClient {
    http: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

/// Anthropic Claude adapter
#[derive(Default)]
pub struct ClaudeAdapter {
    client: Option<ClaudeClient>,
}

impl ClaudeAdapter {
    /// Create an uninitialized adapter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self) -> GatewayResult<&ClaudeClient> {
        self.client
            .as_ref()
            .ok_or_else(|| GatewayError::not_initialized(PROVIDER))
    }

    async fn send(client: &ClaudeClient, request: &ClaudeRequest) -> GatewayResult<ClaudeResponse> {
        debug!(provider = PROVIDER, model = %request.model, "Sending messages request");

        http::execute(
            PROVIDER,
            client
                .http
                .post(format!("{}/messages", client.base_url))
                .header("x-api-key", client.api_key.expose_secret().as_str())
                .header("anthropic-version", API_VERSION)
                .json(request),
        )
        .await
    }

    fn build_request(
        client: &ClaudeClient,
        system: Option<String>,
        messages: Vec<ClaudeMessage>,
        options: &GenerationOptions,
    ) -> ClaudeRequest {
        let options = options.or_defaults(DEFAULT_TEMPERATURE, DEFAULT_MAX_TOKENS);

        ClaudeRequest {
            model: client.model.clone(),
            max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: options.temperature,
            top_p: options.top_p,
            system,
            messages,
        }
    }

    /// System messages go to the `system` field; consecutive turns from the
    /// same role are merged since the API requires alternation.
    fn transform_messages(messages: &[ChatMessage]) -> (Option<String>, Vec<ClaudeMessage>) {
        let mut system: Vec<&str> = Vec::new();
        let mut turns: Vec<ClaudeMessage> = Vec::new();

        for message in messages {
            let role = match message.role {
                MessageRole::System => {
                    system.push(&message.content);
                    continue;
                }
                MessageRole::User => "user",
                MessageRole::Assistant => "assistant",
            };

            let same_role = turns.last().is_some_and(|last| last.role == role);
            match turns.last_mut() {
                Some(ClaudeMessage {
                    content: ClaudeContent::Text(text),
                    ..
                }) if same_role => {
                    text.push_str("\n\n");
                    text.push_str(&message.content);
                }
                _ => turns.push(ClaudeMessage::text(role, message.content.clone())),
            }
        }

        let system = (!system.is_empty()).then(|| system.join("\n\n"));
        (system, turns)
    }

    /// Extract the JSON object from a moderation reply and parse it
    fn parse_verdict(text: &str) -> GatewayResult<ClaudeVerdict> {
        let object = match (text.find('{'), text.rfind('}')) {
            (Some(start), Some(end)) if start < end => &text[start..=end],
            _ => {
                return Err(GatewayError::provider(
                    PROVIDER,
                    "Moderation reply contained no JSON object",
                    None,
                ))
            }
        };

        serde_json::from_str(object).map_err(|e| {
            warn!(provider = PROVIDER, error = %e, "Unparseable moderation verdict");
            GatewayError::provider(PROVIDER, format!("Unparseable moderation verdict: {e}"), None)
        })
    }
}

#[async_trait]
impl AIModel for ClaudeAdapter {
    fn provider_name(&self) -> &str {
        PROVIDER
    }

    fn initialize(&mut self, config: &AdapterConfig) -> GatewayResult<()> {
        let api_key = config.require_secret("api_key")?;
        let client = ClaudeClient {
            http: http::build_client(config)?,
            api_key,
            base_url: http::base_url(config, "base_url", DEFAULT_BASE_URL),
            model: config
                .get_str_any(&["model_name", "model"])
                .unwrap_or(DEFAULT_MODEL)
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
        let model = self
            .client
            .as_ref()
            .map_or(DEFAULT_MODEL, |c| c.model.as_str());
        ModelInfo::new("Anthropic", model, "Large Language Model", CAPABILITIES)
    }

    async fn generate_text(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> GatewayResult<Envelope<TextResponse>> {
        let client = self.client()?;
        let request = Self::build_request(
            client,
            None,
            vec![ClaudeMessage::text("user", prompt.to_string())],
            options,
        );

        let result = Self::send(client, &request).await.and_then(|response| {
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
        let (system, turns) = Self::transform_messages(messages);
        let request = Self::build_request(client, system, turns, options);

        let result = Self::send(client, &request).await.and_then(|response| {
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

    async fn analyze_image(
        &self,
        image: &[u8],
        prompt: Option<&str>,
        options: &GenerationOptions,
    ) -> GatewayResult<Envelope<ImageAnalysisResponse>> {
        let client = self.client()?;
        let content = ClaudeContent::Blocks(vec![
            ClaudeBlock::Image {
                source: ClaudeImageSource {
                    source_type: "base64",
                    media_type: sniff_media_type(image),
                    data: encode_base64(image),
                },
            },
            ClaudeBlock::Text {
                text: prompt.unwrap_or(DEFAULT_IMAGE_PROMPT).to_string(),
            },
        ]);
        let request = Self::build_request(
            client,
            None,
            vec![ClaudeMessage {
                role: "user",
                content,
            }],
            options,
        );

        let result = Self::send(client, &request).await.and_then(|response| {
            let (text, model, _) = response.into_parts()?;
            Ok(ResponseFormatter::format_image_analysis_response(
                text,
                model.unwrap_or_else(|| client.model.clone()),
                None,
                None,
            ))
        });

        Ok(Envelope::capture(&client.model, result))
    }

    async fn moderate_content(
        &self,
        text: &str,
        _options: &GenerationOptions,
    ) -> GatewayResult<Envelope<ModerationResponse>> {
        let client = self.client()?;
        let options = GenerationOptions::default()
            .with_temperature(0.0)
            .with_max_tokens(DEFAULT_MAX_TOKENS);
        let request = Self::build_request(
            client,
            None,
            vec![ClaudeMessage::text("user", format!("{MODERATION_PROMPT}{text}"))],
            &options,
        );

        let result = Self::send(client, &request).await.and_then(|response| {
            let (reply, model, _) = response.into_parts()?;
            let verdict = Self::parse_verdict(&reply)?;

            let mut metadata = Metadata::new();
            if let Some(explanation) = verdict.explanation {
                metadata.insert("explanation".to_string(), explanation.into());
            }

            Ok(ResponseFormatter::format_moderation_response(
                verdict.is_flagged,
                verdict.categories.into_iter().collect(),
                BTreeMap::new(),
                model.unwrap_or_else(|| client.model.clone()),
                Some(metadata),
            ))
        });

        Ok(Envelope::capture(&client.model, result))
    }
}

impl ClaudeResponse {
    fn into_parts(self) -> GatewayResult<(String, Option<String>, Usage)> {
        let text = self
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");
        if text.is_empty() {
            return Err(GatewayError::provider(PROVIDER, "No text content in response", None));
        }

        Ok((text, self.model, ResponseFormatter::usage_from_json(self.usage.as_ref())))
    }
}

// Anthropic API Types

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ClaudeMessage>,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage {
    role: &'static str,
    content: ClaudeContent,
}

impl ClaudeMessage {
    fn text(role: &'static str, text: String) -> Self {
        Self {
            role,
            content: ClaudeContent::Text(text),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ClaudeContent {
    Text(String),
    Blocks(Vec<ClaudeBlock>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ClaudeBlock {
    Text { text: String },
    Image { source: ClaudeImageSource },
}

#[derive(Debug, Serialize)]
struct ClaudeImageSource {
    #[serde(rename = "type")]
    source_type: &'static str,
    media_type: &'static str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeResponseBlock>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponseBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClaudeVerdict {
    is_flagged: bool,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    explanation: Option<String>,
}
