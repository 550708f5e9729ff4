//! Llama 2 adapter served by the Hugging Face Inference API.
//!
//! Generation goes to `POST {base}/models/{model}`, embeddings to the
//! feature-extraction pipeline. The token is optional; public models can be
//! queried anonymously at a lower rate.

use crate::http;
use async_trait::async_trait;
use gateway_core::{
    AIModel, AdapterConfig, CapabilitySet, ChatMessage, ChatResponse, EmbeddingResponse, Envelope,
    GatewayError, GatewayResult, GenerationOptions, MessageRole, ModelInfo, ResponseFormatter,
    TextResponse,
};
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

const PROVIDER: &str = "llama";

/// Default Inference API base URL
pub const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co";
/// Default model repository
pub const DEFAULT_MODEL: &str = "meta-llama/Llama-2-7b-chat-hf";

const DEFAULT_TEMPERATURE: f64 = 0.7;
const DEFAULT_MAX_TOKENS: u64 = 512;

const CAPABILITIES: CapabilitySet = CapabilitySet {
    text_generation: true,
    chat: true,
    embeddings: true,
    image_analysis: false,
    moderation: false,
    image_generation: false,
};

struct HuggingFaceClient {
    http: Client,
    token: Option<SecretString>,
    base_url: String,
    model: String,
}

impl HuggingFaceClient {
    fn post(&self, url: String) -> RequestBuilder {
        let request = self.http.post(url);
        match &self.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }
}

/// Hugging Face hosted Llama 2 adapter
#[derive(Default)]
pub struct LlamaAdapter {
    client: Option<HuggingFaceClient>,
}

impl LlamaAdapter {
    /// Create an uninitialized adapter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self) -> GatewayResult<&HuggingFaceClient> {
        self.client
            .as_ref()
            .ok_or_else(|| GatewayError::not_initialized(PROVIDER))
    }

    /// Llama 2 chat template.
    ///
    /// System messages are folded into the first `[INST]` block inside
    /// `<<SYS>>` markers; every completed exchange is closed with `</s>`.
    fn chat_prompt(messages: &[ChatMessage]) -> String {
        let system = messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let mut pending_system = (!system.is_empty()).then_some(system);

        let mut prompt = String::from("<s>");
        for message in messages {
            match message.role {
                MessageRole::System => {}
                MessageRole::User => match pending_system.take() {
                    Some(system) => prompt.push_str(&format!(
                        "[INST] <<SYS>>\n{system}\n<</SYS>>\n\n{} [/INST]",
                        message.content
                    )),
                    None => prompt.push_str(&format!("[INST] {} [/INST]", message.content)),
                },
                MessageRole::Assistant => {
                    prompt.push_str(&format!(" {} </s><s>", message.content));
                }
            }
        }

        if let Some(system) = pending_system {
            prompt.push_str(&format!("[INST] <<SYS>>\n{system}\n<</SYS>>\n\n [/INST]"));
        }
        prompt
    }

    async fn generate(
        client: &HuggingFaceClient,
        inputs: String,
        options: &GenerationOptions,
    ) -> GatewayResult<String> {
        let options = options.or_defaults(DEFAULT_TEMPERATURE, DEFAULT_MAX_TOKENS);
        let request = GenerationRequest {
            inputs,
            parameters: GenerationParameters {
                max_new_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
                temperature: options.temperature,
                top_p: options.top_p,
                return_full_text: false,
            },
        };

        debug!(provider = PROVIDER, model = %client.model, "Sending text generation request");
        let reply: GenerationReply = http::execute(
            PROVIDER,
            client
                .post(format!("{}/models/{}", client.base_url, client.model))
                .json(&request),
        )
        .await?;

        reply
            .into_text()
            .map(|text| text.trim().to_string())
            .ok_or_else(|| GatewayError::provider(PROVIDER, "No generated text in response", None))
    }
}

/// Descend nested feature-extraction output to the first numeric row.
///
/// Depending on the model the pipeline returns a pooled vector, a
/// `[tokens][hidden]` matrix or a `[batch][tokens][hidden]` tensor; the first
/// row at the innermost level is the first-token hidden state.
fn first_token_vector(value: &Value) -> Option<Vec<f32>> {
    let mut row = value.as_array()?;
    loop {
        match row.first()? {
            Value::Array(inner) => row = inner,
            Value::Number(_) => {
                return row
                    .iter()
                    .map(|v| v.as_f64().map(|f| f as f32))
                    .collect();
            }
            _ => return None,
        }
    }
}

#[async_trait]
impl AIModel for LlamaAdapter {
    fn provider_name(&self) -> &str {
        PROVIDER
    }

    fn initialize(&mut self, config: &AdapterConfig) -> GatewayResult<()> {
        let client = HuggingFaceClient {
            http: http::build_client(config)?,
            token: config.secret("hf_token"),
            base_url: http::base_url(config, "base_url", DEFAULT_BASE_URL),
            model: config
                .get_str_any(&["model_name", "model"])
                .unwrap_or(DEFAULT_MODEL)
                .to_string(),
        };

        debug!(
            provider = PROVIDER,
            model = %client.model,
            authenticated = client.token.is_some(),
            "Initialized adapter"
        );
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
        ModelInfo::new("Hugging Face", model, "Large Language Model", CAPABILITIES)
    }

    async fn generate_text(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> GatewayResult<Envelope<TextResponse>> {
        let client = self.client()?;
        let inputs = Self::chat_prompt(&[ChatMessage::user(prompt)]);

        let result = Self::generate(client, inputs, options)
            .await
            .map(|text| {
                ResponseFormatter::format_text_response(text, client.model.as_str(), None, None)
            });

        Ok(Envelope::capture(&client.model, result))
    }

    async fn generate_chat_response(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> GatewayResult<Envelope<ChatResponse>> {
        let client = self.client()?;

        let result = Self::generate(client, Self::chat_prompt(messages), options)
            .await
            .map(|text| {
                ResponseFormatter::format_chat_response(
                    messages.to_vec(),
                    text,
                    client.model.as_str(),
                    None,
                    None,
                )
            });

        Ok(Envelope::capture(&client.model, result))
    }

    async fn embed_text(
        &self,
        text: &str,
        _options: &GenerationOptions,
    ) -> GatewayResult<Envelope<EmbeddingResponse>> {
        let client = self.client()?;
        debug!(provider = PROVIDER, model = %client.model, "Sending feature extraction request");

        let result = http::execute::<Value>(
            PROVIDER,
            client
                .post(format!(
                    "{}/pipeline/feature-extraction/{}",
                    client.base_url, client.model
                ))
                .json(&FeatureExtractionRequest { inputs: text }),
        )
        .await
        .and_then(|features| {
            let embedding = first_token_vector(&features).ok_or_else(|| {
                GatewayError::provider(PROVIDER, "Unexpected feature extraction output", None)
            })?;
            Ok(ResponseFormatter::format_embedding_response(
                embedding,
                client.model.as_str(),
                None,
            ))
        });

        Ok(Envelope::capture(&client.model, result))
    }
}

// Hugging Face Inference API Types

#[derive(Debug, Serialize)]
struct GenerationRequest {
    inputs: String,
    parameters: GenerationParameters,
}

#[derive(Debug, Serialize)]
struct GenerationParameters {
    max_new_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    return_full_text: bool,
}

#[derive(Debug, Deserialize)]
struct GeneratedText {
    generated_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GenerationReply {
    List(Vec<GeneratedText>),
    Single(GeneratedText),
}

impl GenerationReply {
    fn into_text(self) -> Option<String> {
        match self {
            Self::List(items) => items.into_iter().next().map(|item| item.generated_text),
            Self::Single(item) => Some(item.generated_text),
        }
    }
}

#[derive(Debug, Serialize)]
struct FeatureExtractionRequest<'a> {
    inputs: &'a str,
}
