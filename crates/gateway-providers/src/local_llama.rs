//! Local Llama adapter backed by a llama.cpp inference server.
//!
//! The model file must exist on disk; the engine serving it is reached over
//! HTTP (`POST {server}/completion`, `POST {server}/embedding`). The context
//! size caps `n_predict` on every completion. GPU-layer offload and memory
//! locking are fixed when the engine loads the model, so they are recorded here
//! and reported through `model_info` only.

use crate::http;
use async_trait::async_trait;
use gateway_core::{
    AIModel, AdapterConfig, CapabilitySet, ChatMessage, ChatResponse, EmbeddingResponse, Envelope,
    GatewayError, GatewayResult, GenerationOptions, MessageRole, ModelInfo, ResponseFormatter,
    TextResponse, Usage,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const PROVIDER: &str = "local_llama";

/// Default llama.cpp server address
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";
/// Default context window
pub const DEFAULT_CONTEXT_SIZE: u64 = 2048;

const DEFAULT_TEMPERATURE: f64 = 0.7;
const DEFAULT_MAX_TOKENS: u64 = 1024;
const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

const CAPABILITIES: CapabilitySet = CapabilitySet {
    text_generation: true,
    chat: true,
    embeddings: true,
    image_analysis: false,
    moderation: false,
    image_generation: false,
};

struct LlamaCppClient {
    http: Client,
    server_url: String,
    model_path: PathBuf,
    model: String,
    context_size: u64,
    n_gpu_layers: i64,
    use_mlock: bool,
}

/// Local Llama (llama.cpp) adapter
#[derive(Default)]
pub struct LocalLlamaAdapter {
    client: Option<LlamaCppClient>,
}

impl LocalLlamaAdapter {
    /// Create an uninitialized adapter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self) -> GatewayResult<&LlamaCppClient> {
        self.client
            .as_ref()
            .ok_or_else(|| GatewayError::not_initialized(PROVIDER))
    }

    /// Role-prefixed single-turn prompt
    fn text_prompt(prompt: &str) -> String {
        format!("system: {DEFAULT_SYSTEM_PROMPT}\nuser: {prompt}\n")
    }

    /// `### Role:` chat template ending in an open assistant turn
    fn chat_prompt(messages: &[ChatMessage]) -> String {
        let mut prompt = String::new();
        for message in messages {
            let header = match message.role {
                MessageRole::System => "System",
                MessageRole::User => "User",
                MessageRole::Assistant => "Assistant",
            };
            prompt.push_str(&format!("### {header}:\n{}\n\n", message.content));
        }
        prompt.push_str("### Assistant:\n");
        prompt
    }

    async fn complete(
        client: &LlamaCppClient,
        prompt: String,
        options: &GenerationOptions,
    ) -> GatewayResult<(String, Usage)> {
        let options = options.or_defaults(DEFAULT_TEMPERATURE, DEFAULT_MAX_TOKENS);
        let request = CompletionRequest {
            prompt,
            // A prediction can never outgrow the model's context window
            n_predict: options
                .max_tokens
                .unwrap_or(DEFAULT_MAX_TOKENS)
                .min(client.context_size),
            temperature: options.temperature,
            top_p: options.top_p,
            frequency_penalty: options.frequency_penalty,
            presence_penalty: options.presence_penalty,
            stream: false,
        };

        debug!(provider = PROVIDER, model = %client.model, "Sending completion request");
        let response: CompletionResponse = http::execute(
            PROVIDER,
            client
                .http
                .post(format!("{}/completion", client.server_url))
                .json(&request),
        )
        .await?;

        let mut usage = Usage::new();
        if let Some(prompt_tokens) = response.tokens_evaluated {
            usage.insert("prompt_tokens".to_string(), prompt_tokens);
        }
        if let Some(completion_tokens) = response.tokens_predicted {
            usage.insert("completion_tokens".to_string(), completion_tokens);
        }

        Ok((response.content, usage))
    }
}

fn model_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}

#[async_trait]
impl AIModel for LocalLlamaAdapter {
    fn provider_name(&self) -> &str {
        PROVIDER
    }

    fn initialize(&mut self, config: &AdapterConfig) -> GatewayResult<()> {
        let model_path = PathBuf::from(config.require_str("model_path")?);
        if !model_path.exists() {
            return Err(GatewayError::configuration(
                "model_path",
                format!("Model path not found: {}", model_path.display()),
            ));
        }

        let context_size = match config.get_u64("context_size")? {
            Some(size) => size,
            None => config.get_u64("n_ctx")?.unwrap_or(DEFAULT_CONTEXT_SIZE),
        };

        let client = LlamaCppClient {
            http: http::build_client(config)?,
            server_url: http::base_url(config, "server_url", DEFAULT_SERVER_URL),
            model: model_name(&model_path),
            model_path,
            context_size,
            n_gpu_layers: config.get_i64("n_gpu_layers")?.unwrap_or(0),
            use_mlock: config.get_bool("use_mlock")?.unwrap_or(false),
        };

        info!(
            provider = PROVIDER,
            model_path = %client.model_path.display(),
            context_size = client.context_size,
            server_url = %client.server_url,
            "Initialized local Llama adapter"
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
        match &self.client {
            Some(client) => ModelInfo::new(
                "Local Llama (llama.cpp)",
                client.model_path.display().to_string(),
                "Local Large Language Model",
                CAPABILITIES,
            )
            .with_detail("context_size", client.context_size)
            .with_detail("n_gpu_layers", client.n_gpu_layers)
            .with_detail("use_mlock", client.use_mlock),
            None => ModelInfo::new(
                "Local Llama (llama.cpp)",
                "uninitialized",
                "Local Large Language Model",
                CAPABILITIES,
            ),
        }
    }

    async fn generate_text(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> GatewayResult<Envelope<TextResponse>> {
        let client = self.client()?;
        let result = Self::complete(client, Self::text_prompt(prompt), options)
            .await
            .map(|(text, usage)| {
                ResponseFormatter::format_text_response(text, client.model.as_str(), Some(usage), None)
            });

        Ok(Envelope::capture(&client.model, result))
    }

    async fn generate_chat_response(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> GatewayResult<Envelope<ChatResponse>> {
        let client = self.client()?;
        let result = Self::complete(client, Self::chat_prompt(messages), options)
            .await
            .map(|(text, usage)| {
                ResponseFormatter::format_chat_response(
                    messages.to_vec(),
                    text.trim(),
                    client.model.as_str(),
                    Some(usage),
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
        debug!(provider = PROVIDER, model = %client.model, "Sending embedding request");

        let result = http::execute::<EmbeddingReply>(
            PROVIDER,
            client
                .http
                .post(format!("{}/embedding", client.server_url))
                .json(&EmbeddingRequest { content: text }),
        )
        .await
        .and_then(|reply| {
            let embedding = reply.into_vector().ok_or_else(|| {
                GatewayError::provider(PROVIDER, "No embedding in response", None)
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

// llama.cpp server types

#[derive(Debug, Serialize)]
struct CompletionRequest {
    prompt: String,
    n_predict: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f64>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    content: String,
    #[serde(default)]
    tokens_predicted: Option<u64>,
    #[serde(default)]
    tokens_evaluated: Option<u64>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    content: &'a str,
}

/// Older servers answer with one flat vector, newer ones with a list of
/// per-input results holding per-token vectors.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EmbeddingReply {
    Flat { embedding: Vec<f32> },
    Batched(Vec<BatchedEmbedding>),
}

#[derive(Debug, Deserialize)]
struct BatchedEmbedding {
    embedding: Vec<Vec<f32>>,
}

impl EmbeddingReply {
    fn into_vector(self) -> Option<Vec<f32>> {
        match self {
            Self::Flat { embedding } => Some(embedding),
            Self::Batched(results) => results
                .into_iter()
                .next()
                .and_then(|result| result.embedding.into_iter().next()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::Capability;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn model_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"GGUF").unwrap();
        file
    }

    fn adapter_for(server: &MockServer, file: &NamedTempFile) -> LocalLlamaAdapter {
        let mut adapter = LocalLlamaAdapter::new();
        adapter
            .initialize(
                &AdapterConfig::new()
                    .with("model_path", file.path().display().to_string())
                    .with("server_url", server.uri()),
            )
            .unwrap();
        adapter
    }

    #[test]
    fn test_initialize_requires_model_path() {
        let mut adapter = LocalLlamaAdapter::new();
        let err = adapter.initialize(&AdapterConfig::new()).unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Configuration { key: Some(ref key), .. } if key == "model_path"
        ));
    }

    #[test]
    fn test_initialize_rejects_missing_file() {
        let mut adapter = LocalLlamaAdapter::new();
        let err = adapter
            .initialize(&AdapterConfig::new().with("model_path", "/definitely/not/here.gguf"))
            .unwrap_err();
        assert!(err.to_string().contains("Model path not found"));
        assert!(!adapter.is_initialized());
    }

    #[test]
    fn test_engine_settings_reported_in_model_info() {
        let file = model_file();
        let mut adapter = LocalLlamaAdapter::new();
        adapter
            .initialize(
                &AdapterConfig::new()
                    .with("model_path", file.path().display().to_string())
                    .with("n_ctx", 4096)
                    .with("n_gpu_layers", 35)
                    .with("use_mlock", true),
            )
            .unwrap();

        let info = adapter.model_info();
        assert_eq!(info.details["context_size"], 4096);
        assert_eq!(info.details["n_gpu_layers"], 35);
        assert_eq!(info.details["use_mlock"], true);
        assert!(!info.capabilities.supports(Capability::ImageAnalysis));
    }

    #[test]
    fn test_chat_prompt_template() {
        let prompt = LocalLlamaAdapter::chat_prompt(&[
            ChatMessage::system("Be short"),
            ChatMessage::user("Hi"),
        ]);
        assert_eq!(
            prompt,
            "### System:\nBe short\n\n### User:\nHi\n\n### Assistant:\n"
        );
    }

    #[tokio::test]
    async fn test_generate_text_wraps_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/completion"))
            .and(body_partial_json(json!({
                "prompt": "system: You are a helpful assistant.\nuser: Hello\n",
                "n_predict": 1024,
                "temperature": 0.7,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": "Hi there",
                "tokens_predicted": 3,
                "tokens_evaluated": 12,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let file = model_file();
        let adapter = adapter_for(&server, &file);
        let envelope = adapter
            .generate_text("Hello", &GenerationOptions::default())
            .await
            .unwrap();

        let body = envelope.success().unwrap();
        assert_eq!(body.text, "Hi there");
        assert_eq!(body.usage["prompt_tokens"], 12);
    }

    #[tokio::test]
    async fn test_context_size_caps_prediction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/completion"))
            .and(body_partial_json(json!({"n_predict": 512})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": "ok",
                "tokens_predicted": 1,
                "tokens_evaluated": 1,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let file = model_file();
        let mut adapter = LocalLlamaAdapter::new();
        adapter
            .initialize(
                &AdapterConfig::new()
                    .with("model_path", file.path().display().to_string())
                    .with("server_url", server.uri())
                    .with("context_size", 512)
                    .with("n_gpu_layers", 35),
            )
            .unwrap();

        let envelope = adapter
            .generate_text("Hello", &GenerationOptions::default())
            .await
            .unwrap();
        assert!(envelope.is_success());

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(body.get("n_gpu_layers").is_none());
        assert!(body.get("use_mlock").is_none());
    }

    #[tokio::test]
    async fn test_embed_text_accepts_batched_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embedding"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"index": 0, "embedding": [[0.5, 0.5, 0.0]]},
            ])))
            .mount(&server)
            .await;

        let file = model_file();
        let adapter = adapter_for(&server, &file);
        let envelope = adapter
            .embed_text("hello", &GenerationOptions::default())
            .await
            .unwrap();

        assert_eq!(envelope.success().unwrap().dimensions, 3);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_error_envelope() {
        let file = model_file();
        let mut adapter = LocalLlamaAdapter::new();
        adapter
            .initialize(
                &AdapterConfig::new()
                    .with("model_path", file.path().display().to_string())
                    .with("server_url", "http://127.0.0.1:9"),
            )
            .unwrap();

        let envelope = adapter
            .generate_text("Hello", &GenerationOptions::default())
            .await
            .unwrap();
        assert!(envelope.failure().is_some());
    }

    #[tokio::test]
    async fn test_moderation_is_unsupported() {
        let file = model_file();
        let server = MockServer::start().await;
        let adapter = adapter_for(&server, &file);

        let err = adapter
            .moderate_content("text", &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::CapabilityUnsupported { .. }));
    }
}
