//! Gateway orchestration.
//!
//! Every operation runs the same pipeline:
//!
//! 1. resolve the live adapter for the provider name
//! 2. extract and validate inputs, check the capability
//! 3. wait for rate-limit admission
//! 4. dispatch to the adapter
//! 5. stamp the provider onto successful envelopes
//!
//! Steps 1 and 2 fail fast without touching the limiter or the provider.

use dashmap::DashMap;
use gateway_config::GatewayConfig;
use gateway_core::{
    AIModel, AdapterConfig, Capability, ChatMessage, ChatResponse, EmbeddingResponse, Envelope,
    EnvelopeBody, GatewayError, GatewayResult, GenerationOptions, ImageAnalysisResponse,
    ModelInfo, ModerationMode, ModerationResponse, ResponseFormatter, TextResponse,
};
use gateway_providers::AdapterRegistry;
use gateway_resilience::{RateLimiterRegistry, DEFAULT_REQUESTS_PER_MINUTE};
use gateway_security::{sanitize_prompt, InputValidator};
use gateway_telemetry::{gateway_operation_span, provider_span};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument};

/// The gateway: live adapters, their limiters and the input validator.
pub struct Gateway {
    registry: AdapterRegistry,
    models: DashMap<String, Arc<dyn AIModel>>,
    limiters: RateLimiterRegistry,
    validator: InputValidator,
    default_requests_per_minute: usize,
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new(AdapterRegistry::with_builtin_adapters(), InputValidator::default())
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("providers", &self.provider_names())
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Create a gateway with no configured providers
    #[must_use]
    pub fn new(registry: AdapterRegistry, validator: InputValidator) -> Self {
        Self {
            registry,
            models: DashMap::new(),
            limiters: RateLimiterRegistry::new(),
            validator,
            default_requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
        }
    }

    /// Build a gateway from configuration and configure its providers
    #[must_use]
    pub fn from_config(config: &GatewayConfig) -> Self {
        let validator = InputValidator::new(
            config.limits.max_prompt_length,
            config.limits.max_image_size_mb as usize,
        );
        let mut gateway = Self::new(AdapterRegistry::with_builtin_adapters(), validator);
        gateway.default_requests_per_minute = config.limits.default_requests_per_minute as usize;
        gateway.configure_all(config);
        gateway
    }

    /// Adapter registry used by [`Gateway::configure`]
    #[must_use]
    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Per-provider rate limiters
    #[must_use]
    pub fn limiters(&self) -> &RateLimiterRegistry {
        &self.limiters
    }

    /// Input validator
    #[must_use]
    pub fn validator(&self) -> &InputValidator {
        &self.validator
    }

    /// Create, initialize and publish an adapter under `provider`.
    ///
    /// Replaces any adapter already configured under that name.
    pub fn configure(
        &self,
        provider: &str,
        adapter_type: &str,
        config: &AdapterConfig,
        requests_per_minute: usize,
    ) -> GatewayResult<()> {
        let mut adapter = self.registry.create(adapter_type)?;
        adapter.initialize(config)?;

        self.limiters.register(provider, requests_per_minute);
        self.models.insert(provider.to_string(), Arc::from(adapter));

        info!(
            provider = %provider,
            adapter = %adapter_type,
            requests_per_minute,
            "Configured provider"
        );
        Ok(())
    }

    /// Configure every enabled provider; failures are logged and skipped.
    ///
    /// Returns the number of providers configured.
    pub fn configure_all(&self, config: &GatewayConfig) -> usize {
        let mut configured = 0;
        for provider in config.enabled_providers() {
            let rpm = provider
                .requests_per_minute
                .map_or(self.default_requests_per_minute, |rpm| rpm as usize);

            match self.configure(&provider.name, provider.adapter_type(), &provider.settings, rpm) {
                Ok(()) => configured += 1,
                Err(e) => warn!(
                    provider = %provider.name,
                    adapter = %provider.adapter_type(),
                    error = %e,
                    "Skipping provider that failed to configure"
                ),
            }
        }

        if configured == 0 {
            warn!("No providers configured; every request will fail until one is");
        }
        configured
    }

    /// Configured provider names, sorted
    #[must_use]
    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Whether a provider is configured
    #[must_use]
    pub fn is_configured(&self, provider: &str) -> bool {
        self.models.contains_key(provider)
    }

    /// Number of configured providers
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether no provider is configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Model info for every configured provider
    #[must_use]
    pub fn list_models(&self) -> BTreeMap<String, ModelInfo> {
        self.models
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().model_info()))
            .collect()
    }

    /// Generate text from `{"prompt": .., "options": {..}}`
    pub async fn generate_text(
        &self,
        provider: &str,
        payload: &Value,
    ) -> GatewayResult<Envelope<TextResponse>> {
        let adapter = self.resolve(provider)?;
        let prompt = required_str(payload, "prompt", "No prompt provided")?;
        let prompt = self.clean_prompt(prompt, "prompt")?;
        let options = self.options(payload, provider);
        adapter.check_capability(Capability::TextGeneration)?;

        self.run(
            provider,
            "generate_text",
            adapter.generate_text(&prompt, &options),
        )
        .await
    }

    /// Continue a conversation from `{"messages": [..], "options": {..}}`
    pub async fn generate_chat(
        &self,
        provider: &str,
        payload: &Value,
    ) -> GatewayResult<Envelope<ChatResponse>> {
        let adapter = self.resolve(provider)?;
        let raw = payload
            .get("messages")
            .and_then(Value::as_array)
            .filter(|messages| !messages.is_empty())
            .ok_or_else(|| GatewayError::validation("No messages provided", Some("messages")))?;
        if !self.validator.validate_chat_messages(raw) {
            return Err(GatewayError::validation(
                "Invalid message format",
                Some("messages"),
            ));
        }
        let messages = parse_messages(raw)?;
        let options = self.options(payload, provider);
        adapter.check_capability(Capability::Chat)?;

        self.run(
            provider,
            "generate_chat",
            adapter.generate_chat_response(&messages, &options),
        )
        .await
    }

    /// Embed `{"text": .., "options": {..}}`
    pub async fn embed_text(
        &self,
        provider: &str,
        payload: &Value,
    ) -> GatewayResult<Envelope<EmbeddingResponse>> {
        let adapter = self.resolve(provider)?;
        let text = required_str(payload, "text", "No text provided")?;
        if !self.validator.validate_prompt(text) {
            return Err(GatewayError::validation(
                format!(
                    "Text must be between 1 and {} characters",
                    self.validator.max_prompt_length()
                ),
                Some("text"),
            ));
        }
        let options = self.options(payload, provider);
        adapter.check_capability(Capability::Embeddings)?;

        self.run(provider, "embed_text", adapter.embed_text(text, &options))
            .await
    }

    /// Analyze an uploaded image with an optional prompt
    pub async fn analyze_image(
        &self,
        provider: &str,
        image: Option<&[u8]>,
        prompt: Option<&str>,
        options: Option<&Value>,
    ) -> GatewayResult<Envelope<ImageAnalysisResponse>> {
        let adapter = self.resolve(provider)?;
        let image = image
            .filter(|bytes| !bytes.is_empty())
            .ok_or_else(|| GatewayError::validation("No image provided", Some("image")))?;
        if !self.validator.validate_image_data(image) {
            return Err(GatewayError::validation(
                format!(
                    "Image exceeds {} MB",
                    self.validator.max_image_size_mb()
                ),
                Some("image"),
            ));
        }
        let prompt = match prompt.filter(|p| !p.trim().is_empty()) {
            Some(prompt) => Some(self.clean_prompt(prompt, "prompt")?),
            None => None,
        };
        let options = options.map_or_else(GenerationOptions::default, |o| {
            self.validator.validate_model_options(o, provider)
        });
        adapter.check_capability(Capability::ImageAnalysis)?;

        self.run(
            provider,
            "analyze_image",
            adapter.analyze_image(image, prompt.as_deref(), &options),
        )
        .await
    }

    /// Moderate `{"content": .., "options": {..}}`
    pub async fn moderate_content(
        &self,
        provider: &str,
        payload: &Value,
    ) -> GatewayResult<Envelope<ModerationResponse>> {
        let adapter = self.resolve(provider)?;
        let content = required_str(payload, "content", "No content provided")?;
        if !self.validator.validate_prompt(content) {
            return Err(GatewayError::validation(
                format!(
                    "Content must be between 1 and {} characters",
                    self.validator.max_prompt_length()
                ),
                Some("content"),
            ));
        }
        let options = self.options(payload, provider);
        if adapter.moderation_mode() == ModerationMode::Unsupported {
            return Err(GatewayError::unsupported(provider, Capability::Moderation));
        }

        self.run(
            provider,
            "moderate_content",
            adapter.moderate_content(content, &options),
        )
        .await
    }

    fn resolve(&self, provider: &str) -> GatewayResult<Arc<dyn AIModel>> {
        // Clone the Arc out so no map guard is held across provider latency
        self.models
            .get(provider)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| GatewayError::unknown_provider(provider))
    }

    fn options(&self, payload: &Value, provider: &str) -> GenerationOptions {
        payload.get("options").map_or_else(GenerationOptions::default, |options| {
            self.validator.validate_model_options(options, provider)
        })
    }

    fn clean_prompt(&self, prompt: &str, field: &str) -> GatewayResult<String> {
        if !self.validator.validate_prompt(prompt) {
            return Err(GatewayError::validation(
                format!(
                    "Prompt must be between 1 and {} characters",
                    self.validator.max_prompt_length()
                ),
                Some(field),
            ));
        }

        let sanitized = sanitize_prompt(prompt);
        if sanitized.is_empty() {
            return Err(GatewayError::validation(
                "Prompt contains no usable characters",
                Some(field),
            ));
        }
        Ok(sanitized)
    }

    /// Admit, dispatch and annotate
    async fn run<T, F>(
        &self,
        provider: &str,
        operation: &'static str,
        call: F,
    ) -> GatewayResult<Envelope<T>>
    where
        T: EnvelopeBody,
        F: Future<Output = GatewayResult<Envelope<T>>>,
    {
        let span = gateway_operation_span!(operation, provider);

        async {
            let waited = self.limiters.admit(provider).await;
            if !waited.is_zero() {
                debug!(waited_ms = waited.as_millis() as u64, "Rate limit delayed dispatch");
            }

            let envelope = call
                .instrument(provider_span!(provider, operation))
                .await
                .map_err(|e| {
                    error!(error = %e, "Dispatch failed");
                    e
                })?;

            match &envelope {
                Envelope::Success(_) => debug!("Dispatch succeeded"),
                Envelope::Failure(failure) => warn!(
                    error = %failure.error,
                    code = ?failure.code,
                    "Provider returned an error envelope"
                ),
            }

            Ok(ResponseFormatter::annotate(envelope, provider))
        }
        .instrument(span)
        .await
    }
}

fn required_str<'a>(payload: &'a Value, field: &str, missing: &str) -> GatewayResult<&'a str> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| GatewayError::validation(missing, Some(field)))
}

fn parse_messages(raw: &[Value]) -> GatewayResult<Vec<ChatMessage>> {
    raw.iter()
        .map(|message| {
            serde_json::from_value(message.clone()).map_err(|e| {
                GatewayError::validation(format!("Invalid message format: {e}"), Some("messages"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gateway_config::ProviderConfig;
    use gateway_core::{CapabilitySet, MessageRole};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Adapter that counts dispatches and can be told to fail
    struct Recorder {
        calls: Arc<AtomicUsize>,
        fail: bool,
        ready: bool,
    }

    #[async_trait]
    impl AIModel for Recorder {
        fn provider_name(&self) -> &str {
            "recorder"
        }

        fn initialize(&mut self, config: &AdapterConfig) -> GatewayResult<()> {
            self.fail = config.get_bool("fail")?.unwrap_or(false);
            self.ready = true;
            Ok(())
        }

        fn is_initialized(&self) -> bool {
            self.ready
        }

        fn capabilities(&self) -> CapabilitySet {
            CapabilitySet::text_and_chat()
        }

        fn model_info(&self) -> ModelInfo {
            ModelInfo::new("Recorder", "rec-1", "Test Model", self.capabilities())
        }

        async fn generate_text(
            &self,
            prompt: &str,
            _options: &GenerationOptions,
        ) -> GatewayResult<Envelope<TextResponse>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = if self.fail {
                Err(GatewayError::provider("recorder", "upstream down", Some(503)))
            } else {
                Ok(ResponseFormatter::format_text_response(prompt, "rec-1", None, None))
            };
            Ok(Envelope::capture("rec-1", result))
        }

        async fn generate_chat_response(
            &self,
            messages: &[ChatMessage],
            _options: &GenerationOptions,
        ) -> GatewayResult<Envelope<ChatResponse>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Envelope::Success(ResponseFormatter::format_chat_response(
                messages.to_vec(),
                "ok",
                "rec-1",
                None,
                None,
            )))
        }
    }

    fn gateway_with_recorder(rpm: usize, fail: bool) -> (Gateway, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = AdapterRegistry::with_builtin_adapters();
        let counter = Arc::clone(&calls);
        registry.register("recorder", move || {
            Box::new(Recorder {
                calls: Arc::clone(&counter),
                fail: false,
                ready: false,
            })
        });

        let gateway = Gateway::new(registry, InputValidator::default());
        gateway
            .configure("rec", "recorder", &AdapterConfig::new().with("fail", fail), rpm)
            .unwrap();
        (gateway, calls)
    }

    #[tokio::test]
    async fn test_unknown_provider_regardless_of_payload() {
        let gateway = Gateway::default();
        for payload in [json!({}), json!({"prompt": "hi"}), json!(null)] {
            let err = gateway.generate_text("nope", &payload).await.unwrap_err();
            assert_eq!(err.to_string(), "Model nope not configured");
        }
    }

    #[tokio::test]
    async fn test_missing_fields_messages() {
        let gateway = Gateway::default();
        gateway
            .configure("example", "example", &AdapterConfig::new(), 60)
            .unwrap();

        let cases = [
            gateway.generate_text("example", &json!({})).await.err(),
            gateway.generate_chat("example", &json!({"messages": []})).await.err(),
            gateway.embed_text("example", &json!({"text": ""})).await.err(),
            gateway.moderate_content("example", &json!({})).await.err(),
        ];
        let messages: Vec<String> = cases.into_iter().map(|e| e.unwrap().to_string()).collect();
        assert!(messages[0].contains("No prompt provided"));
        assert!(messages[1].contains("No messages provided"));
        assert!(messages[2].contains("No text provided"));
        assert!(messages[3].contains("No content provided"));

        let err = gateway
            .analyze_image("example", None, None, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No image provided"));
    }

    #[tokio::test]
    async fn test_generate_text_sanitizes_and_annotates() {
        let (gateway, calls) = gateway_with_recorder(60, false);

        let envelope = gateway
            .generate_text("rec", &json!({"prompt": "  Hello   <b>world</b>!  "}))
            .await
            .unwrap();

        let body = envelope.success().unwrap();
        assert_eq!(body.text, "Hello bworldb!");
        assert_eq!(body.metadata["provider"], "rec");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_chat_short_circuits_before_limiter() {
        let (gateway, calls) = gateway_with_recorder(60, false);

        let err = gateway
            .generate_chat(
                "rec",
                &json!({"messages": [{"role": "wizard", "content": "hi"}]}),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Validation { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(gateway.limiters().get("rec").unwrap().in_window(), 0);
    }

    #[tokio::test]
    async fn test_moderation_content_length_validated() {
        let (gateway, calls) = gateway_with_recorder(60, false);

        let err = gateway
            .moderate_content("rec", &json!({"content": "a".repeat(4097)}))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Validation { .. }));
        assert!(err.to_string().contains("4096"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(gateway.limiters().get("rec").unwrap().in_window(), 0);
    }

    #[tokio::test]
    async fn test_chat_preserves_order() {
        let (gateway, _) = gateway_with_recorder(60, false);

        let envelope = gateway
            .generate_chat(
                "rec",
                &json!({"messages": [
                    {"role": "system", "content": "Be kind"},
                    {"role": "user", "content": "Hi"},
                ]}),
            )
            .await
            .unwrap();

        let body = envelope.success().unwrap();
        assert_eq!(body.messages[0].role, MessageRole::System);
        assert_eq!(body.messages[1].content, "Hi");
    }

    #[tokio::test]
    async fn test_unsupported_capability_skips_limiter() {
        let (gateway, calls) = gateway_with_recorder(60, false);

        let err = gateway
            .embed_text("rec", &json!({"text": "hello"}))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::CapabilityUnsupported { .. }));

        let err = gateway
            .moderate_content("rec", &json!({"content": "hello"}))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::CapabilityUnsupported { .. }));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(gateway.limiters().get("rec").unwrap().in_window(), 0);
    }

    #[tokio::test]
    async fn test_error_envelope_passes_through_unannotated() {
        let (gateway, _) = gateway_with_recorder(60, true);

        let envelope = gateway
            .generate_text("rec", &json!({"prompt": "hi"}))
            .await
            .unwrap();

        let failure = envelope.failure().unwrap();
        assert_eq!(failure.error, "upstream down");
        assert_eq!(failure.details["provider"], "recorder");
        assert_eq!(failure.details["status_code"], 503);
    }

    #[tokio::test]
    async fn test_options_are_filtered() {
        let gateway = Gateway::default();
        gateway
            .configure("example", "example", &AdapterConfig::new(), 60)
            .unwrap();

        let envelope = gateway
            .generate_text(
                "example",
                &json!({"prompt": "hi", "options": {"temperature": 9.0, "bogus": 1}}),
            )
            .await
            .unwrap();
        assert!(envelope.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_delays_excess_calls() {
        let (gateway, calls) = gateway_with_recorder(2, false);
        let payload = json!({"prompt": "hi"});
        let start = tokio::time::Instant::now();

        gateway.generate_text("rec", &payload).await.unwrap();
        gateway.generate_text("rec", &payload).await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));

        gateway.generate_text("rec", &payload).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(60));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_configure_all_skips_failures() {
        let mut config = GatewayConfig::default();
        config.providers.push(ProviderConfig::new("example"));
        config
            .providers
            .push(ProviderConfig::new("echo").with_adapter("example").with_setting("model_name", "echo-1"));
        // Missing api_key
        config.providers.push(ProviderConfig::new("openai"));
        config.providers.push(ProviderConfig::new("mystery"));

        let gateway = Gateway::from_config(&config);
        assert_eq!(gateway.provider_names(), vec!["echo", "example"]);
        assert!(gateway.is_configured("echo"));
        assert!(!gateway.is_configured("openai"));

        let models = gateway.list_models();
        assert_eq!(models["echo"].model, "echo-1");
        assert_eq!(models["example"].model, "default-model");
    }

    #[tokio::test]
    async fn test_empty_gateway() {
        let gateway = Gateway::from_config(&GatewayConfig::default());
        assert!(gateway.is_empty());
        assert!(gateway.list_models().is_empty());
    }
}
