//! Configuration model.

use gateway_core::AdapterConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use validator::{Validate, ValidationError};

use crate::error::{ConfigError, Result};

/// Root gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct GatewayConfig {
    /// HTTP server settings.
    #[serde(default)]
    #[validate(nested)]
    pub server: ServerSettings,

    /// Logging settings.
    #[serde(default)]
    #[validate(nested)]
    pub logging: LogSettings,

    /// Input and rate limits.
    #[serde(default)]
    #[validate(nested)]
    pub limits: LimitSettings,

    /// Providers to configure at startup.
    #[serde(default)]
    #[validate(nested)]
    pub providers: Vec<ProviderConfig>,
}

impl GatewayConfig {
    /// Run field validation plus cross-field checks.
    pub fn validate_config(&self) -> Result<()> {
        self.validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if !seen.insert(provider.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate provider name: {}",
                    provider.name
                )));
            }
        }
        Ok(())
    }

    /// Provider entry by name.
    #[must_use]
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// Mutable provider entry by name, created (enabled, empty) when absent.
    pub fn provider_entry(&mut self, name: &str) -> &mut ProviderConfig {
        let index = match self.providers.iter().position(|p| p.name == name) {
            Some(index) => index,
            None => {
                self.providers.push(ProviderConfig::new(name));
                self.providers.len() - 1
            }
        };
        &mut self.providers[index]
    }

    /// Providers that should be configured.
    pub fn enabled_providers(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.iter().filter(|p| p.enabled)
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerSettings {
    /// Bind address.
    #[serde(default = "default_host")]
    #[validate(length(min = 1))]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    #[validate(range(min = 1))]
    pub port: u16,

    /// Maximum request body size; bounds multipart image uploads.
    #[serde(default = "default_max_body_bytes")]
    #[validate(range(min = 1024))]
    pub max_body_bytes: usize,

    /// Per-request timeout.
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_body_bytes() -> usize {
    // Room for a 10 MB image plus multipart framing
    12 * 1024 * 1024
}

const fn default_request_timeout() -> Duration {
    Duration::from_secs(300)
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl ServerSettings {
    /// `host:port` bind address.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LogSettings {
    /// Default level filter, e.g. `info` or `gateway_core=debug,info`.
    #[serde(default = "default_log_level")]
    #[validate(length(min = 1))]
    pub level: String,

    /// Output format: `pretty`, `json` or `compact`.
    #[serde(default = "default_log_format")]
    #[validate(custom(function = "validate_log_format"))]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn validate_log_format(format: &str) -> std::result::Result<(), ValidationError> {
    match format {
        "pretty" | "json" | "compact" => Ok(()),
        _ => Err(ValidationError::new("log_format")),
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Input and rate limits.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LimitSettings {
    /// Maximum prompt length in characters.
    #[serde(default = "default_max_prompt_length")]
    #[validate(range(min = 1))]
    pub max_prompt_length: usize,

    /// Maximum image size in megabytes.
    #[serde(default = "default_max_image_size_mb")]
    #[validate(range(min = 1))]
    pub max_image_size_mb: u64,

    /// Requests per minute for providers without their own budget.
    #[serde(default = "default_requests_per_minute")]
    #[validate(range(min = 1))]
    pub default_requests_per_minute: u32,
}

const fn default_max_prompt_length() -> usize {
    4096
}

const fn default_max_image_size_mb() -> u64 {
    10
}

const fn default_requests_per_minute() -> u32 {
    60
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            max_prompt_length: default_max_prompt_length(),
            max_image_size_mb: default_max_image_size_mb(),
            default_requests_per_minute: default_requests_per_minute(),
        }
    }
}

/// One provider to configure.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProviderConfig {
    /// Name requests address the provider by.
    #[validate(length(min = 1, max = 64))]
    pub name: String,

    /// Registry adapter to construct; defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter: Option<String>,

    /// Whether to configure this provider.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Rate limit budget; falls back to `limits.default_requests_per_minute`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub requests_per_minute: Option<u32>,

    /// Adapter settings passed to `initialize`.
    #[serde(default)]
    pub settings: AdapterConfig,
}

const fn default_enabled() -> bool {
    true
}

impl ProviderConfig {
    /// Enabled provider with empty settings.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            adapter: None,
            enabled: true,
            requests_per_minute: None,
            settings: AdapterConfig::new(),
        }
    }

    /// Set the adapter type.
    #[must_use]
    pub fn with_adapter(mut self, adapter: impl Into<String>) -> Self {
        self.adapter = Some(adapter.into());
        self
    }

    /// Add a setting.
    #[must_use]
    pub fn with_setting(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.settings.insert(key, value);
        self
    }

    /// Adapter type to construct.
    #[must_use]
    pub fn adapter_type(&self) -> &str {
        self.adapter.as_deref().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.bind_address(), "0.0.0.0:3000");
        assert_eq!(config.limits.max_prompt_length, 4096);
        assert_eq!(config.limits.default_requests_per_minute, 60);
        assert!(config.providers.is_empty());
        config.validate_config().unwrap();
    }

    #[test]
    fn test_adapter_type_defaults_to_name() {
        let provider = ProviderConfig::new("openai");
        assert_eq!(provider.adapter_type(), "openai");

        let provider = ProviderConfig::new("fast").with_adapter("openai");
        assert_eq!(provider.adapter_type(), "openai");
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = GatewayConfig::default();
        config.server.port = 0;
        assert!(matches!(
            config.validate_config(),
            Err(ConfigError::Validation(_))
        ));

        let mut config = GatewayConfig::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate_config().is_err());

        let mut config = GatewayConfig::default();
        config.providers.push(ProviderConfig::new(""));
        assert!(config.validate_config().is_err());
    }

    #[test]
    fn test_rejects_duplicate_provider_names() {
        let mut config = GatewayConfig::default();
        config.providers.push(ProviderConfig::new("openai"));
        config.providers.push(ProviderConfig::new("openai"));

        let err = config.validate_config().unwrap_err();
        assert!(err.to_string().contains("duplicate provider name: openai"));
    }

    #[test]
    fn test_provider_entry_creates_once() {
        let mut config = GatewayConfig::default();
        config.provider_entry("gemini").settings.insert("api_key", "a");
        config.provider_entry("gemini").settings.insert("model", "b");

        assert_eq!(config.providers.len(), 1);
        let provider = config.provider("gemini").unwrap();
        assert_eq!(provider.settings.get_str("model"), Some("b"));
    }

    #[test]
    fn test_enabled_providers() {
        let mut config = GatewayConfig::default();
        config.providers.push(ProviderConfig::new("a"));
        let mut disabled = ProviderConfig::new("b");
        disabled.enabled = false;
        config.providers.push(disabled);

        let names: Vec<_> = config.enabled_providers().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a"]);
    }
}
