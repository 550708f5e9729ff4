//! Input validation utilities.
//!
//! Every check here is total: it inspects untrusted input and answers with a
//! boolean or a filtered value, never an error.

use gateway_core::{GenerationOptions, MessageRole};
use serde_json::{Map, Value};
use tracing::debug;

/// Default maximum prompt length, in characters
pub const DEFAULT_MAX_PROMPT_LENGTH: usize = 4096;

/// Default maximum image size, in mebibytes
pub const DEFAULT_MAX_IMAGE_SIZE_MB: usize = 10;

/// Validate a chat message list.
///
/// Every element must be an object with a `role` in {system, user, assistant}
/// and a string `content`. An empty list is invalid.
#[must_use]
pub fn validate_chat_messages(messages: &[Value]) -> bool {
    !messages.is_empty() && messages.iter().all(is_valid_message)
}

fn is_valid_message(message: &Value) -> bool {
    let Some(object) = message.as_object() else {
        return false;
    };

    let role_ok = object
        .get("role")
        .and_then(Value::as_str)
        .is_some_and(|role| role.parse::<MessageRole>().is_ok());

    role_ok && object.get("content").is_some_and(Value::is_string)
}

/// Validate image bytes against a size ceiling
#[must_use]
pub fn validate_image_data(image: &[u8], max_size_mb: usize) -> bool {
    !image.is_empty() && image.len() <= max_size_mb.saturating_mul(1024 * 1024)
}

/// Validate a prompt: non-empty and at most `max_length` characters
#[must_use]
pub fn validate_prompt(prompt: &str, max_length: usize) -> bool {
    !prompt.is_empty() && prompt.chars().count() <= max_length
}

/// Validate an API key: present and free of whitespace
#[must_use]
pub fn validate_api_key(api_key: &str) -> bool {
    !api_key.is_empty() && !api_key.chars().any(char::is_whitespace)
}

/// Keep only the recognized options whose values pass their predicate.
///
/// Anything that is not a JSON object yields empty options.
#[must_use]
pub fn validate_model_options(options: &Value, provider: &str) -> GenerationOptions {
    options
        .as_object()
        .map(|object| validate_option_map(object, provider))
        .unwrap_or_default()
}

/// [`validate_model_options`] over an already-extracted map
#[must_use]
pub fn validate_option_map(options: &Map<String, Value>, provider: &str) -> GenerationOptions {
    let mut sanitized = GenerationOptions::default();

    for (key, value) in options {
        let kept = match key.as_str() {
            "temperature" => in_range(value, 0.0, 2.0).map(|v| sanitized.temperature = Some(v)),
            "max_tokens" => value
                .as_u64()
                .filter(|tokens| *tokens > 0)
                .map(|v| sanitized.max_tokens = Some(v)),
            "top_p" => in_range(value, 0.0, 1.0).map(|v| sanitized.top_p = Some(v)),
            "frequency_penalty" => {
                in_range(value, -2.0, 2.0).map(|v| sanitized.frequency_penalty = Some(v))
            }
            "presence_penalty" => {
                in_range(value, -2.0, 2.0).map(|v| sanitized.presence_penalty = Some(v))
            }
            _ => None,
        };

        if kept.is_none() {
            debug!(provider = %provider, option = %key, value = %value, "Dropping model option");
        }
    }

    sanitized
}

fn in_range(value: &Value, min: f64, max: f64) -> Option<f64> {
    value.as_f64().filter(|v| (min..=max).contains(v))
}

/// Input validator bound to configured limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputValidator {
    max_prompt_length: usize,
    max_image_size_mb: usize,
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PROMPT_LENGTH, DEFAULT_MAX_IMAGE_SIZE_MB)
    }
}

impl InputValidator {
    /// Create a validator with explicit limits
    #[must_use]
    pub fn new(max_prompt_length: usize, max_image_size_mb: usize) -> Self {
        Self {
            max_prompt_length,
            max_image_size_mb,
        }
    }

    /// Maximum prompt length in characters
    #[must_use]
    pub fn max_prompt_length(&self) -> usize {
        self.max_prompt_length
    }

    /// Maximum image size in mebibytes
    #[must_use]
    pub fn max_image_size_mb(&self) -> usize {
        self.max_image_size_mb
    }

    /// Validate a prompt against the configured length limit
    #[must_use]
    pub fn validate_prompt(&self, prompt: &str) -> bool {
        validate_prompt(prompt, self.max_prompt_length)
    }

    /// Validate image bytes against the configured size limit
    #[must_use]
    pub fn validate_image_data(&self, image: &[u8]) -> bool {
        validate_image_data(image, self.max_image_size_mb)
    }

    /// Validate a chat message list
    #[must_use]
    pub fn validate_chat_messages(&self, messages: &[Value]) -> bool {
        validate_chat_messages(messages)
    }

    /// Filter model options
    #[must_use]
    pub fn validate_model_options(&self, options: &Value, provider: &str) -> GenerationOptions {
        validate_model_options(options, provider)
    }
}
