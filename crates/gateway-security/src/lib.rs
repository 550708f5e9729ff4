//! # Gateway Security
//!
//! Input hardening for the AI Model Gateway.
//!
//! ## Features
//!
//! - **Input Validation**: chat messages, prompts, image payloads, model options
//! - **Prompt Sanitization**: allow-list filtering and whitespace normalization
//!
//! ## Example
//!
//! ```rust
//! use gateway_security::{sanitize_prompt, validate_prompt};
//!
//! let prompt = sanitize_prompt("  Tell me <b>a joke</b>  ");
//! assert!(validate_prompt(&prompt, 4096));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod sanitize;
pub mod validation;

pub use sanitize::{is_sanitized, sanitize_prompt};
pub use validation::{
    validate_api_key, validate_chat_messages, validate_image_data, validate_model_options,
    validate_option_map, validate_prompt, InputValidator, DEFAULT_MAX_IMAGE_SIZE_MB,
    DEFAULT_MAX_PROMPT_LENGTH,
};
