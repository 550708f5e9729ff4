//! # Gateway Config
//!
//! Configuration management for the AI Model Gateway.
//!
//! This crate provides:
//! - The [`GatewayConfig`] model with defaults and validation
//! - YAML/TOML/JSON file loading
//! - Environment overrides, including provider credentials

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod model;

// Re-export main types
pub use error::{ConfigError, Result};
pub use loader::{apply_env_overrides, from_file, load_config, load_with, CONFIG_PATH_VAR};
pub use model::{GatewayConfig, LimitSettings, LogSettings, ProviderConfig, ServerSettings};
