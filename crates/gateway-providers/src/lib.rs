//! # Gateway Providers
//!
//! Model adapters for the AI Model Gateway.
//!
//! This crate provides implementations of the [`gateway_core::AIModel`]
//! contract:
//! - OpenAI (GPT-4, embeddings, vision, moderation)
//! - Anthropic (Claude)
//! - Google AI (Gemini)
//! - Local Llama through a llama.cpp server
//! - Llama 2 on the Hugging Face Inference API
//! - A network-free example adapter
//!
//! and the [`AdapterRegistry`] that constructs them by name.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod http;

pub mod example;
pub mod registry;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "claude")]
pub mod claude;

#[cfg(feature = "gemini")]
pub mod gemini;

#[cfg(feature = "local-llama")]
pub mod local_llama;

#[cfg(feature = "llama")]
pub mod llama;

// Re-export main types
pub use example::ExampleAdapter;
pub use registry::{AdapterConstructor, AdapterRegistry};

#[cfg(feature = "openai")]
pub use openai::OpenAIAdapter;

#[cfg(feature = "claude")]
pub use claude::ClaudeAdapter;

#[cfg(feature = "gemini")]
pub use gemini::GeminiAdapter;

#[cfg(feature = "local-llama")]
pub use local_llama::LocalLlamaAdapter;

#[cfg(feature = "llama")]
pub use llama::LlamaAdapter;
