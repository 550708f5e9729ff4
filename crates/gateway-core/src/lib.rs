//! # Gateway Core
//!
//! Core types, traits, and error handling for the AI Model Gateway.
//!
//! This crate provides the foundational types used throughout the gateway:
//! - The [`AIModel`] adapter contract and its capability declarations
//! - Request types (chat messages, generation options)
//! - Response envelopes and the [`ResponseFormatter`]
//! - Error types and handling

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod capability;
pub mod config;
pub mod error;
pub mod image;
pub mod model;
pub mod request;
pub mod response;

// Re-export commonly used types
pub use capability::{Capability, CapabilitySet, ModerationMode};
pub use config::AdapterConfig;
pub use error::{GatewayError, GatewayResult};
pub use model::{degraded_moderation, AIModel, ModelInfo};
pub use request::{ChatMessage, GenerationOptions, MessageRole};
pub use response::{
    ChatResponse, EmbeddingResponse, Envelope, EnvelopeBody, ErrorResponse,
    ImageAnalysisResponse, Metadata, ModerationResponse, ResponseFormatter, TextResponse, Usage,
};
