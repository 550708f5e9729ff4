//! # Gateway Routing
//!
//! Request orchestration for the AI Model Gateway.
//!
//! This crate provides the [`Gateway`], which routes each request to the
//! adapter configured under the requested provider name:
//! - Provider resolution and configuration
//! - Input validation and prompt sanitization
//! - Per-provider rate-limit admission
//! - Response annotation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod gateway;

// Re-export main types
pub use gateway::Gateway;
