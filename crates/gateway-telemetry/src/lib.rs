//! # Gateway Telemetry
//!
//! Observability for the AI Model Gateway.
//!
//! This crate provides:
//! - Structured logging setup (pretty, compact or JSON)
//! - Span macros for gateway operations and provider calls

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod logging;

// Re-export main types
pub use logging::{init_logging, LogFormat, LoggingConfig, LoggingError};
