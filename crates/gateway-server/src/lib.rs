//! # Gateway Server
//!
//! HTTP surface of the AI Model Gateway.
//!
//! This crate provides:
//! - Axum routes for the five model operations plus discovery and health
//! - Mapping of gateway errors onto HTTP statuses
//! - Graceful shutdown on Ctrl+C and SIGTERM

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod state;

// Re-export main types
pub use error::{ApiError, ServerError};
pub use routes::create_router;
pub use server::Server;
pub use state::AppState;
