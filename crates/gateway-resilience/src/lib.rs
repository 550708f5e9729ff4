//! # Gateway Resilience
//!
//! Admission control for the AI Model Gateway:
//! - Per-provider sliding-window rate limiting
//! - A registry of limiters keyed by provider name

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod rate_limiter;

// Re-export main types
pub use rate_limiter::{
    RateLimiter, RateLimiterConfig, RateLimiterRegistry, RateLimiterStats, DEFAULT_REQUESTS_PER_MINUTE,
    DEFAULT_WINDOW,
};
