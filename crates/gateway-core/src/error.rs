//! Error types for the gateway.
//!
//! Every failure the gateway can surface is one variant of [`GatewayError`].
//! Provider-side failures are normally captured by the adapter and turned into
//! an error envelope; the `ProviderCall` variant is what adapters build
//! internally before that conversion happens.

use crate::capability::Capability;
use thiserror::Error;

/// Result alias used across the gateway crates
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Unified gateway error
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Adapter setup is missing or invalid
    #[error("Configuration error: {message}")]
    Configuration {
        /// Human-readable description
        message: String,
        /// Configuration key at fault, if any
        key: Option<String>,
    },

    /// Provider name is not registered or not configured
    #[error("Model {name} not configured")]
    UnknownProvider {
        /// Requested provider name
        name: String,
    },

    /// Malformed caller input
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable description
        message: String,
        /// Offending field, if any
        field: Option<String>,
    },

    /// Operation is not offered by the selected provider
    #[error("{provider} does not support {capability}")]
    CapabilityUnsupported {
        /// Provider name
        provider: String,
        /// Capability that was requested
        capability: Capability,
    },

    /// Adapter method called before `initialize`
    #[error("{provider} adapter is not initialized")]
    NotInitialized {
        /// Provider name
        provider: String,
    },

    /// The wrapped provider itself failed
    #[error("Provider error ({provider}): {message}")]
    ProviderCall {
        /// Provider name
        provider: String,
        /// Error message reported by (or about) the provider
        message: String,
        /// Upstream HTTP status, when there was one
        status_code: Option<u16>,
    },

    /// Unexpected internal failure
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable description
        message: String,
    },
}

impl GatewayError {
    /// Create a configuration error that names the offending key
    pub fn configuration(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Create a configuration error for a required key that is absent
    pub fn missing_config(key: &str) -> Self {
        Self::configuration(key, format!("missing required configuration key `{key}`"))
    }

    /// Create an unknown provider error
    pub fn unknown_provider(name: impl Into<String>) -> Self {
        Self::UnknownProvider { name: name.into() }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Validation {
            message: message.into(),
            field: field.map(String::from),
        }
    }

    /// Create a capability error
    pub fn unsupported(provider: impl Into<String>, capability: Capability) -> Self {
        Self::CapabilityUnsupported {
            provider: provider.into(),
            capability,
        }
    }

    /// Create a not-initialized error
    pub fn not_initialized(provider: impl Into<String>) -> Self {
        Self::NotInitialized {
            provider: provider.into(),
        }
    }

    /// Create a provider call error
    pub fn provider(
        provider: impl Into<String>,
        message: impl Into<String>,
        status_code: Option<u16>,
    ) -> Self {
        Self::ProviderCall {
            provider: provider.into(),
            message: message.into(),
            status_code,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the caller can fix this by changing the request
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownProvider { .. }
                | Self::Validation { .. }
                | Self::CapabilityUnsupported { .. }
        )
    }

    /// HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> u16 {
        if self.is_client_error() {
            400
        } else {
            500
        }
    }

    /// Stable machine-readable code
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration_error",
            Self::UnknownProvider { .. } => "unknown_provider",
            Self::Validation { .. } => "validation_error",
            Self::CapabilityUnsupported { .. } => "capability_unsupported",
            Self::NotInitialized { .. } => "not_initialized",
            Self::ProviderCall { .. } => "provider_error",
            Self::Internal { .. } => "internal_error",
        }
    }
}
