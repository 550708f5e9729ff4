//! Shared handler state.

use gateway_config::{GatewayConfig, ServerSettings};
use gateway_routing::Gateway;
use std::sync::Arc;

/// State cloned into every handler
#[derive(Debug, Clone)]
pub struct AppState {
    /// Gateway core
    pub gateway: Arc<Gateway>,
    /// Server settings the router is built from
    pub settings: Arc<ServerSettings>,
}

impl AppState {
    /// Wrap a gateway with default server settings
    #[must_use]
    pub fn new(gateway: Gateway) -> Self {
        Self::with_settings(gateway, ServerSettings::default())
    }

    /// Wrap a gateway with explicit server settings
    #[must_use]
    pub fn with_settings(gateway: Gateway, settings: ServerSettings) -> Self {
        Self {
            gateway: Arc::new(gateway),
            settings: Arc::new(settings),
        }
    }

    /// Build the gateway and configure every enabled provider
    #[must_use]
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::with_settings(Gateway::from_config(config), config.server.clone())
    }
}
