//! # AI Model Gateway
//!
//! One HTTP API over hosted and local AI model providers.
//!
//! ## Usage
//!
//! ```bash
//! # Providers are enabled by their credentials
//! OPENAI_API_KEY=sk-... ai-model-gateway
//!
//! # Or from a config file (YAML, TOML or JSON)
//! GATEWAY_CONFIG=/etc/gateway.yaml ai-model-gateway
//!
//! # Environment overrides apply on top of the file
//! GATEWAY_PORT=9000 GATEWAY_LOG_FORMAT=json ai-model-gateway
//! ```

use gateway_config::{load_config, GatewayConfig};
use gateway_server::{AppState, Server};
use gateway_telemetry::{init_logging, LogFormat, LoggingConfig};
use tracing::{error, info, warn};

/// Application entry point
#[tokio::main]
async fn main() {
    // Logging settings live in the config, so load it first
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(&logging_config(&config)) {
        eprintln!("Failed to initialize logging: {e}");
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting AI Model Gateway"
    );

    if let Err(e) = run(&config).await {
        error!(error = %e, "Application failed");
        std::process::exit(1);
    }
}

/// Main application logic
async fn run(config: &GatewayConfig) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::from_config(config);

    if state.gateway.is_empty() {
        warn!("No providers available; set a provider credential or GATEWAY_CONFIG");
    } else {
        info!(
            providers = ?state.gateway.provider_names(),
            "Providers configured"
        );
    }

    Server::new(state).run().await?;

    info!("Gateway shutdown complete");
    Ok(())
}

fn logging_config(config: &GatewayConfig) -> LoggingConfig {
    // The format was validated at load time
    let format = config
        .logging
        .format
        .parse()
        .unwrap_or(LogFormat::Pretty);
    LoggingConfig::new(config.logging.level.clone()).with_format(format)
}
