//! Configuration loading.
//!
//! Sources, in increasing precedence:
//! 1. Built-in defaults
//! 2. The file named by `GATEWAY_CONFIG` (YAML, TOML or JSON by extension)
//! 3. Environment variables

use std::path::Path;
use tracing::{debug, info};

use crate::error::{ConfigError, Result};
use crate::model::GatewayConfig;

/// Variable naming the configuration file.
pub const CONFIG_PATH_VAR: &str = "GATEWAY_CONFIG";

/// A provider whose presence is driven by one credential variable.
struct EnvProvider {
    name: &'static str,
    /// Variable that enables the provider, and the setting it fills
    primary: (&'static str, &'static str),
    /// Optional variables applied once the provider exists
    extras: &'static [(&'static str, &'static str)],
}

const ENV_PROVIDERS: &[EnvProvider] = &[
    EnvProvider {
        name: "openai",
        primary: ("OPENAI_API_KEY", "api_key"),
        extras: &[("OPENAI_MODEL", "model")],
    },
    EnvProvider {
        name: "gemini",
        primary: ("GEMINI_API_KEY", "api_key"),
        extras: &[("GEMINI_MODEL", "model")],
    },
    EnvProvider {
        name: "claude",
        primary: ("ANTHROPIC_API_KEY", "api_key"),
        extras: &[("CLAUDE_MODEL", "model_name")],
    },
    EnvProvider {
        name: "local_llama",
        primary: ("LOCAL_LLAMA_MODEL_PATH", "model_path"),
        extras: &[
            ("LOCAL_LLAMA_CONTEXT_SIZE", "context_size"),
            ("LOCAL_LLAMA_SERVER_URL", "server_url"),
            ("LOCAL_LLAMA_GPU_LAYERS", "n_gpu_layers"),
        ],
    },
    EnvProvider {
        name: "llama",
        primary: ("HF_TOKEN", "hf_token"),
        extras: &[("LLAMA_MODEL", "model_name")],
    },
];

/// Load configuration from the process environment.
pub fn load_config() -> Result<GatewayConfig> {
    load_with(|var| std::env::var(var).ok())
}

/// Load configuration using `lookup` for every environment read.
pub fn load_with<F>(lookup: F) -> Result<GatewayConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match lookup(CONFIG_PATH_VAR).filter(|p| !p.is_empty()) {
        Some(path) => from_file(Path::new(&path))?,
        None => {
            debug!("No config file set, using defaults");
            GatewayConfig::default()
        }
    };

    apply_env_overrides(&mut config, &lookup)?;
    config.validate_config()?;

    info!(
        providers = config.providers.len(),
        bind = %config.server.bind_address(),
        "Configuration loaded"
    );
    Ok(config)
}

/// Parse a configuration file, choosing the format by extension.
pub fn from_file(path: &Path) -> Result<GatewayConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let config = match extension.as_deref() {
        Some("yaml" | "yml") => {
            serde_yaml::from_str(&content).map_err(|e| ConfigError::parse(path, e))?
        }
        Some("toml") => toml::from_str(&content).map_err(|e| ConfigError::parse(path, e))?,
        Some("json") => {
            serde_json::from_str(&content).map_err(|e| ConfigError::parse(path, e))?
        }
        _ => {
            return Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
            })
        }
    };

    debug!(path = %path.display(), "Loaded config file");
    Ok(config)
}

/// Apply environment overrides on top of `config`.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: &F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |var: &str| lookup(var).filter(|v| !v.is_empty());

    if let Some(host) = get("GATEWAY_HOST") {
        config.server.host = host;
    }

    for var in ["GATEWAY_PORT", "PORT"] {
        if let Some(port) = get(var) {
            config.server.port = port
                .parse()
                .map_err(|_| ConfigError::invalid_env(var, format!("not a port number: {port}")))?;
            break;
        }
    }

    if let Some(level) = get("GATEWAY_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = get("GATEWAY_LOG_FORMAT") {
        config.logging.format = format;
    }

    for provider in ENV_PROVIDERS {
        let (var, key) = provider.primary;
        if let Some(value) = get(var) {
            debug!(provider = provider.name, var, "Provider enabled from environment");
            config.provider_entry(provider.name).settings.insert(key, value);
        }

        let Some(entry) = config.providers.iter_mut().find(|p| p.name == provider.name) else {
            continue;
        };
        for (var, key) in provider.extras {
            if let Some(value) = get(*var) {
                entry.settings.insert(*key, value);
            }
        }
    }

    Ok(())
}
