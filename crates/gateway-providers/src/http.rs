//! HTTP plumbing shared by the network-backed adapters.

use gateway_core::{AdapterConfig, GatewayError, GatewayResult};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, trace};

/// Request timeout when `timeout_secs` is not configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Build the HTTP client for an adapter
pub fn build_client(config: &AdapterConfig) -> GatewayResult<Client> {
    let timeout = config
        .get_u64("timeout_secs")?
        .map_or(DEFAULT_TIMEOUT, Duration::from_secs);

    Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(100)
        .build()
        .map_err(|e| GatewayError::internal(format!("Failed to create HTTP client: {e}")))
}

/// Configured base URL (under `key`) or the provider default, without a trailing slash
pub fn base_url(config: &AdapterConfig, key: &str, default: &str) -> String {
    config
        .get_str(key)
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}

/// Send a request and decode a JSON success body.
///
/// Non-2xx responses are turned into [`GatewayError::ProviderCall`] carrying
/// the provider's own error message when one can be extracted.
pub async fn execute<T: DeserializeOwned>(
    provider: &'static str,
    request: RequestBuilder,
) -> GatewayResult<T> {
    // Drop the URL from transport errors; some providers authenticate through it
    let response = request.send().await.map_err(|e| {
        let e = e.without_url();
        error!(provider = provider, error = %e, "Provider request failed");
        GatewayError::provider(provider, format!("Request failed: {e}"), None)
    })?;

    let status = response.status();
    let body = response.text().await.map_err(|e| {
        let e = e.without_url();
        GatewayError::provider(provider, format!("Failed to read response: {e}"), None)
    })?;

    trace!(provider = provider, status = %status, body = %body, "Received provider response");

    if !status.is_success() {
        return Err(parse_error(provider, status.as_u16(), &body));
    }

    serde_json::from_str(&body).map_err(|e| {
        GatewayError::provider(
            provider,
            format!("Invalid response JSON: {e}"),
            Some(status.as_u16()),
        )
    })
}

/// Parse an error body.
///
/// Understands `{"error": {"message": ..}}` (OpenAI, Anthropic, Google) and
/// `{"error": ".."}` (Hugging Face, llama.cpp); anything else is quoted raw.
pub fn parse_error(provider: &str, status: u16, body: &str) -> GatewayError {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ErrorDetail {
        Structured { message: String },
        Plain(String),
    }

    let message = match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            error: ErrorDetail::Structured { message } | ErrorDetail::Plain(message),
        }) => message,
        Err(_) => format!("HTTP {status}: {body}"),
    };

    GatewayError::provider(provider, message, Some(status))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_of(err: GatewayError) -> (String, Option<u16>) {
        match err {
            GatewayError::ProviderCall {
                message,
                status_code,
                ..
            } => (message, status_code),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_structured_error() {
        let err = parse_error(
            "openai",
            401,
            r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}}"#,
        );
        assert_eq!(
            message_of(err),
            ("Incorrect API key provided".to_string(), Some(401))
        );
    }

    #[test]
    fn test_parse_plain_error() {
        let err = parse_error("llama", 503, r#"{"error": "Model is currently loading"}"#);
        assert_eq!(message_of(err).0, "Model is currently loading");
    }

    #[test]
    fn test_parse_unstructured_error() {
        let err = parse_error("gemini", 502, "Bad Gateway");
        assert_eq!(message_of(err).0, "HTTP 502: Bad Gateway");
    }

    #[test]
    fn test_base_url_trims_trailing_slash() {
        let config = AdapterConfig::new().with("base_url", "http://localhost:9000/");
        assert_eq!(
            base_url(&config, "base_url", "https://api.openai.com/v1"),
            "http://localhost:9000"
        );
        assert_eq!(
            base_url(&AdapterConfig::new(), "base_url", "https://api.openai.com/v1"),
            "https://api.openai.com/v1"
        );
    }
}
