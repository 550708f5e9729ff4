//! End-to-end tests for the AI Model Gateway HTTP API.
//!
//! Requests go through the full router with the network-free example adapter,
//! plus an OpenAI adapter pointed at a mock server for failure envelopes.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use gateway_config::{GatewayConfig, ProviderConfig};
use gateway_core::AdapterConfig;
use gateway_routing::Gateway;
use gateway_server::routes::create_router;
use gateway_server::AppState;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

/// Gateway with the example adapter configured as `example`
fn create_test_state() -> AppState {
    let gateway = Gateway::default();
    gateway
        .configure("example", "example", &AdapterConfig::new(), 60)
        .expect("example adapter configures");
    AppState::new(gateway)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(state: AppState, request: Request<Body>) -> (StatusCode, Value) {
    let response = create_router(state).oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

const BOUNDARY: &str = "gateway-test-boundary";

fn multipart_request(uri: &str, parts: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, filename, content) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[cfg(test)]
mod health_endpoint_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_endpoint_returns_ok() {
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(create_test_state(), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["providers"], 1);
    }

    #[tokio::test]
    async fn test_models_lists_configured_providers() {
        let request = Request::builder()
            .uri("/api/models")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(create_test_state(), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["example"]["provider"], "Example");
        assert_eq!(json["example"]["model"], "default-model");
        assert_eq!(json.as_object().unwrap().len(), 1);
    }
}

#[cfg(test)]
mod generation_tests {
    use super::*;

    #[tokio::test]
    async fn test_generate_success() {
        let request = post_json("/api/example/generate", &json!({"prompt": "Hello world"}));
        let (status, json) = send(create_test_state(), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["text"], "Example response to: Hello world");
        assert_eq!(json["model"], "default-model");
        assert_eq!(json["metadata"]["provider"], "example");
    }

    #[tokio::test]
    async fn test_generate_sanitizes_prompt() {
        let request = post_json(
            "/api/example/generate",
            &json!({"prompt": "Hello <b>world</b>!"}),
        );
        let (status, json) = send(create_test_state(), request).await;

        assert_eq!(status, StatusCode::OK);
        let text = json["text"].as_str().unwrap();
        assert!(!text.contains('<'));
        assert!(!text.contains('>'));
    }

    #[tokio::test]
    async fn test_generate_missing_prompt() {
        let request = post_json("/api/example/generate", &json!({}));
        let (status, json) = send(create_test_state(), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No prompt provided");
        assert_eq!(json["code"], "validation_error");
    }

    #[tokio::test]
    async fn test_generate_prompt_too_long() {
        let request = post_json(
            "/api/example/generate",
            &json!({"prompt": "a".repeat(5000)}),
        );
        let (status, _) = send(create_test_state(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_invalid_json_body() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/example/generate")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, json) = send(create_test_state(), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().starts_with("Invalid JSON"));
    }

    #[tokio::test]
    async fn test_chat_success() {
        let request = post_json(
            "/api/example/chat",
            &json!({"messages": [
                {"role": "system", "content": "Be brief"},
                {"role": "user", "content": "How are you?"}
            ]}),
        );
        let (status, json) = send(create_test_state(), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["response"], "Example response to: How are you?");
        assert_eq!(json["messages"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_chat_invalid_messages() {
        let request = post_json(
            "/api/example/chat",
            &json!({"messages": [{"role": "wizard", "content": "hi"}]}),
        );
        let (status, json) = send(create_test_state(), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid message format");
    }

    #[tokio::test]
    async fn test_embed_success() {
        let request = post_json("/api/example/embed", &json!({"text": "hello"}));
        let (status, json) = send(create_test_state(), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["dimensions"], 8);
        assert_eq!(json["embedding"].as_array().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_moderation_unsupported() {
        let request = post_json("/api/example/moderate", &json!({"content": "hello"}));
        let (status, json) = send(create_test_state(), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "capability_unsupported");
    }
}

#[cfg(test)]
mod provider_tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let request = post_json("/api/mistral/generate", &json!({"prompt": "hi"}));
        let (status, json) = send(create_test_state(), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Model mistral not configured");
        assert_eq!(json["code"], "unknown_provider");
    }

    #[tokio::test]
    async fn test_unconfigured_provider_regardless_of_payload() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/mistral/chat")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, json) = send(create_test_state(), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "unknown_provider");
    }

    #[tokio::test]
    async fn test_provider_failure_is_500_envelope() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(503)
                    .set_body_json(json!({"error": {"message": "overloaded"}})),
            )
            .mount(&server)
            .await;

        let mut config = GatewayConfig::default();
        config.providers.push(
            ProviderConfig::new("openai")
                .with_setting("api_key", "sk-test")
                .with_setting("base_url", server.uri()),
        );
        let state = AppState::from_config(&config);

        let request = post_json("/api/openai/generate", &json!({"prompt": "hi"}));
        let (status, json) = send(state, request).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["error"].as_str().unwrap().contains("overloaded"));
        assert!(json.get("model").is_some());
    }
}

#[cfg(test)]
mod image_tests {
    use super::*;

    #[tokio::test]
    async fn test_image_analysis_unsupported_by_example() {
        let request = multipart_request(
            "/api/example/analyze-image",
            &[
                ("image", Some("cat.png"), b"\x89PNG\r\n\x1a\nfake".as_slice()),
                ("prompt", None, b"What is this?".as_slice()),
            ],
        );
        let (status, json) = send(create_test_state(), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "capability_unsupported");
    }

    #[tokio::test]
    async fn test_image_missing() {
        let request = multipart_request("/api/example/analyze-image", &[("prompt", None, b"hi".as_slice())]);
        let (status, json) = send(create_test_state(), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No image provided");
    }

    #[tokio::test]
    async fn test_image_not_multipart() {
        let request = post_json("/api/example/analyze-image", &json!({"image": "abc"}));
        let (status, json) = send(create_test_state(), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No image provided");
    }

    #[tokio::test]
    async fn test_image_invalid_options() {
        let request = multipart_request(
            "/api/example/analyze-image",
            &[
                ("image", Some("cat.png"), b"\x89PNG".as_slice()),
                ("options", None, b"{broken".as_slice()),
            ],
        );
        let (status, json) = send(create_test_state(), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().starts_with("Invalid options JSON"));
    }
}
