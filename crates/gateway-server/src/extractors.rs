//! Request extraction helpers.

use axum::{async_trait, body::Bytes, extract::FromRequestParts, http::request::Parts};
use serde_json::Value;

use crate::error::ApiError;

/// Request ID taken from the caller's headers or generated
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get("x-request-id")
            .or_else(|| parts.headers.get("x-correlation-id"))
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from);

        Ok(Self(id))
    }
}

/// Parse a JSON request body; an empty body is `null`
pub fn parse_json_body(body: &Bytes) -> Result<Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("Invalid JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    async fn request_id(request: Request<()>) -> String {
        let (mut parts, ()) = request.into_parts();
        RequestId::from_request_parts(&mut parts, &())
            .await
            .unwrap()
            .0
    }

    #[tokio::test]
    async fn test_request_id_from_header() {
        let request = Request::builder()
            .header("x-request-id", "abc-123")
            .body(())
            .unwrap();
        assert_eq!(request_id(request).await, "abc-123");

        let request = Request::builder()
            .header("x-correlation-id", "corr-1")
            .body(())
            .unwrap();
        assert_eq!(request_id(request).await, "corr-1");
    }

    #[tokio::test]
    async fn test_request_id_generated() {
        let id = request_id(Request::builder().body(()).unwrap()).await;
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_parse_json_body() {
        let value = parse_json_body(&Bytes::from_static(br#"{"prompt":"hi"}"#)).unwrap();
        assert_eq!(value["prompt"], "hi");

        assert_eq!(parse_json_body(&Bytes::new()).unwrap(), Value::Null);
        assert_eq!(
            parse_json_body(&Bytes::from_static(b"  \n")).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_parse_json_body_rejects_garbage() {
        let err = parse_json_body(&Bytes::from_static(b"{not json")).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.starts_with("Invalid JSON"));
    }
}
