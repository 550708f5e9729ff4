//! Route configuration for the gateway API.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::{handlers, state::AppState};

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    let settings = state.settings.clone();

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/models", get(handlers::list_models))
        .route("/api/:provider/generate", post(handlers::generate))
        .route("/api/:provider/chat", post(handlers::chat))
        .route("/api/:provider/embed", post(handlers::embed))
        .route("/api/:provider/analyze-image", post(handlers::analyze_image))
        .route("/api/:provider/moderate", post(handlers::moderate))
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(settings.max_body_bytes))
        .layer(TimeoutLayer::new(settings.request_timeout))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use gateway_routing::Gateway;
    use tower::ServiceExt;

    fn app() -> Router {
        create_router(AppState::new(Gateway::default()))
    }

    #[tokio::test]
    async fn test_health_route() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let response = app()
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_generate_requires_post() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/example/generate")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
