//! Builds the `/queue/*` router over a shared
//! [`lightq_engine::Engine`], with request-id tagging, tracing, and a
//! per-request timeout applied uniformly.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::context::{MakeRequestUuid, request_id_header};
use crate::handlers::{self, AppState};

/// Builds the full router over `state`. `request_timeout` bounds every
/// request handler; the engine's own per-call `cache-command-timeout-seconds`
/// bounds each individual store/cache call beneath it and is configured
/// shorter so a single slow dependency call cannot itself eat the whole
/// request budget.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    let request_id_header = request_id_header();

    Router::new()
        .route("/queue/push", post(handlers::push))
        .route("/queue/batch/push", post(handlers::batch_push))
        .route("/queue/pop", get(handlers::pop))
        .route("/queue/ack", post(handlers::ack))
        .route("/queue/nack", post(handlers::nack))
        .route("/queue/extend-visibility", post(handlers::extend_visibility))
        .route("/queue/view", get(handlers::view))
        .route("/queue/dlq/view", get(handlers::dlq_view))
        .route("/queue/dlq/replay", post(handlers::dlq_replay))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(tower_http::request_id::SetRequestIdLayer::new(
                    request_id_header.clone(),
                    MakeRequestUuid,
                ))
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(request_timeout))
                .layer(tower_http::request_id::PropagateRequestIdLayer::new(request_id_header)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use lightq_cache_memory::MemoryCache;
    use lightq_store_memory::MemoryStore;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState {
            engine: Arc::new(lightq_engine::Engine::new(
                Arc::new(MemoryStore::new()),
                Arc::new(MemoryCache::new(Duration::from_secs(300), 1000)),
                lightq_engine::EngineConfig::default(),
            )),
            groups: crate::registry::GroupRegistry::new(),
        }
    }

    #[tokio::test]
    async fn push_then_pop_round_trips_content() {
        let app = router(test_state(), Duration::from_secs(5));

        let push_response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/queue/push")
                    .header("consumerGroup", "g1")
                    .body(Body::from("hello"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(push_response.status(), StatusCode::OK);

        let pop_response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/queue/pop")
                    .header("consumerGroup", "g1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(pop_response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn push_without_group_header_is_bad_request() {
        let app = router(test_state(), Duration::from_secs(5));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/queue/push")
                    .body(Body::from("hello"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn pop_on_empty_group_is_not_found() {
        let app = router(test_state(), Duration::from_secs(5));
        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/queue/pop")
                    .header("consumerGroup", "empty")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
