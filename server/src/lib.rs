pub mod chat;
pub mod config;
pub mod error;
pub mod handlers;
pub mod state;
pub mod validation;
pub mod ws;

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Request},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, key_extractor::GlobalKeyExtractor, GovernorLayer};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::handlers::{chat_endpoint, conversation_history, health_check, list_voices, voice_chat_endpoint};
use crate::state::AppState;
use crate::ws::stream_ws;

/// Routes without middleware, mounted at `/` and under `/api`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
        .route("/voices", get(list_voices))
        .route("/chat", post(chat_endpoint))
        .route("/voice-chat", post(voice_chat_endpoint))
        .route("/chat/stream", get(stream_ws))
        .route("/conversations/{id}", get(conversation_history))
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let methods = [
        axum::http::Method::GET,
        axum::http::Method::POST,
        axum::http::Method::OPTIONS,
    ];
    let permissive = || {
        CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods.clone())
            .allow_headers(tower_http::cors::Any)
            .allow_credentials(false)
    };

    let Some(ref allowed_origins) = config.cors_allowed_origins else {
        warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (development mode)");
        return permissive();
    };

    let origins: Vec<axum::http::HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse::<axum::http::HeaderValue>().ok())
        .collect();

    if origins.is_empty() {
        warn!("CORS_ALLOWED_ORIGINS is empty, falling back to permissive CORS");
        return permissive();
    }

    info!("CORS configured for {} origin(s)", origins.len());
    CorsLayer::new()
        .allow_origin(tower_http::cors::AllowOrigin::list(origins))
        .allow_methods(methods)
        .allow_headers(tower_http::cors::Any)
        .allow_credentials(false)
}

// Request ID middleware for tracing
async fn add_request_id(mut request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    if let Ok(value) = axum::http::HeaderValue::from_str(&request_id) {
        request.headers_mut().insert("x-request-id", value.clone());
        let mut response = next.run(request).await;
        response.headers_mut().insert("x-request-id", value);
        return response;
    }
    next.run(request).await
}

/// Full application: routes, shared state and the middleware stack.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let config = state.config.clone();

    // Global limit: all clients share one bucket, which behaves the same
    // behind proxies where client IPs are not visible.
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(u64::from((config.rate_limit_per_minute / 60).max(1)))
            .burst_size(config.rate_limit_per_minute.max(1))
            .key_extractor(GlobalKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("invalid rate limit configuration"))?,
    );
    info!("Rate limiting: {} requests per minute", config.rate_limit_per_minute);

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer::new(governor_conf))
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(cors_layer(&config))
        .into_inner();

    let app = Router::new()
        .merge(api_routes())
        .nest("/api", api_routes())
        .layer(axum::middleware::from_fn(add_request_id))
        // Recordings can exceed the 2 MB extractor default.
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(middleware_stack)
        .with_state(state);

    Ok(app)
}
