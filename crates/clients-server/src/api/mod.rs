//! HTTP API for the clients server.

mod handlers;
mod middleware;
mod types;

pub use handlers::*;
pub use middleware::{
    digest_key, logging_middleware, rate_limit_middleware, require_api_key, RateLimitState,
    API_KEY_HEADER,
};
pub use types::*;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use registration_saga::Registrar;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub registrar: Arc<Registrar>,
    /// SHA-256 of the expected `X-API-KEY`
    pub api_key_digest: Arc<[u8; 32]>,
}

impl AppState {
    pub fn new(registrar: Arc<Registrar>, api_key: &str) -> Self {
        Self {
            registrar,
            api_key_digest: Arc::new(digest_key(api_key)),
        }
    }
}

/// Create the API router with the default rate limit.
pub fn create_router(state: AppState) -> Router {
    create_router_with_rate_limit(state, RateLimitState::new(30))
}

/// Create the API router with custom rate limiting.
pub fn create_router_with_rate_limit(state: AppState, rate_limit: RateLimitState) -> Router {
    let protected = Router::new()
        .route("/regions", get(handlers::list_regions))
        .route("/register", post(handlers::register))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ))
        .layer(axum_middleware::from_fn_with_state(
            rate_limit,
            rate_limit_middleware,
        ));

    Router::new()
        // Health check (no auth, no rate limiting)
        .route("/health", get(handlers::health))
        .merge(protected)
        .layer(axum_middleware::from_fn(logging_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
