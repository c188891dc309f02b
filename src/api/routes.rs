//! API route definitions

use super::handlers::{self, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // JSON-RPC
        .route("/mcp", post(handlers::rpc))
        .route("/", post(handlers::rpc))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
