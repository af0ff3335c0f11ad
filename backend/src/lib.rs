//! Commerce MCP gateway library.
//!
//! This module exposes the application builder for use in tests.

use axum::http::HeaderValue;
use axum::http::{header, Method};
use axum::{
    middleware,
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod auth;
pub mod config;
pub mod forwarder;
pub mod mcp;
pub mod state;

use auth::IdentityVerifier;
use state::AppState;

/// Create the Axum application router.
///
/// This function is used both by the main server binary and by integration tests.
pub fn create_app(state: AppState, verifier: Arc<dyn IdentityVerifier>) -> Router {
    create_app_with_config(state, verifier, Vec::new())
}

/// Create the Axum application router with a given state, verifier, and CORS origins.
///
/// If `cors_allowed_origins` is empty, any origin is allowed.
/// Otherwise, only the specified origins are allowed.
pub fn create_app_with_config(
    state: AppState,
    verifier: Arc<dyn IdentityVerifier>,
    cors_allowed_origins: Vec<String>,
) -> Router {
    tracing::info!(
        "Serving {} tools, call-time role checks {}",
        state.registry().len(),
        if state.enforce_call_roles() {
            "enabled"
        } else {
            "disabled"
        }
    );

    // Both MCP endpoints require an authenticated identity
    let mcp_router = Router::new()
        .route("/mcp", get(api::mcp::mcp_connect))
        .route(api::mcp::MESSAGES_PATH, post(api::mcp::mcp_messages))
        .layer(middleware::from_fn(auth::auth_middleware))
        .layer(Extension(verifier));

    Router::new()
        .route("/health", get(health))
        .merge(mcp_router)
        .layer(TraceLayer::new_for_http())
        .layer({
            let cors = CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

            // If no origins specified, allow any origin
            // Otherwise, restrict to the specified origins
            if cors_allowed_origins.is_empty() {
                cors.allow_origin(Any)
            } else {
                let origins: Vec<HeaderValue> = cors_allowed_origins
                    .iter()
                    .filter_map(|o| o.parse::<HeaderValue>().ok())
                    .collect();
                cors.allow_origin(origins).allow_credentials(true)
            }
        })
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "OK"
}
