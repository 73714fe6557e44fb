//! Sluice backend library.
//!
//! This module exposes the application builder for use in tests.

use axum::http::{header, HeaderValue, Method};
use axum::{
    middleware,
    routing::{get, post},
    Extension, Router,
};
use sluice_types::{MESSAGES_PATH, SSE_PATH};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod directory;
pub mod mcp;
pub mod state;
pub mod tools;

use state::AppState;

/// Create the Axum application router.
///
/// This function is used both by the main server binary and by integration tests.
pub fn create_app() -> Router {
    create_app_with_state(AppState::default())
}

/// Create the Axum application router with a given state.
pub fn create_app_with_state(state: AppState) -> Router {
    create_app_with_config(state, auth::AuthConfig::from_env(), Vec::new())
}

/// Create the Axum application router with a given state, auth configuration, and CORS origins.
///
/// If `cors_allowed_origins` is empty, any origin is allowed.
/// Otherwise, only the specified origins are allowed.
pub fn create_app_with_config(
    state: AppState,
    auth_config: auth::AuthConfig,
    cors_allowed_origins: Vec<String>,
) -> Router {
    let auth_config = Arc::new(auth_config);

    if auth_config.enabled {
        tracing::info!("Authentication enabled (API key)");
    } else {
        auth::warn_if_disabled(&auth_config);
    }

    // Service info and MCP transport (requires authentication)
    let protected_router = Router::new()
        .route("/", get(api::root::service_info))
        .route(SSE_PATH, get(api::sse::open_stream))
        .route(MESSAGES_PATH, post(api::messages::submit_message))
        .layer(middleware::from_fn(auth::auth_middleware));

    Router::new()
        .route("/health", get(health))
        .merge(protected_router)
        .layer(Extension(auth_config))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&cors_allowed_origins))
        .with_state(state)
}

fn cors_layer(cors_allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    if cors_allowed_origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = cors_allowed_origins
            .iter()
            .filter_map(|o| o.parse::<HeaderValue>().ok())
            .collect();
        cors.allow_origin(origins).allow_credentials(true)
    }
}

/// Health check endpoint.
async fn health() -> &'static str {
    "OK"
}
