use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension, Json,
};
use sluice_types::ErrorResponse;
use std::sync::Arc;
use tracing::{debug, warn};

/// Environment variable holding the shared API key.
pub const API_KEY_ENV: &str = "SLUICE_API_KEY";

/// Query parameter accepted in place of the Authorization header, for
/// clients (like browser `EventSource`) that cannot set headers.
pub const AUTH_TOKEN_PARAM: &str = "auth_token";

/// Authentication configuration loaded from environment variables
#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    /// API key for bearer token auth (from SLUICE_API_KEY env var)
    pub api_key: Option<String>,
    /// Whether authentication is enabled
    pub enabled: bool,
}

impl AuthConfig {
    pub fn from_env() -> Self {
        Self::with_api_key(std::env::var(API_KEY_ENV).ok())
    }

    /// Build a config from an optional key. Blank keys count as unset.
    pub fn with_api_key(api_key: Option<String>) -> Self {
        let api_key = api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        Self {
            enabled: api_key.is_some(),
            api_key,
        }
    }

    /// Authentication turned off.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Verify API key
    pub fn verify_api_key(&self, key: &str) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|k| !key.is_empty() && k == key.trim())
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new("Unauthorized: Invalid Bearer token")),
    )
        .into_response()
}

/// Bearer token from the Authorization header, if present.
fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Token from the `auth_token` query parameter, if present.
fn query_token(request: &Request) -> Option<String> {
    request.uri().query()?.split('&').find_map(|pair| {
        let value = pair.strip_prefix(AUTH_TOKEN_PARAM)?.strip_prefix('=')?;
        urlencoding::decode(value).ok().map(|v| v.into_owned())
    })
}

/// Authentication middleware: checks the bearer token, then the query token.
pub async fn auth_middleware(
    Extension(config): Extension<Arc<AuthConfig>>,
    request: Request,
    next: Next,
) -> Response {
    if !config.enabled {
        return next.run(request).await;
    }

    if bearer_token(&request).is_some_and(|token| config.verify_api_key(token)) {
        return next.run(request).await;
    }

    if query_token(&request).is_some_and(|token| config.verify_api_key(&token)) {
        return next.run(request).await;
    }

    debug!(
        "Rejected unauthenticated request to {}",
        request.uri().path()
    );
    unauthorized()
}

/// Log a warning when the server is about to run without authentication.
pub fn warn_if_disabled(config: &AuthConfig) {
    if !config.enabled {
        warn!(
            "{} is not set: authentication is DISABLED and every endpoint is public",
            API_KEY_ENV
        );
    }
}
