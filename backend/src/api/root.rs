//! Service info endpoint.

use axum::Json;
use sluice_types::{ServiceInfo, MESSAGES_PATH, SSE_PATH};
use std::collections::BTreeMap;

/// GET / - Describe the service and its endpoints.
pub async fn service_info() -> Json<ServiceInfo> {
    let endpoints = BTreeMap::from([
        ("/".to_string(), "This info".to_string()),
        (
            SSE_PATH.to_string(),
            "SSE endpoint for MCP connections".to_string(),
        ),
        (
            MESSAGES_PATH.to_string(),
            "Message endpoint for MCP clients".to_string(),
        ),
    ]);

    Json(ServiceInfo {
        name: "Sluice MCP Server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: "Model Context Protocol server exposing chat workspace tools".to_string(),
        endpoints,
    })
}
