//! API request and response types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Service description returned from the root endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    /// Path -> human readable purpose.
    pub endpoints: BTreeMap<String, String>,
}

/// Error body returned by the HTTP endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
