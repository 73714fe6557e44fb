//! POST /messages - deliver a client message to its session.

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::FutureExt;
use serde::Deserialize;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error, warn};

use super::error_response;
use crate::mcp::{Delivery, TransportError};
use crate::state::AppState;

/// Query string of the message endpoint.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// Route one JSON-RPC message to the transport named by `sessionId`.
///
/// Replies are not returned here: they travel over the session's SSE
/// stream. This endpoint only acknowledges receipt.
pub async fn submit_message(
    State(state): State<AppState>,
    query: Result<Query<MessageQuery>, QueryRejection>,
    body: Bytes,
) -> Response {
    let session_id = match query {
        Ok(Query(query)) => query.session_id.filter(|id| !id.is_empty()),
        Err(e) => {
            warn!("MCP: failed to parse message query string: {}", e);
            return error_response(StatusCode::BAD_REQUEST, "Malformed request URL");
        }
    };

    let Some(session_id) = session_id else {
        return error_response(StatusCode::BAD_REQUEST, "Missing sessionId query parameter");
    };

    let Some(transport) = state.sessions().lookup(&session_id) else {
        debug!("MCP: message for unknown session {}", session_id);
        return error_response(StatusCode::NOT_FOUND, "Unknown or expired sessionId");
    };

    let Some(transport) = transport.into_inbound() else {
        error!(
            "MCP: transport for session {} cannot accept client messages",
            session_id
        );
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Transport type mismatch or invalid session",
        );
    };

    match AssertUnwindSafe(transport.receive(body)).catch_unwind().await {
        Ok(Ok(Delivery::Accepted)) => (StatusCode::ACCEPTED, "Accepted").into_response(),
        Ok(Ok(Delivery::Rejected(reason))) => error_response(StatusCode::BAD_REQUEST, reason),
        Ok(Err(TransportError::Closed)) => {
            error_response(StatusCode::NOT_FOUND, "Unknown or expired sessionId")
        }
        Ok(Err(e)) => {
            error!("MCP: error delivering message to {}: {}", session_id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
        Err(_) => {
            error!("MCP: panic while delivering message to {}", session_id);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}
