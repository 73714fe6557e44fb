//! GET /sse - open an MCP session stream.

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{
        sse::{KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use futures::StreamExt;
use std::convert::Infallible;
use tracing::{debug, error, info};

use super::error_response;
use crate::mcp::{Session, SseTransport};
use crate::state::AppState;

/// Open a new session and stream its frames as server-sent events.
///
/// The first event is always `endpoint`, carrying the URL the client must
/// POST its messages to. The session ends when the client disconnects.
pub async fn open_stream(State(state): State<AppState>) -> Response {
    let session = Session::new();
    let session_id = session.id.clone();
    debug!("MCP: SSE connection requested, new session {}", session_id);

    let settings = state.transport_settings();
    let (transport, stream) = match SseTransport::connect(
        session,
        state.handler(),
        state.sessions().clone(),
        settings.queue_capacity,
    ) {
        Ok(pair) => pair,
        Err(e) => {
            error!("MCP: failed to create transport for {}: {}", session_id, e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Transport error");
        }
    };

    if let Err(e) = state.sessions().register(&session_id, transport) {
        error!("MCP: failed to register session: {}", e);
        // Dropping the stream closes the transport. Its release is a no-op
        // because this transport never owned a registry entry.
        drop(stream);
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Transport error");
    }

    info!(
        "MCP: SSE stream opened for session {} (open sessions: {})",
        session_id,
        state.sessions().session_count()
    );

    let events = stream.map(|frame| Ok::<_, Infallible>(frame.into_event()));
    let mut response = Sse::new(events)
        .keep_alive(KeepAlive::new().interval(settings.keep_alive))
        .into_response();
    // No `Connection: keep-alive` header: HTTP/1.1 keeps the connection open
    // by default and HTTP/2 forbids connection-specific headers.
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}
