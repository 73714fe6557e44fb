//! SSE transport for MCP sessions.
//!
//! One [`SseTransport`] owns the write side of one open SSE stream. Inbound
//! JSON-RPC messages arrive out-of-band through the message endpoint and are
//! handed to [`InboundTransport::receive`]; replies travel back over the
//! stream as `message` events.
//!
//! All frames for a session pass through a single bounded queue that is
//! drained by the HTTP response body, so concurrent senders can never
//! interleave partial frames and frames leave in the order `send` was called.

use async_trait::async_trait;
use axum::body::Bytes;
use axum::response::sse::Event;
use futures::{FutureExt, Stream, StreamExt};
use parking_lot::{Mutex, RwLock};
use sluice_types::{
    JsonRpcError, JsonRpcMessage, JsonRpcRequest, JsonRpcResponse, RequestId, MESSAGES_PATH,
    SESSION_ID_PARAM,
};
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::handler::MessageHandler;
use super::session::{Session, SessionRegistry};

/// SSE event name for the initial endpoint announcement.
pub const ENDPOINT_EVENT: &str = "endpoint";

/// SSE event name for JSON-RPC frames.
pub const MESSAGE_EVENT: &str = "message";

const STATE_OPEN: u8 = 0;
const STATE_CLOSING: u8 = 1;
const STATE_CLOSED: u8 = 2;

/// Lifecycle of a transport. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Open,
    Closing,
    Closed,
}

/// Error type for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Transport closed")]
    Closed,

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Outbound stream unavailable")]
    StreamUnavailable,
}

/// Synchronous outcome of handing a payload to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The message was queued for handling; any reply goes out on the stream.
    Accepted,
    /// The payload was malformed. An error frame has been pushed already.
    Rejected(String),
}

/// A transport bound to one session.
#[async_trait]
pub trait Transport: Send + Sync {
    /// The session this transport serves.
    fn session(&self) -> &Session;

    fn state(&self) -> TransportState;

    fn is_open(&self) -> bool {
        self.state() == TransportState::Open
    }

    /// Push one JSON-RPC message to the client.
    async fn send(&self, message: &JsonRpcMessage) -> Result<(), TransportError>;

    /// Close the transport and drop its registry entry. Idempotent.
    fn close(&self);

    /// Capability check for out-of-band message delivery.
    fn into_inbound(self: Arc<Self>) -> Option<Arc<dyn InboundTransport>> {
        None
    }
}

/// A transport that accepts client messages delivered out-of-band.
#[async_trait]
pub trait InboundTransport: Transport {
    /// Validate and dispatch one raw message body.
    async fn receive(self: Arc<Self>, payload: Bytes) -> Result<Delivery, TransportError>;
}

/// One frame on the SSE stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Tells the client where to POST its messages.
    Endpoint(String),
    /// A serialized JSON-RPC message, always a single line.
    Message(String),
}

impl Frame {
    pub fn event_name(&self) -> &'static str {
        match self {
            Frame::Endpoint(_) => ENDPOINT_EVENT,
            Frame::Message(_) => MESSAGE_EVENT,
        }
    }

    pub fn data(&self) -> &str {
        match self {
            Frame::Endpoint(data) | Frame::Message(data) => data,
        }
    }

    /// Convert into an axum SSE event.
    pub fn into_event(self) -> Event {
        Event::default().event(self.event_name()).data(self.data())
    }
}

/// Transport that pushes frames over an SSE response body.
pub struct SseTransport {
    session: Session,
    state: AtomicU8,
    outbound: mpsc::Sender<Frame>,
    handler: RwLock<Arc<dyn MessageHandler>>,
    in_flight: Mutex<HashSet<RequestId>>,
    cancel: CancellationToken,
    registry: SessionRegistry,
}

impl SseTransport {
    /// Bind a new transport to a fresh outbound stream.
    ///
    /// The endpoint frame is queued before returning, so the stream is known
    /// to be writable by the time the caller registers the transport.
    pub fn connect(
        session: Session,
        handler: Arc<dyn MessageHandler>,
        registry: SessionRegistry,
        queue_capacity: usize,
    ) -> Result<(Arc<Self>, SessionStream), TransportError> {
        let (outbound, frames) = mpsc::channel(queue_capacity.max(1));

        let endpoint = format!("{}?{}={}", MESSAGES_PATH, SESSION_ID_PARAM, session.id);
        outbound
            .try_send(Frame::Endpoint(endpoint))
            .map_err(|_| TransportError::StreamUnavailable)?;

        let transport = Arc::new(Self {
            session,
            state: AtomicU8::new(STATE_OPEN),
            outbound,
            handler: RwLock::new(handler),
            in_flight: Mutex::new(HashSet::new()),
            cancel: CancellationToken::new(),
            registry,
        });
        let stream = SessionStream::new(transport.clone(), frames);
        Ok((transport, stream))
    }

    /// Current message handler.
    pub fn handler(&self) -> Arc<dyn MessageHandler> {
        self.handler.read().clone()
    }

    /// Replace the message handler. Requests already dispatched keep the old one.
    pub fn set_handler(&self, handler: Arc<dyn MessageHandler>) {
        *self.handler.write() = handler;
    }

    /// Number of requests awaiting a reply.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    async fn push(&self, response: JsonRpcResponse) -> Result<(), TransportError> {
        self.send(&JsonRpcMessage::Response(response)).await
    }

    /// Run one request through the handler and push exactly one reply.
    async fn dispatch_request(self: Arc<Self>, handler: Arc<dyn MessageHandler>, request: JsonRpcRequest) {
        let id = request.id.clone();
        let method = request.method.clone();
        debug!(
            "MCP session {}: dispatching {} (id {})",
            self.session.id, method, id
        );

        let call = AssertUnwindSafe(handler.handle_request(&self.session.id, request)).catch_unwind();
        let outcome = tokio::select! {
            _ = self.cancel.cancelled() => {
                debug!("MCP session {}: closed while handling {} (id {})", self.session.id, method, id);
                self.in_flight.lock().remove(&id);
                return;
            }
            outcome = call => outcome,
        };

        let response = match outcome {
            Ok(Ok(result)) => JsonRpcResponse::success(id.clone(), result),
            Ok(Err(err)) => {
                debug!(
                    "MCP session {}: {} (id {}) failed: {}",
                    self.session.id, method, id, err
                );
                JsonRpcResponse::failure(Some(id.clone()), err)
            }
            Err(_) => {
                error!(
                    "MCP session {}: handler panicked on {} (id {})",
                    self.session.id, method, id
                );
                JsonRpcResponse::failure(
                    Some(id.clone()),
                    JsonRpcError::internal_error("Internal error while handling request"),
                )
            }
        };

        let sent = self.push(response).await;
        self.in_flight.lock().remove(&id);
        if let Err(e) = sent {
            debug!(
                "MCP session {}: dropping reply for id {}: {}",
                self.session.id, id, e
            );
        }
    }
}

#[async_trait]
impl Transport for SseTransport {
    fn session(&self) -> &Session {
        &self.session
    }

    fn state(&self) -> TransportState {
        match self.state.load(Ordering::Acquire) {
            STATE_OPEN => TransportState::Open,
            STATE_CLOSING => TransportState::Closing,
            _ => TransportState::Closed,
        }
    }

    async fn send(&self, message: &JsonRpcMessage) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }

        let frame = Frame::Message(serde_json::to_string(message)?);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TransportError::Closed),
            sent = self.outbound.send(frame) => match sent {
                Ok(()) => Ok(()),
                Err(_) => {
                    warn!("MCP session {}: stream is gone, closing transport", self.session.id);
                    self.close();
                    Err(TransportError::Closed)
                }
            },
        }
    }

    fn close(&self) {
        if self
            .state
            .compare_exchange(STATE_OPEN, STATE_CLOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        self.cancel.cancel();
        self.registry.release(&self.session.id, self);
        self.state.store(STATE_CLOSED, Ordering::Release);
        info!(
            "Closed MCP session: {} (age: {}s)",
            self.session.id,
            self.session.age_secs()
        );
    }

    fn into_inbound(self: Arc<Self>) -> Option<Arc<dyn InboundTransport>> {
        Some(self)
    }
}

#[async_trait]
impl InboundTransport for SseTransport {
    async fn receive(self: Arc<Self>, payload: Bytes) -> Result<Delivery, TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }

        let message = match JsonRpcMessage::from_slice(&payload) {
            Ok(message) => message,
            Err(None) => {
                debug!("MCP session {}: body is not JSON", self.session.id);
                self.push(JsonRpcResponse::failure(None, JsonRpcError::parse_error()))
                    .await?;
                return Ok(Delivery::Rejected("Invalid JSON body".to_string()));
            }
            Err(Some(mut err)) => {
                debug!(
                    "MCP session {}: malformed JSON-RPC message: {}",
                    self.session.id, err
                );
                // A pending request owns its id until its reply goes out.
                if err
                    .id
                    .as_ref()
                    .is_some_and(|id| self.in_flight.lock().contains(id))
                {
                    err.id = None;
                }
                self.push(err.to_response()).await?;
                return Ok(Delivery::Rejected(format!(
                    "Invalid JSON-RPC message: {}",
                    err
                )));
            }
        };

        match message {
            JsonRpcMessage::Request(request) => {
                let fresh = self.in_flight.lock().insert(request.id.clone());
                if !fresh {
                    return Ok(Delivery::Rejected(format!(
                        "Request id {} is already in flight",
                        request.id
                    )));
                }
                let handler = self.handler();
                tokio::spawn(self.dispatch_request(handler, request));
            }
            JsonRpcMessage::Notification(notification) => {
                let handler = self.handler();
                let session_id = self.session.id.clone();
                let cancel = self.cancel.clone();
                tokio::spawn(async move {
                    let method = notification.method.clone();
                    let call =
                        AssertUnwindSafe(handler.handle_notification(&session_id, notification))
                            .catch_unwind();
                    let outcome = tokio::select! {
                        _ = cancel.cancelled() => {
                            debug!("MCP session {}: closed while handling {}", session_id, method);
                            return;
                        }
                        outcome = call => outcome,
                    };
                    if outcome.is_err() {
                        error!(
                            "MCP session {}: handler panicked on notification {}",
                            session_id, method
                        );
                    }
                });
            }
            JsonRpcMessage::Response(response) => {
                debug!(
                    "MCP session {}: client response for id {:?} ignored",
                    self.session.id, response.id
                );
            }
        }

        Ok(Delivery::Accepted)
    }
}

/// The outbound half of a session, consumed by the SSE response body.
///
/// Dropping the stream (client disconnect, server shutdown) closes the
/// transport and removes it from the registry.
pub struct SessionStream {
    frames: Pin<Box<dyn Stream<Item = Frame> + Send>>,
    transport: Arc<SseTransport>,
}

impl SessionStream {
    fn new(transport: Arc<SseTransport>, frames: mpsc::Receiver<Frame>) -> Self {
        let frames =
            ReceiverStream::new(frames).take_until(transport.cancel.clone().cancelled_owned());
        Self {
            frames: Box::pin(frames),
            transport,
        }
    }

    /// Session id of the transport feeding this stream.
    pub fn session_id(&self) -> &str {
        &self.transport.session.id
    }
}

impl Stream for SessionStream {
    type Item = Frame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Frame>> {
        self.frames.as_mut().poll_next(cx)
    }
}

impl Drop for SessionStream {
    fn drop(&mut self) {
        self.transport.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use sluice_types::jsonrpc::error_codes;
    use sluice_types::JsonRpcNotification;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;
    use tokio::time::timeout;

    struct ScriptedHandler;

    #[async_trait]
    impl MessageHandler for ScriptedHandler {
        async fn handle_request(
            &self,
            _session_id: &str,
            request: JsonRpcRequest,
        ) -> Result<Value, JsonRpcError> {
            match request.method.as_str() {
                "ping" => Ok(json!({})),
                "echo" => Ok(request.params.unwrap_or(Value::Null)),
                "fail" => Err(JsonRpcError::internal_error("boom")),
                "panic" => panic!("handler exploded"),
                "slow" => {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok(json!({"done": true}))
                }
                "hang" => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(json!({}))
                }
                other => Err(JsonRpcError::method_not_found(other)),
            }
        }
    }

    fn open() -> (SessionRegistry, Arc<SseTransport>, SessionStream) {
        let registry = SessionRegistry::new();
        let session = Session::new();
        let id = session.id.clone();
        let (transport, stream) =
            SseTransport::connect(session, Arc::new(ScriptedHandler), registry.clone(), 16).unwrap();
        registry.register(&id, transport.clone()).unwrap();
        (registry, transport, stream)
    }

    async fn next_message(stream: &mut SessionStream) -> Value {
        let frame = timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended");
        match frame {
            Frame::Message(data) => serde_json::from_str(&data).unwrap(),
            other => panic!("expected message frame, got {:?}", other),
        }
    }

    async fn skip_endpoint(stream: &mut SessionStream) {
        let frame = stream.next().await.unwrap();
        assert_eq!(frame.event_name(), ENDPOINT_EVENT);
    }

    fn request(id: i64, method: &str) -> Bytes {
        Bytes::from(
            serde_json::to_vec(&json!({"jsonrpc": "2.0", "id": id, "method": method})).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_first_frame_announces_endpoint() {
        let (_registry, transport, mut stream) = open();
        let frame = stream.next().await.unwrap();
        assert_eq!(
            frame,
            Frame::Endpoint(format!("/messages?sessionId={}", transport.session().id))
        );
        assert_eq!(stream.session_id(), transport.session().id);
    }

    #[tokio::test]
    async fn test_request_reply_carries_same_id() {
        let (_registry, transport, mut stream) = open();
        skip_endpoint(&mut stream).await;

        let delivery = transport.clone().receive(request(1, "ping")).await.unwrap();
        assert_eq!(delivery, Delivery::Accepted);

        let reply = next_message(&mut stream).await;
        assert_eq!(reply, json!({"jsonrpc": "2.0", "id": 1, "result": {}}));
    }

    #[tokio::test]
    async fn test_handler_error_becomes_error_frame() {
        let (_registry, transport, mut stream) = open();
        skip_endpoint(&mut stream).await;

        transport.clone().receive(request(9, "fail")).await.unwrap();
        let reply = next_message(&mut stream).await;
        assert_eq!(reply["id"], 9);
        assert_eq!(reply["error"]["code"], error_codes::INTERNAL_ERROR);
        assert!(reply.get("result").is_none());
    }

    #[tokio::test]
    async fn test_handler_panic_is_contained() {
        let (registry, transport, mut stream) = open();
        skip_endpoint(&mut stream).await;

        transport.clone().receive(request(3, "panic")).await.unwrap();
        let reply = next_message(&mut stream).await;
        assert_eq!(reply["id"], 3);
        assert_eq!(reply["error"]["code"], error_codes::INTERNAL_ERROR);

        // Transport survives and keeps serving.
        assert!(transport.is_open());
        assert!(registry.contains(&transport.session().id));
        transport.clone().receive(request(4, "ping")).await.unwrap();
        assert_eq!(next_message(&mut stream).await["id"], 4);
    }

    #[tokio::test]
    async fn test_malformed_envelope_pushes_error_with_request_id() {
        let (_registry, transport, mut stream) = open();
        skip_endpoint(&mut stream).await;

        let body = Bytes::from_static(br#"{"jsonrpc":"1.0","id":5,"method":"ping"}"#);
        let delivery = transport.clone().receive(body).await.unwrap();
        assert!(matches!(delivery, Delivery::Rejected(_)));

        let reply = next_message(&mut stream).await;
        assert_eq!(reply["id"], 5);
        assert_eq!(reply["error"]["code"], error_codes::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_envelope_never_reuses_pending_id() {
        let (_registry, transport, mut stream) = open();
        skip_endpoint(&mut stream).await;

        transport.clone().receive(request(5, "slow")).await.unwrap();
        let body = Bytes::from_static(br#"{"jsonrpc":"2.0","id":5,"method":"x","params":7}"#);
        let delivery = transport.clone().receive(body).await.unwrap();
        assert!(matches!(delivery, Delivery::Rejected(_)));

        let error = next_message(&mut stream).await;
        assert_eq!(error["id"], Value::Null);
        assert_eq!(error["error"]["code"], error_codes::INVALID_REQUEST);

        let reply = next_message(&mut stream).await;
        assert_eq!(reply["id"], 5);
        assert_eq!(reply["result"]["done"], true);
        assert!(timeout(Duration::from_millis(100), stream.next())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_close_cancels_pending_notification() {
        struct SetOnDrop(Arc<AtomicBool>);

        impl Drop for SetOnDrop {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        struct Stuck {
            started: Arc<AtomicBool>,
            dropped: Arc<AtomicBool>,
        }

        #[async_trait]
        impl MessageHandler for Stuck {
            async fn handle_request(
                &self,
                _session_id: &str,
                _request: JsonRpcRequest,
            ) -> Result<Value, JsonRpcError> {
                Ok(json!({}))
            }

            async fn handle_notification(&self, _session_id: &str, _notification: JsonRpcNotification) {
                let _guard = SetOnDrop(self.dropped.clone());
                self.started.store(true, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }

        let started = Arc::new(AtomicBool::new(false));
        let dropped = Arc::new(AtomicBool::new(false));
        let (_registry, transport, mut stream) = open();
        skip_endpoint(&mut stream).await;
        transport.set_handler(Arc::new(Stuck {
            started: started.clone(),
            dropped: dropped.clone(),
        }));

        let body = Bytes::from_static(br#"{"jsonrpc":"2.0","method":"notifications/progress"}"#);
        transport.clone().receive(body).await.unwrap();
        timeout(Duration::from_secs(5), async {
            while !started.load(Ordering::SeqCst) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        transport.close();
        timeout(Duration::from_secs(5), async {
            while !dropped.load(Ordering::SeqCst) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_non_json_pushes_parse_error() {
        let (_registry, transport, mut stream) = open();
        skip_endpoint(&mut stream).await;

        let delivery = transport
            .clone()
            .receive(Bytes::from_static(b"{oops"))
            .await
            .unwrap();
        assert!(matches!(delivery, Delivery::Rejected(_)));

        let reply = next_message(&mut stream).await;
        assert_eq!(reply["id"], Value::Null);
        assert_eq!(reply["error"]["code"], error_codes::PARSE_ERROR);
    }

    #[tokio::test]
    async fn test_notification_gets_no_reply() {
        let (_registry, transport, mut stream) = open();
        skip_endpoint(&mut stream).await;

        let body = Bytes::from_static(br#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#);
        assert_eq!(
            transport.clone().receive(body).await.unwrap(),
            Delivery::Accepted
        );
        assert!(timeout(Duration::from_millis(100), stream.next())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_duplicate_in_flight_id_is_rejected() {
        let (_registry, transport, mut stream) = open();
        skip_endpoint(&mut stream).await;

        transport.clone().receive(request(7, "hang")).await.unwrap();
        let second = transport.clone().receive(request(7, "ping")).await.unwrap();
        assert!(matches!(second, Delivery::Rejected(_)));
        assert_eq!(transport.in_flight_count(), 1);

        transport.close();
        drop(stream);
    }

    #[tokio::test]
    async fn test_dropping_stream_closes_and_unregisters() {
        let (registry, transport, stream) = open();
        let id = transport.session().id.clone();
        assert!(registry.contains(&id));

        drop(stream);

        assert_eq!(transport.state(), TransportState::Closed);
        assert!(!registry.contains(&id));
        let err = transport
            .send(&JsonRpcNotification::new("notifications/x", None).into())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Closed));
        assert!(matches!(
            transport.clone().receive(request(1, "ping")).await,
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_ends_stream() {
        let (registry, transport, mut stream) = open();
        skip_endpoint(&mut stream).await;

        transport.close();
        transport.close();
        assert_eq!(transport.state(), TransportState::Closed);
        assert_eq!(registry.session_count(), 0);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_close_cancels_pending_request() {
        let (_registry, transport, mut stream) = open();
        skip_endpoint(&mut stream).await;

        transport.clone().receive(request(11, "hang")).await.unwrap();
        transport.close();

        // The dispatch task observes the cancellation and clears its slot.
        timeout(Duration::from_secs(5), async {
            while transport.in_flight_count() > 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_sends_produce_whole_frames() {
        let (_registry, transport, mut stream) = open();
        skip_endpoint(&mut stream).await;

        let reader = tokio::spawn(async move {
            let mut seen = Vec::new();
            while seen.len() < 64 {
                match stream.next().await {
                    Some(Frame::Message(data)) => seen.push(data),
                    other => panic!("unexpected frame {:?}", other),
                }
            }
            seen
        });

        let mut senders = Vec::new();
        for i in 0..64 {
            let transport = transport.clone();
            senders.push(tokio::spawn(async move {
                let note = JsonRpcNotification::new(
                    "notifications/progress",
                    Some(json!({"n": i, "pad": "x".repeat(512)})),
                );
                transport.send(&note.into()).await.unwrap();
            }));
        }
        for sender in senders {
            sender.await.unwrap();
        }

        let frames = reader.await.unwrap();
        let mut numbers: Vec<i64> = frames
            .iter()
            .map(|data| {
                let value: Value = serde_json::from_str(data).unwrap();
                assert!(!data.contains('\n'));
                value["params"]["n"].as_i64().unwrap()
            })
            .collect();
        numbers.sort_unstable();
        assert_eq!(numbers, (0..64).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_sends_from_one_task_keep_order() {
        let (_registry, transport, mut stream) = open();
        skip_endpoint(&mut stream).await;

        for i in 0..10 {
            let note = JsonRpcNotification::new("n", Some(json!({"i": i})));
            transport.send(&note.into()).await.unwrap();
        }
        for i in 0..10 {
            assert_eq!(next_message(&mut stream).await["params"]["i"], i);
        }
    }

    #[tokio::test]
    async fn test_replaced_handler_serves_new_requests() {
        struct Constant;

        #[async_trait]
        impl MessageHandler for Constant {
            async fn handle_request(
                &self,
                _session_id: &str,
                _request: JsonRpcRequest,
            ) -> Result<Value, JsonRpcError> {
                Ok(json!("constant"))
            }
        }

        let (_registry, transport, mut stream) = open();
        skip_endpoint(&mut stream).await;

        transport.set_handler(Arc::new(Constant));
        transport.clone().receive(request(1, "ping")).await.unwrap();
        assert_eq!(next_message(&mut stream).await["result"], "constant");
    }
}
