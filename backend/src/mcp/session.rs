//! MCP session management.
//!
//! Each session owns the write side of one push stream. Frames are handed to
//! a bounded channel whose single consumer is the HTTP response body, so
//! concurrent producers never interleave partial frames. A failed write means
//! the peer is gone and the session is removed on the spot.

use axum::response::sse::{Event, Sse};
use commerce_mcp_types::JsonRpcResponse;
use futures::Stream;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::frame::Frame;
use crate::auth::Identity;

/// Errors reported to internal callers of the send operations.
///
/// None of these ever reach the protocol client.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("session {0} not found")]
    NotFound(String),

    #[error("session {0} disconnected")]
    Disconnected(String),

    #[error("failed to encode frame: {0}")]
    Encode(#[from] axum::Error),
}

/// Per-session timing settings.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Interval between keepalive frames.
    pub keepalive_interval: Duration,
    /// Idle ceiling measured from the last observed activity.
    pub idle_timeout: Duration,
    /// Frames buffered ahead of the response body.
    pub buffer: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_secs(15),
            idle_timeout: Duration::from_secs(60 * 60),
            buffer: 64,
        }
    }
}

/// Write side of a session stream.
#[derive(Debug, Clone)]
pub struct FrameSink {
    tx: mpsc::Sender<Event>,
}

impl FrameSink {
    async fn write(&self, event: Event) -> bool {
        self.tx.send(event).await.is_ok()
    }

    /// Resolves once the read side has been dropped.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Read side of a session stream.
#[derive(Debug)]
pub struct FrameStream {
    rx: mpsc::Receiver<Event>,
}

impl FrameStream {
    /// Turn the stream into an SSE response. Keepalives come from the
    /// session task, not from the response.
    pub fn into_sse(self) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
        Sse::new(ReceiverStream::new(self.rx).map(Ok::<_, Infallible>))
    }
}

/// Create a connected sink/stream pair.
pub fn frame_channel(buffer: usize) -> (FrameSink, FrameStream) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (FrameSink { tx }, FrameStream { rx })
}

/// An MCP session.
#[derive(Debug)]
pub struct McpSession {
    /// Unique session identifier.
    pub id: String,
    /// Identity that opened the stream.
    pub identity: Identity,
    sink: FrameSink,
    last_activity: Mutex<Instant>,
}

impl McpSession {
    fn new(id: String, sink: FrameSink, identity: Identity) -> Self {
        let now = Instant::now();
        Self {
            id,
            identity,
            sink,
            last_activity: Mutex::new(now),
        }
    }

    /// Record activity on this session.
    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// Time since the last observed activity.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    /// Resolves once the peer has gone away.
    pub async fn closed(&self) {
        self.sink.closed().await
    }
}

/// Store of live sessions, keyed by session id.
#[derive(Clone)]
pub struct McpSessionManager {
    sessions: Arc<RwLock<HashMap<String, Arc<McpSession>>>>,
    shutdown: CancellationToken,
}

impl McpSessionManager {
    /// Create a new session manager.
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            shutdown: CancellationToken::new(),
        }
    }

    /// Register a stream and return the new session's id.
    pub fn create_session(&self, sink: FrameSink, identity: Identity) -> String {
        let id = Uuid::new_v4().simple().to_string();
        let session = Arc::new(McpSession::new(id.clone(), sink, identity));
        self.sessions.write().insert(id.clone(), session);
        info!("Created MCP session: {}", id);
        id
    }

    /// Get a session by ID.
    pub fn get(&self, id: &str) -> Option<Arc<McpSession>> {
        self.sessions.read().get(id).cloned()
    }

    /// Check if a session exists.
    pub fn session_exists(&self, id: &str) -> bool {
        self.sessions.read().contains_key(id)
    }

    /// Mark activity on a session. Returns false if it does not exist.
    pub fn touch(&self, id: &str) -> bool {
        match self.get(id) {
            Some(session) => {
                session.touch();
                true
            }
            None => false,
        }
    }

    /// Remove a session. Removing an absent session is a no-op.
    pub fn remove_session(&self, id: &str) -> bool {
        if self.sessions.write().remove(id).is_some() {
            info!("Removed MCP session: {}", id);
            true
        } else {
            false
        }
    }

    /// Get the number of active sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Token cancelled when the store shuts down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Drop every session and stop their keepalive loops.
    pub fn close_all(&self) -> usize {
        self.shutdown.cancel();
        let mut sessions = self.sessions.write();
        let count = sessions.len();
        sessions.clear();
        if count > 0 {
            info!("Closed {} MCP session(s) on shutdown", count);
        }
        count
    }

    /// Push a JSON-RPC response to a session.
    pub async fn send_response(
        &self,
        id: &str,
        response: JsonRpcResponse,
    ) -> Result<(), SendError> {
        self.send_frame(id, Frame::Message(response)).await
    }

    /// Announce the request-submission URL to a session.
    pub async fn send_endpoint(&self, id: &str, url: &str) -> Result<(), SendError> {
        self.send_frame(
            id,
            Frame::Endpoint {
                url: url.to_string(),
                session_id: id.to_string(),
            },
        )
        .await
    }

    /// Push a keepalive comment to a session.
    pub async fn send_keepalive(&self, id: &str) -> Result<(), SendError> {
        self.send_frame(id, Frame::Keepalive).await
    }

    async fn send_frame(&self, id: &str, frame: Frame) -> Result<(), SendError> {
        let Some(session) = self.get(id) else {
            debug!("Dropping frame for unknown MCP session {}", id);
            return Err(SendError::NotFound(id.to_string()));
        };

        let event = frame.into_event()?;
        if session.sink.write(event).await {
            Ok(())
        } else {
            warn!("MCP session {} disconnected during write", id);
            self.remove_session(id);
            Err(SendError::Disconnected(id.to_string()))
        }
    }
}

impl Default for McpSessionManager {
    fn default() -> Self {
        Self::new()
    }
}
