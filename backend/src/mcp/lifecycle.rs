//! Keepalive and expiry of session streams.
//!
//! One task per stream announces the endpoint, then emits keepalive frames
//! until the peer leaves, the session idles out or the server shuts down.
//! Whatever ends the task, the session is removed from the store.

use tracing::{debug, info};

use super::session::{McpSessionManager, SessionSettings};

/// Removes a session from the store when dropped.
pub struct SessionGuard {
    sessions: McpSessionManager,
    session_id: String,
}

impl SessionGuard {
    pub fn new(sessions: McpSessionManager, session_id: impl Into<String>) -> Self {
        Self {
            sessions,
            session_id: session_id.into(),
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.sessions.remove_session(&self.session_id);
    }
}

/// Why a stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    Disconnected,
    IdleTimeout,
    Shutdown,
}

/// Drive one session stream to completion.
///
/// `endpoint_url` is the submission URL without the session query.
pub async fn run_session(
    sessions: McpSessionManager,
    session_id: String,
    endpoint_url: String,
    settings: SessionSettings,
) -> StreamEnd {
    let _guard = SessionGuard::new(sessions.clone(), session_id.clone());
    let shutdown = sessions.shutdown_token();

    let Some(session) = sessions.get(&session_id) else {
        return StreamEnd::Disconnected;
    };

    if sessions
        .send_endpoint(&session_id, &endpoint_url)
        .await
        .is_err()
    {
        return StreamEnd::Disconnected;
    }

    let end = loop {
        tokio::select! {
            _ = shutdown.cancelled() => break StreamEnd::Shutdown,
            _ = session.closed() => break StreamEnd::Disconnected,
            _ = tokio::time::sleep(settings.keepalive_interval) => {
                if sessions.send_keepalive(&session_id).await.is_err() {
                    break StreamEnd::Disconnected;
                }
                if session.idle_for() > settings.idle_timeout {
                    break StreamEnd::IdleTimeout;
                }
            }
        }
    };

    match end {
        StreamEnd::IdleTimeout => info!("MCP session {} idle for too long, closing", session_id),
        _ => debug!("MCP session {} stream ended: {:?}", session_id, end),
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Identity;
    use crate::mcp::frame::wire::next_frame;
    use crate::mcp::session::{frame_channel, FrameStream};
    use axum::body::Body;
    use axum::response::IntoResponse;
    use std::time::Duration;

    fn identity() -> Identity {
        Identity::new(None, ["Owner"], "token")
    }

    fn settings() -> SessionSettings {
        SessionSettings {
            keepalive_interval: Duration::from_secs(15),
            idle_timeout: Duration::from_secs(60 * 60),
            buffer: 8,
        }
    }

    fn body_of(stream: FrameStream) -> Body {
        stream.into_sse().into_response().into_body()
    }

    #[tokio::test(start_paused = true)]
    async fn test_endpoint_then_keepalives() {
        let sessions = McpSessionManager::new();
        let (sink, stream) = frame_channel(8);
        let mut body = body_of(stream);
        let id = sessions.create_session(sink, identity());

        let task = tokio::spawn(run_session(
            sessions.clone(),
            id.clone(),
            "/mcp/messages".to_string(),
            settings(),
        ));

        let frame = next_frame(&mut body).await.unwrap();
        assert_eq!(frame.event.as_deref(), Some("endpoint"));
        assert_eq!(frame.data.unwrap(), format!("/mcp/messages?sessionId={}", id));

        let frame = next_frame(&mut body).await.unwrap();
        assert!(frame.event.is_none());
        assert_eq!(frame.comment.as_deref(), Some("keepalive"));

        drop(body);
        assert_eq!(task.await.unwrap(), StreamEnd::Disconnected);
        assert!(!sessions.session_exists(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_session_expires() {
        let sessions = McpSessionManager::new();
        let (sink, stream) = frame_channel(8);
        let id = sessions.create_session(sink, identity());

        let drainer = tokio::spawn(async move {
            let mut body = body_of(stream);
            let mut frames = 0usize;
            while http_body_util::BodyExt::frame(&mut body).await.is_some() {
                frames += 1;
            }
            frames
        });

        let end = run_session(
            sessions.clone(),
            id.clone(),
            "/mcp/messages".to_string(),
            settings(),
        )
        .await;

        assert_eq!(end, StreamEnd::IdleTimeout);
        assert!(!sessions.session_exists(&id));
        // Endpoint plus one keepalive per interval over the idle hour.
        assert!(drainer.await.unwrap() > 200);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_keeps_session_alive() {
        let sessions = McpSessionManager::new();
        let (sink, stream) = frame_channel(8);
        let id = sessions.create_session(sink, identity());

        tokio::spawn(async move {
            let mut body = body_of(stream);
            while http_body_util::BodyExt::frame(&mut body).await.is_some() {}
        });
        let task = tokio::spawn(run_session(
            sessions.clone(),
            id.clone(),
            "/mcp/messages".to_string(),
            settings(),
        ));

        for _ in 0..4 {
            tokio::time::sleep(Duration::from_secs(50 * 60)).await;
            assert!(sessions.touch(&id));
        }
        assert!(!task.is_finished());

        sessions.close_all();
        assert_eq!(task.await.unwrap(), StreamEnd::Shutdown);
    }

    #[tokio::test]
    async fn test_missing_session_ends_immediately() {
        let sessions = McpSessionManager::new();
        let end = run_session(
            sessions,
            "missing".to_string(),
            "/mcp/messages".to_string(),
            settings(),
        )
        .await;
        assert_eq!(end, StreamEnd::Disconnected);
    }
}
