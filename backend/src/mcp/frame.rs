//! Server-Sent Events frames pushed to a session stream.
//!
//! Each frame becomes exactly one [`Event`], so one frame is always one item
//! of the response body.

use axum::response::sse::Event;
use commerce_mcp_types::JsonRpcResponse;

/// Comment text carried by keepalive frames.
pub const KEEPALIVE_COMMENT: &str = "keepalive";

/// A frame pushed to a session's stream.
#[derive(Debug, Clone)]
pub enum Frame {
    /// Announces where the client must post its requests. Sent once per session.
    Endpoint { url: String, session_id: String },
    /// A serialized JSON-RPC response.
    Message(JsonRpcResponse),
    /// Comment-only frame, no payload.
    Keepalive,
}

impl Frame {
    /// Convert the frame into an SSE event.
    pub fn into_event(self) -> Result<Event, axum::Error> {
        match self {
            Frame::Endpoint { url, session_id } => Ok(Event::default()
                .event("endpoint")
                .data(format!("{}?sessionId={}", url, session_id))),
            Frame::Message(response) => Event::default().event("message").json_data(&response),
            Frame::Keepalive => Ok(Event::default().comment(KEEPALIVE_COMMENT)),
        }
    }
}

/// Reads frames back off a stream body.
#[cfg(test)]
pub(crate) mod wire {
    use axum::body::Body;
    use http_body_util::BodyExt;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct ParsedFrame {
        pub event: Option<String>,
        pub data: Option<String>,
        pub comment: Option<String>,
    }

    /// Parse one frame. Returns `None` unless it ends with a blank line.
    pub fn parse_frame(text: &str) -> Option<ParsedFrame> {
        let body = text.strip_suffix("\n\n")?;
        let mut frame = ParsedFrame {
            event: None,
            data: None,
            comment: None,
        };
        for line in body.split('\n') {
            if let Some(rest) = line.strip_prefix("event: ") {
                frame.event = Some(rest.to_string());
            } else if let Some(rest) = line.strip_prefix("data: ") {
                frame.data = Some(rest.to_string());
            } else if let Some(rest) = line.strip_prefix(':') {
                frame.comment = Some(rest.trim_start().to_string());
            } else {
                return None;
            }
        }
        Some(frame)
    }

    /// Next frame of `body`, or `None` once the stream has ended.
    pub async fn next_frame(body: &mut Body) -> Option<ParsedFrame> {
        let frame = body.frame().await?.unwrap();
        let bytes = frame.into_data().unwrap();
        Some(parse_frame(std::str::from_utf8(&bytes).unwrap()).expect("complete frame"))
    }
}
