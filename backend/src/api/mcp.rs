//! MCP push-stream endpoint handlers.
//!
//! ## Endpoints
//!
//! - `GET /mcp` - Open the session stream
//! - `POST /mcp/messages?sessionId=<id>` - Submit one JSON-RPC request

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use commerce_mcp_types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId};
use futures::FutureExt;
use serde::Deserialize;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error, info, warn};

use crate::auth::Identity;
use crate::mcp::{frame_channel, run_session, McpHandler};
use crate::state::AppState;

/// Path clients POST their requests to.
pub const MESSAGES_PATH: &str = "/mcp/messages";

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// Base URL announced in the endpoint frame.
fn endpoint_url(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(base) = state.public_url() {
        return format!("{}{}", base, MESSAGES_PATH);
    }
    match headers.get(header::HOST).and_then(|v| v.to_str().ok()) {
        Some(host) if !host.is_empty() => format!("http://{}{}", host, MESSAGES_PATH),
        _ => MESSAGES_PATH.to_string(),
    }
}

/// GET /mcp - Open a session stream.
///
/// The first frame names the submission URL for this session. The response
/// stays open until the peer disconnects, the session idles out or the
/// server shuts down.
pub async fn mcp_connect(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    headers: HeaderMap,
) -> Response {
    let settings = state.session_settings().clone();
    let (sink, stream) = frame_channel(settings.buffer);
    let session_id = state.sessions().create_session(sink, identity);
    info!(
        "MCP: Stream opened for session {} ({} active)",
        session_id,
        state.sessions().session_count()
    );

    tokio::spawn(run_session(
        state.sessions().clone(),
        session_id,
        endpoint_url(&state, &headers),
        settings,
    ));

    (
        [
            (header::CONNECTION, HeaderValue::from_static("keep-alive")),
            (X_ACCEL_BUFFERING, HeaderValue::from_static("no")),
        ],
        stream.into_sse(),
    )
        .into_response()
}

/// POST /mcp/messages - Submit a JSON-RPC request.
///
/// The reply is always an empty `202`; the response to the request is pushed
/// over the session stream once dispatch completes. Requests run with the
/// identity that opened the stream, and callers other than that principal
/// are ignored.
pub async fn mcp_messages(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<MessagesQuery>,
    body: Bytes,
) -> Response {
    let Some(session_id) = query.session_id.filter(|id| !id.is_empty()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let Some(session) = state.sessions().get(&session_id) else {
        warn!("MCP: Request for unknown session {}", session_id);
        return StatusCode::ACCEPTED.into_response();
    };

    if !session.identity.same_principal(&identity) {
        warn!(
            "MCP: Ignoring request for session {} from a different caller ({:?})",
            session_id, identity.subject
        );
        return StatusCode::ACCEPTED.into_response();
    }

    state.sessions().touch(&session_id);
    let identity = session.identity.clone();
    tokio::spawn(dispatch(state, identity, session_id, body));
    StatusCode::ACCEPTED.into_response()
}

/// Parse, handle and push back one request.
async fn dispatch(state: AppState, identity: Identity, session_id: String, body: Bytes) {
    let response = match McpHandler::parse_request(&body) {
        Ok(request) => handle_guarded(&state, &identity, request).await,
        Err(response) => response,
    };

    let Some(response) = response else {
        return;
    };
    if let Err(e) = state.sessions().send_response(&session_id, response).await {
        debug!("MCP: Response for session {} dropped: {}", session_id, e);
    }
}

/// Run the handler, turning a panic into an internal error response.
async fn handle_guarded(
    state: &AppState,
    identity: &Identity,
    request: JsonRpcRequest,
) -> Option<JsonRpcResponse> {
    let id: Option<RequestId> = request.id.clone();
    let notification = request.is_notification();
    match AssertUnwindSafe(McpHandler::handle_request(state, identity, request))
        .catch_unwind()
        .await
    {
        Ok(response) => response,
        Err(_) => {
            error!("MCP: Handler panicked while dispatching request {:?}", id);
            (!notification).then(|| {
                JsonRpcResponse::error(id, JsonRpcError::internal("Internal server error"))
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forwarder::{ForwardError, ForwardResponse, Forwarder};
    use crate::mcp::commerce_registry;
    use async_trait::async_trait;
    use serde_json::{json, Map, Value};
    use std::sync::Arc;

    /// Panics on every call.
    struct PanickingForwarder;

    #[async_trait]
    impl Forwarder for PanickingForwarder {
        async fn forward(
            &self,
            tool: &str,
            _arguments: &Map<String, Value>,
            _bearer_token: &str,
        ) -> Result<ForwardResponse, ForwardError> {
            panic!("forwarder exploded on {}", tool);
        }
    }

    fn state() -> AppState {
        AppState::with_options(
            commerce_registry().unwrap(),
            Arc::new(PanickingForwarder),
            Default::default(),
            true,
            None,
        )
    }

    fn owner() -> Identity {
        Identity::new(Some("olga".to_string()), ["Owner"], "owner-token")
    }

    #[tokio::test]
    async fn test_panic_becomes_internal_error() {
        let params = json!({"name": "list_products", "arguments": {}});
        let request = JsonRpcRequest::new(11, "tools/call")
            .with_params(params.as_object().cloned().unwrap());

        let response = handle_guarded(&state(), &owner(), request).await.unwrap();
        assert_eq!(response.id, Some(RequestId::Number(11)));
        let error = response.error_ref().unwrap();
        assert_eq!(error.code, -32603);
        assert_eq!(error.message, "Internal server error");
    }

    #[tokio::test]
    async fn test_handled_request_passes_through() {
        let response = handle_guarded(&state(), &owner(), JsonRpcRequest::new(12, "ping"))
            .await
            .unwrap();
        assert!(response.error_ref().is_none());
    }

    #[test]
    fn test_endpoint_url_prefers_host_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(endpoint_url(&state(), &headers), MESSAGES_PATH);

        headers.insert(header::HOST, HeaderValue::from_static("gateway:5080"));
        assert_eq!(
            endpoint_url(&state(), &headers),
            "http://gateway:5080/mcp/messages"
        );
    }
}
