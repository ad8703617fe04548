//! Axum integration — ready-made HTTP routes for A2A agents.
//!
//! [`a2a_router`] exposes one [`A2AProtocol`] over HTTP:
//!
//! | Route | Behavior |
//! |-------|----------|
//! | `POST /a2a/messages` | decode the JSON envelope, run `process_message` |
//! | `GET /.well-known/agent.json` | the local [`AgentInfo`](crate::types::AgentInfo) |
//!
//! Status codes for `POST /a2a/messages`:
//!
//! | Status | Body |
//! |--------|------|
//! | 200 | the response message |
//! | 202 | empty, the message produced no response |
//! | 400 | ERROR message (malformed, expired, oversized, version mismatch) |
//! | 403 | ERROR message (`UNAUTHORIZED`) |
//! | 429 | ERROR message (`RATE_LIMITED`) |
//!
//! # Example
//!
//! ```rust,ignore
//! use a2a_protocol::server::a2a_router;
//! use std::sync::Arc;
//!
//! let app = a2a_router(Arc::new(protocol));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! ```

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use tracing::{debug, warn};

use crate::error::{ProtocolError, ValidationErrorKind};
use crate::protocol::A2AProtocol;
use crate::types::{A2AMessage, ErrorDetails, MessageType};
use crate::utils::constants::{AGENT_INFO_WELL_KNOWN_PATH, MESSAGES_PATH};

/// Create an axum Router serving `protocol`.
pub fn a2a_router(protocol: Arc<A2AProtocol>) -> Router {
    Router::new()
        .route(AGENT_INFO_WELL_KNOWN_PATH, get(handle_agent_info))
        .route(MESSAGES_PATH, post(handle_message))
        .with_state(protocol)
}

/// Serve the local agent info at the well-known endpoint.
async fn handle_agent_info(State(protocol): State<Arc<A2AProtocol>>) -> impl IntoResponse {
    Json(protocol.agent_info())
}

/// Decode one envelope and hand it to the protocol.
async fn handle_message(State(protocol): State<Arc<A2AProtocol>>, body: Bytes) -> Response {
    let max = protocol.config().max_message_size;
    if body.len() > max {
        let err = ProtocolError::validation(
            ValidationErrorKind::Oversized,
            format!("request body is {} bytes, maximum is {}", body.len(), max),
        );
        return uncorrelated_error(&protocol, err);
    }

    let message: A2AMessage = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            let err = ProtocolError::validation(
                ValidationErrorKind::Malformed,
                format!("invalid message envelope: {e}"),
            );
            return uncorrelated_error(&protocol, err);
        }
    };

    debug!(
        message_id = %message.header.message_id,
        message_type = %message.header.message_type,
        sender_id = %message.header.sender_id,
        "HTTP message received"
    );

    match protocol.process_message(&message).await {
        Ok(Some(response)) => (StatusCode::OK, Json(response)).into_response(),
        Ok(None) => StatusCode::ACCEPTED.into_response(),
        Err(e) => {
            let status = status_for(&e);
            let mut reply = message.create_error_response(e);
            reply.header.sender_id = protocol.agent_id();
            (status, Json(reply)).into_response()
        }
    }
}

fn status_for(err: &ProtocolError) -> StatusCode {
    match err {
        ProtocolError::RateLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
        ProtocolError::Unauthorized { .. } => StatusCode::FORBIDDEN,
        _ => StatusCode::BAD_REQUEST,
    }
}

/// An ERROR for a body that never became a message, so there is nothing to correlate with.
fn uncorrelated_error(protocol: &A2AProtocol, err: ProtocolError) -> Response {
    warn!(error_code = err.code(), error = %err, "Rejected HTTP message");
    let status = status_for(&err);
    let mut reply = A2AMessage::new(MessageType::Error, protocol.agent_id());
    reply.payload.data = ErrorDetails::from(err).to_data();
    (status, Json(reply)).into_response()
}
