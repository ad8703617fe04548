//! Shared test utilities for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use a2a_protocol::builders::{AgentInfoBuilder, CapabilityBuilder};
use a2a_protocol::config::ProtocolConfig;
use a2a_protocol::error::ProtocolError;
use a2a_protocol::protocol::{
    capability_handler_fn, A2AProtocol, CapabilityHandler, HandshakeContext, HandshakeObserver,
    HandshakeState,
};
use a2a_protocol::types::{A2AMessage, AgentInfo};
use async_trait::async_trait;
use serde_json::{json, Value};

/// An agent with no capabilities.
pub fn test_agent(id: &str) -> AgentInfo {
    AgentInfoBuilder::new(id, format!("Test Agent {id}"))
        .agent_type("test")
        .build()
}

/// Capability handler returning `{"echo": params["message"]}`.
pub fn echo_handler() -> Arc<dyn CapabilityHandler> {
    capability_handler_fn(|params: HashMap<String, Value>| async move {
        Ok::<_, ProtocolError>(Some(json!({
            "echo": params.get("message").cloned().unwrap_or(Value::Null)
        })))
    })
}

/// A protocol instance advertising an `echo` capability.
pub fn echo_protocol(id: &str, config: ProtocolConfig) -> A2AProtocol {
    let protocol = A2AProtocol::new(test_agent(id), config);
    protocol.register_capability(
        CapabilityBuilder::new("echo")
            .description("Echo the message parameter")
            .tag("test")
            .build(),
        echo_handler(),
    );
    protocol
}

/// Request parameters `{"message": text}`.
pub fn message_params(text: &str) -> HashMap<String, Value> {
    let mut params = HashMap::new();
    params.insert("message".to_string(), json!(text));
    params
}

/// Records every handshake outcome it observes.
#[derive(Default)]
pub struct RecordingObserver {
    outcomes: Mutex<Vec<(String, HandshakeState, Option<String>)>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// `(remote_agent_id, final state, error)` per session, in order.
    pub fn outcomes(&self) -> Vec<(String, HandshakeState, Option<String>)> {
        self.outcomes.lock().unwrap().clone()
    }

    pub fn states(&self) -> Vec<HandshakeState> {
        self.outcomes().into_iter().map(|(_, s, _)| s).collect()
    }

    fn record(&self, context: &HandshakeContext) {
        self.outcomes.lock().unwrap().push((
            context.remote_agent_id.clone(),
            context.state,
            context.error_message.clone(),
        ));
    }
}

#[async_trait]
impl HandshakeObserver for RecordingObserver {
    async fn on_connected(&self, context: &HandshakeContext) {
        self.record(context);
    }

    async fn on_failed(&self, context: &HandshakeContext) {
        self.record(context);
    }
}

/// Deliver `first` to `to` and bounce replies between the two agents until
/// one side produces none. Returns every message exchanged, in order.
pub async fn converse(from: &A2AProtocol, to: &A2AProtocol, first: A2AMessage) -> Vec<A2AMessage> {
    let mut transcript = Vec::new();
    let mut next = Some((first, true));
    while let Some((message, to_remote)) = next {
        transcript.push(message.clone());
        let reply = if to_remote {
            to.handle_incoming(&message).await
        } else {
            from.handle_incoming(&message).await
        };
        next = reply.map(|r| (r, !to_remote));
    }
    transcript
}

/// Start a test server on a random port serving `protocol`.
#[cfg(feature = "server")]
pub async fn start_test_server(
    protocol: Arc<A2AProtocol>,
) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{}", addr);

    let app = a2a_protocol::server::a2a_router(protocol);

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Brief wait for the server to start accepting connections.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    (base_url, handle)
}
