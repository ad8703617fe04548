//! Echo Agent — a minimal A2A agent served over HTTP.
//!
//! Run with:
//! ```sh
//! cargo run --example echo_agent
//! ```
//!
//! Then test with curl:
//! ```sh
//! # Check agent info
//! curl http://localhost:3000/.well-known/agent.json | jq
//!
//! # Send a request to the echo capability
//! curl -X POST http://localhost:3000/a2a/messages \
//!   -H "Content-Type: application/json" \
//!   -d '{
//!     "header": {
//!       "message_id": "m1",
//!       "message_type": "request",
//!       "timestamp": '"$(date +%s)"',
//!       "sender_id": "curl",
//!       "receiver_id": "echo-agent"
//!     },
//!     "payload": {
//!       "capability": "echo",
//!       "parameters": {"message": "Hello, agent!"}
//!     }
//!   }'
//! ```

use std::sync::Arc;

use a2a_protocol::builders::{AgentInfoBuilder, CapabilityBuilder, ServerBuilder};
use a2a_protocol::config::ProtocolConfig;
use a2a_protocol::error::ProtocolResult;
use a2a_protocol::protocol::{A2AProtocol, CapabilityHandler};
use a2a_protocol::types::A2AMessage;
use async_trait::async_trait;
use serde_json::{json, Value};

/// Echoes the `message` parameter back to the caller.
struct EchoCapability;

#[async_trait]
impl CapabilityHandler for EchoCapability {
    async fn handle(&self, message: &A2AMessage) -> ProtocolResult<Option<Value>> {
        let text = message
            .payload
            .parameters
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("No text received");

        tracing::info!(sender_id = %message.sender_id(), "Echoing message");
        Ok(Some(json!({
            "echo": text,
            "from": message.sender_id(),
        })))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for log output.
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Describe this agent.
    let agent = AgentInfoBuilder::new("echo-agent", "Echo Agent")
        .agent_type("demo")
        .description("A simple agent that echoes messages back")
        .endpoint("http://localhost:3000")
        .build();

    // Config comes from A2A_* environment variables, falling back to defaults.
    let protocol = A2AProtocol::builder(agent)
        .config(ProtocolConfig::from_env())
        .capability(
            CapabilityBuilder::new("echo")
                .description("Echoes back the `message` parameter")
                .tags(["echo", "test"])
                .input_schema(json!({
                    "type": "object",
                    "properties": { "message": { "type": "string" } }
                }))
                .build(),
            Arc::new(EchoCapability),
        )
        .build()?;

    let app = ServerBuilder::new(Arc::new(protocol))
        .with_cors(true)
        .with_heartbeat(true)
        .build()
        .await;

    // Start the server.
    let addr = "0.0.0.0:3000";
    println!("Echo Agent listening on http://{}", addr);
    println!("  Agent info: http://{}/.well-known/agent.json", addr);
    println!("  Messages:   http://{}/a2a/messages", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
