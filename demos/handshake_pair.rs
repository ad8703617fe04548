//! Handshake Pair — two in-process agents authenticate and exchange a request.
//!
//! `alice` initiates a handshake with `bob`, who demands a token challenge.
//! Once connected, alice calls bob's `echo` capability, which only serves
//! authenticated peers.
//!
//! Run with:
//! ```sh
//! cargo run --example handshake_pair
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use a2a_protocol::builders::{AgentInfoBuilder, CapabilityBuilder};
use a2a_protocol::protocol::{
    capability_handler_fn, A2AProtocol, ChannelTransport, SimpleTokenAuthProvider,
};
use a2a_protocol::types::A2AMessage;
use a2a_protocol::ProtocolError;
use serde_json::json;

/// Which side a message in flight is headed to.
enum Leg {
    ToAlice,
    ToBob,
}

/// Deliver `first` to bob and keep bouncing replies until one side is silent.
async fn converse(alice: &A2AProtocol, bob: &A2AProtocol, first: A2AMessage) {
    let mut next = Some((first, Leg::ToBob));
    while let Some((message, leg)) = next {
        println!(
            "  {} -> {}: {} {}",
            message.sender_id(),
            message.header.receiver_id.as_deref().unwrap_or("*"),
            message.message_type(),
            message.action().unwrap_or("")
        );
        next = match leg {
            Leg::ToBob => bob.handle_incoming(&message).await.map(|r| (r, Leg::ToAlice)),
            Leg::ToAlice => alice.handle_incoming(&message).await.map(|r| (r, Leg::ToBob)),
        };
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let secret = "correct horse battery staple";

    let alice = A2AProtocol::builder(AgentInfoBuilder::new("alice", "Alice").build())
        .auth_provider(Arc::new(SimpleTokenAuthProvider::new(secret)))
        .build()?;

    let bob = A2AProtocol::builder(AgentInfoBuilder::new("bob", "Bob").build())
        .auth_provider(Arc::new(SimpleTokenAuthProvider::new(secret)))
        .require_auth(true)
        .capability(
            CapabilityBuilder::new("echo")
                .description("Echoes the `message` parameter")
                .auth_required(true)
                .build(),
            capability_handler_fn(|params| async move {
                Ok::<_, ProtocolError>(Some(json!({ "echo": params.get("message").cloned() })))
            }),
        )
        .build()?;

    // Everything alice sends lands in `outbox`; `converse` carries it to bob.
    let (to_bob, mut outbox) = ChannelTransport::pair();

    println!("Handshake:");
    let session_id = alice.initiate_handshake("bob", &to_bob).await?;
    let initiate = outbox.recv().await.ok_or("handshake was not sent")?;
    converse(&alice, &bob, initiate).await;

    println!(
        "Session {} -> alice connected to bob: {}, bob connected to alice: {}",
        session_id,
        alice.is_connected("bob").await,
        bob.is_connected("alice").await
    );

    println!("Request:");
    let mut params = HashMap::new();
    params.insert("message".to_string(), json!("Hello, Bob!"));
    let request = alice.create_request("bob", "echo", params);
    let pending = alice.send_request(&request, &to_bob).await?;
    let sent = outbox.recv().await.ok_or("request was not sent")?;
    converse(&alice, &bob, sent).await;

    let response = pending.wait_timeout(Duration::from_secs(1)).await?;
    println!("Bob says: {}", response.payload.data["result"]["echo"]);

    let stats = bob.stats().await;
    println!("Bob stats: {}", serde_json::to_string_pretty(&stats)?);

    alice.shutdown().await;
    bob.shutdown().await;
    Ok(())
}
