//! # a2a-protocol — Agent-to-Agent messaging for Rust
//!
//! A peer-to-peer protocol that lets autonomous agents exchange typed
//! messages, advertise capabilities, authenticate each other through a
//! handshake and keep each other informed with heartbeats.
//!
//! ## Overview
//!
//! Every exchange is an [`A2AMessage`]: a header (identity, routing, priority,
//! TTL, version) plus a payload (capability, action, parameters, data,
//! metadata). An [`A2AProtocol`](protocol::A2AProtocol) instance represents
//! one local agent and runs each inbound message through:
//!
//! 1. structural validation ([`protocol::MessageValidator`])
//! 2. per-sender rate limiting ([`protocol::RateLimiter`])
//! 3. type and capability dispatch ([`protocol::MessageRouter`])
//!
//! Handshakes ([`protocol::HandshakeManager`]) move a session through
//! `initiating → challenge_sent → authenticating → connected`, optionally with
//! a pluggable [`protocol::AuthenticationProvider`].
//!
//! ## Feature flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `client` | yes     | HTTP transport and agent info resolver (reqwest) |
//! | `server` | yes     | axum routes exposing a protocol instance over HTTP |
//! | `full`   | no      | Enable all features |
//!
//! ## Quick Start
//!
//! ```
//! use a2a_protocol::prelude::*;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let agent = AgentInfoBuilder::new("echo-agent", "Echo").build();
//! let protocol = A2AProtocol::new(agent, ProtocolConfig::default());
//!
//! protocol.register_capability(
//!     CapabilityBuilder::new("echo").description("Echoes its input").build(),
//!     capability_handler_fn(|params| async move {
//!         Ok::<_, ProtocolError>(Some(json!({ "echo": params.get("message").cloned() })))
//!     }),
//! );
//!
//! let request = MessageBuilder::new(MessageType::Request, "caller")
//!     .receiver("echo-agent")
//!     .capability("echo")
//!     .param("message", json!("Hello, World!"))
//!     .build();
//!
//! let response = protocol.process_message(&request).await?.expect("echo replies");
//! assert_eq!(response.payload.data["result"]["echo"], "Hello, World!");
//! # Ok(())
//! # }
//! ```
//!
//! ## Serving over HTTP
//!
//! ```rust,ignore
//! use a2a_protocol::prelude::*;
//! use std::sync::Arc;
//!
//! let protocol = Arc::new(A2AProtocol::new(agent, ProtocolConfig::from_env()));
//! let app = ServerBuilder::new(protocol).with_cors(true).build().await;
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! ```
//!
//! Remote agents are reached with [`client::HttpTransport`], which implements
//! [`protocol::MessageTransport`].
//!
//! ## Modules
//!
//! - [`types`] — message envelope, agent and capability descriptors
//! - [`protocol`] — validator, rate limiter, router, handshake, facade
//! - [`config`] — [`ProtocolConfig`](config::ProtocolConfig) with TOML and environment loading
//! - [`error`] — [`ProtocolError`](error::ProtocolError) and wire error codes
//! - [`builders`] — fluent builders for agents, capabilities, messages and servers
//!
//! ## Demos
//!
//! See the `demos/` directory:
//! - `echo_agent.rs` — an HTTP agent exposing an `echo` capability
//! - `handshake_pair.rs` — two in-process agents authenticating and exchanging a request

pub mod builders;
pub mod config;
pub mod error;
pub mod protocol;
pub mod types;
pub mod utils;

#[cfg(feature = "client")]
pub mod client;

#[cfg(feature = "server")]
pub mod server;

/// Prelude module that re-exports commonly used types and traits.
///
/// # Example
///
/// ```
/// use a2a_protocol::prelude::*;
///
/// let agent = AgentInfoBuilder::new("a1", "Agent One").build();
/// let protocol = A2AProtocol::new(agent, ProtocolConfig::default());
/// assert_eq!(protocol.agent_id(), "a1");
/// ```
pub mod prelude {
    // Core types
    pub use crate::types::{
        A2AMessage, AgentInfo, AgentStatus, CapabilityInfo, ErrorDetails, MessageHeader,
        MessagePayload, MessageType, Priority,
    };

    // Errors and configuration
    pub use crate::config::{HandshakeConfig, ProtocolConfig, RateLimitConfig};
    pub use crate::error::{ProtocolError, ProtocolResult, ValidationErrorKind};

    // Protocol
    pub use crate::protocol::{
        capability_handler_fn, message_handler_fn, transport_fn, A2AProtocol,
        AuthenticationProvider, CapabilityHandler, ChannelTransport, HandshakeObserver,
        HandshakeState, MessageFilter, MessageHandler, MessageTransport, PendingResponse,
        SimpleTokenAuthProvider,
    };

    // Builders
    pub use crate::builders::{AgentInfoBuilder, CapabilityBuilder, MessageBuilder};

    #[cfg(feature = "client")]
    pub use crate::client::{AgentInfoResolver, HttpTransport};

    #[cfg(feature = "server")]
    pub use crate::builders::ServerBuilder;

    #[cfg(feature = "server")]
    pub use crate::server::a2a_router;
}

// Re-export core types at crate root for convenience.
pub use builders::{AgentInfoBuilder, CapabilityBuilder, MessageBuilder};
pub use config::ProtocolConfig;
pub use error::{ProtocolError, ProtocolResult};
pub use protocol::A2AProtocol;
pub use types::*;

#[cfg(feature = "server")]
pub use builders::ServerBuilder;
