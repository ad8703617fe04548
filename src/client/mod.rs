//! HTTP client side — reach remote agents served by [`a2a_router`](crate::server::a2a_router).
//!
//! - [`HttpTransport`] — a [`MessageTransport`](crate::protocol::MessageTransport)
//!   posting envelopes to `{base}/a2a/messages`
//! - [`AgentInfoResolver`] — fetch a peer's `AgentInfo` from the well-known URL
//!
//! # Quick Start
//!
//! ```no_run
//! use a2a_protocol::prelude::*;
//! use a2a_protocol::client::{AgentInfoResolver, HttpTransport};
//!
//! # async fn example(protocol: A2AProtocol) -> Result<(), Box<dyn std::error::Error>> {
//! let peer = AgentInfoResolver::new().resolve("http://localhost:3000").await?;
//! let transport = HttpTransport::new("http://localhost:3000");
//!
//! let request = protocol.create_request(&peer.agent_id, "echo", Default::default());
//! if let Some(reply) = transport.exchange(&request).await? {
//!     protocol.process_message(&reply).await?;
//! }
//! # Ok(())
//! # }
//! ```

mod agent_resolver;
mod http_transport;

pub use agent_resolver::AgentInfoResolver;
pub use http_transport::{HttpTransport, HttpTransportConfig};
