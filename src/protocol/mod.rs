//! The protocol core: validation, admission control, routing, handshakes.
//!
//! - [`MessageValidator`] — structural checks applied to every message
//! - [`RateLimiter`] — per-sender sliding-window admission
//! - [`MessageRouter`] — type and capability dispatch with filters
//! - [`HandshakeManager`] — session establishment and authentication
//! - [`A2AProtocol`] — the facade composing all of the above
//! - [`MessageTransport`] — how messages leave the process
//! - [`DiscoveryService`] — registry collaborators implement

mod a2a_protocol;
pub mod auth;
pub mod discovery;
mod handlers;
pub mod handshake;
pub mod rate_limiter;
pub mod router;
pub mod transport;
pub mod validator;

pub use a2a_protocol::{A2AProtocol, PendingResponse, ProtocolBuilder, ProtocolStats};
pub use auth::{AuthenticationProvider, HandshakeChallenge, SimpleTokenAuthProvider};
pub use discovery::{DiscoveryService, InMemoryDiscoveryService};
pub use handshake::{
    HandshakeAction, HandshakeContext, HandshakeManager, HandshakeObserver, HandshakeState,
};
pub use rate_limiter::RateLimiter;
pub use router::{
    capability_handler_fn, message_handler_fn, CapabilityHandler, MessageFilter, MessageHandler,
    MessageRouter,
};
pub use transport::{transport_fn, ChannelTransport, FnTransport, MessageTransport};
pub use validator::{validate_message, MessageValidator};
