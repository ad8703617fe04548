//! HTTP server surface for an [`A2AProtocol`](crate::protocol::A2AProtocol).
//!
//! - [`a2a_router`] — axum routes for inbound messages and agent info
//! - [`ServerBuilder`](crate::builders::ServerBuilder) — the same routes with optional CORS
//!
//! # Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use a2a_protocol::prelude::*;
//!
//! let protocol = Arc::new(A2AProtocol::new(agent_info, ProtocolConfig::default()));
//! let app = a2a_router(protocol);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! ```

pub mod axum_integration;

pub use axum_integration::a2a_router;
