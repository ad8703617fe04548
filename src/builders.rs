//! Builder patterns for ergonomic construction of A2A types.

use std::collections::HashMap;

use serde_json::Value;

use crate::types::*;

/// Builder for [`AgentInfo`].
///
/// # Example
///
/// ```
/// use a2a_protocol::builders::{AgentInfoBuilder, CapabilityBuilder};
///
/// let agent = AgentInfoBuilder::new("parser-1", "Parser")
///     .agent_type("parser")
///     .description("Parses free text into structured records")
///     .endpoint("http://localhost:3000")
///     .capability(CapabilityBuilder::new("parse").tag("nlp").build())
///     .build();
/// assert!(agent.has_capability("parse"));
/// ```
#[derive(Debug, Clone)]
pub struct AgentInfoBuilder {
    info: AgentInfo,
}

impl AgentInfoBuilder {
    /// Start with the required id and display name.
    pub fn new(agent_id: impl Into<String>, agent_name: impl Into<String>) -> Self {
        Self {
            info: AgentInfo::new(agent_id, agent_name),
        }
    }

    /// Set the agent type.
    pub fn agent_type(mut self, agent_type: impl Into<String>) -> Self {
        self.info.agent_type = agent_type.into();
        self
    }

    /// Set the agent version.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.info.version = version.into();
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.info.description = description.into();
        self
    }

    /// Set the endpoint the agent listens on.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.info.endpoint = Some(endpoint.into());
        self
    }

    /// Set the initial status.
    pub fn status(mut self, status: AgentStatus) -> Self {
        self.info.status = status;
        self
    }

    /// Add a metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.info.metadata.insert(key.into(), value);
        self
    }

    /// Advertise a capability (replacing one with the same name).
    pub fn capability(mut self, capability: CapabilityInfo) -> Self {
        self.info.upsert_capability(capability);
        self
    }

    /// Build the [`AgentInfo`].
    pub fn build(self) -> AgentInfo {
        self.info
    }
}

/// Builder for [`CapabilityInfo`].
#[derive(Debug, Clone)]
pub struct CapabilityBuilder {
    info: CapabilityInfo,
}

impl CapabilityBuilder {
    /// Start with the capability name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            info: CapabilityInfo::new(name, ""),
        }
    }

    /// Set the version.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.info.version = version.into();
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.info.description = description.into();
        self
    }

    /// Set the parameters schema.
    pub fn input_schema(mut self, schema: Value) -> Self {
        self.info.input_schema = schema;
        self
    }

    /// Set the result schema.
    pub fn output_schema(mut self, schema: Value) -> Self {
        self.info.output_schema = schema;
        self
    }

    /// Add a discovery tag.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.info.tags.insert(tag.into());
        self
    }

    /// Add several discovery tags.
    pub fn tags<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.info.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Limit each sender to `requests_per_window` calls of this capability.
    pub fn rate_limit(mut self, requests_per_window: u32) -> Self {
        self.info.rate_limit = Some(requests_per_window);
        self
    }

    /// Only serve senders that completed a handshake or registered.
    pub fn auth_required(mut self, required: bool) -> Self {
        self.info.auth_required = required;
        self
    }

    /// Build the [`CapabilityInfo`].
    pub fn build(self) -> CapabilityInfo {
        self.info
    }
}

/// Builder for [`A2AMessage`].
///
/// ```
/// use a2a_protocol::builders::MessageBuilder;
/// use a2a_protocol::types::{MessageType, Priority};
///
/// let msg = MessageBuilder::new(MessageType::Request, "agent-a")
///     .receiver("agent-b")
///     .capability("echo")
///     .param("text", serde_json::json!("hi"))
///     .priority(Priority::High)
///     .build();
/// assert_eq!(msg.capability(), Some("echo"));
/// ```
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    message: A2AMessage,
}

impl MessageBuilder {
    /// Start a message of `message_type` from `sender_id`.
    pub fn new(message_type: MessageType, sender_id: impl Into<String>) -> Self {
        Self {
            message: A2AMessage::new(message_type, sender_id),
        }
    }

    /// Address the message. Without a receiver it is a broadcast.
    pub fn receiver(mut self, receiver_id: impl Into<String>) -> Self {
        self.message.header.receiver_id = Some(receiver_id.into());
        self
    }

    /// Link the message to an earlier one.
    pub fn correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.message.header.correlation_id = Some(correlation_id.into());
        self
    }

    /// Set the priority.
    pub fn priority(mut self, priority: Priority) -> Self {
        self.message.header.priority = priority;
        self
    }

    /// Set the time-to-live.
    pub fn ttl_seconds(mut self, ttl_seconds: u64) -> Self {
        self.message.header.ttl_seconds = ttl_seconds;
        self
    }

    /// Attach a trace id.
    pub fn trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.message.header.trace_id = Some(trace_id.into());
        self
    }

    /// Override the protocol version (defaults to the current one).
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.message.header.version = version.into();
        self
    }

    /// Target capability.
    pub fn capability(mut self, capability: impl Into<String>) -> Self {
        self.message.payload.capability = Some(capability.into());
        self
    }

    /// Sub-operation.
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.message.payload.action = Some(action.into());
        self
    }

    /// Add a request parameter.
    pub fn param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.message.payload.parameters.insert(key.into(), value);
        self
    }

    /// Replace all request parameters.
    pub fn parameters(mut self, parameters: HashMap<String, Value>) -> Self {
        self.message.payload.parameters = parameters;
        self
    }

    /// Add a body entry.
    pub fn data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.message.payload.data.insert(key.into(), value);
        self
    }

    /// Add a metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.message.payload.metadata.insert(key.into(), value);
        self
    }

    /// Build the [`A2AMessage`].
    pub fn build(self) -> A2AMessage {
        self.message
    }
}

/// Builder for an axum server exposing an [`A2AProtocol`](crate::protocol::A2AProtocol).
///
/// # Example
///
/// ```rust,ignore
/// use a2a_protocol::builders::ServerBuilder;
/// use std::sync::Arc;
///
/// let app = ServerBuilder::new(Arc::new(protocol))
///     .with_cors(true)
///     .build()
///     .await;
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
/// axum::serve(listener, app).await?;
/// ```
#[cfg(feature = "server")]
pub struct ServerBuilder {
    protocol: std::sync::Arc<crate::protocol::A2AProtocol>,
    cors_enabled: bool,
    heartbeat: bool,
}

#[cfg(feature = "server")]
impl ServerBuilder {
    /// Create a builder serving `protocol`.
    pub fn new(protocol: std::sync::Arc<crate::protocol::A2AProtocol>) -> Self {
        Self {
            protocol,
            cors_enabled: false,
            heartbeat: false,
        }
    }

    /// Enable or disable permissive CORS middleware.
    pub fn with_cors(mut self, enabled: bool) -> Self {
        self.cors_enabled = enabled;
        self
    }

    /// Start the protocol's background heartbeat (without a transport) when
    /// the router is built. Requires a tokio runtime.
    pub fn with_heartbeat(mut self, enabled: bool) -> Self {
        self.heartbeat = enabled;
        self
    }

    /// Build the axum router.
    pub async fn build(self) -> axum::Router {
        use crate::server::a2a_router;

        if self.heartbeat {
            self.protocol.start_heartbeat(None).await;
        }

        let mut router = a2a_router(self.protocol);
        if self.cors_enabled {
            use tower_http::cors::CorsLayer;
            router = router.layer(CorsLayer::permissive());
        }
        router
    }
}
