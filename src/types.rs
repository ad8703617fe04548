//! A2A data model: message envelopes, agent identity and capabilities.
//!
//! Every type here is a serde value object. Once a message is handed to the
//! router it is treated as immutable; responses are always new messages built
//! from their originating message via [`A2AMessage::create_response`].
//!
//! Wire shape of a message (JSON):
//!
//! ```text
//! {
//!   "header":  { "message_id", "message_type", "timestamp", "sender_id",
//!                "receiver_id", "correlation_id", "priority", "ttl_seconds",
//!                "retry_count", "trace_id", "version" },
//!   "payload": { "capability", "action", "parameters", "data", "metadata" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::error::ProtocolResult;
use crate::utils::constants::{DEFAULT_TTL_SECONDS, PROTOCOL_VERSION};
use crate::utils::message::{new_id, now_timestamp};

// ============================================================================
// Enums
// ============================================================================

/// The kind of exchange a message represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Application request targeting a capability.
    Request,
    /// Reply to a request, linked via `correlation_id`.
    Response,
    /// One-way notification.
    Notification,
    /// Session establishment traffic.
    Handshake,
    /// Liveness beacon.
    Heartbeat,
    /// Error report, usually correlated to the failing message.
    Error,
    /// Query for a peer's advertised capabilities.
    CapabilityDiscovery,
    /// Announce (or refresh) an agent to a peer.
    Registration,
    /// Withdraw an agent from a peer.
    Deregistration,
}

impl MessageType {
    /// All message types, in declaration order.
    pub const ALL: [MessageType; 9] = [
        MessageType::Request,
        MessageType::Response,
        MessageType::Notification,
        MessageType::Handshake,
        MessageType::Heartbeat,
        MessageType::Error,
        MessageType::CapabilityDiscovery,
        MessageType::Registration,
        MessageType::Deregistration,
    ];

    /// Wire name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Request => "request",
            MessageType::Response => "response",
            MessageType::Notification => "notification",
            MessageType::Handshake => "handshake",
            MessageType::Heartbeat => "heartbeat",
            MessageType::Error => "error",
            MessageType::CapabilityDiscovery => "capability_discovery",
            MessageType::Registration => "registration",
            MessageType::Deregistration => "deregistration",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Message priority. Serialized as an integer from 1 (low) to 5 (critical).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Priority {
    /// 1
    Low,
    /// 2
    #[default]
    Normal,
    /// 3
    High,
    /// 4
    Urgent,
    /// 5
    Critical,
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        match priority {
            Priority::Low => 1,
            Priority::Normal => 2,
            Priority::High => 3,
            Priority::Urgent => 4,
            Priority::Critical => 5,
        }
    }
}

impl TryFrom<u8> for Priority {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Priority::Low),
            2 => Ok(Priority::Normal),
            3 => Ok(Priority::High),
            4 => Ok(Priority::Urgent),
            5 => Ok(Priority::Critical),
            other => Err(format!("priority must be between 1 and 5, got {}", other)),
        }
    }
}

/// Lifecycle status an agent advertises about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Accepting messages.
    #[default]
    Online,
    /// Not reachable.
    Offline,
    /// Reachable but saturated.
    Busy,
    /// Temporarily withdrawn.
    Maintenance,
    /// Running in a degraded state.
    Error,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentStatus::Online => "online",
            AgentStatus::Offline => "offline",
            AgentStatus::Busy => "busy",
            AgentStatus::Maintenance => "maintenance",
            AgentStatus::Error => "error",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// Message envelope
// ============================================================================

fn default_ttl() -> u64 {
    DEFAULT_TTL_SECONDS
}

fn default_version() -> String {
    PROTOCOL_VERSION.to_string()
}

/// Identity and routing metadata for one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageHeader {
    /// Unique per message instance.
    pub message_id: String,

    /// Kind of exchange.
    pub message_type: MessageType,

    /// Creation time, float seconds since the Unix epoch.
    pub timestamp: f64,

    /// Originating agent.
    pub sender_id: String,

    /// Target agent. `None` means broadcast.
    #[serde(default)]
    pub receiver_id: Option<String>,

    /// `message_id` of the message this one answers.
    #[serde(default)]
    pub correlation_id: Option<String>,

    /// Delivery priority.
    #[serde(default)]
    pub priority: Priority,

    /// Validity window in seconds, measured from `timestamp`.
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,

    /// How many times delivery has been retried.
    #[serde(default)]
    pub retry_count: u32,

    /// Opaque tracing token propagated across hops.
    #[serde(default)]
    pub trace_id: Option<String>,

    /// Protocol version string.
    #[serde(default = "default_version")]
    pub version: String,
}

impl MessageHeader {
    /// Create a header stamped with a fresh id and the current time.
    pub fn new(message_type: MessageType, sender_id: impl Into<String>) -> Self {
        Self {
            message_id: new_id(),
            message_type,
            timestamp: now_timestamp(),
            sender_id: sender_id.into(),
            receiver_id: None,
            correlation_id: None,
            priority: Priority::Normal,
            ttl_seconds: DEFAULT_TTL_SECONDS,
            retry_count: 0,
            trace_id: None,
            version: PROTOCOL_VERSION.to_string(),
        }
    }

    /// `true` iff `now - timestamp > ttl_seconds`.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_timestamp())
    }

    /// Expiry check against an explicit clock reading.
    pub fn is_expired_at(&self, now: f64) -> bool {
        now - self.timestamp > self.ttl_seconds as f64
    }
}

/// The content being exchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    /// Target capability name.
    #[serde(default)]
    pub capability: Option<String>,

    /// Sub-operation within the capability (or handshake stage).
    #[serde(default)]
    pub action: Option<String>,

    /// Request arguments.
    #[serde(default)]
    pub parameters: HashMap<String, Value>,

    /// Response or notification body.
    #[serde(default)]
    pub data: HashMap<String, Value>,

    /// Cross-cutting annotations such as a session id.
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

/// One protocol exchange: header plus payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct A2AMessage {
    /// Identity and routing metadata.
    pub header: MessageHeader,
    /// Content.
    #[serde(default)]
    pub payload: MessagePayload,
}

impl A2AMessage {
    /// Create an empty message of the given type.
    pub fn new(message_type: MessageType, sender_id: impl Into<String>) -> Self {
        Self {
            header: MessageHeader::new(message_type, sender_id),
            payload: MessagePayload::default(),
        }
    }

    /// Create a REQUEST for `capability` on `receiver_id`.
    pub fn request(
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
        capability: impl Into<String>,
        parameters: HashMap<String, Value>,
    ) -> Self {
        let mut message = Self::new(MessageType::Request, sender_id);
        message.header.receiver_id = Some(receiver_id.into());
        message.payload.capability = Some(capability.into());
        message.payload.parameters = parameters;
        message
    }

    /// Create a broadcast NOTIFICATION carrying `data`.
    pub fn notification(sender_id: impl Into<String>, data: HashMap<String, Value>) -> Self {
        let mut message = Self::new(MessageType::Notification, sender_id);
        message.payload.data = data;
        message
    }

    /// Shorthand for `self.header.message_id`.
    pub fn id(&self) -> &str {
        &self.header.message_id
    }

    /// Shorthand for `self.header.message_type`.
    pub fn message_type(&self) -> MessageType {
        self.header.message_type
    }

    /// Shorthand for `self.header.sender_id`.
    pub fn sender_id(&self) -> &str {
        &self.header.sender_id
    }

    /// Target capability, if any.
    pub fn capability(&self) -> Option<&str> {
        self.payload.capability.as_deref()
    }

    /// Payload action, if any.
    pub fn action(&self) -> Option<&str> {
        self.payload.action.as_deref()
    }

    /// `true` if the message has no explicit receiver.
    pub fn is_broadcast(&self) -> bool {
        self.header.receiver_id.is_none()
    }

    /// See [`MessageHeader::is_expired`].
    pub fn is_expired(&self) -> bool {
        self.header.is_expired()
    }

    /// Build a RESPONSE to this message.
    ///
    /// Swaps sender and receiver, sets `correlation_id` to this message's id,
    /// and carries over capability, action, priority, trace id and metadata.
    /// When this message was a broadcast the response sender is empty; the
    /// protocol facade stamps its own agent id in that case.
    pub fn create_response(&self, data: HashMap<String, Value>) -> A2AMessage {
        self.create_reply(MessageType::Response, data)
    }

    /// Build a correlated reply of an arbitrary type.
    pub fn create_reply(&self, message_type: MessageType, data: HashMap<String, Value>) -> A2AMessage {
        let mut header = MessageHeader::new(
            message_type,
            self.header.receiver_id.clone().unwrap_or_default(),
        );
        header.receiver_id = Some(self.header.sender_id.clone());
        header.correlation_id = Some(self.header.message_id.clone());
        header.priority = self.header.priority;
        header.trace_id = self.header.trace_id.clone();

        A2AMessage {
            header,
            payload: MessagePayload {
                capability: self.payload.capability.clone(),
                action: self.payload.action.clone(),
                parameters: HashMap::new(),
                data,
                metadata: self.payload.metadata.clone(),
            },
        }
    }

    /// Build an ERROR reply correlated to this message.
    pub fn create_error_response(&self, error: impl Into<ErrorDetails>) -> A2AMessage {
        self.create_reply(MessageType::Error, error.into().to_data())
    }

    /// Decode the ERROR body, if this is an ERROR message.
    pub fn error_details(&self) -> Option<ErrorDetails> {
        if self.header.message_type != MessageType::Error {
            return None;
        }
        ErrorDetails::from_data(&self.payload.data)
    }

    /// Convert to a JSON value (the dictionary form of the envelope).
    pub fn to_value(&self) -> ProtocolResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Rebuild a message from its dictionary form.
    pub fn from_value(value: Value) -> ProtocolResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Encode as a JSON string.
    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from a JSON string.
    pub fn from_json(json: &str) -> ProtocolResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Size in bytes of the JSON encoding.
    pub fn encoded_len(&self) -> ProtocolResult<usize> {
        Ok(serde_json::to_vec(self)?.len())
    }
}

// ============================================================================
// Error payload
// ============================================================================

/// Body of an ERROR message: `data = {error_code, error_message, details, timestamp}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Machine-readable code, see [`crate::error`] constants.
    pub error_code: String,
    /// Human-readable message.
    pub error_message: String,
    /// Structured context.
    #[serde(default)]
    pub details: Value,
    /// When the error was produced (float seconds since epoch).
    pub timestamp: f64,
}

impl ErrorDetails {
    /// Create error details stamped with the current time.
    pub fn new(error_code: impl Into<String>, error_message: impl Into<String>, details: Value) -> Self {
        Self {
            error_code: error_code.into(),
            error_message: error_message.into(),
            details,
            timestamp: now_timestamp(),
        }
    }

    /// Flatten into a payload `data` map.
    pub fn to_data(&self) -> HashMap<String, Value> {
        let mut data = HashMap::new();
        data.insert("error_code".to_string(), Value::String(self.error_code.clone()));
        data.insert(
            "error_message".to_string(),
            Value::String(self.error_message.clone()),
        );
        data.insert("details".to_string(), self.details.clone());
        data.insert("timestamp".to_string(), serde_json::json!(self.timestamp));
        data
    }

    /// Parse from a payload `data` map.
    pub fn from_data(data: &HashMap<String, Value>) -> Option<Self> {
        let value = serde_json::to_value(data).ok()?;
        serde_json::from_value(value).ok()
    }
}

// ============================================================================
// Agents and capabilities
// ============================================================================

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// An advertised unit of functionality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityInfo {
    /// Capability name, the key peers put in `payload.capability`.
    pub name: String,

    /// Capability version.
    #[serde(default = "default_version")]
    pub version: String,

    /// What the capability does.
    #[serde(default)]
    pub description: String,

    /// JSON schema of the accepted parameters.
    #[serde(default = "empty_object")]
    pub input_schema: Value,

    /// JSON schema of the produced result.
    #[serde(default = "empty_object")]
    pub output_schema: Value,

    /// Discovery tags.
    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// Per-sender requests per minute for this capability, overriding the global limit.
    #[serde(default)]
    pub rate_limit: Option<u32>,

    /// Only connected (handshaken) senders may call this capability.
    #[serde(default)]
    pub auth_required: bool,
}

impl CapabilityInfo {
    /// Create a capability with the given name and description.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: PROTOCOL_VERSION.to_string(),
            description: description.into(),
            input_schema: empty_object(),
            output_schema: empty_object(),
            tags: BTreeSet::new(),
            rate_limit: None,
            auth_required: false,
        }
    }

    /// `true` if the capability carries `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Discovery match: name in `names` (when given) and any tag in `tags` (when given).
    pub fn matches(&self, tags: &[String], names: &[String]) -> bool {
        let name_ok = names.is_empty() || names.iter().any(|n| n == &self.name);
        let tag_ok = tags.is_empty() || tags.iter().any(|t| self.tags.contains(t));
        name_ok && tag_ok
    }
}

/// Identity of a participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInfo {
    /// Unique agent id.
    pub agent_id: String,

    /// Display name.
    pub agent_name: String,

    /// Free-form classification (e.g. "parser", "monitor").
    #[serde(default)]
    pub agent_type: String,

    /// Agent software version.
    #[serde(default = "default_version")]
    pub version: String,

    /// Description.
    #[serde(default)]
    pub description: String,

    /// Where the agent can be reached, if it listens anywhere.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Advertised capabilities in registration order.
    #[serde(default)]
    pub capabilities: Vec<CapabilityInfo>,

    /// Current status.
    #[serde(default)]
    pub status: AgentStatus,

    /// Arbitrary annotations.
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl AgentInfo {
    /// Create an online agent with no capabilities.
    pub fn new(agent_id: impl Into<String>, agent_name: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_name: agent_name.into(),
            agent_type: String::new(),
            version: PROTOCOL_VERSION.to_string(),
            description: String::new(),
            endpoint: None,
            capabilities: Vec::new(),
            status: AgentStatus::Online,
            metadata: HashMap::new(),
        }
    }

    /// `true` if a capability named `name` is advertised.
    pub fn has_capability(&self, name: &str) -> bool {
        self.capability(name).is_some()
    }

    /// Look up a capability by name.
    pub fn capability(&self, name: &str) -> Option<&CapabilityInfo> {
        self.capabilities.iter().find(|c| c.name == name)
    }

    /// Add a capability, replacing any existing one with the same name in place.
    pub fn upsert_capability(&mut self, capability: CapabilityInfo) {
        match self
            .capabilities
            .iter_mut()
            .find(|c| c.name == capability.name)
        {
            Some(existing) => *existing = capability,
            None => self.capabilities.push(capability),
        }
    }

    /// Remove a capability by name. Returns it if it was present.
    pub fn remove_capability(&mut self, name: &str) -> Option<CapabilityInfo> {
        let idx = self.capabilities.iter().position(|c| c.name == name)?;
        Some(self.capabilities.remove(idx))
    }

    /// Capabilities matching the discovery filters, in advertised order.
    pub fn find_capabilities(&self, tags: &[String], names: &[String]) -> Vec<CapabilityInfo> {
        self.capabilities
            .iter()
            .filter(|c| c.matches(tags, names))
            .cloned()
            .collect()
    }

    /// Convert to a JSON value for embedding in payloads.
    pub fn to_value(&self) -> ProtocolResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Parse from a JSON value embedded in a payload.
    pub fn from_value(value: Value) -> ProtocolResult<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_serializes_as_integer() {
        assert_eq!(serde_json::to_value(Priority::Low).unwrap(), 1);
        assert_eq!(serde_json::to_value(Priority::Critical).unwrap(), 5);
        let p: Priority = serde_json::from_value(serde_json::json!(3)).unwrap();
        assert_eq!(p, Priority::High);
        assert!(serde_json::from_value::<Priority>(serde_json::json!(9)).is_err());
    }

    #[test]
    fn priority_ordering() {
        assert!(Priority::Low < Priority::Normal);
        assert!(Priority::Urgent < Priority::Critical);
    }

    #[test]
    fn message_type_wire_names() {
        assert_eq!(
            serde_json::to_value(MessageType::CapabilityDiscovery).unwrap(),
            "capability_discovery"
        );
        for t in MessageType::ALL {
            let v = serde_json::to_value(t).unwrap();
            assert_eq!(v, t.as_str());
        }
    }

    #[test]
    fn header_defaults() {
        let header = MessageHeader::new(MessageType::Heartbeat, "a1");
        assert!(!header.message_id.is_empty());
        assert_eq!(header.ttl_seconds, 300);
        assert_eq!(header.version, "1.0");
        assert_eq!(header.priority, Priority::Normal);
        assert!(header.receiver_id.is_none());
    }

    #[test]
    fn missing_optional_header_fields_take_defaults() {
        let json = serde_json::json!({
            "header": {
                "message_id": "m1",
                "message_type": "notification",
                "timestamp": 1700000000.5,
                "sender_id": "a1"
            }
        });
        let msg = A2AMessage::from_value(json).unwrap();
        assert_eq!(msg.header.ttl_seconds, 300);
        assert_eq!(msg.header.version, "1.0");
        assert!(msg.payload.parameters.is_empty());
    }

    #[test]
    fn upsert_capability_replaces_in_place() {
        let mut agent = AgentInfo::new("a1", "Agent One");
        agent.upsert_capability(CapabilityInfo::new("echo", "v1"));
        agent.upsert_capability(CapabilityInfo::new("sum", "adds"));
        agent.upsert_capability(CapabilityInfo::new("echo", "v2"));
        assert_eq!(agent.capabilities.len(), 2);
        assert_eq!(agent.capabilities[0].description, "v2");
        assert!(agent.remove_capability("sum").is_some());
        assert!(!agent.has_capability("sum"));
    }

    #[test]
    fn error_details_roundtrip_through_data() {
        let details = ErrorDetails::new("RATE_LIMITED", "slow down", serde_json::json!({"limit": 1}));
        let parsed = ErrorDetails::from_data(&details.to_data()).unwrap();
        assert_eq!(parsed, details);
    }
}
