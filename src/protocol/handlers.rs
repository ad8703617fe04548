//! Built-in type handlers registered by [`A2AProtocol`](super::A2AProtocol).
//!
//! | Type | Effect | Reply |
//! |------|--------|-------|
//! | HANDSHAKE | drives the handshake state machine | next handshake stage |
//! | HEARTBEAT | refreshes the sender's status in `connected_agents` | none |
//! | CAPABILITY_DISCOVERY | filters local capabilities by `tags` / `names` | RESPONSE |
//! | REGISTRATION | adds or updates the sender in `connected_agents` | RESPONSE |
//! | DEREGISTRATION | removes the sender from `connected_agents` and `authenticated` | RESPONSE |
//! | RESPONSE | resolves the pending request named by `correlation_id` | none |
//! | ERROR | same, for requests that failed remotely | none |
//!
//! Registration and deregistration only ever concern the sender itself; a
//! message naming any other agent id fails with `HANDLER_ERROR`.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};

use crate::error::{ProtocolError, ProtocolResult};
use crate::types::{A2AMessage, AgentInfo, AgentStatus};
use crate::utils::message::{get_str, get_string_list};

use super::handshake::{HandshakeContext, HandshakeManager, HandshakeObserver};
use super::router::MessageHandler;

/// A REQUEST sent by this agent that has not been answered yet.
#[derive(Debug)]
pub(crate) struct PendingRequest {
    pub receiver_id: Option<String>,
    pub capability: Option<String>,
    pub sent_at: f64,
    pub responder: Option<oneshot::Sender<A2AMessage>>,
}

/// Mutable state owned by one protocol instance and shared with its handlers.
#[derive(Debug)]
pub(crate) struct AgentState {
    pub agent_info: Arc<RwLock<AgentInfo>>,
    pub connected_agents: Mutex<HashMap<String, AgentInfo>>,
    /// Peers that answered our challenge during a handshake.
    pub authenticated: Mutex<HashSet<String>>,
    pub pending_requests: Mutex<HashMap<String, PendingRequest>>,
}

impl AgentState {
    pub fn new(agent_info: AgentInfo) -> Self {
        Self {
            agent_info: Arc::new(RwLock::new(agent_info)),
            connected_agents: Mutex::new(HashMap::new()),
            authenticated: Mutex::new(HashSet::new()),
            pending_requests: Mutex::new(HashMap::new()),
        }
    }

    pub fn agent(&self) -> AgentInfo {
        self.agent_info
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn agent_id(&self) -> String {
        self.agent_info
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .agent_id
            .clone()
    }

    pub fn update_agent<F: FnOnce(&mut AgentInfo)>(&self, f: F) {
        let mut agent = self.agent_info.write().unwrap_or_else(|e| e.into_inner());
        f(&mut agent);
    }

    /// Resolve the pending request `message` answers. Returns `false` when
    /// there is no such request.
    pub async fn resolve_pending(&self, message: &A2AMessage) -> bool {
        let Some(correlation_id) = message.header.correlation_id.as_deref() else {
            return false;
        };
        let pending = self.pending_requests.lock().await.remove(correlation_id);
        match pending {
            Some(pending) => {
                debug!(
                    correlation_id = %correlation_id,
                    capability = ?pending.capability,
                    receiver_id = ?pending.receiver_id,
                    "Pending request resolved"
                );
                if let Some(responder) = pending.responder {
                    // The waiter may have given up; that is not an error here.
                    let _ = responder.send(message.clone());
                }
                true
            }
            None => false,
        }
    }

    /// Forget `agent_id` entirely. Returns `true` if it was connected.
    pub async fn forget(&self, agent_id: &str) -> bool {
        self.authenticated.lock().await.remove(agent_id);
        self.connected_agents.lock().await.remove(agent_id).is_some()
    }

    /// Local responses to broadcasts carry no sender; stamp ours.
    pub fn stamp(&self, mut message: A2AMessage) -> A2AMessage {
        if message.header.sender_id.is_empty() {
            message.header.sender_id = self.agent_id();
        }
        message
    }
}

/// Keeps `connected_agents` in step with completed handshakes.
///
/// A peer counts as authenticated only when this side issued the challenge
/// and verified the answer.
pub(crate) struct ConnectionTracker {
    pub state: Arc<AgentState>,
}

#[async_trait]
impl HandshakeObserver for ConnectionTracker {
    async fn on_connected(&self, context: &HandshakeContext) {
        if let Some(ref remote) = context.remote_agent {
            self.state
                .connected_agents
                .lock()
                .await
                .insert(remote.agent_id.clone(), remote.clone());
            if !context.initiator && context.auth_token.is_some() {
                self.state
                    .authenticated
                    .lock()
                    .await
                    .insert(remote.agent_id.clone());
            }
        }
    }
}

pub(crate) struct HandshakeHandler {
    pub handshake: HandshakeManager,
}

#[async_trait]
impl MessageHandler for HandshakeHandler {
    async fn handle(&self, message: &A2AMessage) -> ProtocolResult<Option<A2AMessage>> {
        Ok(self.handshake.handle_handshake_message(message).await)
    }
}

pub(crate) struct HeartbeatHandler {
    pub state: Arc<AgentState>,
}

#[async_trait]
impl MessageHandler for HeartbeatHandler {
    async fn handle(&self, message: &A2AMessage) -> ProtocolResult<Option<A2AMessage>> {
        let status = message
            .payload
            .data
            .get("status")
            .and_then(|v| serde_json::from_value::<AgentStatus>(v.clone()).ok())
            .unwrap_or(AgentStatus::Online);

        let mut connected = self.state.connected_agents.lock().await;
        match connected.get_mut(message.sender_id()) {
            Some(agent) => {
                agent.status = status;
                agent
                    .metadata
                    .insert("last_heartbeat".to_string(), json!(message.header.timestamp));
                debug!(sender_id = %message.sender_id(), status = %status, "Heartbeat received");
            }
            None => debug!(sender_id = %message.sender_id(), "Heartbeat from unknown agent"),
        }
        Ok(None)
    }
}

pub(crate) struct DiscoveryHandler {
    pub state: Arc<AgentState>,
}

#[async_trait]
impl MessageHandler for DiscoveryHandler {
    async fn handle(&self, message: &A2AMessage) -> ProtocolResult<Option<A2AMessage>> {
        let params = &message.payload.parameters;
        let tags = get_string_list(params, "tags");
        let mut names = get_string_list(params, "names");
        if names.is_empty() {
            names = get_string_list(params, "capabilities");
        }

        let agent = self.state.agent();
        let matches = agent.find_capabilities(&tags, &names);
        debug!(
            sender_id = %message.sender_id(),
            matched = matches.len(),
            "Capability discovery"
        );

        let mut data = HashMap::new();
        data.insert("agent_id".to_string(), Value::String(agent.agent_id));
        data.insert("capabilities".to_string(), serde_json::to_value(&matches)?);
        Ok(Some(message.create_response(data)))
    }
}

pub(crate) struct RegistrationHandler {
    pub state: Arc<AgentState>,
}

#[async_trait]
impl MessageHandler for RegistrationHandler {
    async fn handle(&self, message: &A2AMessage) -> ProtocolResult<Option<A2AMessage>> {
        let raw = message
            .payload
            .data
            .get("agent_info")
            .or_else(|| message.payload.parameters.get("agent_info"))
            .cloned()
            .ok_or_else(|| ProtocolError::handler("registration carries no agent_info"))?;
        let agent = AgentInfo::from_value(raw)
            .map_err(|e| ProtocolError::handler(format!("invalid agent_info: {e}")))?;

        if agent.agent_id != message.sender_id() {
            warn!(
                sender_id = %message.sender_id(),
                agent_id = %agent.agent_id,
                "Registration on behalf of another agent"
            );
            return Err(ProtocolError::handler(format!(
                "agent {} cannot register as {}",
                message.sender_id(),
                agent.agent_id
            )));
        }

        let agent_id = agent.agent_id.clone();
        let updated = self
            .state
            .connected_agents
            .lock()
            .await
            .insert(agent_id.clone(), agent)
            .is_some();
        info!(agent_id = %agent_id, updated, "Agent registered");

        let mut data = HashMap::new();
        data.insert(
            "status".to_string(),
            json!(if updated { "updated" } else { "registered" }),
        );
        data.insert("agent_id".to_string(), Value::String(agent_id));
        Ok(Some(message.create_response(data)))
    }
}

pub(crate) struct DeregistrationHandler {
    pub state: Arc<AgentState>,
}

#[async_trait]
impl MessageHandler for DeregistrationHandler {
    async fn handle(&self, message: &A2AMessage) -> ProtocolResult<Option<A2AMessage>> {
        let agent_id = message.sender_id().to_string();
        if let Some(named) = get_str(&message.payload.data, "agent_id") {
            if named != agent_id {
                warn!(sender_id = %agent_id, agent_id = %named, "Deregistration of another agent");
                return Err(ProtocolError::handler(format!(
                    "agent {agent_id} cannot deregister {named}"
                )));
            }
        }
        let removed = self.state.forget(&agent_id).await;
        info!(agent_id = %agent_id, removed, "Agent deregistered");

        let mut data = HashMap::new();
        data.insert(
            "status".to_string(),
            json!(if removed { "deregistered" } else { "unknown" }),
        );
        data.insert("agent_id".to_string(), Value::String(agent_id));
        Ok(Some(message.create_response(data)))
    }
}

pub(crate) struct ResponseHandler {
    pub state: Arc<AgentState>,
}

#[async_trait]
impl MessageHandler for ResponseHandler {
    async fn handle(&self, message: &A2AMessage) -> ProtocolResult<Option<A2AMessage>> {
        if !self.state.resolve_pending(message).await {
            warn!(
                message_id = %message.header.message_id,
                correlation_id = ?message.header.correlation_id,
                "Response does not match any pending request"
            );
        }
        Ok(None)
    }
}

pub(crate) struct ErrorHandler {
    pub state: Arc<AgentState>,
}

#[async_trait]
impl MessageHandler for ErrorHandler {
    async fn handle(&self, message: &A2AMessage) -> ProtocolResult<Option<A2AMessage>> {
        let (code, text) = match message.error_details() {
            Some(details) => (details.error_code, details.error_message),
            None => ("UNKNOWN".to_string(), String::new()),
        };
        warn!(
            sender_id = %message.sender_id(),
            correlation_id = ?message.header.correlation_id,
            error_code = %code,
            error_message = %text,
            "Error reported by peer"
        );
        self.state.resolve_pending(message).await;
        Ok(None)
    }
}
