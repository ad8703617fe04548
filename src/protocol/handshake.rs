//! Handshake manager — session establishment between two agents.
//!
//! ```text
//! DISCONNECTED → INITIATING ──────────────────────────────┐
//!                    │ (peer challenges)                   │ (no auth)
//!                    ▼                                     ▼
//!              AUTHENTICATING ─────────────────────────▶ CONNECTED
//!
//! responder:  CHALLENGE_RECEIVED → CHALLENGE_SENT → CONNECTED
//!
//! any state ──▶ FAILED      (error reply, bad auth, version mismatch)
//! any state ──▶ TIMEOUT     (watchdog)
//! ```
//!
//! All traffic is `HANDSHAKE`-typed; `payload.action` names the stage and
//! `session_id` (in `data` and `metadata`) ties both sides together.
//!
//! Sessions are ephemeral: they are removed the moment they reach a terminal
//! state, and the outcome is reported to every [`HandshakeObserver`]. Protocol
//! failures are never returned as errors. Only initiation (a transport that
//! cannot deliver after all retries) fails with [`ProtocolError::Handshake`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex as StdMutex, RwLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::HandshakeConfig;
use crate::error::{ProtocolError, ProtocolResult};
use crate::types::{A2AMessage, AgentInfo, MessageType};
use crate::utils::constants::SESSION_ID_KEY;
use crate::utils::message::{get_str, get_string_list, new_id, now_timestamp};

use super::auth::{AuthenticationProvider, HandshakeChallenge};
use super::transport::MessageTransport;

/// Handshake session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeState {
    /// No session.
    Disconnected,
    /// Initiator sent its agent info and awaits a reply.
    Initiating,
    /// Responder issued a challenge and awaits the answer.
    ChallengeSent,
    /// Responder received an initiation.
    ChallengeReceived,
    /// Initiator answered a challenge and awaits the verdict.
    Authenticating,
    /// Terminal success.
    Connected,
    /// Terminal failure.
    Failed,
    /// Terminal failure enforced by the watchdog.
    Timeout,
}

impl HandshakeState {
    /// `true` for `Connected`, `Failed` and `Timeout`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            HandshakeState::Connected | HandshakeState::Failed | HandshakeState::Timeout
        )
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HandshakeState::Disconnected => "disconnected",
            HandshakeState::Initiating => "initiating",
            HandshakeState::ChallengeSent => "challenge_sent",
            HandshakeState::ChallengeReceived => "challenge_received",
            HandshakeState::Authenticating => "authenticating",
            HandshakeState::Connected => "connected",
            HandshakeState::Failed => "failed",
            HandshakeState::Timeout => "timeout",
        };
        write!(f, "{}", s)
    }
}

/// Stage of a handshake exchange, carried in `payload.action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeAction {
    /// Initiator → responder, carries the initiator's agent info.
    Initiate,
    /// Responder → initiator, carries a [`HandshakeChallenge`].
    Challenge,
    /// Initiator → responder, carries the challenge answer.
    ChallengeResponse,
    /// Session established, carries the sender's agent info.
    Success,
    /// Session rejected, carries `error`.
    Failure,
}

impl HandshakeAction {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HandshakeAction::Initiate => "initiate",
            HandshakeAction::Challenge => "challenge",
            HandshakeAction::ChallengeResponse => "challenge_response",
            HandshakeAction::Success => "success",
            HandshakeAction::Failure => "failure",
        }
    }

    /// Parse a wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "initiate" => Some(HandshakeAction::Initiate),
            "challenge" => Some(HandshakeAction::Challenge),
            "challenge_response" => Some(HandshakeAction::ChallengeResponse),
            "success" => Some(HandshakeAction::Success),
            "failure" => Some(HandshakeAction::Failure),
            _ => None,
        }
    }
}

/// Per-attempt session state.
#[derive(Debug, Clone)]
pub struct HandshakeContext {
    /// Shared by both sides of the exchange.
    pub session_id: String,
    /// This agent, as of session creation.
    pub local_agent: AgentInfo,
    /// Id of the peer.
    pub remote_agent_id: String,
    /// The peer's agent info, once received.
    pub remote_agent: Option<AgentInfo>,
    /// Current state.
    pub state: HandshakeState,
    /// Creation time, float seconds since the Unix epoch.
    pub started_at: f64,
    /// Settings in force for this session.
    pub config: HandshakeConfig,
    /// Challenge issued (responder) or received (initiator).
    pub challenge: Option<HandshakeChallenge>,
    /// The initiator's answer to the challenge.
    pub auth_token: Option<String>,
    /// Initiation send attempts beyond the first.
    pub retry_count: u32,
    /// Reason for a terminal failure.
    pub error_message: Option<String>,
    /// `true` on the side that called `initiate_handshake`.
    pub initiator: bool,
    started: Instant,
}

impl HandshakeContext {
    fn new(
        local_agent: AgentInfo,
        remote_agent_id: impl Into<String>,
        config: HandshakeConfig,
        initiator: bool,
    ) -> Self {
        Self {
            session_id: new_id(),
            local_agent,
            remote_agent_id: remote_agent_id.into(),
            remote_agent: None,
            state: HandshakeState::Disconnected,
            started_at: now_timestamp(),
            config,
            challenge: None,
            auth_token: None,
            retry_count: 0,
            error_message: None,
            initiator,
            started: Instant::now(),
        }
    }

    /// Time since the session was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// `true` once the session has outlived `config.timeout_seconds`.
    pub fn is_expired(&self) -> bool {
        self.elapsed() >= self.config.timeout()
    }
}

/// Receives handshake outcomes.
///
/// Both methods get the final context snapshot; by the time they run the
/// session has already left the active-session map.
#[async_trait]
pub trait HandshakeObserver: Send + Sync {
    /// The session reached `Connected`.
    async fn on_connected(&self, _context: &HandshakeContext) {}

    /// The session reached `Failed` or `Timeout`.
    async fn on_failed(&self, _context: &HandshakeContext) {}
}

/// Drives handshakes for one local agent.
///
/// Cheap to clone; clones share sessions and observers.
#[derive(Clone)]
pub struct HandshakeManager {
    inner: Arc<Inner>,
}

struct Inner {
    local_agent: Arc<RwLock<AgentInfo>>,
    config: HandshakeConfig,
    auth_provider: RwLock<Option<Arc<dyn AuthenticationProvider>>>,
    observers: RwLock<Vec<Arc<dyn HandshakeObserver>>>,
    sessions: Mutex<HashMap<String, HandshakeContext>>,
    watchdogs: StdMutex<HashMap<String, JoinHandle<()>>>,
}

impl HandshakeManager {
    /// Create a manager for `local_agent`.
    pub fn new(local_agent: AgentInfo, config: HandshakeConfig) -> Self {
        Self::with_shared_agent(Arc::new(RwLock::new(local_agent)), config)
    }

    /// Create a manager reading the local agent from a shared cell, so that
    /// capability changes made elsewhere show up in later handshakes.
    pub fn with_shared_agent(local_agent: Arc<RwLock<AgentInfo>>, config: HandshakeConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                local_agent,
                config,
                auth_provider: RwLock::new(None),
                observers: RwLock::new(Vec::new()),
                sessions: Mutex::new(HashMap::new()),
                watchdogs: StdMutex::new(HashMap::new()),
            }),
        }
    }

    /// Install the challenge-response scheme.
    pub fn set_auth_provider(&self, provider: Arc<dyn AuthenticationProvider>) {
        *self
            .inner
            .auth_provider
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(provider);
    }

    /// Register an outcome observer.
    pub fn add_observer(&self, observer: Arc<dyn HandshakeObserver>) {
        self.inner
            .observers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(observer);
    }

    /// Active settings.
    pub fn config(&self) -> &HandshakeConfig {
        &self.inner.config
    }

    /// Snapshot of the local agent.
    pub fn local_agent(&self) -> AgentInfo {
        self.inner.local_agent()
    }

    /// Start a handshake with `remote_agent_id` over `transport`.
    ///
    /// Returns the session id once the initiation message was accepted by the
    /// transport. Transport failures are retried `max_retries` times, after
    /// which the session fails and [`ProtocolError::Handshake`] is returned.
    pub async fn initiate_handshake(
        &self,
        remote_agent_id: &str,
        transport: &dyn MessageTransport,
    ) -> ProtocolResult<String> {
        let inner = &self.inner;
        let local = inner.local_agent();
        let agent_value = local.to_value()?;

        let mut context =
            HandshakeContext::new(local, remote_agent_id, inner.config.clone(), true);
        context.state = HandshakeState::Initiating;
        let session_id = context.session_id.clone();

        inner
            .sessions
            .lock()
            .await
            .insert(session_id.clone(), context);
        inner.spawn_watchdog(&session_id);

        let mut data = HashMap::new();
        data.insert("agent_info".to_string(), agent_value);
        data.insert(
            "supported_versions".to_string(),
            serde_json::json!(inner.config.supported_versions),
        );
        let mut message =
            inner.handshake_message(remote_agent_id, HandshakeAction::Initiate, &session_id, data);

        info!(
            session_id = %session_id,
            remote_agent_id = %remote_agent_id,
            "Initiating handshake"
        );

        let mut last_error = None;
        for attempt in 0..=inner.config.max_retries {
            if attempt > 0 {
                tokio::time::sleep(inner.config.retry_delay()).await;
                let mut sessions = inner.sessions.lock().await;
                match sessions.get_mut(&session_id) {
                    Some(context) => context.retry_count = attempt,
                    None => {
                        return Err(ProtocolError::handshake(format!(
                            "handshake session {session_id} ended before delivery"
                        )))
                    }
                }
                message.header.retry_count = attempt;
            }

            match transport.send(&message).await {
                Ok(()) => return Ok(session_id),
                Err(e) => {
                    warn!(
                        session_id = %session_id,
                        attempt,
                        error = %e,
                        "Handshake delivery failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        let reason = match last_error {
            Some(e) => format!("failed to deliver handshake to {remote_agent_id}: {e}"),
            None => format!("failed to deliver handshake to {remote_agent_id}"),
        };
        inner
            .finish(&session_id, HandshakeState::Failed, Some(reason.clone()))
            .await;
        Err(ProtocolError::handshake(reason))
    }

    /// Process an inbound HANDSHAKE message and return the reply to send, if any.
    pub async fn handle_handshake_message(&self, message: &A2AMessage) -> Option<A2AMessage> {
        let inner = &self.inner;
        let action = message.action().and_then(HandshakeAction::parse);
        debug!(
            message_id = %message.header.message_id,
            sender_id = %message.header.sender_id,
            action = ?message.action(),
            "Handling handshake message"
        );

        match action {
            Some(HandshakeAction::Initiate) => inner.on_initiate(message).await,
            Some(HandshakeAction::Challenge) => inner.on_challenge(message).await,
            Some(HandshakeAction::ChallengeResponse) => inner.on_challenge_response(message).await,
            Some(HandshakeAction::Success) => {
                inner.on_success(message).await;
                None
            }
            Some(HandshakeAction::Failure) => {
                inner.on_failure(message).await;
                None
            }
            None => {
                warn!(
                    sender_id = %message.header.sender_id,
                    action = ?message.action(),
                    "Unknown handshake action"
                );
                let session_id = session_id_of(message).unwrap_or_default();
                Some(inner.failure_reply(message, &session_id, "unknown handshake action"))
            }
        }
    }

    /// Snapshot of every session still in flight.
    pub async fn active_sessions(&self) -> Vec<HandshakeContext> {
        self.inner.sessions.lock().await.values().cloned().collect()
    }

    /// Number of sessions still in flight.
    pub async fn session_count(&self) -> usize {
        self.inner.sessions.lock().await.len()
    }

    /// State of an in-flight session, `None` once it has ended.
    pub async fn session_state(&self, session_id: &str) -> Option<HandshakeState> {
        self.inner
            .sessions
            .lock()
            .await
            .get(session_id)
            .map(|c| c.state)
    }

    /// Time out every session older than `timeout_seconds`. Returns how many were removed.
    ///
    /// Watchdogs normally do this; the sweep catches sessions whose watchdog
    /// was lost.
    pub async fn cleanup_expired_sessions(&self) -> usize {
        let inner = &self.inner;
        let expired: Vec<HandshakeContext> = {
            let mut sessions = inner.sessions.lock().await;
            let ids: Vec<String> = sessions
                .values()
                .filter(|c| c.is_expired())
                .map(|c| c.session_id.clone())
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };

        for mut context in expired.iter().cloned() {
            inner.cancel_watchdog(&context.session_id);
            context.state = HandshakeState::Timeout;
            context.error_message = Some("session expired".to_string());
            inner.notify(&context).await;
        }
        if !expired.is_empty() {
            info!(removed = expired.len(), "Cleaned up expired handshake sessions");
        }
        expired.len()
    }

    /// Abort every watchdog and drop all sessions without notifying observers.
    pub async fn shutdown(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut watchdogs = self
                .inner
                .watchdogs
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            watchdogs.drain().map(|(_, h)| h).collect()
        };
        for handle in handles {
            handle.abort();
        }
        let dropped = {
            let mut sessions = self.inner.sessions.lock().await;
            let n = sessions.len();
            sessions.clear();
            n
        };
        debug!(dropped, "Handshake manager shut down");
    }
}

impl Inner {
    fn local_agent(&self) -> AgentInfo {
        self.local_agent
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn auth_provider(&self) -> Option<Arc<dyn AuthenticationProvider>> {
        self.auth_provider
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn spawn_watchdog(self: &Arc<Self>, session_id: &str) {
        let weak: Weak<Inner> = Arc::downgrade(self);
        let id = session_id.to_string();
        let timeout = self.config.timeout();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(inner) = weak.upgrade() {
                inner.expire(&id).await;
            }
        });
        let previous = self
            .watchdogs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session_id.to_string(), handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn cancel_watchdog(&self, session_id: &str) {
        let handle = self
            .watchdogs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(session_id);
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    /// Called from the watchdog task itself, so its handle is dropped, not aborted.
    async fn expire(&self, session_id: &str) {
        self.watchdogs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(session_id);

        let context = {
            let mut sessions = self.sessions.lock().await;
            match sessions.get(session_id) {
                Some(c) if !c.state.is_terminal() => sessions.remove(session_id),
                _ => None,
            }
        };

        if let Some(mut context) = context {
            context.state = HandshakeState::Timeout;
            context.error_message = Some(format!(
                "handshake timed out after {}s",
                context.config.timeout_seconds
            ));
            self.notify(&context).await;
        }
    }

    /// Move a session to a terminal state, remove it and notify observers.
    async fn finish(
        &self,
        session_id: &str,
        state: HandshakeState,
        error: Option<String>,
    ) -> Option<HandshakeContext> {
        let mut context = self.sessions.lock().await.remove(session_id)?;
        self.cancel_watchdog(session_id);
        context.state = state;
        if error.is_some() {
            context.error_message = error;
        }
        self.notify(&context).await;
        Some(context)
    }

    async fn notify(&self, context: &HandshakeContext) {
        match context.state {
            HandshakeState::Connected => info!(
                session_id = %context.session_id,
                remote_agent_id = %context.remote_agent_id,
                "Handshake completed"
            ),
            state => warn!(
                session_id = %context.session_id,
                remote_agent_id = %context.remote_agent_id,
                state = %state,
                error = context.error_message.as_deref().unwrap_or(""),
                "Handshake failed"
            ),
        }

        let observers = self
            .observers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for observer in observers {
            if context.state == HandshakeState::Connected {
                observer.on_connected(context).await;
            } else {
                observer.on_failed(context).await;
            }
        }
    }

    /// `true` if the session exists, is still open and belongs to `sender_id`.
    async fn owns(&self, session_id: &str, sender_id: &str) -> bool {
        let sessions = self.sessions.lock().await;
        matches!(
            sessions.get(session_id),
            Some(c) if c.remote_agent_id == sender_id && !c.state.is_terminal()
        )
    }

    fn handshake_message(
        &self,
        receiver_id: &str,
        action: HandshakeAction,
        session_id: &str,
        mut data: HashMap<String, Value>,
    ) -> A2AMessage {
        let mut message = A2AMessage::new(MessageType::Handshake, self.local_agent().agent_id);
        message.header.receiver_id = Some(receiver_id.to_string());
        message.payload.action = Some(action.as_str().to_string());
        data.insert(SESSION_ID_KEY.to_string(), Value::String(session_id.to_string()));
        message.payload.data = data;
        message.payload.metadata.insert(
            SESSION_ID_KEY.to_string(),
            Value::String(session_id.to_string()),
        );
        message
    }

    fn reply(
        &self,
        original: &A2AMessage,
        action: HandshakeAction,
        session_id: &str,
        mut data: HashMap<String, Value>,
    ) -> A2AMessage {
        data.insert(SESSION_ID_KEY.to_string(), Value::String(session_id.to_string()));
        let mut reply = original.create_reply(MessageType::Handshake, data);
        reply.header.sender_id = self.local_agent().agent_id;
        reply.payload.action = Some(action.as_str().to_string());
        reply.payload.metadata.insert(
            SESSION_ID_KEY.to_string(),
            Value::String(session_id.to_string()),
        );
        reply
    }

    fn success_reply(&self, original: &A2AMessage, session_id: &str) -> ProtocolResult<A2AMessage> {
        let mut data = HashMap::new();
        data.insert("agent_info".to_string(), self.local_agent().to_value()?);
        Ok(self.reply(original, HandshakeAction::Success, session_id, data))
    }

    fn failure_reply(&self, original: &A2AMessage, session_id: &str, reason: &str) -> A2AMessage {
        let mut data = HashMap::new();
        data.insert("error".to_string(), Value::String(reason.to_string()));
        self.reply(original, HandshakeAction::Failure, session_id, data)
    }

    /// Fail a responder session that never entered the session map.
    async fn reject(
        &self,
        mut context: HandshakeContext,
        message: &A2AMessage,
        reason: String,
    ) -> Option<A2AMessage> {
        context.state = HandshakeState::Failed;
        context.error_message = Some(reason.clone());
        self.notify(&context).await;
        Some(self.failure_reply(message, &context.session_id, &reason))
    }

    async fn on_initiate(self: &Arc<Self>, message: &A2AMessage) -> Option<A2AMessage> {
        let sender_id = message.sender_id().to_string();
        let mut context =
            HandshakeContext::new(self.local_agent(), &sender_id, self.config.clone(), false);
        if let Some(id) = session_id_of(message) {
            context.session_id = id;
        }
        context.state = HandshakeState::ChallengeReceived;

        if let Some(reply) = self.on_duplicate_initiate(message, &context.session_id).await {
            return Some(reply);
        }

        let remote = message
            .payload
            .data
            .get("agent_info")
            .cloned()
            .map(AgentInfo::from_value);
        match remote {
            Some(Ok(agent)) => context.remote_agent = Some(agent),
            _ => {
                return self
                    .reject(context, message, "handshake carries no valid agent_info".to_string())
                    .await
            }
        }

        let mut peer_versions = get_string_list(&message.payload.data, "supported_versions");
        if peer_versions.is_empty() {
            peer_versions.push(message.header.version.clone());
        }
        if !peer_versions
            .iter()
            .any(|v| self.config.supported_versions.contains(v))
        {
            let reason = format!(
                "incompatible protocol versions: peer supports {:?}, local supports {:?}",
                peer_versions, self.config.supported_versions
            );
            return self.reject(context, message, reason).await;
        }

        if self.config.require_auth {
            let Some(provider) = self.auth_provider() else {
                return self
                    .reject(
                        context,
                        message,
                        "authentication required but no provider is configured".to_string(),
                    )
                    .await;
            };
            let challenge = match provider
                .create_challenge(&sender_id, self.config.challenge_ttl_seconds)
                .await
            {
                Ok(challenge) => challenge,
                Err(e) => {
                    return self
                        .reject(context, message, format!("failed to create challenge: {e}"))
                        .await
                }
            };
            let challenge_value = match serde_json::to_value(&challenge) {
                Ok(v) => v,
                Err(e) => {
                    return self
                        .reject(context, message, format!("failed to encode challenge: {e}"))
                        .await
                }
            };

            context.state = HandshakeState::ChallengeSent;
            context.challenge = Some(challenge);
            let session_id = context.session_id.clone();
            {
                let mut sessions = self.sessions.lock().await;
                if sessions.contains_key(&session_id) {
                    drop(sessions);
                    return Some(self.failure_reply(
                        message,
                        &session_id,
                        "handshake session id already in use",
                    ));
                }
                sessions.insert(session_id.clone(), context);
            }
            self.spawn_watchdog(&session_id);

            debug!(session_id = %session_id, remote_agent_id = %sender_id, "Challenge sent");
            let mut data = HashMap::new();
            data.insert("challenge".to_string(), challenge_value);
            return Some(self.reply(message, HandshakeAction::Challenge, &session_id, data));
        }

        let reply = match self.success_reply(message, &context.session_id) {
            Ok(reply) => reply,
            Err(e) => {
                return self
                    .reject(context, message, format!("failed to encode agent_info: {e}"))
                    .await
            }
        };
        context.state = HandshakeState::Connected;
        self.notify(&context).await;
        Some(reply)
    }

    /// Answer an initiation whose session id is already taken.
    ///
    /// A retransmitted initiation from the same peer gets the outstanding
    /// challenge again. Any other collision is refused and the existing
    /// session is left as it was.
    async fn on_duplicate_initiate(
        &self,
        message: &A2AMessage,
        session_id: &str,
    ) -> Option<A2AMessage> {
        let challenge = {
            let sessions = self.sessions.lock().await;
            let existing = sessions.get(session_id)?;
            match &existing.challenge {
                Some(challenge)
                    if !existing.initiator
                        && existing.remote_agent_id == message.sender_id()
                        && existing.state == HandshakeState::ChallengeSent
                        && !challenge.is_expired() =>
                {
                    Some(challenge.clone())
                }
                _ => None,
            }
        };

        if let Some(value) = challenge.and_then(|c| serde_json::to_value(c).ok()) {
            debug!(session_id = %session_id, "Re-sending challenge for repeated initiation");
            let mut data = HashMap::new();
            data.insert("challenge".to_string(), value);
            return Some(self.reply(message, HandshakeAction::Challenge, session_id, data));
        }

        warn!(
            session_id = %session_id,
            sender_id = %message.sender_id(),
            "Handshake initiation reuses an active session id"
        );
        Some(self.failure_reply(message, session_id, "handshake session id already in use"))
    }

    async fn on_challenge(&self, message: &A2AMessage) -> Option<A2AMessage> {
        let sender_id = message.sender_id();
        let Some(session_id) = session_id_of(message) else {
            warn!(sender_id = %sender_id, "Challenge without session id");
            return None;
        };
        if !self.owns(&session_id, sender_id).await {
            warn!(session_id = %session_id, sender_id = %sender_id, "Challenge for unknown session");
            return None;
        }

        let challenge: Option<HandshakeChallenge> = message
            .payload
            .data
            .get("challenge")
            .and_then(|v| serde_json::from_value(v.clone()).ok());
        let (Some(challenge), Some(provider)) = (challenge, self.auth_provider()) else {
            let reason = "cannot answer challenge: no valid challenge or no auth provider";
            self.finish(&session_id, HandshakeState::Failed, Some(reason.to_string()))
                .await;
            return Some(self.failure_reply(message, &session_id, reason));
        };

        let response = match provider.respond_to_challenge(&challenge).await {
            Ok(response) => response,
            Err(e) => {
                let reason = format!("failed to answer challenge: {e}");
                self.finish(&session_id, HandshakeState::Failed, Some(reason.clone()))
                    .await;
                return Some(self.failure_reply(message, &session_id, &reason));
            }
        };

        {
            let mut sessions = self.sessions.lock().await;
            let context = sessions.get_mut(&session_id)?;
            context.state = HandshakeState::Authenticating;
            context.auth_token = Some(response.to_string());
            context.challenge = Some(challenge.clone());
        }

        debug!(session_id = %session_id, "Answering challenge");
        let mut data = HashMap::new();
        data.insert(
            "challenge_id".to_string(),
            Value::String(challenge.challenge_id),
        );
        data.insert("response".to_string(), response);
        Some(self.reply(message, HandshakeAction::ChallengeResponse, &session_id, data))
    }

    async fn on_challenge_response(&self, message: &A2AMessage) -> Option<A2AMessage> {
        let sender_id = message.sender_id();
        let session_id = session_id_of(message)?;

        let challenge = {
            let mut sessions = self.sessions.lock().await;
            match sessions.get_mut(&session_id) {
                Some(c) if c.remote_agent_id == sender_id
                    && c.state == HandshakeState::ChallengeSent =>
                {
                    c.state = HandshakeState::Authenticating;
                    c.challenge.clone()
                }
                _ => {
                    warn!(
                        session_id = %session_id,
                        sender_id = %sender_id,
                        "Challenge response for unknown session"
                    );
                    return None;
                }
            }
        };

        let response = message
            .payload
            .data
            .get("response")
            .cloned()
            .unwrap_or(Value::Null);
        let verified = match (challenge, self.auth_provider()) {
            (Some(challenge), Some(provider)) => {
                if get_str(&message.payload.data, "challenge_id")
                    .is_some_and(|id| id != challenge.challenge_id)
                {
                    false
                } else {
                    provider
                        .verify_response(&challenge, &response)
                        .await
                        .unwrap_or_else(|e| {
                            warn!(session_id = %session_id, error = %e, "Challenge verification failed");
                            false
                        })
                }
            }
            _ => false,
        };

        if verified {
            self.sessions
                .lock()
                .await
                .get_mut(&session_id)
                .map(|c| c.auth_token = Some(response.to_string()))?;
            let reply = match self.success_reply(message, &session_id) {
                Ok(reply) => reply,
                Err(e) => {
                    let reason = format!("failed to encode agent_info: {e}");
                    self.finish(&session_id, HandshakeState::Failed, Some(reason.clone()))
                        .await?;
                    return Some(self.failure_reply(message, &session_id, &reason));
                }
            };
            self.finish(&session_id, HandshakeState::Connected, None)
                .await?;
            Some(reply)
        } else {
            let reason = "authentication failed";
            self.finish(&session_id, HandshakeState::Failed, Some(reason.to_string()))
                .await?;
            Some(self.failure_reply(message, &session_id, reason))
        }
    }

    async fn on_success(&self, message: &A2AMessage) {
        let sender_id = message.sender_id();
        let Some(session_id) = session_id_of(message) else {
            warn!(sender_id = %sender_id, "Handshake success without session id");
            return;
        };
        if !self.owns(&session_id, sender_id).await {
            warn!(session_id = %session_id, sender_id = %sender_id, "Success for unknown session");
            return;
        }

        let remote = message
            .payload
            .data
            .get("agent_info")
            .cloned()
            .map(AgentInfo::from_value);
        match remote {
            Some(Ok(agent)) => {
                if let Some(context) = self.sessions.lock().await.get_mut(&session_id) {
                    context.remote_agent = Some(agent);
                }
                self.finish(&session_id, HandshakeState::Connected, None)
                    .await;
            }
            _ => {
                self.finish(
                    &session_id,
                    HandshakeState::Failed,
                    Some("success reply carries no valid agent_info".to_string()),
                )
                .await;
            }
        }
    }

    async fn on_failure(&self, message: &A2AMessage) {
        let sender_id = message.sender_id();
        let Some(session_id) = session_id_of(message) else {
            return;
        };
        if !self.owns(&session_id, sender_id).await {
            debug!(session_id = %session_id, "Failure for unknown session");
            return;
        }
        let reason = get_str(&message.payload.data, "error")
            .unwrap_or("rejected by peer")
            .to_string();
        self.finish(&session_id, HandshakeState::Failed, Some(reason))
            .await;
    }
}

fn session_id_of(message: &A2AMessage) -> Option<String> {
    get_str(&message.payload.data, SESSION_ID_KEY)
        .or_else(|| get_str(&message.payload.metadata, SESSION_ID_KEY))
        .map(str::to_string)
}

impl Drop for Inner {
    fn drop(&mut self) {
        let watchdogs = self
            .watchdogs
            .get_mut()
            .unwrap_or_else(|e| e.into_inner());
        for (_, handle) in watchdogs.drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(HandshakeState::Connected.is_terminal());
        assert!(HandshakeState::Timeout.is_terminal());
        assert!(!HandshakeState::ChallengeSent.is_terminal());
    }

    #[test]
    fn actions_roundtrip_wire_names() {
        for action in [
            HandshakeAction::Initiate,
            HandshakeAction::Challenge,
            HandshakeAction::ChallengeResponse,
            HandshakeAction::Success,
            HandshakeAction::Failure,
        ] {
            assert_eq!(HandshakeAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(HandshakeAction::parse("hello"), None);
    }

    #[tokio::test]
    async fn unknown_action_gets_failure_reply() {
        let manager = HandshakeManager::new(AgentInfo::new("b", "B"), HandshakeConfig::default());
        let mut msg = A2AMessage::new(MessageType::Handshake, "a");
        msg.payload.action = Some("bogus".to_string());
        let reply = manager.handle_handshake_message(&msg).await.unwrap();
        assert_eq!(reply.action(), Some("failure"));
        assert_eq!(reply.header.sender_id, "b");
    }
}
