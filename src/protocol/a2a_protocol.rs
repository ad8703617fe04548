//! The protocol facade — one instance per local agent.
//!
//! Inbound: [`A2AProtocol::process_message`] runs validate → rate-limit →
//! capability policy → route. [`A2AProtocol::handle_incoming`] does the same
//! but turns rejections into ERROR messages for the sender, which is what a
//! transport adapter usually wants.
//!
//! Outbound: [`A2AProtocol::send_message`] validates, records REQUESTs in
//! `pending_requests` and hands the message to a [`MessageTransport`].
//! [`A2AProtocol::send_request`] additionally returns a [`PendingResponse`]
//! that resolves when the correlated RESPONSE or ERROR is processed.
//!
//! # Example
//!
//! ```rust,ignore
//! use a2a_protocol::prelude::*;
//!
//! let protocol = A2AProtocol::new(AgentInfo::new("agent-1", "Echo"), ProtocolConfig::default());
//! protocol.register_capability(
//!     CapabilityInfo::new("echo", "Echo text back"),
//!     capability_handler_fn(|params| async move {
//!         Ok(Some(serde_json::json!({ "echo": params.get("text") })))
//!     }),
//! );
//! let response = protocol.process_message(&request).await?;
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::ProtocolConfig;
use crate::error::{ProtocolError, ProtocolResult};
use crate::types::{A2AMessage, AgentInfo, AgentStatus, CapabilityInfo, MessageType};
use crate::utils::message::now_timestamp;

use super::auth::AuthenticationProvider;
use super::handlers::{
    AgentState, ConnectionTracker, DeregistrationHandler, DiscoveryHandler, ErrorHandler,
    HandshakeHandler, HeartbeatHandler, PendingRequest, RegistrationHandler, ResponseHandler,
};
use super::handshake::{HandshakeManager, HandshakeObserver};
use super::rate_limiter::RateLimiter;
use super::router::{CapabilityHandler, MessageFilter, MessageHandler, MessageRouter};
use super::transport::MessageTransport;
use super::validator::MessageValidator;

#[derive(Debug, Default)]
struct Counters {
    processed: AtomicU64,
    sent: AtomicU64,
    rejected: AtomicU64,
    rate_limited: AtomicU64,
    heartbeats: AtomicU64,
}

/// Point-in-time counters for one protocol instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtocolStats {
    /// Inbound messages that reached the router.
    pub messages_processed: u64,
    /// Outbound messages accepted by a transport.
    pub messages_sent: u64,
    /// Inbound messages rejected before routing.
    pub messages_rejected: u64,
    /// Subset of `messages_rejected` refused by rate limiting.
    pub rate_limited: u64,
    /// Heartbeats emitted by the background task.
    pub heartbeats_sent: u64,
    /// Size of `connected_agents`.
    pub connected_agents: usize,
    /// Size of `pending_requests`.
    pub pending_requests: usize,
    /// Handshake sessions in flight.
    pub active_sessions: usize,
    /// Seconds since the instance was created.
    pub uptime_seconds: f64,
}

/// Resolves when the RESPONSE (or ERROR) correlated to a sent REQUEST arrives.
///
/// There is no built-in deadline; use [`wait_timeout`](Self::wait_timeout).
#[derive(Debug)]
pub struct PendingResponse {
    message_id: String,
    rx: oneshot::Receiver<A2AMessage>,
}

impl PendingResponse {
    /// Id of the request being answered.
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Wait for the reply.
    ///
    /// Fails if the request is cancelled or the protocol shuts down first.
    pub async fn wait(self) -> ProtocolResult<A2AMessage> {
        self.rx.await.map_err(|_| {
            ProtocolError::Other(format!(
                "request {} was cancelled before a response arrived",
                self.message_id
            ))
        })
    }

    /// Wait for the reply for at most `timeout`.
    ///
    /// On timeout the request stays pending; call
    /// [`A2AProtocol::cancel_request`] to forget it.
    pub async fn wait_timeout(self, timeout: Duration) -> ProtocolResult<A2AMessage> {
        let message_id = self.message_id.clone();
        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(result) => result,
            Err(_) => Err(ProtocolError::Timeout(format!(
                "no response to request {message_id} within {timeout:?}"
            ))),
        }
    }
}

struct HeartbeatTask {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Composes validator, rate limiter, router and handshake manager for one agent.
pub struct A2AProtocol {
    state: Arc<AgentState>,
    config: ProtocolConfig,
    validator: MessageValidator,
    rate_limiter: Arc<RateLimiter>,
    router: MessageRouter,
    handshake: HandshakeManager,
    counters: Arc<Counters>,
    started: Instant,
    heartbeat: Mutex<Option<HeartbeatTask>>,
}

impl std::fmt::Debug for A2AProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("A2AProtocol")
            .field("agent_id", &self.agent_id())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl A2AProtocol {
    /// Create a protocol instance for `agent_info` with the built-in handlers registered.
    pub fn new(agent_info: AgentInfo, config: ProtocolConfig) -> Self {
        let state = Arc::new(AgentState::new(agent_info));
        let handshake =
            HandshakeManager::with_shared_agent(state.agent_info.clone(), config.handshake.clone());
        handshake.add_observer(Arc::new(ConnectionTracker {
            state: state.clone(),
        }));

        let router = MessageRouter::new();
        router.register_handler(
            MessageType::Handshake,
            Arc::new(HandshakeHandler {
                handshake: handshake.clone(),
            }),
        );
        router.register_handler(
            MessageType::Heartbeat,
            Arc::new(HeartbeatHandler {
                state: state.clone(),
            }),
        );
        router.register_handler(
            MessageType::CapabilityDiscovery,
            Arc::new(DiscoveryHandler {
                state: state.clone(),
            }),
        );
        router.register_handler(
            MessageType::Registration,
            Arc::new(RegistrationHandler {
                state: state.clone(),
            }),
        );
        router.register_handler(
            MessageType::Deregistration,
            Arc::new(DeregistrationHandler {
                state: state.clone(),
            }),
        );
        router.register_handler(
            MessageType::Response,
            Arc::new(ResponseHandler {
                state: state.clone(),
            }),
        );
        router.register_handler(
            MessageType::Error,
            Arc::new(ErrorHandler {
                state: state.clone(),
            }),
        );

        Self {
            validator: MessageValidator::from_config(&config),
            rate_limiter: Arc::new(RateLimiter::new(config.rate_limit.clone())),
            state,
            config,
            router,
            handshake,
            counters: Arc::new(Counters::default()),
            started: Instant::now(),
            heartbeat: Mutex::new(None),
        }
    }

    /// Start building a protocol instance.
    pub fn builder(agent_info: AgentInfo) -> ProtocolBuilder {
        ProtocolBuilder::new(agent_info)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Snapshot of the local agent.
    pub fn agent_info(&self) -> AgentInfo {
        self.state.agent()
    }

    /// Local agent id.
    pub fn agent_id(&self) -> String {
        self.state.agent_id()
    }

    /// Active configuration.
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// The router, for custom handlers and filters.
    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    /// The handshake manager.
    pub fn handshake(&self) -> &HandshakeManager {
        &self.handshake
    }

    /// The inbound rate limiter.
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Update the status advertised in this agent's info.
    pub fn set_status(&self, status: AgentStatus) {
        self.state.update_agent(|agent| agent.status = status);
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Advertise `info` and serve it with `handler`.
    ///
    /// Re-registering a name replaces the advertised info; the handler is
    /// appended after any existing ones.
    pub fn register_capability(&self, info: CapabilityInfo, handler: Arc<dyn CapabilityHandler>) {
        let name = info.name.clone();
        self.state.update_agent(|agent| agent.upsert_capability(info));
        self.router.register_capability_handler(name.clone(), handler);
        info!(capability = %name, "Capability registered");
    }

    /// Stop advertising and serving `name`. Returns `true` if it was advertised.
    pub fn unregister_capability(&self, name: &str) -> bool {
        let mut removed = false;
        self.state
            .update_agent(|agent| removed = agent.remove_capability(name).is_some());
        self.router.unregister_capability(name);
        removed
    }

    /// Add a type handler; see [`MessageRouter::register_handler`].
    pub fn register_handler(&self, message_type: MessageType, handler: Arc<dyn MessageHandler>) {
        self.router.register_handler(message_type, handler);
    }

    /// Add a capability handler without advertising the capability.
    pub fn register_capability_handler(
        &self,
        capability: impl Into<String>,
        handler: Arc<dyn CapabilityHandler>,
    ) {
        self.router.register_capability_handler(capability, handler);
    }

    /// Add an inbound filter; see [`MessageRouter::add_filter`].
    pub fn add_filter(&self, filter: MessageFilter) {
        self.router.add_filter(filter);
    }

    /// Install the handshake challenge-response scheme.
    pub fn set_auth_provider(&self, provider: Arc<dyn AuthenticationProvider>) {
        self.handshake.set_auth_provider(provider);
    }

    /// Observe handshake outcomes.
    pub fn add_handshake_observer(&self, observer: Arc<dyn HandshakeObserver>) {
        self.handshake.add_observer(observer);
    }

    // -----------------------------------------------------------------------
    // Message construction
    // -----------------------------------------------------------------------

    /// A REQUEST from this agent for `capability` on `receiver_id`.
    pub fn create_request(
        &self,
        receiver_id: impl Into<String>,
        capability: impl Into<String>,
        parameters: HashMap<String, Value>,
    ) -> A2AMessage {
        let mut message = A2AMessage::request(self.agent_id(), receiver_id, capability, parameters);
        message.header.ttl_seconds = self.config.default_ttl_seconds;
        message
    }

    /// A message of `message_type` from this agent, addressed to `receiver_id`
    /// or broadcast when `None`.
    pub fn create_message(
        &self,
        message_type: MessageType,
        receiver_id: Option<String>,
    ) -> A2AMessage {
        let mut message = A2AMessage::new(message_type, self.agent_id());
        message.header.receiver_id = receiver_id;
        message.header.ttl_seconds = self.config.default_ttl_seconds;
        message
    }

    /// A REGISTRATION carrying this agent's info.
    pub fn create_registration(&self, receiver_id: Option<String>) -> ProtocolResult<A2AMessage> {
        let mut message = self.create_message(MessageType::Registration, receiver_id);
        message
            .payload
            .data
            .insert("agent_info".to_string(), self.agent_info().to_value()?);
        Ok(message)
    }

    /// A broadcast HEARTBEAT carrying liveness metrics.
    pub async fn create_heartbeat(&self) -> A2AMessage {
        build_heartbeat(
            &self.state,
            &self.counters,
            self.started,
            self.config.default_ttl_seconds,
        )
        .await
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Validate, admit and route one inbound message.
    ///
    /// Validation, version, rate-limit and authorization failures are
    /// returned as errors and never reach a handler. Handler failures come
    /// back as `Ok(Some(error_message))`.
    pub async fn process_message(&self, message: &A2AMessage) -> ProtocolResult<Option<A2AMessage>> {
        if let Err(e) = self.admit(message).await {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            if e.is_rate_limited() {
                self.counters.rate_limited.fetch_add(1, Ordering::Relaxed);
            }
            warn!(
                message_id = %message.header.message_id,
                sender_id = %message.header.sender_id,
                error_code = e.code(),
                error = %e,
                "Message rejected"
            );
            return Err(e);
        }

        self.counters.processed.fetch_add(1, Ordering::Relaxed);
        debug!(
            message_id = %message.header.message_id,
            message_type = %message.header.message_type,
            sender_id = %message.header.sender_id,
            "Routing message"
        );

        let response = self.router.route_message(message).await;
        Ok(response.map(|r| self.state.stamp(r)))
    }

    /// Like [`process_message`](Self::process_message) but reports rejections
    /// to the sender as an ERROR message instead of returning them.
    pub async fn handle_incoming(&self, message: &A2AMessage) -> Option<A2AMessage> {
        match self.process_message(message).await {
            Ok(response) => response,
            Err(e) => {
                let mut reply = message.create_error_response(e);
                reply.header.sender_id = self.agent_id();
                Some(reply)
            }
        }
    }

    async fn admit(&self, message: &A2AMessage) -> ProtocolResult<()> {
        self.validator.validate(message)?;
        let sender_id = message.sender_id();
        self.rate_limiter.acquire(sender_id).await?;

        if message.header.message_type != MessageType::Request {
            return Ok(());
        }
        let Some(capability) = message.capability() else {
            return Ok(());
        };
        let Some(info) = self.state.agent().capability(capability).cloned() else {
            return Ok(());
        };

        if let Some(limit) = info.rate_limit {
            let key = format!("{sender_id}:{capability}");
            if !self.rate_limiter.check_with_limit(&key, limit).await {
                return Err(ProtocolError::RateLimit {
                    sender_id: sender_id.to_string(),
                    limit,
                    window_seconds: self.config.rate_limit.window_seconds,
                });
            }
        }

        if !info.auth_required {
            return Ok(());
        }
        // With authentication on, registration alone does not unlock a capability.
        let admitted = if self.config.handshake.require_auth {
            self.is_authenticated(sender_id).await
        } else {
            self.is_connected(sender_id).await
        };
        if !admitted {
            return Err(ProtocolError::Unauthorized {
                sender_id: sender_id.to_string(),
                capability: capability.to_string(),
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    /// Validate and deliver `message`. REQUESTs are recorded as pending until
    /// their RESPONSE is processed.
    pub async fn send_message(
        &self,
        message: &A2AMessage,
        transport: &dyn MessageTransport,
    ) -> ProtocolResult<()> {
        self.dispatch(message, transport, None).await
    }

    /// Send a REQUEST and get a handle on its eventual response.
    pub async fn send_request(
        &self,
        message: &A2AMessage,
        transport: &dyn MessageTransport,
    ) -> ProtocolResult<PendingResponse> {
        if message.header.message_type != MessageType::Request {
            return Err(ProtocolError::Other(format!(
                "send_request expects a request, got {}",
                message.header.message_type
            )));
        }
        let (tx, rx) = oneshot::channel();
        self.dispatch(message, transport, Some(tx)).await?;
        Ok(PendingResponse {
            message_id: message.header.message_id.clone(),
            rx,
        })
    }

    async fn dispatch(
        &self,
        message: &A2AMessage,
        transport: &dyn MessageTransport,
        responder: Option<oneshot::Sender<A2AMessage>>,
    ) -> ProtocolResult<()> {
        self.validator.validate(message)?;

        let message_id = message.header.message_id.clone();
        let is_request = message.header.message_type == MessageType::Request;
        if is_request {
            self.state.pending_requests.lock().await.insert(
                message_id.clone(),
                PendingRequest {
                    receiver_id: message.header.receiver_id.clone(),
                    capability: message.payload.capability.clone(),
                    sent_at: now_timestamp(),
                    responder,
                },
            );
        }

        match transport.send(message).await {
            Ok(()) => {
                self.counters.sent.fetch_add(1, Ordering::Relaxed);
                debug!(
                    message_id = %message_id,
                    message_type = %message.header.message_type,
                    receiver_id = ?message.header.receiver_id,
                    "Message sent"
                );
                Ok(())
            }
            Err(e) => {
                if is_request {
                    self.state.pending_requests.lock().await.remove(&message_id);
                }
                error!(message_id = %message_id, error = %e, "Failed to send message");
                Err(e)
            }
        }
    }

    /// Forget a pending request. Its [`PendingResponse`] fails. Returns `true`
    /// if the request was pending.
    pub async fn cancel_request(&self, message_id: &str) -> bool {
        self.state
            .pending_requests
            .lock()
            .await
            .remove(message_id)
            .is_some()
    }

    /// Number of unanswered REQUESTs.
    pub async fn pending_count(&self) -> usize {
        self.state.pending_requests.lock().await.len()
    }

    /// Ids of unanswered REQUESTs.
    pub async fn pending_request_ids(&self) -> Vec<String> {
        self.state
            .pending_requests
            .lock()
            .await
            .keys()
            .cloned()
            .collect()
    }

    /// Ids of REQUESTs sent more than `age` ago and still unanswered.
    pub async fn stale_requests(&self, age: Duration) -> Vec<String> {
        let cutoff = now_timestamp() - age.as_secs_f64();
        self.state
            .pending_requests
            .lock()
            .await
            .iter()
            .filter(|(_, p)| p.sent_at < cutoff)
            .map(|(id, _)| id.clone())
            .collect()
    }

    // -----------------------------------------------------------------------
    // Peers
    // -----------------------------------------------------------------------

    /// Start a handshake with `remote_agent_id`; see
    /// [`HandshakeManager::initiate_handshake`].
    pub async fn initiate_handshake(
        &self,
        remote_agent_id: &str,
        transport: &dyn MessageTransport,
    ) -> ProtocolResult<String> {
        self.handshake
            .initiate_handshake(remote_agent_id, transport)
            .await
    }

    /// Snapshot of the peers this agent knows, keyed by agent id.
    pub async fn connected_agents(&self) -> HashMap<String, AgentInfo> {
        self.state.connected_agents.lock().await.clone()
    }

    /// Info for one connected peer.
    pub async fn connected_agent(&self, agent_id: &str) -> Option<AgentInfo> {
        self.state
            .connected_agents
            .lock()
            .await
            .get(agent_id)
            .cloned()
    }

    /// `true` if `agent_id` completed a handshake or registered.
    pub async fn is_connected(&self, agent_id: &str) -> bool {
        self.state
            .connected_agents
            .lock()
            .await
            .contains_key(agent_id)
    }

    /// `true` if `agent_id` answered a challenge this agent issued.
    ///
    /// With `handshake.require_auth` set, only such peers may call
    /// capabilities marked `auth_required`.
    pub async fn is_authenticated(&self, agent_id: &str) -> bool {
        self.state.authenticated.lock().await.contains(agent_id)
    }

    /// Forget a peer. Returns `true` if it was known.
    pub async fn disconnect_agent(&self, agent_id: &str) -> bool {
        self.state.forget(agent_id).await
    }

    // -----------------------------------------------------------------------
    // Heartbeat
    // -----------------------------------------------------------------------

    /// Start the background heartbeat.
    ///
    /// Every `heartbeat_interval_seconds` the task builds a HEARTBEAT, hands
    /// it to `transport` when one is given, and sweeps expired handshake
    /// sessions and idle rate-limit windows. Returns `false` if a heartbeat
    /// is already running.
    pub async fn start_heartbeat(&self, transport: Option<Arc<dyn MessageTransport>>) -> bool {
        let mut slot = self.heartbeat.lock().await;
        if slot.is_some() {
            debug!("Heartbeat already running");
            return false;
        }

        let (shutdown, mut shutdown_rx) = oneshot::channel::<()>();
        let state = self.state.clone();
        let counters = self.counters.clone();
        let handshake = self.handshake.clone();
        let rate_limiter = self.rate_limiter.clone();
        let started = self.started;
        let ttl = self.config.default_ttl_seconds;
        let period = self.config.heartbeat_interval();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        let beat = build_heartbeat(&state, &counters, started, ttl).await;
                        if let Some(ref transport) = transport {
                            match transport.send(&beat).await {
                                Ok(()) => {
                                    counters.heartbeats.fetch_add(1, Ordering::Relaxed);
                                    counters.sent.fetch_add(1, Ordering::Relaxed);
                                }
                                Err(e) => warn!(error = %e, "Failed to send heartbeat"),
                            }
                        } else {
                            counters.heartbeats.fetch_add(1, Ordering::Relaxed);
                        }
                        handshake.cleanup_expired_sessions().await;
                        rate_limiter.sweep().await;
                    }
                }
            }
            debug!("Heartbeat task stopped");
        });

        *slot = Some(HeartbeatTask { shutdown, handle });
        info!(interval_seconds = period.as_secs(), "Heartbeat started");
        true
    }

    /// Stop the heartbeat and wait for the task to finish. Returns `false`
    /// if none was running.
    pub async fn stop_heartbeat(&self) -> bool {
        let task = self.heartbeat.lock().await.take();
        let Some(task) = task else {
            return false;
        };
        // A send error means the task already exited.
        let _ = task.shutdown.send(());
        if let Err(e) = task.handle.await {
            if e.is_panic() {
                error!(error = %e, "Heartbeat task panicked");
            }
        }
        info!("Heartbeat stopped");
        true
    }

    /// `true` while the heartbeat task is running.
    pub async fn is_heartbeat_running(&self) -> bool {
        self.heartbeat
            .lock()
            .await
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Current counters.
    pub async fn stats(&self) -> ProtocolStats {
        ProtocolStats {
            messages_processed: self.counters.processed.load(Ordering::Relaxed),
            messages_sent: self.counters.sent.load(Ordering::Relaxed),
            messages_rejected: self.counters.rejected.load(Ordering::Relaxed),
            rate_limited: self.counters.rate_limited.load(Ordering::Relaxed),
            heartbeats_sent: self.counters.heartbeats.load(Ordering::Relaxed),
            connected_agents: self.state.connected_agents.lock().await.len(),
            pending_requests: self.state.pending_requests.lock().await.len(),
            active_sessions: self.handshake.session_count().await,
            uptime_seconds: self.started.elapsed().as_secs_f64(),
        }
    }

    /// Stop background work and drop all per-instance state.
    ///
    /// Outstanding [`PendingResponse`]s fail; the agent is marked offline.
    pub async fn shutdown(&self) {
        self.stop_heartbeat().await;
        self.handshake.shutdown().await;
        let dropped = {
            let mut pending = self.state.pending_requests.lock().await;
            let n = pending.len();
            pending.clear();
            n
        };
        self.state.connected_agents.lock().await.clear();
        self.state.authenticated.lock().await.clear();
        self.set_status(AgentStatus::Offline);
        info!(agent_id = %self.agent_id(), dropped_requests = dropped, "Protocol shut down");
    }
}

async fn build_heartbeat(
    state: &AgentState,
    counters: &Counters,
    started: Instant,
    ttl_seconds: u64,
) -> A2AMessage {
    let agent = state.agent();
    let connected = state.connected_agents.lock().await.len();
    let pending = state.pending_requests.lock().await.len();

    let mut message = A2AMessage::new(MessageType::Heartbeat, agent.agent_id);
    message.header.ttl_seconds = ttl_seconds;
    let data = &mut message.payload.data;
    data.insert("status".to_string(), json!(agent.status));
    data.insert(
        "uptime_seconds".to_string(),
        json!(started.elapsed().as_secs_f64()),
    );
    data.insert(
        "messages_processed".to_string(),
        json!(counters.processed.load(Ordering::Relaxed)),
    );
    data.insert("connected_agents".to_string(), json!(connected));
    data.insert("pending_requests".to_string(), json!(pending));
    message
}

/// Builder for [`A2AProtocol`].
///
/// ```rust,ignore
/// let protocol = ProtocolBuilder::new(agent)
///     .config(ProtocolConfig::from_env())
///     .auth_provider(Arc::new(SimpleTokenAuthProvider::new("secret")))
///     .build()?;
/// ```
pub struct ProtocolBuilder {
    agent_info: AgentInfo,
    config: ProtocolConfig,
    auth_provider: Option<Arc<dyn AuthenticationProvider>>,
    observers: Vec<Arc<dyn HandshakeObserver>>,
    capabilities: Vec<(CapabilityInfo, Arc<dyn CapabilityHandler>)>,
    filters: Vec<MessageFilter>,
}

impl ProtocolBuilder {
    /// Start from `agent_info` and the default configuration.
    pub fn new(agent_info: AgentInfo) -> Self {
        Self {
            agent_info,
            config: ProtocolConfig::default(),
            auth_provider: None,
            observers: Vec::new(),
            capabilities: Vec::new(),
            filters: Vec::new(),
        }
    }

    /// Use `config`.
    pub fn config(mut self, config: ProtocolConfig) -> Self {
        self.config = config;
        self
    }

    /// Install a handshake auth provider.
    pub fn auth_provider(mut self, provider: Arc<dyn AuthenticationProvider>) -> Self {
        self.auth_provider = Some(provider);
        self
    }

    /// Require challenge-response authentication from handshake initiators.
    pub fn require_auth(mut self, require: bool) -> Self {
        self.config.handshake.require_auth = require;
        self
    }

    /// Add a handshake observer.
    pub fn observer(mut self, observer: Arc<dyn HandshakeObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Advertise and serve a capability.
    pub fn capability(mut self, info: CapabilityInfo, handler: Arc<dyn CapabilityHandler>) -> Self {
        self.capabilities.push((info, handler));
        self
    }

    /// Add an inbound filter.
    pub fn filter(mut self, filter: MessageFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Validate the configuration and build.
    pub fn build(self) -> ProtocolResult<A2AProtocol> {
        self.config.validate()?;
        if self.agent_info.agent_id.trim().is_empty() {
            return Err(ProtocolError::Config("agent_id must not be empty".to_string()));
        }

        let protocol = A2AProtocol::new(self.agent_info, self.config);
        if let Some(provider) = self.auth_provider {
            protocol.set_auth_provider(provider);
        }
        for observer in self.observers {
            protocol.add_handshake_observer(observer);
        }
        for (info, handler) in self.capabilities {
            protocol.register_capability(info, handler);
        }
        for filter in self.filters {
            protocol.add_filter(filter);
        }
        Ok(protocol)
    }
}
