//! Message router — dispatches validated messages to handlers.
//!
//! Two dispatch paths:
//!
//! | Path | Keyed by | Invocation | Response |
//! |------|----------|------------|----------|
//! | type handlers | `header.message_type` | all, in registration order | first non-empty, optional |
//! | capability handlers | `payload.capability` (REQUEST only) | in order until one answers | `data = {"result": ...}` |
//!
//! A capability result of `null` or `{}` counts as no answer.
//!
//! Filters run before either path. A message failing any filter is dropped
//! silently: no handler runs and no error reaches the sender.
//!
//! Handler failures never escape [`MessageRouter::route_message`]; they are
//! logged and converted into an ERROR message correlated to the input.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::{ProtocolError, ProtocolResult};
use crate::types::{A2AMessage, MessageType, Priority};

/// Handles every message of a given type.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Process `message`, optionally producing a reply.
    async fn handle(&self, message: &A2AMessage) -> ProtocolResult<Option<A2AMessage>>;
}

/// Serves REQUEST messages for one capability.
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    /// Produce the result for `message`, or `None` to let the next handler try.
    ///
    /// `Some(Value::Null)` and `Some` of an empty object are treated as `None`.
    async fn handle(&self, message: &A2AMessage) -> ProtocolResult<Option<Value>>;
}

/// Closure adapter for [`MessageHandler`]; see [`message_handler_fn`].
pub struct FnMessageHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> MessageHandler for FnMessageHandler<F>
where
    F: Fn(A2AMessage) -> Fut + Send + Sync,
    Fut: Future<Output = ProtocolResult<Option<A2AMessage>>> + Send + 'static,
{
    async fn handle(&self, message: &A2AMessage) -> ProtocolResult<Option<A2AMessage>> {
        (self.f)(message.clone()).await
    }
}

/// Wrap an async closure taking the message as a [`MessageHandler`].
pub fn message_handler_fn<F, Fut>(f: F) -> Arc<dyn MessageHandler>
where
    F: Fn(A2AMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ProtocolResult<Option<A2AMessage>>> + Send + 'static,
{
    Arc::new(FnMessageHandler { f })
}

/// Closure adapter for [`CapabilityHandler`]; see [`capability_handler_fn`].
pub struct FnCapabilityHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> CapabilityHandler for FnCapabilityHandler<F>
where
    F: Fn(HashMap<String, Value>) -> Fut + Send + Sync,
    Fut: Future<Output = ProtocolResult<Option<Value>>> + Send + 'static,
{
    async fn handle(&self, message: &A2AMessage) -> ProtocolResult<Option<Value>> {
        (self.f)(message.payload.parameters.clone()).await
    }
}

/// Wrap an async closure taking the request parameters as a [`CapabilityHandler`].
///
/// ```rust,ignore
/// router.register_capability_handler(
///     "echo",
///     capability_handler_fn(|params| async move {
///         Ok(Some(serde_json::json!({ "echo": params["text"] })))
///     }),
/// );
/// ```
pub fn capability_handler_fn<F, Fut>(f: F) -> Arc<dyn CapabilityHandler>
where
    F: Fn(HashMap<String, Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ProtocolResult<Option<Value>>> + Send + 'static,
{
    Arc::new(FnCapabilityHandler { f })
}

/// Accept/reject predicate over message type, sender, capability and priority.
///
/// Unset dimensions are unconstrained. A message passes only if it satisfies
/// every constrained dimension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageFilter {
    /// Allowed message types.
    pub message_types: Option<HashSet<MessageType>>,
    /// Allowed sender ids.
    pub sender_ids: Option<HashSet<String>>,
    /// Allowed capabilities. Messages with no capability fail this dimension.
    pub capabilities: Option<HashSet<String>>,
    /// Minimum priority.
    pub min_priority: Option<Priority>,
}

impl MessageFilter {
    /// A filter that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to the given message types.
    pub fn with_message_types(mut self, types: impl IntoIterator<Item = MessageType>) -> Self {
        self.message_types = Some(types.into_iter().collect());
        self
    }

    /// Restrict to the given senders.
    pub fn with_sender_ids<S: Into<String>>(mut self, ids: impl IntoIterator<Item = S>) -> Self {
        self.sender_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict to the given capabilities.
    pub fn with_capabilities<S: Into<String>>(
        mut self,
        capabilities: impl IntoIterator<Item = S>,
    ) -> Self {
        self.capabilities = Some(capabilities.into_iter().map(Into::into).collect());
        self
    }

    /// Require at least `priority`.
    pub fn with_min_priority(mut self, priority: Priority) -> Self {
        self.min_priority = Some(priority);
        self
    }

    /// `true` if `message` satisfies every constrained dimension.
    pub fn matches(&self, message: &A2AMessage) -> bool {
        if let Some(ref types) = self.message_types {
            if !types.contains(&message.header.message_type) {
                return false;
            }
        }
        if let Some(ref senders) = self.sender_ids {
            if !senders.contains(&message.header.sender_id) {
                return false;
            }
        }
        if let Some(ref capabilities) = self.capabilities {
            match message.payload.capability {
                Some(ref capability) if capabilities.contains(capability) => {}
                _ => return false,
            }
        }
        if let Some(min) = self.min_priority {
            if message.header.priority < min {
                return false;
            }
        }
        true
    }
}

/// Dispatches messages to type handlers and capability handlers.
///
/// Registration takes `&self`; registries sit behind short-lived locks that
/// are never held across a handler invocation.
#[derive(Default)]
pub struct MessageRouter {
    handlers: RwLock<HashMap<MessageType, Vec<Arc<dyn MessageHandler>>>>,
    capability_handlers: RwLock<HashMap<String, Vec<Arc<dyn CapabilityHandler>>>>,
    filters: RwLock<Vec<MessageFilter>>,
}

impl MessageRouter {
    /// Create a router with no handlers or filters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler for `message_type`. All handlers of a type are invoked.
    pub fn register_handler(&self, message_type: MessageType, handler: Arc<dyn MessageHandler>) {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers.entry(message_type).or_default().push(handler);
        debug!(message_type = %message_type, "Registered message handler");
    }

    /// Append a handler for REQUESTs naming `capability`.
    pub fn register_capability_handler(
        &self,
        capability: impl Into<String>,
        handler: Arc<dyn CapabilityHandler>,
    ) {
        let capability = capability.into();
        let mut handlers = self
            .capability_handlers
            .write()
            .unwrap_or_else(|e| e.into_inner());
        debug!(capability = %capability, "Registered capability handler");
        handlers.entry(capability).or_default().push(handler);
    }

    /// Remove every handler registered for `capability`. Returns how many were removed.
    pub fn unregister_capability(&self, capability: &str) -> usize {
        let mut handlers = self
            .capability_handlers
            .write()
            .unwrap_or_else(|e| e.into_inner());
        handlers.remove(capability).map(|h| h.len()).unwrap_or(0)
    }

    /// Add a filter. Messages must pass every registered filter.
    pub fn add_filter(&self, filter: MessageFilter) {
        let mut filters = self.filters.write().unwrap_or_else(|e| e.into_inner());
        filters.push(filter);
    }

    /// Remove all filters.
    pub fn remove_filters(&self) {
        let mut filters = self.filters.write().unwrap_or_else(|e| e.into_inner());
        filters.clear();
    }

    /// Number of type handlers registered for `message_type`.
    pub fn handler_count(&self, message_type: MessageType) -> usize {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        handlers.get(&message_type).map(Vec::len).unwrap_or(0)
    }

    /// Number of handlers registered for `capability`.
    pub fn capability_handler_count(&self, capability: &str) -> usize {
        let handlers = self
            .capability_handlers
            .read()
            .unwrap_or_else(|e| e.into_inner());
        handlers.get(capability).map(Vec::len).unwrap_or(0)
    }

    /// `true` if `message` passes every registered filter.
    pub fn accepts(&self, message: &A2AMessage) -> bool {
        let filters = self.filters.read().unwrap_or_else(|e| e.into_inner());
        filters.iter().all(|f| f.matches(message))
    }

    /// Route a message and return at most one response.
    ///
    /// The capability path answers first; otherwise the first reply (or
    /// handler-error reply) from the type handlers is returned.
    pub async fn route_message(&self, message: &A2AMessage) -> Option<A2AMessage> {
        if !self.accepts(message) {
            debug!(
                message_id = %message.header.message_id,
                sender_id = %message.header.sender_id,
                "Message rejected by filter"
            );
            return None;
        }

        let type_handlers = {
            let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
            handlers
                .get(&message.header.message_type)
                .cloned()
                .unwrap_or_default()
        };

        let mut type_response = None;
        for handler in &type_handlers {
            match handler.handle(message).await {
                Ok(Some(reply)) => {
                    if type_response.is_none() {
                        type_response = Some(reply);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    error!(
                        message_id = %message.header.message_id,
                        message_type = %message.header.message_type,
                        error = %e,
                        "Message handler failed"
                    );
                    if type_response.is_none() {
                        type_response = Some(message.create_error_response(handler_error(e)));
                    }
                }
            }
        }

        if message.header.message_type == MessageType::Request {
            if let Some(capability) = message.capability().filter(|c| !c.is_empty()) {
                if let Some(response) = self.dispatch_capability(capability, message).await {
                    return Some(response);
                }
            }
        }

        if type_handlers.is_empty() && type_response.is_none() {
            debug!(message_type = %message.header.message_type, "No handler for message type");
        }
        type_response
    }

    async fn dispatch_capability(
        &self,
        capability: &str,
        message: &A2AMessage,
    ) -> Option<A2AMessage> {
        let handlers = {
            let all = self
                .capability_handlers
                .read()
                .unwrap_or_else(|e| e.into_inner());
            all.get(capability).cloned().unwrap_or_default()
        };

        if handlers.is_empty() {
            warn!(capability = %capability, "No handler registered for capability");
            return Some(
                message.create_error_response(ProtocolError::capability_not_found(capability)),
            );
        }

        let mut failure = None;
        for handler in handlers {
            match handler.handle(message).await {
                Ok(Some(result)) if !is_empty_result(&result) => {
                    let mut data = HashMap::new();
                    data.insert("result".to_string(), result);
                    return Some(message.create_response(data));
                }
                Ok(_) => {}
                Err(e) => {
                    error!(
                        message_id = %message.header.message_id,
                        capability = %capability,
                        error = %e,
                        "Capability handler failed"
                    );
                    if failure.is_none() {
                        failure = Some(message.create_error_response(handler_error(e)));
                    }
                }
            }
        }
        failure
    }
}

fn is_empty_result(result: &Value) -> bool {
    match result {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Handler errors keep their own code unless they are generic.
fn handler_error(err: ProtocolError) -> ProtocolError {
    match err {
        ProtocolError::Other(message) => ProtocolError::Handler { message },
        other => other,
    }
}
