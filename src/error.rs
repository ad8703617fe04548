//! Protocol error types and the error codes carried by ERROR messages.
//!
//! The taxonomy follows the lifecycle of a message:
//! - validation failures (malformed, expired, oversized, wrong version) are
//!   raised before routing and never reach a handler
//! - rate-limit and authorization failures are raised to the caller of
//!   `process_message` so backpressure stays visible
//! - handler failures are caught by the router and turned into ERROR messages
//! - handshake failures are reported to observers; only initiation problems
//!   (such as a transport that cannot deliver) surface as [`ProtocolError::Handshake`]

use std::fmt;

use crate::types::ErrorDetails;

// ---------------------------------------------------------------------------
// Error codes (payload `data.error_code` of ERROR messages)
// ---------------------------------------------------------------------------

/// The message is missing required fields or could not be decoded.
pub const MALFORMED_MESSAGE: &str = "MALFORMED_MESSAGE";

/// The message outlived its `ttl_seconds`.
pub const MESSAGE_EXPIRED: &str = "MESSAGE_EXPIRED";

/// The encoded message exceeds the size cap.
pub const MESSAGE_TOO_LARGE: &str = "MESSAGE_TOO_LARGE";

/// The header carries an unsupported protocol version.
pub const VERSION_MISMATCH: &str = "VERSION_MISMATCH";

/// The sender exceeded its admission quota.
pub const RATE_LIMITED: &str = "RATE_LIMITED";

/// A registered handler failed while processing the message.
pub const HANDLER_ERROR: &str = "HANDLER_ERROR";

/// A handshake could not be started or completed.
pub const HANDSHAKE_FAILED: &str = "HANDSHAKE_FAILED";

/// No handler is registered for the requested capability.
pub const CAPABILITY_NOT_FOUND: &str = "CAPABILITY_NOT_FOUND";

/// The capability requires a connected (handshaken) sender.
pub const UNAUTHORIZED: &str = "UNAUTHORIZED";

/// The transport failed to deliver the message.
pub const TRANSPORT_ERROR: &str = "TRANSPORT_ERROR";

/// Anything else.
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

/// Why a message failed structural validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorKind {
    /// A required header field is empty.
    MissingField,
    /// `now - timestamp > ttl_seconds`.
    Expired,
    /// The encoded message is larger than the configured cap.
    Oversized,
    /// The bytes could not be decoded into a message.
    Malformed,
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValidationErrorKind::MissingField => "missing field",
            ValidationErrorKind::Expired => "expired",
            ValidationErrorKind::Oversized => "oversized",
            ValidationErrorKind::Malformed => "malformed",
        };
        write!(f, "{}", s)
    }
}

/// Unified error type for the protocol layer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    /// The message failed structural validation.
    #[error("Message validation failed ({kind}): {message}")]
    MessageValidation {
        /// Which check failed.
        kind: ValidationErrorKind,
        /// Human-readable explanation.
        message: String,
    },

    /// The message (or a handshake peer) speaks an unsupported version.
    #[error("Unsupported protocol version {version:?} (supported: {supported:?})")]
    ProtocolVersion {
        /// The offending version string.
        version: String,
        /// Versions this agent accepts.
        supported: Vec<String>,
    },

    /// The sender exceeded its sliding-window quota.
    #[error("Rate limit exceeded for {sender_id}: {limit} requests per {window_seconds}s")]
    RateLimit {
        /// Sender whose quota is exhausted.
        sender_id: String,
        /// Admissions allowed per window.
        limit: u32,
        /// Window length in seconds.
        window_seconds: u64,
    },

    /// A handshake could not be initiated.
    #[error("Handshake error: {message}")]
    Handshake {
        /// Human-readable explanation.
        message: String,
    },

    /// A handler failed while processing a message.
    #[error("Handler error: {message}")]
    Handler {
        /// Human-readable explanation.
        message: String,
    },

    /// No handler serves the requested capability.
    #[error("Capability not found: {capability}")]
    CapabilityNotFound {
        /// Requested capability name.
        capability: String,
    },

    /// The capability requires a connected sender.
    #[error("Sender {sender_id} is not authorized to call {capability}")]
    Unauthorized {
        /// Sender that was refused.
        sender_id: String,
        /// Capability that requires authentication.
        capability: String,
    },

    /// Transport-level failure (connection refused, channel closed, ...).
    #[error("Transport error: {0}")]
    Transport(String),

    /// Encoding or decoding failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// An awaited operation did not finish in time.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Catch-all for errors that don't fit other categories.
    #[error("{0}")]
    Other(String),
}

/// Convenience result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

impl ProtocolError {
    /// Create a `MessageValidation` error.
    pub fn validation(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self::MessageValidation {
            kind,
            message: message.into(),
        }
    }

    /// Create a `Handshake` error.
    pub fn handshake(message: impl Into<String>) -> Self {
        Self::Handshake {
            message: message.into(),
        }
    }

    /// Create a `Handler` error.
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler {
            message: message.into(),
        }
    }

    /// Create a `CapabilityNotFound` error.
    pub fn capability_not_found(capability: impl Into<String>) -> Self {
        Self::CapabilityNotFound {
            capability: capability.into(),
        }
    }

    /// Returns the error code placed in ERROR message payloads.
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::MessageValidation { kind, .. } => match kind {
                ValidationErrorKind::Expired => MESSAGE_EXPIRED,
                ValidationErrorKind::Oversized => MESSAGE_TOO_LARGE,
                ValidationErrorKind::MissingField | ValidationErrorKind::Malformed => {
                    MALFORMED_MESSAGE
                }
            },
            ProtocolError::ProtocolVersion { .. } => VERSION_MISMATCH,
            ProtocolError::RateLimit { .. } => RATE_LIMITED,
            ProtocolError::Handshake { .. } => HANDSHAKE_FAILED,
            ProtocolError::Handler { .. } => HANDLER_ERROR,
            ProtocolError::CapabilityNotFound { .. } => CAPABILITY_NOT_FOUND,
            ProtocolError::Unauthorized { .. } => UNAUTHORIZED,
            ProtocolError::Transport(_) => TRANSPORT_ERROR,
            ProtocolError::Serialization(_) => MALFORMED_MESSAGE,
            ProtocolError::Config(_) | ProtocolError::Timeout(_) | ProtocolError::Other(_) => {
                INTERNAL_ERROR
            }
        }
    }

    /// Returns the default human-readable message for this error variant.
    pub fn default_message(&self) -> &str {
        match self {
            ProtocolError::MessageValidation { kind, .. } => match kind {
                ValidationErrorKind::Expired => "Message has expired",
                ValidationErrorKind::Oversized => "Message exceeds the maximum size",
                ValidationErrorKind::MissingField => "Message is missing required fields",
                ValidationErrorKind::Malformed => "Message could not be decoded",
            },
            ProtocolError::ProtocolVersion { .. } => "Unsupported protocol version",
            ProtocolError::RateLimit { .. } => "Rate limit exceeded",
            ProtocolError::Handshake { .. } => "Handshake failed",
            ProtocolError::Handler { .. } => "Handler failed",
            ProtocolError::CapabilityNotFound { .. } => "Capability not found",
            ProtocolError::Unauthorized { .. } => "Not authorized",
            ProtocolError::Transport(_) => "Transport error",
            ProtocolError::Serialization(_) => "Serialization error",
            ProtocolError::Config(_) => "Invalid configuration",
            ProtocolError::Timeout(_) => "Operation timed out",
            ProtocolError::Other(_) => "Error",
        }
    }

    /// `true` for errors raised by the validator (including version mismatches).
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            ProtocolError::MessageValidation { .. } | ProtocolError::ProtocolVersion { .. }
        )
    }

    /// `true` if the error is a rate-limit rejection.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProtocolError::RateLimit { .. })
    }

    /// Structured details attached to the ERROR payload, if any.
    fn details(&self) -> serde_json::Value {
        match self {
            ProtocolError::MessageValidation { kind, .. } => {
                serde_json::json!({ "reason": kind.to_string() })
            }
            ProtocolError::ProtocolVersion { version, supported } => {
                serde_json::json!({ "version": version, "supported_versions": supported })
            }
            ProtocolError::RateLimit {
                sender_id,
                limit,
                window_seconds,
            } => serde_json::json!({
                "sender_id": sender_id,
                "limit": limit,
                "window_seconds": window_seconds,
                "retry_after": window_seconds,
            }),
            ProtocolError::CapabilityNotFound { capability } => {
                serde_json::json!({ "capability": capability })
            }
            ProtocolError::Unauthorized {
                sender_id,
                capability,
            } => serde_json::json!({ "sender_id": sender_id, "capability": capability }),
            _ => serde_json::json!({}),
        }
    }
}

impl From<ProtocolError> for ErrorDetails {
    fn from(err: ProtocolError) -> Self {
        ErrorDetails::new(err.code(), err.to_string(), err.details())
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::Serialization(err.to_string())
    }
}
