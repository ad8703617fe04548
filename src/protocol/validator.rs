//! Message validator — the first gate for every inbound and outbound message.
//!
//! Validation is stateless and side-effect free. A message is rejected when:
//! - `message_id` or `sender_id` is empty
//! - `header.version` is not supported ([`ProtocolError::ProtocolVersion`])
//! - the message has expired
//! - its JSON encoding exceeds the size cap

use std::collections::HashSet;

use tracing::debug;

use crate::config::ProtocolConfig;
use crate::error::{ProtocolError, ProtocolResult, ValidationErrorKind};
use crate::types::A2AMessage;
use crate::utils::constants::{MAX_MESSAGE_SIZE, SUPPORTED_VERSIONS};
use crate::utils::message::now_timestamp;

/// Validate a message against the default rules (version "1.0", 1 MiB cap).
pub fn validate_message(message: &A2AMessage) -> ProtocolResult<()> {
    MessageValidator::default().validate(message)
}

/// Configurable message validator.
#[derive(Debug, Clone)]
pub struct MessageValidator {
    supported_versions: HashSet<String>,
    max_message_size: usize,
}

impl MessageValidator {
    /// Create a validator accepting `supported_versions` up to `max_message_size` bytes.
    pub fn new<I, S>(supported_versions: I, max_message_size: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            supported_versions: supported_versions.into_iter().map(Into::into).collect(),
            max_message_size,
        }
    }

    /// Create a validator from protocol configuration.
    pub fn from_config(config: &ProtocolConfig) -> Self {
        Self::new(config.supported_versions.iter().cloned(), config.max_message_size)
    }

    /// `true` if `version` is accepted.
    pub fn supports_version(&self, version: &str) -> bool {
        self.supported_versions.contains(version)
    }

    /// Size cap in bytes.
    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Validate using the current wall clock.
    pub fn validate(&self, message: &A2AMessage) -> ProtocolResult<()> {
        self.validate_at(message, now_timestamp())
    }

    /// Validate against an explicit clock reading.
    pub fn validate_at(&self, message: &A2AMessage, now: f64) -> ProtocolResult<()> {
        let header = &message.header;

        if header.message_id.trim().is_empty() {
            return Err(ProtocolError::validation(
                ValidationErrorKind::MissingField,
                "message_id is required",
            ));
        }

        if header.sender_id.trim().is_empty() {
            return Err(ProtocolError::validation(
                ValidationErrorKind::MissingField,
                "sender_id is required",
            ));
        }

        if !self.supports_version(&header.version) {
            let mut supported: Vec<String> = self.supported_versions.iter().cloned().collect();
            supported.sort();
            return Err(ProtocolError::ProtocolVersion {
                version: header.version.clone(),
                supported,
            });
        }

        if header.is_expired_at(now) {
            return Err(ProtocolError::validation(
                ValidationErrorKind::Expired,
                format!(
                    "message {} is {:.1}s old, ttl is {}s",
                    header.message_id,
                    now - header.timestamp,
                    header.ttl_seconds
                ),
            ));
        }

        let size = message.encoded_len()?;
        if size > self.max_message_size {
            return Err(ProtocolError::validation(
                ValidationErrorKind::Oversized,
                format!(
                    "message is {} bytes, maximum is {}",
                    size, self.max_message_size
                ),
            ));
        }

        debug!(message_id = %header.message_id, size, "Message validated");
        Ok(())
    }
}

impl Default for MessageValidator {
    fn default() -> Self {
        Self::new(SUPPORTED_VERSIONS.iter().copied(), MAX_MESSAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageType;

    #[test]
    fn fresh_message_passes() {
        let msg = A2AMessage::new(MessageType::Notification, "agent-a");
        assert!(validate_message(&msg).is_ok());
    }

    #[test]
    fn whitespace_sender_is_missing() {
        let mut msg = A2AMessage::new(MessageType::Notification, "agent-a");
        msg.header.sender_id = "  ".to_string();
        let err = validate_message(&msg).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MessageValidation {
                kind: ValidationErrorKind::MissingField,
                ..
            }
        ));
    }

    #[test]
    fn expiry_uses_explicit_clock() {
        let msg = A2AMessage::new(MessageType::Notification, "agent-a");
        let validator = MessageValidator::default();
        let ttl = msg.header.ttl_seconds as f64;
        assert!(validator.validate_at(&msg, msg.header.timestamp + ttl).is_ok());
        assert!(validator
            .validate_at(&msg, msg.header.timestamp + ttl + 0.001)
            .is_err());
    }

    #[test]
    fn custom_versions() {
        let validator = MessageValidator::new(["1.0", "1.1"], 4096);
        let mut msg = A2AMessage::new(MessageType::Notification, "agent-a");
        msg.header.version = "1.1".to_string();
        assert!(validator.validate(&msg).is_ok());
        msg.header.version = "2.0".to_string();
        match validator.validate(&msg).unwrap_err() {
            ProtocolError::ProtocolVersion { version, supported } => {
                assert_eq!(version, "2.0");
                assert_eq!(supported, vec!["1.0", "1.1"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
