//! Tests for structural message validation.

use a2a_protocol::config::ProtocolConfig;
use a2a_protocol::error::{ProtocolError, ValidationErrorKind};
use a2a_protocol::protocol::{validate_message, MessageValidator};
use a2a_protocol::types::{A2AMessage, MessageType};
use serde_json::json;

fn kind_of(err: ProtocolError) -> ValidationErrorKind {
    match err {
        ProtocolError::MessageValidation { kind, .. } => kind,
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn empty_message_id_is_rejected() {
    let mut msg = A2AMessage::new(MessageType::Heartbeat, "a1");
    msg.header.message_id.clear();
    let err = validate_message(&msg).unwrap_err();
    assert_eq!(kind_of(err), ValidationErrorKind::MissingField);
}

#[test]
fn empty_sender_is_rejected() {
    let msg = A2AMessage::new(MessageType::Heartbeat, "");
    let err = validate_message(&msg).unwrap_err();
    assert_eq!(err.code(), "MALFORMED_MESSAGE");
}

#[test]
fn unsupported_version_is_a_version_error() {
    let mut msg = A2AMessage::new(MessageType::Notification, "a1");
    msg.header.version = "0.9".to_string();
    let err = validate_message(&msg).unwrap_err();
    assert!(matches!(err, ProtocolError::ProtocolVersion { ref version, .. } if version == "0.9"));
}

#[test]
fn expired_message_is_rejected() {
    let mut msg = A2AMessage::new(MessageType::Notification, "a1");
    msg.header.ttl_seconds = 5;
    msg.header.timestamp -= 6.0;
    let err = validate_message(&msg).unwrap_err();
    assert_eq!(kind_of(err), ValidationErrorKind::Expired);
}

#[test]
fn zero_ttl_message_expires_immediately() {
    let mut msg = A2AMessage::new(MessageType::Notification, "a1");
    msg.header.ttl_seconds = 0;
    let validator = MessageValidator::default();
    assert!(validator
        .validate_at(&msg, msg.header.timestamp + 0.01)
        .is_err());
}

#[test]
fn oversized_message_is_rejected() {
    let validator = MessageValidator::new(["1.0"], 256);
    let mut msg = A2AMessage::new(MessageType::Notification, "a1");
    msg.payload
        .data
        .insert("blob".to_string(), json!("x".repeat(512)));
    let err = validator.validate(&msg).unwrap_err();
    assert_eq!(kind_of(err), ValidationErrorKind::Oversized);
    assert_eq!(validator.max_message_size(), 256);
}

#[test]
fn message_at_exact_size_limit_passes() {
    let msg = A2AMessage::new(MessageType::Notification, "a1");
    let size = msg.encoded_len().unwrap();
    let validator = MessageValidator::new(["1.0"], size);
    assert!(validator.validate(&msg).is_ok());

    let tighter = MessageValidator::new(["1.0"], size - 1);
    assert!(tighter.validate(&msg).is_err());
}

#[test]
fn validator_follows_config() {
    let mut config = ProtocolConfig::default();
    config.supported_versions = vec!["1.0".to_string(), "2.0".to_string()];
    let validator = MessageValidator::from_config(&config);
    assert!(validator.supports_version("2.0"));
    assert!(!validator.supports_version("3.0"));

    let mut msg = A2AMessage::new(MessageType::Notification, "a1");
    msg.header.version = "2.0".to_string();
    assert!(validator.validate(&msg).is_ok());
}
