//! Tests for the message envelope, agent info and error payloads.

mod common;

use std::collections::HashMap;

use a2a_protocol::builders::MessageBuilder;
use a2a_protocol::error::{ProtocolError, ValidationErrorKind, RATE_LIMITED};
use a2a_protocol::types::{
    A2AMessage, AgentInfo, AgentStatus, CapabilityInfo, ErrorDetails, MessageType, Priority,
};
use a2a_protocol::utils::now_timestamp;
use common::{message_params, test_agent};
use serde_json::json;

#[test]
fn message_survives_json_encoding() {
    let msg = MessageBuilder::new(MessageType::Request, "a1")
        .receiver("a2")
        .correlation_id("c-1")
        .priority(Priority::Urgent)
        .ttl_seconds(42)
        .trace_id("trace-9")
        .capability("echo")
        .action("run")
        .param("message", json!("hi"))
        .data("k", json!([1, 2, 3]))
        .metadata("session_id", json!("s-1"))
        .build();

    let decoded = A2AMessage::from_json(&msg.to_json().unwrap()).unwrap();
    assert_eq!(decoded, msg);

    let from_value = A2AMessage::from_value(msg.to_value().unwrap()).unwrap();
    assert_eq!(from_value, msg);
}

#[test]
fn wire_shape_uses_snake_case_and_integer_priority() {
    let msg = A2AMessage::new(MessageType::CapabilityDiscovery, "a1");
    let value = msg.to_value().unwrap();
    assert_eq!(value["header"]["message_type"], "capability_discovery");
    assert_eq!(value["header"]["priority"], 2);
    assert_eq!(value["header"]["version"], "1.0");
    assert!(value["header"]["timestamp"].is_f64());
    assert!(value["payload"]["parameters"].is_object());
}

#[test]
fn create_response_swaps_endpoints_and_correlates() {
    let request = A2AMessage::request("alice", "bob", "echo", message_params("hi"));
    let mut data = HashMap::new();
    data.insert("result".to_string(), json!("ok"));

    let response = request.create_response(data);

    assert_eq!(response.header.message_type, MessageType::Response);
    assert_eq!(response.header.sender_id, "bob");
    assert_eq!(response.header.receiver_id.as_deref(), Some("alice"));
    assert_eq!(
        response.header.correlation_id.as_deref(),
        Some(request.id())
    );
    assert_ne!(response.header.message_id, request.header.message_id);
    assert_eq!(response.capability(), Some("echo"));
    assert_eq!(response.header.priority, request.header.priority);
    assert!(response.payload.parameters.is_empty());
    assert_eq!(response.payload.data["result"], "ok");
}

#[test]
fn response_to_broadcast_has_empty_sender() {
    let broadcast = A2AMessage::notification("alice", HashMap::new());
    assert!(broadcast.is_broadcast());

    let response = broadcast.create_response(HashMap::new());
    assert_eq!(response.header.sender_id, "");
    assert_eq!(response.header.receiver_id.as_deref(), Some("alice"));
}

#[test]
fn expiry_is_measured_from_timestamp() {
    let mut msg = A2AMessage::new(MessageType::Notification, "a1");
    msg.header.ttl_seconds = 10;
    let created = msg.header.timestamp;

    assert!(!msg.header.is_expired_at(created + 10.0));
    assert!(msg.header.is_expired_at(created + 10.5));

    msg.header.timestamp = now_timestamp() - 60.0;
    assert!(msg.is_expired());
}

#[test]
fn error_response_carries_code_and_correlation() {
    let request = A2AMessage::request("alice", "bob", "echo", HashMap::new());
    let err = ProtocolError::RateLimit {
        sender_id: "alice".to_string(),
        limit: 5,
        window_seconds: 60,
    };

    let reply = request.create_error_response(err);
    assert_eq!(reply.message_type(), MessageType::Error);
    assert_eq!(reply.header.correlation_id.as_deref(), Some(request.id()));

    let details = reply.error_details().unwrap();
    assert_eq!(details.error_code, RATE_LIMITED);
    assert!(details.error_message.contains("alice"));
}

#[test]
fn error_details_only_decode_from_error_messages() {
    let msg = A2AMessage::notification("a1", ErrorDetails::new("X", "y", json!(null)).to_data());
    assert!(msg.error_details().is_none());
}

#[test]
fn validation_error_codes() {
    let expired = ProtocolError::validation(ValidationErrorKind::Expired, "old");
    assert_eq!(expired.code(), "MESSAGE_EXPIRED");
    assert!(expired.is_validation_error());

    let big = ProtocolError::validation(ValidationErrorKind::Oversized, "big");
    assert_eq!(big.code(), "MESSAGE_TOO_LARGE");

    let version = ProtocolError::ProtocolVersion {
        version: "9.9".to_string(),
        supported: vec!["1.0".to_string()],
    };
    assert_eq!(version.code(), "VERSION_MISMATCH");
    assert!(version.is_validation_error());

    assert_eq!(
        ProtocolError::capability_not_found("nope").code(),
        "CAPABILITY_NOT_FOUND"
    );
}

#[test]
fn agent_info_roundtrip_and_capability_search() {
    let mut agent = test_agent("parser-1");
    agent.status = AgentStatus::Maintenance;
    let mut parse = CapabilityInfo::new("parse", "Parse text");
    parse.tags.insert("nlp".to_string());
    let mut sum = CapabilityInfo::new("sum", "Add numbers");
    sum.tags.insert("math".to_string());
    agent.upsert_capability(parse);
    agent.upsert_capability(sum);

    let decoded = AgentInfo::from_value(agent.to_value().unwrap()).unwrap();
    assert_eq!(decoded, agent);
    assert_eq!(decoded.to_value().unwrap()["status"], "maintenance");

    let nlp = agent.find_capabilities(&["nlp".to_string()], &[]);
    assert_eq!(nlp.len(), 1);
    assert_eq!(nlp[0].name, "parse");

    let by_name = agent.find_capabilities(&[], &["sum".to_string()]);
    assert_eq!(by_name[0].name, "sum");

    assert_eq!(agent.find_capabilities(&[], &[]).len(), 2);
    assert!(agent
        .find_capabilities(&["nlp".to_string()], &["sum".to_string()])
        .is_empty());
}
