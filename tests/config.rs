//! Tests for loading configuration from files and the environment.

use std::io::Write;

use a2a_protocol::config::ProtocolConfig;
use a2a_protocol::error::ProtocolError;

#[test]
fn loads_partial_file_over_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
heartbeat_interval_seconds = 10

[rate_limit]
requests_per_minute = 120
burst_size = 5

[handshake]
require_auth = true
timeout_seconds = 5
"#
    )
    .unwrap();

    let config = ProtocolConfig::from_file(file.path()).unwrap();
    assert_eq!(config.heartbeat_interval_seconds, 10);
    assert_eq!(config.rate_limit.requests_per_minute, 120);
    assert_eq!(config.rate_limit.burst_size, Some(5));
    assert_eq!(config.rate_limit.window_seconds, 60);
    assert!(config.handshake.require_auth);
    assert_eq!(config.handshake.timeout_seconds, 5);
    assert_eq!(config.handshake.max_retries, 3);
    assert_eq!(config.supported_versions, vec!["1.0"]);
}

#[test]
fn missing_file_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ProtocolConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ProtocolError::Config(ref msg) if msg.contains("read")));
}

#[test]
fn invalid_values_are_rejected() {
    let err = ProtocolConfig::from_toml_str("[rate_limit]\nwindow_seconds = 0\n").unwrap_err();
    assert!(matches!(err, ProtocolError::Config(ref msg) if msg.contains("window_seconds")));

    let err = ProtocolConfig::from_toml_str("supported_versions = []\n").unwrap_err();
    assert!(matches!(err, ProtocolError::Config(_)));

    let err = ProtocolConfig::from_toml_str("max_message_size = \"big\"\n").unwrap_err();
    assert!(matches!(err, ProtocolError::Config(ref msg) if msg.contains("parse")));
}

#[test]
fn disabled_limiter_may_have_zero_quota() {
    let config =
        ProtocolConfig::from_toml_str("[rate_limit]\nenabled = false\nrequests_per_minute = 0\n")
            .unwrap();
    assert!(!config.rate_limit.enabled);
}

// The only test in this binary touching the environment.
#[test]
fn environment_overrides_defaults() {
    std::env::set_var("A2A_RATE_LIMIT_REQUESTS_PER_MINUTE", "7");
    std::env::set_var("A2A_HANDSHAKE_REQUIRE_AUTH", "true");
    std::env::set_var("A2A_SUPPORTED_VERSIONS", "1.0, 1.1");
    std::env::set_var("A2A_HEARTBEAT_INTERVAL_SECONDS", "not-a-number");

    let config = ProtocolConfig::from_env();

    std::env::remove_var("A2A_RATE_LIMIT_REQUESTS_PER_MINUTE");
    std::env::remove_var("A2A_HANDSHAKE_REQUIRE_AUTH");
    std::env::remove_var("A2A_SUPPORTED_VERSIONS");
    std::env::remove_var("A2A_HEARTBEAT_INTERVAL_SECONDS");

    assert_eq!(config.rate_limit.requests_per_minute, 7);
    assert!(config.handshake.require_auth);
    assert_eq!(config.supported_versions, vec!["1.0", "1.1"]);
    assert_eq!(config.handshake.supported_versions, vec!["1.0", "1.1"]);
    assert_eq!(config.heartbeat_interval_seconds, 30);
    assert!(config.validate().is_ok());
}
