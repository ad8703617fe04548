//! Protocol configuration.
//!
//! Supports configuration from:
//! - TOML documents and files
//! - `A2A_*` environment variables
//! - code, via `Default` plus field assignment
//!
//! Every section has serde defaults, so a partial TOML file only needs the
//! values it changes:
//!
//! ```toml
//! heartbeat_interval_seconds = 10
//!
//! [rate_limit]
//! requests_per_minute = 120
//!
//! [handshake]
//! require_auth = true
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};
use crate::utils::constants::{
    DEFAULT_CHALLENGE_TTL_SECONDS, DEFAULT_HANDSHAKE_TIMEOUT_SECONDS,
    DEFAULT_HEARTBEAT_INTERVAL_SECONDS, DEFAULT_REQUESTS_PER_MINUTE, DEFAULT_TTL_SECONDS,
    DEFAULT_WINDOW_SECONDS, MAX_MESSAGE_SIZE, SUPPORTED_VERSIONS,
};

fn supported_versions() -> Vec<String> {
    SUPPORTED_VERSIONS.iter().map(|v| v.to_string()).collect()
}

/// Top-level configuration for an [`A2AProtocol`](crate::protocol::A2AProtocol).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Protocol versions accepted by the validator.
    pub supported_versions: Vec<String>,

    /// Maximum encoded message size in bytes.
    pub max_message_size: usize,

    /// Default TTL applied to messages created by the facade.
    pub default_ttl_seconds: u64,

    /// Period of the background heartbeat task.
    pub heartbeat_interval_seconds: u64,

    /// Inbound admission control.
    pub rate_limit: RateLimitConfig,

    /// Session establishment.
    pub handshake: HandshakeConfig,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            supported_versions: supported_versions(),
            max_message_size: MAX_MESSAGE_SIZE,
            default_ttl_seconds: DEFAULT_TTL_SECONDS,
            heartbeat_interval_seconds: DEFAULT_HEARTBEAT_INTERVAL_SECONDS,
            rate_limit: RateLimitConfig::default(),
            handshake: HandshakeConfig::default(),
        }
    }
}

impl ProtocolConfig {
    /// Parse configuration from a TOML document.
    pub fn from_toml_str(content: &str) -> ProtocolResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ProtocolError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> ProtocolResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ProtocolError::Config(format!("Failed to read config file: {e}")))?;
        Self::from_toml_str(&content)
    }

    /// Defaults overridden by `A2A_*` environment variables.
    ///
    /// Unparseable values are ignored and the default kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_parse("A2A_MAX_MESSAGE_SIZE") {
            config.max_message_size = v;
        }
        if let Some(v) = env_parse("A2A_DEFAULT_TTL_SECONDS") {
            config.default_ttl_seconds = v;
        }
        if let Some(v) = env_parse("A2A_HEARTBEAT_INTERVAL_SECONDS") {
            config.heartbeat_interval_seconds = v;
        }
        if let Some(v) = env_parse("A2A_RATE_LIMIT_ENABLED") {
            config.rate_limit.enabled = v;
        }
        if let Some(v) = env_parse("A2A_RATE_LIMIT_REQUESTS_PER_MINUTE") {
            config.rate_limit.requests_per_minute = v;
        }
        if let Some(v) = env_parse("A2A_RATE_LIMIT_WINDOW_SECONDS") {
            config.rate_limit.window_seconds = v;
        }
        if let Some(v) = env_parse("A2A_RATE_LIMIT_BURST_SIZE") {
            config.rate_limit.burst_size = Some(v);
        }
        if let Some(v) = env_parse("A2A_HANDSHAKE_TIMEOUT_SECONDS") {
            config.handshake.timeout_seconds = v;
        }
        if let Some(v) = env_parse("A2A_HANDSHAKE_REQUIRE_AUTH") {
            config.handshake.require_auth = v;
        }
        if let Ok(versions) = std::env::var("A2A_SUPPORTED_VERSIONS") {
            let versions: Vec<String> = versions
                .split(',')
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect();
            if !versions.is_empty() {
                config.handshake.supported_versions = versions.clone();
                config.supported_versions = versions;
            }
        }

        config
    }

    /// Reject values that would make the protocol unusable.
    pub fn validate(&self) -> ProtocolResult<()> {
        if self.supported_versions.is_empty() {
            return Err(ProtocolError::Config(
                "supported_versions must not be empty".to_string(),
            ));
        }
        if self.max_message_size == 0 {
            return Err(ProtocolError::Config(
                "max_message_size must be greater than 0".to_string(),
            ));
        }
        if self.heartbeat_interval_seconds == 0 {
            return Err(ProtocolError::Config(
                "heartbeat_interval_seconds must be greater than 0".to_string(),
            ));
        }
        self.rate_limit.validate()?;
        self.handshake.validate()
    }

    /// Heartbeat period as a `Duration`.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_seconds)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Sliding-window admission control settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// When `false` every sender is admitted.
    pub enabled: bool,

    /// Admissions per sender within one window.
    pub requests_per_minute: u32,

    /// Window length in seconds.
    pub window_seconds: u64,

    /// Optional cap on admissions within any one-second span.
    pub burst_size: Option<u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            window_seconds: DEFAULT_WINDOW_SECONDS,
            burst_size: None,
        }
    }
}

impl RateLimitConfig {
    /// Convenience constructor for the two values most tests and deployments tune.
    pub fn new(requests_per_minute: u32, window_seconds: u64) -> Self {
        Self {
            requests_per_minute,
            window_seconds,
            ..Self::default()
        }
    }

    /// Window length as a `Duration`.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }

    fn validate(&self) -> ProtocolResult<()> {
        if self.window_seconds == 0 {
            return Err(ProtocolError::Config(
                "rate_limit.window_seconds must be greater than 0".to_string(),
            ));
        }
        if self.enabled && self.requests_per_minute == 0 {
            return Err(ProtocolError::Config(
                "rate_limit.requests_per_minute must be greater than 0".to_string(),
            ));
        }
        if self.burst_size == Some(0) {
            return Err(ProtocolError::Config(
                "rate_limit.burst_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Handshake settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeConfig {
    /// Watchdog deadline for a session to reach a terminal state.
    pub timeout_seconds: u64,

    /// Demand challenge-response authentication from initiators.
    pub require_auth: bool,

    /// Extra send attempts when the transport fails during initiation.
    pub max_retries: u32,

    /// Delay between initiation attempts, in milliseconds.
    pub retry_delay_ms: u64,

    /// Lifetime of an issued challenge, in seconds.
    pub challenge_ttl_seconds: u64,

    /// Peer protocol versions this agent will connect to.
    pub supported_versions: Vec<String>,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_HANDSHAKE_TIMEOUT_SECONDS,
            require_auth: false,
            max_retries: 3,
            retry_delay_ms: 500,
            challenge_ttl_seconds: DEFAULT_CHALLENGE_TTL_SECONDS,
            supported_versions: supported_versions(),
        }
    }
}

impl HandshakeConfig {
    /// Watchdog deadline as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Retry delay as a `Duration`.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    fn validate(&self) -> ProtocolResult<()> {
        if self.timeout_seconds == 0 {
            return Err(ProtocolError::Config(
                "handshake.timeout_seconds must be greater than 0".to_string(),
            ));
        }
        if self.supported_versions.is_empty() {
            return Err(ProtocolError::Config(
                "handshake.supported_versions must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_constants() {
        let config = ProtocolConfig::default();
        assert_eq!(config.supported_versions, vec!["1.0"]);
        assert_eq!(config.max_message_size, 1024 * 1024);
        assert_eq!(config.rate_limit.requests_per_minute, 60);
        assert_eq!(config.rate_limit.window_seconds, 60);
        assert_eq!(config.handshake.timeout_seconds, 30);
        assert_eq!(config.heartbeat_interval_seconds, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ProtocolConfig::from_toml_str(
            r#"
            heartbeat_interval_seconds = 5

            [rate_limit]
            requests_per_minute = 10
            burst_size = 3

            [handshake]
            require_auth = true
            "#,
        )
        .unwrap();
        assert_eq!(config.heartbeat_interval_seconds, 5);
        assert_eq!(config.rate_limit.requests_per_minute, 10);
        assert_eq!(config.rate_limit.window_seconds, 60);
        assert_eq!(config.rate_limit.burst_size, Some(3));
        assert!(config.handshake.require_auth);
        assert_eq!(config.handshake.timeout_seconds, 30);
    }

    #[test]
    fn zero_window_is_rejected() {
        let err = ProtocolConfig::from_toml_str("[rate_limit]\nwindow_seconds = 0\n").unwrap_err();
        assert!(matches!(err, ProtocolError::Config(_)));
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let err = ProtocolConfig::from_toml_str("rate_limit = [").unwrap_err();
        assert!(matches!(err, ProtocolError::Config(_)));
    }
}
