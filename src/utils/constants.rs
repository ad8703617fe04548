//! Protocol-wide constants and defaults.

/// Protocol version stamped on every message this crate creates.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Versions accepted by the default validator.
pub const SUPPORTED_VERSIONS: &[&str] = &["1.0"];

/// Default message time-to-live, in seconds.
pub const DEFAULT_TTL_SECONDS: u64 = 300;

/// Maximum encoded message size accepted by the validator (1 MiB).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Default admissions per sender per window.
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 60;

/// Default rate-limit window, in seconds.
pub const DEFAULT_WINDOW_SECONDS: u64 = 60;

/// Default handshake timeout, in seconds.
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECONDS: u64 = 30;

/// Default handshake challenge lifetime, in seconds.
pub const DEFAULT_CHALLENGE_TTL_SECONDS: u64 = 300;

/// Default heartbeat period, in seconds.
pub const DEFAULT_HEARTBEAT_INTERVAL_SECONDS: u64 = 30;

/// The well-known path serving the local agent's `AgentInfo`.
pub const AGENT_INFO_WELL_KNOWN_PATH: &str = "/.well-known/agent.json";

/// The HTTP path accepting inbound message envelopes.
pub const MESSAGES_PATH: &str = "/a2a/messages";

/// Payload metadata key carrying the handshake session id.
pub const SESSION_ID_KEY: &str = "session_id";
