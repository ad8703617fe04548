//! Pluggable challenge-response authentication for handshakes.
//!
//! The responder issues a [`HandshakeChallenge`], the initiator answers it,
//! and the responder verifies the answer. [`SimpleTokenAuthProvider`] is a
//! shared-secret reference scheme; it has no replay protection beyond
//! challenge expiry and does not authenticate the responder to the initiator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{ProtocolError, ProtocolResult};
use crate::utils::message::{new_id, now_timestamp};

/// A short-lived authentication nonce issued by the responder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakeChallenge {
    /// Unique challenge id.
    pub challenge_id: String,
    /// Scheme name, e.g. `"token"`.
    pub challenge_type: String,
    /// Scheme-specific data (for tokens: `{"nonce": "..."}`).
    pub challenge_data: Value,
    /// Issue time, float seconds since the Unix epoch.
    pub timestamp: f64,
    /// Expiry time, float seconds since the Unix epoch.
    pub expires_at: f64,
}

impl HandshakeChallenge {
    /// Create a challenge valid for `ttl_seconds`.
    pub fn new(challenge_type: impl Into<String>, challenge_data: Value, ttl_seconds: u64) -> Self {
        let timestamp = now_timestamp();
        Self {
            challenge_id: new_id(),
            challenge_type: challenge_type.into(),
            challenge_data,
            timestamp,
            expires_at: timestamp + ttl_seconds as f64,
        }
    }

    /// `true` once the challenge can no longer be answered.
    pub fn is_expired(&self) -> bool {
        now_timestamp() > self.expires_at
    }
}

/// Challenge-response scheme used during handshakes.
#[async_trait]
pub trait AuthenticationProvider: Send + Sync {
    /// Issue a challenge for `remote_agent_id`, valid for `ttl_seconds`.
    ///
    /// The handshake manager passes its configured `challenge_ttl_seconds`.
    async fn create_challenge(
        &self,
        remote_agent_id: &str,
        ttl_seconds: u64,
    ) -> ProtocolResult<HandshakeChallenge>;

    /// Compute the answer to a challenge received from a peer.
    async fn respond_to_challenge(&self, challenge: &HandshakeChallenge) -> ProtocolResult<Value>;

    /// Check a peer's answer to a challenge this side issued.
    async fn verify_response(
        &self,
        challenge: &HandshakeChallenge,
        response: &Value,
    ) -> ProtocolResult<bool>;
}

const TOKEN_CHALLENGE: &str = "token";

/// Shared-secret provider: the answer is `hex(sha256("{nonce}:{secret}"))`.
#[derive(Clone)]
pub struct SimpleTokenAuthProvider {
    secret: String,
}

impl std::fmt::Debug for SimpleTokenAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleTokenAuthProvider")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl SimpleTokenAuthProvider {
    /// Create a provider with the shared `secret`.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn token_for(&self, nonce: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(nonce.as_bytes());
        hasher.update(b":");
        hasher.update(self.secret.as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

fn nonce_of(challenge: &HandshakeChallenge) -> ProtocolResult<&str> {
    if challenge.challenge_type != TOKEN_CHALLENGE {
        return Err(ProtocolError::handshake(format!(
            "unsupported challenge type {:?}",
            challenge.challenge_type
        )));
    }
    challenge
        .challenge_data
        .get("nonce")
        .and_then(Value::as_str)
        .ok_or_else(|| ProtocolError::handshake("challenge has no nonce"))
}

/// Compare without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[async_trait]
impl AuthenticationProvider for SimpleTokenAuthProvider {
    async fn create_challenge(
        &self,
        _remote_agent_id: &str,
        ttl_seconds: u64,
    ) -> ProtocolResult<HandshakeChallenge> {
        let nonce = format!("{}{}", new_id().replace('-', ""), new_id().replace('-', ""));
        Ok(HandshakeChallenge::new(
            TOKEN_CHALLENGE,
            serde_json::json!({ "nonce": nonce }),
            ttl_seconds,
        ))
    }

    async fn respond_to_challenge(&self, challenge: &HandshakeChallenge) -> ProtocolResult<Value> {
        let nonce = nonce_of(challenge)?;
        Ok(serde_json::json!({ "token": self.token_for(nonce) }))
    }

    async fn verify_response(
        &self,
        challenge: &HandshakeChallenge,
        response: &Value,
    ) -> ProtocolResult<bool> {
        if challenge.is_expired() {
            return Ok(false);
        }
        let nonce = nonce_of(challenge)?;
        let Some(token) = response.get("token").and_then(Value::as_str) else {
            return Ok(false);
        };
        Ok(constant_time_eq(
            token.as_bytes(),
            self.token_for(nonce).as_bytes(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shared_secret_verifies() {
        let server = SimpleTokenAuthProvider::new("s3cret");
        let client = SimpleTokenAuthProvider::new("s3cret");
        let challenge = server.create_challenge("client", 300).await.unwrap();
        let answer = client.respond_to_challenge(&challenge).await.unwrap();
        assert!(server.verify_response(&challenge, &answer).await.unwrap());
    }

    #[tokio::test]
    async fn wrong_secret_is_rejected() {
        let server = SimpleTokenAuthProvider::new("s3cret");
        let client = SimpleTokenAuthProvider::new("guess");
        let challenge = server.create_challenge("client", 300).await.unwrap();
        let answer = client.respond_to_challenge(&challenge).await.unwrap();
        assert!(!server.verify_response(&challenge, &answer).await.unwrap());
    }

    #[tokio::test]
    async fn expired_challenge_is_rejected() {
        let provider = SimpleTokenAuthProvider::new("s3cret");
        let mut challenge = provider.create_challenge("client", 300).await.unwrap();
        let answer = provider.respond_to_challenge(&challenge).await.unwrap();
        challenge.expires_at = challenge.timestamp - 1.0;
        assert!(!provider.verify_response(&challenge, &answer).await.unwrap());
    }

    #[tokio::test]
    async fn challenge_lives_for_requested_ttl() {
        let provider = SimpleTokenAuthProvider::new("s3cret");
        let challenge = provider.create_challenge("client", 5).await.unwrap();
        assert!((challenge.expires_at - challenge.timestamp - 5.0).abs() < 1e-6);
        assert_eq!(challenge.challenge_type, "token");
    }

    #[test]
    fn token_is_hex_sha256() {
        let provider = SimpleTokenAuthProvider::new("secret");
        let token = provider.token_for("nonce");
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(token, provider.token_for("nonce"));
        assert_ne!(token, provider.token_for("other"));
    }

    #[test]
    fn debug_hides_secret() {
        let provider = SimpleTokenAuthProvider::new("hunter2");
        assert!(!format!("{provider:?}").contains("hunter2"));
    }
}
