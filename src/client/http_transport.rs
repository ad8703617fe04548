//! HTTP transport — POSTs message envelopes to a peer's `/a2a/messages`.
//!
//! The peer answers in the HTTP response body. [`HttpTransport::exchange`]
//! returns that reply directly; through the [`MessageTransport`] trait the
//! reply is forwarded to an optional sink, typically a channel drained into
//! the local [`A2AProtocol`](crate::protocol::A2AProtocol) so RESPONSEs
//! resolve pending requests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{ProtocolError, ProtocolResult};
use crate::protocol::MessageTransport;
use crate::types::A2AMessage;
use crate::utils::constants::MESSAGES_PATH;

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Request timeout. Defaults to 30 seconds.
    pub timeout: Duration,
    /// Additional HTTP headers to include on every request.
    pub headers: HashMap<String, String>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            headers: HashMap::new(),
        }
    }
}

/// Message transport over HTTP using `reqwest`.
///
/// # Example
///
/// ```no_run
/// use a2a_protocol::client::HttpTransport;
///
/// let transport = HttpTransport::new("http://localhost:3000");
/// assert_eq!(transport.url(), "http://localhost:3000/a2a/messages");
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    replies: Option<mpsc::UnboundedSender<A2AMessage>>,
}

impl HttpTransport {
    /// Create a transport targeting the agent at `base_url`.
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self::with_config(base_url, HttpTransportConfig::default())
    }

    /// Create a transport with custom configuration.
    pub fn with_config(base_url: impl AsRef<str>, config: HttpTransportConfig) -> Self {
        let mut default_headers = HeaderMap::new();
        for (key, value) in &config.headers {
            if let (Ok(name), Ok(val)) = (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                default_headers.insert(name, val);
            }
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(default_headers)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self::with_client(base_url, client)
    }

    /// Create a transport with an existing `reqwest::Client`.
    pub fn with_client(base_url: impl AsRef<str>, client: reqwest::Client) -> Self {
        let base = base_url.as_ref().trim_end_matches('/');
        Self {
            client,
            url: format!("{base}{MESSAGES_PATH}"),
            replies: None,
        }
    }

    /// Forward every reply received through [`MessageTransport::send`] to `sink`.
    pub fn with_reply_sink(mut self, sink: mpsc::UnboundedSender<A2AMessage>) -> Self {
        self.replies = Some(sink);
        self
    }

    /// The URL messages are posted to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST `message` and return the peer's reply, if it sent one.
    ///
    /// Rejections the peer reports as ERROR messages (400/403/429) are
    /// returned as `Ok(Some(error))`; other failures are transport errors.
    pub async fn exchange(&self, message: &A2AMessage) -> ProtocolResult<Option<A2AMessage>> {
        let response = self
            .client
            .post(&self.url)
            .json(message)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProtocolError::Timeout(format!("timed out posting to {}: {e}", self.url))
                } else {
                    ProtocolError::Transport(format!("failed to post to {}: {e}", self.url))
                }
            })?;

        let status = response.status();
        if status == StatusCode::ACCEPTED || status == StatusCode::NO_CONTENT {
            debug!(message_id = %message.header.message_id, "Peer accepted message");
            return Ok(None);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProtocolError::Transport(format!("failed to read response: {e}")))?;

        match serde_json::from_slice::<A2AMessage>(&bytes) {
            Ok(reply) => {
                if !status.is_success() {
                    warn!(
                        message_id = %message.header.message_id,
                        status = status.as_u16(),
                        "Peer rejected message"
                    );
                }
                Ok(Some(reply))
            }
            Err(_) if !status.is_success() => Err(ProtocolError::Transport(format!(
                "HTTP {}: {}",
                status.as_u16(),
                String::from_utf8_lossy(&bytes)
            ))),
            Err(e) => Err(ProtocolError::Serialization(format!(
                "invalid reply from {}: {e}",
                self.url
            ))),
        }
    }
}

#[async_trait]
impl MessageTransport for HttpTransport {
    async fn send(&self, message: &A2AMessage) -> ProtocolResult<()> {
        let reply = self.exchange(message).await?;
        if let (Some(reply), Some(sink)) = (reply, self.replies.as_ref()) {
            if sink.send(reply).is_err() {
                warn!(url = %self.url, "Reply sink closed, dropping reply");
            }
        }
        Ok(())
    }
}
