//! Agent info discovery via the well-known URI.
//!
//! Every agent served by [`a2a_router`](crate::server::a2a_router) publishes
//! its [`AgentInfo`] at `{base_url}/.well-known/agent.json`.

use crate::error::{ProtocolError, ProtocolResult};
use crate::types::AgentInfo;
use crate::utils::constants::AGENT_INFO_WELL_KNOWN_PATH;

/// Resolves [`AgentInfo`] from agent base URLs.
///
/// # Example
///
/// ```no_run
/// use a2a_protocol::client::AgentInfoResolver;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let resolver = AgentInfoResolver::new();
/// let info = resolver.resolve("http://localhost:3000").await?;
/// println!("Agent: {} ({} capabilities)", info.agent_name, info.capabilities.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AgentInfoResolver {
    client: reqwest::Client,
    path: String,
}

impl AgentInfoResolver {
    /// Create a resolver with default settings.
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    /// Create a resolver with an existing `reqwest::Client`.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            path: AGENT_INFO_WELL_KNOWN_PATH.to_string(),
        }
    }

    /// Override the well-known path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        self
    }

    /// Fetch and parse the agent info published at `base_url`.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Transport`] on connection failures and non-2xx
    /// responses, [`ProtocolError::Timeout`] on timeouts,
    /// [`ProtocolError::Serialization`] when the body is not an `AgentInfo`.
    pub async fn resolve(&self, base_url: &str) -> ProtocolResult<AgentInfo> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), self.path);
        tracing::debug!(url = %url, "Resolving agent info");

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ProtocolError::Transport(format!("failed to connect to agent at {url}: {e}"))
                } else if e.is_timeout() {
                    ProtocolError::Timeout(format!("timed out fetching agent info from {url}: {e}"))
                } else {
                    ProtocolError::Transport(format!("failed to fetch agent info from {url}: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProtocolError::Transport(format!(
                "HTTP {} from {url}: {body}",
                status.as_u16()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProtocolError::Transport(format!("failed to read agent info: {e}")))?;

        let info: AgentInfo = serde_json::from_slice(&bytes)
            .map_err(|e| ProtocolError::Serialization(format!("failed to parse agent info: {e}")))?;

        tracing::debug!(
            agent_id = %info.agent_id,
            capabilities = info.capabilities.len(),
            "Resolved agent info"
        );
        Ok(info)
    }
}

impl Default for AgentInfoResolver {
    fn default() -> Self {
        Self::new()
    }
}
