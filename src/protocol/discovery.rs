//! Agent discovery registry.
//!
//! A discovery service is a collaborator, not part of message routing: agents
//! register their [`AgentInfo`] and peers look them up by id, capability or
//! tag. [`InMemoryDiscoveryService`] keeps everything in process.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{ProtocolError, ProtocolResult};
use crate::types::{AgentInfo, AgentStatus};

/// Registry of reachable agents.
#[async_trait]
pub trait DiscoveryService: Send + Sync {
    /// Add or replace an agent.
    async fn register(&self, agent: AgentInfo) -> ProtocolResult<()>;

    /// Remove an agent. Returns `true` if it was registered.
    async fn deregister(&self, agent_id: &str) -> ProtocolResult<bool>;

    /// Look up one agent.
    async fn get(&self, agent_id: &str) -> ProtocolResult<Option<AgentInfo>>;

    /// Every registered agent.
    async fn list(&self) -> ProtocolResult<Vec<AgentInfo>>;

    /// Agents advertising a capability named `capability`.
    async fn find_by_capability(&self, capability: &str) -> ProtocolResult<Vec<AgentInfo>>;

    /// Agents advertising any capability tagged `tag`.
    async fn find_by_tag(&self, tag: &str) -> ProtocolResult<Vec<AgentInfo>>;
}

/// Process-local [`DiscoveryService`].
///
/// Results are sorted by agent id so lookups are deterministic.
#[derive(Debug, Default)]
pub struct InMemoryDiscoveryService {
    agents: RwLock<HashMap<String, AgentInfo>>,
}

impl InMemoryDiscoveryService {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the status of a registered agent. Returns `false` if it is unknown.
    pub async fn set_status(&self, agent_id: &str, status: AgentStatus) -> bool {
        match self.agents.write().await.get_mut(agent_id) {
            Some(agent) => {
                agent.status = status;
                true
            }
            None => false,
        }
    }

    /// Number of registered agents.
    pub async fn len(&self) -> usize {
        self.agents.read().await.len()
    }

    /// `true` if nothing is registered.
    pub async fn is_empty(&self) -> bool {
        self.agents.read().await.is_empty()
    }

    async fn filtered<F>(&self, predicate: F) -> Vec<AgentInfo>
    where
        F: Fn(&AgentInfo) -> bool,
    {
        let agents = self.agents.read().await;
        let mut matches: Vec<AgentInfo> = agents.values().filter(|a| predicate(a)).cloned().collect();
        matches.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        matches
    }
}

#[async_trait]
impl DiscoveryService for InMemoryDiscoveryService {
    async fn register(&self, agent: AgentInfo) -> ProtocolResult<()> {
        if agent.agent_id.trim().is_empty() {
            return Err(ProtocolError::Other(
                "cannot register an agent with an empty id".to_string(),
            ));
        }
        info!(
            agent_id = %agent.agent_id,
            capabilities = agent.capabilities.len(),
            "Agent registered"
        );
        self.agents
            .write()
            .await
            .insert(agent.agent_id.clone(), agent);
        Ok(())
    }

    async fn deregister(&self, agent_id: &str) -> ProtocolResult<bool> {
        let removed = self.agents.write().await.remove(agent_id).is_some();
        debug!(agent_id = %agent_id, removed, "Agent deregistered");
        Ok(removed)
    }

    async fn get(&self, agent_id: &str) -> ProtocolResult<Option<AgentInfo>> {
        Ok(self.agents.read().await.get(agent_id).cloned())
    }

    async fn list(&self) -> ProtocolResult<Vec<AgentInfo>> {
        Ok(self.filtered(|_| true).await)
    }

    async fn find_by_capability(&self, capability: &str) -> ProtocolResult<Vec<AgentInfo>> {
        Ok(self.filtered(|a| a.has_capability(capability)).await)
    }

    async fn find_by_tag(&self, tag: &str) -> ProtocolResult<Vec<AgentInfo>> {
        Ok(self
            .filtered(|a| a.capabilities.iter().any(|c| c.has_tag(tag)))
            .await)
    }
}
