//! Tests for the in-memory discovery registry.

use a2a_protocol::builders::{AgentInfoBuilder, CapabilityBuilder};
use a2a_protocol::protocol::{DiscoveryService, InMemoryDiscoveryService};
use a2a_protocol::types::{AgentInfo, AgentStatus};

fn agent(id: &str, capabilities: &[(&str, &str)]) -> AgentInfo {
    let mut builder = AgentInfoBuilder::new(id, id.to_uppercase());
    for (name, tag) in capabilities {
        builder = builder.capability(CapabilityBuilder::new(*name).tag(*tag).build());
    }
    builder.build()
}

async fn populated() -> InMemoryDiscoveryService {
    let registry = InMemoryDiscoveryService::new();
    registry
        .register(agent("translator", &[("translate", "nlp")]))
        .await
        .unwrap();
    registry
        .register(agent("calculator", &[("sum", "math"), ("mean", "math")]))
        .await
        .unwrap();
    registry
        .register(agent("analyst", &[("sentiment", "nlp"), ("mean", "stats")]))
        .await
        .unwrap();
    registry
}

fn ids(agents: &[AgentInfo]) -> Vec<&str> {
    agents.iter().map(|a| a.agent_id.as_str()).collect()
}

#[tokio::test]
async fn list_is_sorted_by_id() {
    let registry = populated().await;
    assert_eq!(registry.len().await, 3);
    let all = registry.list().await.unwrap();
    assert_eq!(ids(&all), vec!["analyst", "calculator", "translator"]);
}

#[tokio::test]
async fn lookup_by_capability_and_tag() {
    let registry = populated().await;

    let mean = registry.find_by_capability("mean").await.unwrap();
    assert_eq!(ids(&mean), vec!["analyst", "calculator"]);

    let nlp = registry.find_by_tag("nlp").await.unwrap();
    assert_eq!(ids(&nlp), vec!["analyst", "translator"]);

    assert!(registry.find_by_capability("fly").await.unwrap().is_empty());
    assert!(registry.find_by_tag("").await.unwrap().is_empty());
}

#[tokio::test]
async fn register_replaces_existing_entry() {
    let registry = populated().await;
    registry
        .register(agent("translator", &[("summarize", "nlp")]))
        .await
        .unwrap();

    assert_eq!(registry.len().await, 3);
    let translator = registry.get("translator").await.unwrap().unwrap();
    assert!(translator.has_capability("summarize"));
    assert!(!translator.has_capability("translate"));
}

#[tokio::test]
async fn deregister_and_status_updates() {
    let registry = populated().await;

    assert!(registry.set_status("analyst", AgentStatus::Busy).await);
    assert_eq!(
        registry.get("analyst").await.unwrap().unwrap().status,
        AgentStatus::Busy
    );
    assert!(!registry.set_status("ghost", AgentStatus::Busy).await);

    assert!(registry.deregister("analyst").await.unwrap());
    assert!(!registry.deregister("analyst").await.unwrap());
    assert!(registry.get("analyst").await.unwrap().is_none());
    assert_eq!(registry.len().await, 2);
}

#[tokio::test]
async fn empty_agent_id_is_refused() {
    let registry = InMemoryDiscoveryService::new();
    assert!(registry.register(agent(" ", &[])).await.is_err());
    assert!(registry.is_empty().await);
}
