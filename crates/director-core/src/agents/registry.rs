//! Agent Registry
//!
//! Read-only map from agent id to connection metadata, loaded once from
//! configuration and shared between in-flight tasks without locking.

use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

use super::types::AgentDescriptor;
use crate::config::Config;

/// Registry of known downstream agents
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: BTreeMap<String, AgentDescriptor>,
}

impl AgentRegistry {
    /// Build a registry from descriptors. Later duplicates replace earlier ones.
    pub fn new(agents: impl IntoIterator<Item = AgentDescriptor>) -> Self {
        Self {
            agents: agents
                .into_iter()
                .map(|agent| (agent.id.clone(), agent))
                .collect(),
        }
    }

    /// Build the registry from the `[agents]` settings table
    pub fn from_config(config: &Config) -> Self {
        let registry = Self::new(config.agents.iter().map(|(id, agent)| AgentDescriptor {
            id: id.clone(),
            base_url: agent.base_url.clone(),
            capability_endpoint: agent.capability_endpoint.clone(),
        }));

        info!(
            "Loaded {} agent(s) into registry: {:?}",
            registry.len(),
            registry.agents.keys().collect::<Vec<_>>()
        );

        registry
    }

    pub fn get(&self, id: &str) -> Option<&AgentDescriptor> {
        self.agents.get(id)
    }

    /// All valid agent ids
    pub fn ids(&self) -> BTreeSet<String> {
        self.agents.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentDescriptor> {
        self.agents.values()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
