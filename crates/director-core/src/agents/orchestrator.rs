//! Director Orchestrator
//!
//! Public entry point: selector, delegation client and lifecycle controller
//! composed into one streaming call. Every failure becomes a terminal
//! `Failed` event; nothing is raised across `stream`.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::delegation::DelegationClient;
use super::lifecycle::{DEFAULT_TRAILER_GRACE, EventStream, TaskLifecycle};
use super::registry::AgentRegistry;
use super::selector::{AgentSelector, SelectionResult};
use super::types::{Event, FailureReason, Query};
use crate::a2a::A2aTransport;
use crate::config::Config;
use crate::llm::{ClassifierClient, LlmClient};
use crate::{Error, Result};

/// Routes queries to downstream agents and streams their answers back
#[derive(Clone)]
pub struct Director {
    registry: Arc<AgentRegistry>,
    selector: AgentSelector,
    delegation: DelegationClient,
    trailer_grace: Duration,
}

impl Director {
    pub fn new(registry: AgentRegistry, selector: AgentSelector, delegation: DelegationClient) -> Self {
        Self {
            registry: Arc::new(registry),
            selector,
            delegation,
            trailer_grace: DEFAULT_TRAILER_GRACE,
        }
    }

    /// Wire the LLM classifier and the A2A transport from settings
    pub fn from_config(config: &Config) -> Result<Self> {
        let registry = AgentRegistry::from_config(config);
        let classifier = ClassifierClient::new(LlmClient::new(&config.llm)?);
        let transport = A2aTransport::new(&config.delegation)?;

        info!(
            "Director ready: {} agent(s), classifier model {}",
            registry.len(),
            config.llm.model
        );

        Ok(Self::new(
            registry,
            AgentSelector::new(Arc::new(classifier)),
            DelegationClient::new(Arc::new(transport), &config.delegation),
        ))
    }

    /// How long to listen for stray events after a downstream terminal event
    pub fn with_trailer_grace(mut self, grace: Duration) -> Self {
        self.trailer_grace = grace;
        self
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Stream the answer to `query`.
    ///
    /// The sequence always ends with exactly one terminal event. Dropping it
    /// early releases the downstream connection.
    pub fn stream(&self, query: Query) -> EventStream {
        let director = self.clone();
        stream::once(async move { director.start(query).await })
            .flatten()
            .boxed()
    }

    /// Synchronous invocation is not offered; use [`Director::stream`].
    pub fn invoke(&self, _query: &Query) -> Result<Event> {
        Err(Error::NotSupported(
            "Synchronous invocation is not supported by this agent. \
             Use the streaming endpoint (message/stream) instead."
                .to_string(),
        ))
    }

    async fn start(self, query: Query) -> EventStream {
        let mut lifecycle =
            TaskLifecycle::new(query.session_id.clone()).with_trailer_grace(self.trailer_grace);
        lifecycle.begin_selection();

        info!(
            task_id = %lifecycle.task().task_id,
            session_id = %query.session_id,
            "Processing query: {}",
            query.text.chars().take(50).collect::<String>()
        );

        let candidates = self.registry.ids();
        let rejected = match self.selector.select(&query, &candidates).await {
            Ok(SelectionResult::Selected(id)) => match self.registry.get(&id) {
                Some(agent) => {
                    let agent = agent.clone();
                    lifecycle.begin_delegation(agent.clone());
                    let raw = self.delegation.delegate(&agent, &query);
                    return lifecycle.drive(raw);
                }
                None => lifecycle.fail(FailureReason::Unresolved, format!("unknown agent '{}'", id)),
            },
            Ok(SelectionResult::Unresolved) => {
                lifecycle.fail(FailureReason::Unresolved, "no suitable agent for this query")
            }
            Err(Error::Configuration(msg)) => lifecycle.fail(FailureReason::ConfigurationError, msg),
            Err(e) => lifecycle.fail(FailureReason::UpstreamError, e.to_string()),
        };

        stream::iter(vec![rejected]).boxed()
    }
}
