//! Agent Selector
//!
//! Wraps the classification collaborator. The collaborator is asked exactly
//! once per query; whatever it answers is checked against the candidate set
//! before it is trusted.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::types::Query;
use crate::{Error, Result};

/// Answer of the classification collaborator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Selected id, `None` when the classifier declined to choose
    pub agent_id: Option<String>,
    pub reasoning: Option<String>,
}

impl Classification {
    pub fn selected(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: Some(agent_id.into()),
            reasoning: None,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }
}

/// Classification collaborator: picks one id out of a closed list
#[async_trait]
pub trait Classifier: Send + Sync + 'static {
    async fn classify(
        &self,
        query_text: &str,
        candidate_ids: &BTreeSet<String>,
    ) -> Result<Classification>;
}

/// Outcome of agent selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionResult {
    Selected(String),
    Unresolved,
}

/// Chooses the downstream agent for a query
#[derive(Clone)]
pub struct AgentSelector {
    classifier: Arc<dyn Classifier>,
}

impl AgentSelector {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    /// Select an agent for `query` among `candidate_ids`.
    ///
    /// Fails with `Error::Configuration` when there are no candidates and with
    /// `Error::Upstream` when the classifier fails. Out-of-set answers are
    /// `Unresolved`.
    pub async fn select(
        &self,
        query: &Query,
        candidate_ids: &BTreeSet<String>,
    ) -> Result<SelectionResult> {
        if candidate_ids.is_empty() {
            return Err(Error::Configuration(
                "no valid agents registered".to_string(),
            ));
        }

        let classification = self
            .classifier
            .classify(&query.text, candidate_ids)
            .await
            .map_err(|e| match e {
                Error::Upstream(msg) => Error::Upstream(msg),
                other => Error::Upstream(other.to_string()),
            })?;

        if let Some(reasoning) = &classification.reasoning {
            debug!(session_id = %query.session_id, "Classifier reasoning: {}", reasoning);
        }

        match classification.agent_id {
            Some(id) if candidate_ids.contains(&id) => {
                info!(session_id = %query.session_id, agent_id = %id, "Agent selected");
                Ok(SelectionResult::Selected(id))
            }
            Some(id) => {
                warn!(
                    session_id = %query.session_id,
                    "Classifier returned unknown agent id '{}', treating as unresolved",
                    id
                );
                Ok(SelectionResult::Unresolved)
            }
            None => {
                info!(session_id = %query.session_id, "Classifier declined to select an agent");
                Ok(SelectionResult::Unresolved)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::MockClassifier;

    fn candidates(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_select_known_agent() {
        let classifier = Arc::new(MockClassifier::answering(Some("widgets")));
        let selector = AgentSelector::new(classifier.clone());

        let result = selector
            .select(&Query::new("What is widget 1?", "s1"), &candidates(&["widgets"]))
            .await
            .unwrap();

        assert_eq!(result, SelectionResult::Selected("widgets".to_string()));
        assert_eq!(classifier.calls(), 1);
        assert_eq!(
            classifier.last_candidates(),
            Some(candidates(&["widgets"]))
        );
    }

    #[tokio::test]
    async fn test_select_out_of_set_is_unresolved() {
        let selector = AgentSelector::new(Arc::new(MockClassifier::answering(Some("unknown_agent"))));

        let result = selector
            .select(&Query::new("foo", "s1"), &candidates(&["widgets"]))
            .await
            .unwrap();

        assert_eq!(result, SelectionResult::Unresolved);
    }

    #[tokio::test]
    async fn test_select_declined_is_unresolved() {
        let selector = AgentSelector::new(Arc::new(MockClassifier::answering(None)));

        let result = selector
            .select(&Query::new("foo", "s1"), &candidates(&["widgets"]))
            .await
            .unwrap();

        assert_eq!(result, SelectionResult::Unresolved);
    }

    #[tokio::test]
    async fn test_select_empty_candidates() {
        let classifier = Arc::new(MockClassifier::answering(Some("widgets")));
        let selector = AgentSelector::new(classifier.clone());

        let err = selector
            .select(&Query::new("foo", "s1"), &BTreeSet::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Configuration(_)));
        assert_eq!(classifier.calls(), 0);
    }

    #[tokio::test]
    async fn test_select_classifier_failure() {
        let selector = AgentSelector::new(Arc::new(MockClassifier::failing("connection refused")));

        let err = selector
            .select(&Query::new("foo", "s1"), &candidates(&["widgets"]))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Upstream(_)));
    }
}
