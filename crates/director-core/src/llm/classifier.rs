//! LLM-backed agent classification

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tracing::debug;

use super::client::LlmClient;
use crate::agents::selector::{Classification, Classifier};
use crate::Result;

/// Sentinel the model returns when no candidate fits
pub const UNKNOWN_AGENT: &str = "UNKNOWN";

/// `Classifier` that asks an LLM to pick one agent id
#[derive(Clone)]
pub struct ClassifierClient {
    llm: LlmClient,
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    agent_id: String,
    #[serde(default)]
    reasoning: Option<String>,
}

impl ClassifierClient {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    /// Routing instructions listing the closed set of answers
    pub fn system_prompt(candidate_ids: &BTreeSet<String>) -> String {
        let mut prompt = String::from(
            "You are an agent router. Given a user question, return the correct \
             agent_id and explain your reasoning.\n\n\
             You have access to the following agent IDs:\n",
        );
        for id in candidate_ids {
            prompt.push_str(&format!("- {}\n", id));
        }
        prompt.push_str(&format!(
            "- {}: for anything not covered by the other agents.\n\n",
            UNKNOWN_AGENT
        ));
        prompt.push_str(
            "You can ONLY select an agent ID from the list above. Do not invent an agent ID.\n\
             If you are unsure, return \"UNKNOWN\" as the agent_id.\n\
             Reply with a single JSON object and nothing else:\n\
             {\"agent_id\": \"<id>\", \"reasoning\": \"<one sentence>\"}",
        );
        prompt
    }
}

#[async_trait]
impl Classifier for ClassifierClient {
    async fn classify(
        &self,
        query_text: &str,
        candidate_ids: &BTreeSet<String>,
    ) -> Result<Classification> {
        let system = Self::system_prompt(candidate_ids);
        let reply = self.llm.complete(&system, query_text).await?;
        debug!(model = %self.llm.model(), "Classifier reply: {}", reply);
        Ok(parse_classification(&reply))
    }
}

/// Parse a model reply leniently.
///
/// Accepts a JSON object anywhere in the text (reasoning models wrap it in
/// `<think>` blocks or prose) or a bare agent id. `UNKNOWN` and anything
/// unparseable mean "no selection".
pub fn parse_classification(reply: &str) -> Classification {
    let text = THINK_BLOCK.replace_all(reply, "");
    let text = text.trim();

    let parsed = first_classification(text);

    let (agent_id, reasoning) = match parsed {
        Some(raw) => (raw.agent_id.trim().to_string(), raw.reasoning),
        None => {
            let bare = text.trim_matches(|c: char| c == '"' || c == '`' || c.is_whitespace());
            if bare.is_empty() || bare.contains(char::is_whitespace) {
                return Classification::none();
            }
            (bare.to_string(), None)
        }
    };

    if agent_id.is_empty() || agent_id.eq_ignore_ascii_case(UNKNOWN_AGENT) {
        let classification = Classification::none();
        return match reasoning {
            Some(r) => classification.with_reasoning(r),
            None => classification,
        };
    }

    let classification = Classification::selected(agent_id);
    match reasoning {
        Some(r) => classification.with_reasoning(r),
        None => classification,
    }
}

/// Reasoning blocks; an unterminated block runs to the end of the reply
static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?(?:</think>|\z)").expect("valid think-block pattern"));

/// First `{` in `text` that starts a classification object
fn first_classification(text: &str) -> Option<RawClassification> {
    text.match_indices('{').find_map(|(start, _)| {
        serde_json::Deserializer::from_str(&text[start..])
            .into_iter::<RawClassification>()
            .next()
            .and_then(|parsed| parsed.ok())
    })
}
