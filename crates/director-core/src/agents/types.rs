//! Director data model
//!
//! - AgentDescriptor: connection metadata of a downstream agent
//! - Query / Credential: one inbound request and its opaque token
//! - Task / TaskState: the per-query delegation lifecycle
//! - Event / RawDownstreamEvent: caller-facing and downstream vocabularies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;
use zeroize::Zeroizing;

/// Connection metadata for one downstream agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub id: String,
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability_endpoint: Option<String>,
}

impl AgentDescriptor {
    pub fn new(id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into(),
            capability_endpoint: None,
        }
    }

    pub fn with_capability_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.capability_endpoint = Some(endpoint.into());
        self
    }

    /// Absolute URL of the agent card, if one is declared.
    ///
    /// Relative endpoints are joined onto `base_url`.
    pub fn capability_url(&self) -> Option<String> {
        let endpoint = self.capability_endpoint.as_deref()?;
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return Some(endpoint.to_string());
        }
        Some(format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        ))
    }
}

/// Opaque authentication token carried across the delegation hop.
///
/// The value is wiped on drop and never rendered by `Debug`/`Display`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(Zeroizing<String>);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Zeroizing::new(token.into()))
    }

    /// Raw token, for attaching to an outbound request only
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl From<String> for Credential {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for Credential {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One inbound request
#[derive(Debug, Clone)]
pub struct Query {
    pub text: String,
    pub session_id: String,
    pub credential: Option<Credential>,
}

impl Query {
    pub fn new(text: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            session_id: session_id.into(),
            credential: None,
        }
    }

    pub fn with_credential(mut self, credential: impl Into<Credential>) -> Self {
        self.credential = Some(credential.into());
        self
    }
}

/// Unique identifier of a delegated task
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    #[default]
    Created,
    Selecting,
    Delegating,
    Streaming,
    Completed,
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `self -> next` is an edge of the lifecycle graph
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, next),
            (Created, Selecting)
                | (Selecting, Delegating)
                | (Selecting, Failed)
                | (Delegating, Streaming)
                | (Delegating, Failed)
                | (Streaming, Streaming)
                | (Streaming, Completed)
                | (Streaming, Failed)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Selecting => "selecting",
            Self::Delegating => "delegating",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// The unit of work delegated to one downstream agent
#[derive(Debug, Clone)]
pub struct Task {
    pub task_id: TaskId,
    pub session_id: String,
    pub selected_agent: Option<AgentDescriptor>,
    state: TaskState,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            task_id: TaskId::default(),
            session_id: session_id.into(),
            selected_agent: None,
            state: TaskState::Created,
            error: None,
            created_at: Utc::now(),
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Move to `next`. Illegal edges are logged and ignored.
    pub(crate) fn transition(&mut self, next: TaskState) -> bool {
        if !self.state.can_transition_to(next) {
            warn!(
                task_id = %self.task_id,
                from = %self.state,
                to = %next,
                "Rejected illegal task transition"
            );
            return false;
        }
        self.state = next;
        true
    }
}

/// Why a task failed. The string form is stable and travels in `Failed` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureReason {
    /// No candidate agents registered
    #[serde(rename = "ConfigurationError")]
    ConfigurationError,
    /// Classification service unreachable or erroring
    #[serde(rename = "UpstreamError")]
    UpstreamError,
    /// Classifier declined or answered outside the candidate set
    #[serde(rename = "Unresolved")]
    Unresolved,
    #[serde(rename = "timeout")]
    Timeout,
    #[serde(rename = "connect_failed")]
    ConnectFailed,
    #[serde(rename = "connection_dropped")]
    ConnectionDropped,
    /// The downstream agent reported a terminal failure
    #[serde(rename = "agent_failed")]
    AgentFailed,
    /// Downstream kept talking after its terminal event
    #[serde(rename = "protocol_violation")]
    ProtocolViolation,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigurationError => "ConfigurationError",
            Self::UpstreamError => "UpstreamError",
            Self::Unresolved => "Unresolved",
            Self::Timeout => "timeout",
            Self::ConnectFailed => "connect_failed",
            Self::ConnectionDropped => "connection_dropped",
            Self::AgentFailed => "agent_failed",
            Self::ProtocolViolation => "protocol_violation",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of streamed output visible to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    Working {
        message: String,
    },
    ContentChunk {
        text: String,
        content_type: String,
    },
    Completed {
        message: String,
    },
    Failed {
        reason: FailureReason,
        detail: String,
    },
}

impl Event {
    pub fn working(message: impl Into<String>) -> Self {
        Self::Working {
            message: message.into(),
        }
    }

    pub fn content_chunk(text: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self::ContentChunk {
            text: text.into(),
            content_type: content_type.into(),
        }
    }

    pub fn completed(message: impl Into<String>) -> Self {
        Self::Completed {
            message: message.into(),
        }
    }

    pub fn failed(reason: FailureReason, detail: impl Into<String>) -> Self {
        Self::Failed {
            reason,
            detail: detail.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }

    /// Event name used on the wire (SSE `event:` field)
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Working { .. } => "working",
            Self::ContentChunk { .. } => "content_chunk",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Downstream agent vocabulary, as produced by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawDownstreamEvent {
    StatusUpdate(String),
    ContentChunk { text: String, content_type: String },
    TerminalSuccess(String),
    TerminalFailure { reason: FailureReason, detail: String },
}

impl RawDownstreamEvent {
    pub fn failure(reason: FailureReason, detail: impl Into<String>) -> Self {
        Self::TerminalFailure {
            reason,
            detail: detail.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::TerminalSuccess(_) | Self::TerminalFailure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_default() {
        assert_ne!(TaskId::default(), TaskId::default());
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let query = Query::new("q", "s1").with_credential("Bearer abc123");
        let rendered = format!("{:?}", query);
        assert!(!rendered.contains("abc123"));
        assert!(rendered.contains("<redacted>"));
        assert_eq!(
            query.credential.as_ref().map(Credential::expose),
            Some("Bearer abc123")
        );
    }

    #[test]
    fn test_task_state_transitions() {
        use TaskState::*;
        assert!(Created.can_transition_to(Selecting));
        assert!(Selecting.can_transition_to(Failed));
        assert!(Streaming.can_transition_to(Streaming));
        assert!(!Created.can_transition_to(Delegating));
        assert!(!Selecting.can_transition_to(Streaming));
        for terminal in [Completed, Failed] {
            assert!(terminal.is_terminal());
            for next in [Created, Selecting, Delegating, Streaming, Completed, Failed] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_task_rejects_illegal_transition() {
        let mut task = Task::new("s1");
        assert!(!task.transition(TaskState::Streaming));
        assert_eq!(task.state(), TaskState::Created);
        assert!(task.transition(TaskState::Selecting));
        assert_eq!(task.state(), TaskState::Selecting);
    }

    #[test]
    fn test_capability_url() {
        let agent = AgentDescriptor::new("widgets", "http://localhost:10020/")
            .with_capability_endpoint("/.well-known/agent.json");
        assert_eq!(
            agent.capability_url().as_deref(),
            Some("http://localhost:10020/.well-known/agent.json")
        );

        let absolute = AgentDescriptor::new("widgets", "http://a")
            .with_capability_endpoint("https://cards.example.com/widgets.json");
        assert_eq!(
            absolute.capability_url().as_deref(),
            Some("https://cards.example.com/widgets.json")
        );

        assert!(AgentDescriptor::new("w", "http://a").capability_url().is_none());
    }

    #[test]
    fn test_event_serialization() {
        let event = Event::failed(FailureReason::ConfigurationError, "no valid agents registered");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "failed");
        assert_eq!(json["reason"], "ConfigurationError");

        let chunk = Event::content_chunk("Force is 10N", "text/plain");
        assert_eq!(chunk.kind(), "content_chunk");
        assert!(!chunk.is_terminal());
        assert_eq!(
            serde_json::to_value(&chunk).unwrap()["content_type"],
            "text/plain"
        );
    }

    #[test]
    fn test_failure_reason_strings() {
        assert_eq!(FailureReason::Timeout.to_string(), "timeout");
        assert_eq!(
            serde_json::to_value(FailureReason::ConnectionDropped).unwrap(),
            "connection_dropped"
        );
    }
}
