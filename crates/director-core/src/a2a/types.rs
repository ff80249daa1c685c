//! Agent-to-agent JSON-RPC wire types
//!
//! Only the subset needed for `message/stream` and agent cards is modelled,
//! in both directions. Unknown fields are ignored so newer agents stay readable.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";
pub const METHOD_MESSAGE_STREAM: &str = "message/stream";
pub const METHOD_MESSAGE_SEND: &str = "message/send";

// Standard JSON-RPC and A2A error codes
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
pub const UNSUPPORTED_OPERATION: i64 = -32004;

/// JSON-RPC 2.0 request envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest<P> {
    pub jsonrpc: String,
    /// String or number; echoed back in every response
    #[serde(default)]
    pub id: Value,
    pub method: String,
    pub params: P,
}

impl<P> JsonRpcRequest<P> {
    pub fn new(method: impl Into<String>, params: P) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Value::String(uuid::Uuid::new_v4().to_string()),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 response envelope, one per SSE `data:` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<StreamResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

fn jsonrpc_version() -> String {
    JSONRPC_VERSION.to_string()
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: StreamResult) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id: Some(id),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

/// Message part. Non-text parts are carried but never rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Part {
    Text { text: String },
    File { file: Value },
    Data { data: Value },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Concatenated text of a part list
pub fn parts_text(parts: &[Part]) -> String {
    parts.iter().filter_map(Part::as_text).collect::<Vec<_>>().join("")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

impl Message {
    /// User message with one text part and a fresh message id
    pub fn user_text(text: impl Into<String>, context_id: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::text(text)],
            message_id: uuid::Uuid::new_v4().simple().to_string(),
            context_id: Some(context_id.into()),
            task_id: None,
        }
    }

    /// Agent reply with one text part, bound to a task
    pub fn agent_text(
        text: impl Into<String>,
        context_id: impl Into<String>,
        task_id: impl Into<String>,
    ) -> Self {
        Self {
            role: Role::Agent,
            parts: vec![Part::text(text)],
            message_id: uuid::Uuid::new_v4().simple().to_string(),
            context_id: Some(context_id.into()),
            task_id: Some(task_id.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageSendParams {
    pub message: Message,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    Submitted,
    Working,
    InputRequired,
    Completed,
    Canceled,
    Failed,
    Rejected,
    AuthRequired,
    #[serde(other)]
    Unknown,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Working => "working",
            Self::InputRequired => "input-required",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
            Self::Failed => "failed",
            Self::Rejected => "rejected",
            Self::AuthRequired => "auth-required",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
}

impl TaskStatus {
    pub fn new(state: TaskState) -> Self {
        Self { state, message: None }
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.message = Some(message);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    #[serde(default)]
    pub artifact_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub parts: Vec<Part>,
}

/// `result` of one streamed JSON-RPC response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StreamResult {
    #[serde(rename_all = "camelCase")]
    Task {
        id: String,
        #[serde(default)]
        context_id: Option<String>,
        status: TaskStatus,
    },
    #[serde(rename_all = "camelCase")]
    StatusUpdate {
        #[serde(default)]
        task_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context_id: Option<String>,
        status: TaskStatus,
        #[serde(default, rename = "final")]
        is_final: bool,
    },
    #[serde(rename_all = "camelCase")]
    ArtifactUpdate {
        #[serde(default)]
        task_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context_id: Option<String>,
        artifact: Artifact,
        #[serde(default)]
        last_chunk: Option<bool>,
    },
    Message(Message),
}

/// Capabilities advertised by an agent card
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub push_notifications: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSkill {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub examples: Vec<String>,
}

/// Self-description an agent publishes at `/.well-known/agent.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub default_input_modes: Vec<String>,
    #[serde(default)]
    pub default_output_modes: Vec<String>,
    #[serde(default)]
    pub capabilities: AgentCapabilities,
    #[serde(default)]
    pub skills: Vec<AgentSkill>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = JsonRpcRequest::new(
            METHOD_MESSAGE_STREAM,
            MessageSendParams {
                message: Message::user_text("What is widget 1?", "s1"),
            },
        );

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["method"], "message/stream");
        assert_eq!(json["params"]["message"]["role"], "user");
        assert_eq!(json["params"]["message"]["contextId"], "s1");
        assert_eq!(json["params"]["message"]["parts"][0]["kind"], "text");
        assert_eq!(json["params"]["message"]["parts"][0]["text"], "What is widget 1?");
        assert!(json["params"]["message"]["messageId"].is_string());
    }

    #[test]
    fn test_status_update_deserialization() {
        let json = r#"{
            "jsonrpc": "2.0",
            "id": "1",
            "result": {
                "kind": "status-update",
                "taskId": "t1",
                "contextId": "s1",
                "final": false,
                "status": {
                    "state": "working",
                    "message": {
                        "kind": "message",
                        "role": "agent",
                        "messageId": "m1",
                        "parts": [{"kind": "text", "text": "Processing request..."}]
                    }
                }
            }
        }"#;

        let response: JsonRpcResponse = serde_json::from_str(json).unwrap();
        match response.result {
            Some(StreamResult::StatusUpdate { status, is_final, .. }) => {
                assert_eq!(status.state, TaskState::Working);
                assert!(!is_final);
                let message = status.message.unwrap();
                assert_eq!(parts_text(&message.parts), "Processing request...");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_artifact_update_and_unknown_state() {
        let json = r#"{
            "kind": "artifact-update",
            "taskId": "t1",
            "lastChunk": true,
            "artifact": {
                "artifactId": "a1",
                "name": "current_result",
                "parts": [{"kind": "text", "text": "Force is 10N"}]
            }
        }"#;
        let result: StreamResult = serde_json::from_str(json).unwrap();
        assert!(matches!(result, StreamResult::ArtifactUpdate { last_chunk: Some(true), .. }));

        let state: TaskState = serde_json::from_str("\"paused-forever\"").unwrap();
        assert_eq!(state, TaskState::Unknown);
        let state: TaskState = serde_json::from_str("\"input-required\"").unwrap();
        assert_eq!(state.as_str(), "input-required");
    }

    #[test]
    fn test_response_serialization() {
        let status = TaskStatus::new(TaskState::Working)
            .with_message(Message::agent_text("thinking", "s1", "t1"));
        let result = StreamResult::StatusUpdate {
            task_id: Some("t1".to_string()),
            context_id: Some("s1".to_string()),
            status,
            is_final: false,
        };

        let json = serde_json::to_value(JsonRpcResponse::success(Value::from(7), result)).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["id"], 7);
        assert!(json.get("error").is_none());
        assert_eq!(json["result"]["kind"], "status-update");
        assert_eq!(json["result"]["final"], false);
        assert_eq!(json["result"]["status"]["message"]["role"], "agent");
        assert_eq!(json["result"]["status"]["message"]["taskId"], "t1");

        let json = serde_json::to_value(JsonRpcResponse::failure(
            Value::Null,
            METHOD_NOT_FOUND,
            "Method not found",
        ))
        .unwrap();
        assert_eq!(json["error"]["code"], -32601);
        assert!(json.get("result").is_none());
    }

    #[test]
    fn test_request_accepts_numeric_id() {
        let request: JsonRpcRequest<Value> = serde_json::from_str(
            r#"{"jsonrpc": "2.0", "id": 3, "method": "message/stream", "params": {}}"#,
        )
        .unwrap();
        assert_eq!(request.id, Value::from(3));
    }

    #[test]
    fn test_agent_card_roundtrip_fields() {
        let json = r#"{
            "name": "Widgets Agent",
            "url": "http://localhost:10020/",
            "version": "1.0.0",
            "capabilities": {"streaming": true},
            "defaultInputModes": ["text"],
            "defaultOutputModes": ["text"],
            "skills": [{"id": "widgets", "name": "Widgets"}]
        }"#;
        let card: AgentCard = serde_json::from_str(json).unwrap();
        assert!(card.capabilities.streaming);
        assert_eq!(card.skills[0].id, "widgets");
    }
}
