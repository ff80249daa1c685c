//! A2A JSON-RPC endpoint
//!
//! Serves `message/stream` at the URL advertised in the agent card, so other
//! agents can delegate to the director the same way it delegates to them.
//!
//! Director events become A2A stream results:
//! - `working` and `content_chunk` map to non-final `working` status updates
//! - `completed` maps to a `current_result` artifact and a final `completed` status
//! - `failed` maps to a final `failed` status carrying the reason

use axum::body::Bytes;
use axum::extract::State;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::convert::Infallible;
use tracing::{debug, info, warn};

use director_core::a2a::*;
use director_core::{Event, Query};

use crate::handlers::SseStream;
use crate::middleware::ForwardedCredential;
use crate::server::AppState;

const RESULT_ARTIFACT: &str = "current_result";

/// Ids binding every stream result to one task
#[derive(Debug, Clone)]
struct TaskIds {
    task_id: String,
    context_id: String,
}

impl TaskIds {
    fn snapshot(&self) -> StreamResult {
        StreamResult::Task {
            id: self.task_id.clone(),
            context_id: Some(self.context_id.clone()),
            status: TaskStatus::new(TaskState::Submitted),
        }
    }

    fn status(&self, state: TaskState, text: Option<String>, is_final: bool) -> StreamResult {
        let mut status = TaskStatus::new(state);
        if let Some(text) = text {
            status = status.with_message(Message::agent_text(
                text,
                self.context_id.clone(),
                self.task_id.clone(),
            ));
        }

        StreamResult::StatusUpdate {
            task_id: Some(self.task_id.clone()),
            context_id: Some(self.context_id.clone()),
            status,
            is_final,
        }
    }

    fn results(&self, event: Event) -> Vec<StreamResult> {
        match event {
            Event::Working { message } => vec![self.status(TaskState::Working, Some(message), false)],
            Event::ContentChunk { text, .. } => {
                vec![self.status(TaskState::Working, Some(text), false)]
            }
            Event::Completed { message } => vec![
                StreamResult::ArtifactUpdate {
                    task_id: Some(self.task_id.clone()),
                    context_id: Some(self.context_id.clone()),
                    artifact: Artifact {
                        artifact_id: uuid::Uuid::new_v4().to_string(),
                        name: Some(RESULT_ARTIFACT.to_string()),
                        parts: vec![Part::text(message)],
                    },
                    last_chunk: Some(true),
                },
                self.status(TaskState::Completed, None, true),
            ],
            Event::Failed { reason, detail } => vec![self.status(
                TaskState::Failed,
                Some(format!("{}: {}", reason, detail)),
                true,
            )],
        }
    }
}

fn rpc_error(id: Value, code: i64, message: impl Into<String>) -> Response {
    let message = message.into();
    debug!(code, "JSON-RPC error: {}", message);
    Json(JsonRpcResponse::failure(id, code, message)).into_response()
}

/// Query carried by `message/send` and `message/stream` params
fn query_from_params(params: Value, credential: ForwardedCredential) -> Result<(Query, TaskIds), String> {
    let params: MessageSendParams =
        serde_json::from_value(params).map_err(|e| format!("Invalid message params: {}", e))?;
    let message = params.message;

    let text = parts_text(&message.parts);
    if text.trim().is_empty() {
        return Err("message has no text part".to_string());
    }

    let ids = TaskIds {
        task_id: message
            .task_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        context_id: message
            .context_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
    };

    let mut query = Query::new(text, ids.context_id.clone());
    query.credential = credential.into_inner();
    Ok((query, ids))
}

/// JSON-RPC entry point at the card URL
pub async fn rpc(
    State(state): State<AppState>,
    credential: ForwardedCredential,
    body: Bytes,
) -> Response {
    let raw: Value = match serde_json::from_slice(&body) {
        Ok(raw) => raw,
        Err(e) => return rpc_error(Value::Null, PARSE_ERROR, format!("Parse error: {}", e)),
    };
    let id = raw.get("id").cloned().unwrap_or(Value::Null);
    let request: JsonRpcRequest<Value> = match serde_json::from_value(raw) {
        Ok(request) => request,
        Err(e) => return rpc_error(id, INVALID_REQUEST, format!("Invalid request: {}", e)),
    };

    match request.method.as_str() {
        METHOD_MESSAGE_STREAM => {}
        METHOD_MESSAGE_SEND => {
            return match query_from_params(request.params, credential) {
                Ok((query, _)) => match state.director.invoke(&query) {
                    Ok(event) => rpc_error(
                        request.id,
                        UNSUPPORTED_OPERATION,
                        format!("unexpected synchronous result: {}", event.kind()),
                    ),
                    Err(e) => rpc_error(request.id, UNSUPPORTED_OPERATION, e.to_string()),
                },
                Err(message) => rpc_error(request.id, INVALID_PARAMS, message),
            };
        }
        other => {
            return rpc_error(request.id, METHOD_NOT_FOUND, format!("Method not found: {}", other));
        }
    }

    let (query, ids) = match query_from_params(request.params, credential) {
        Ok(parsed) => parsed,
        Err(message) => return rpc_error(request.id, INVALID_PARAMS, message),
    };
    info!(task_id = %ids.task_id, session_id = %query.session_id, "A2A message/stream request");

    let snapshot = ids.snapshot();
    let rpc_id = request.id;
    let results = stream::iter([snapshot])
        .chain(
            state
                .director
                .stream(query)
                .flat_map(move |event| stream::iter(ids.results(event))),
        )
        .map(move |result| Ok::<_, Infallible>(to_sse(JsonRpcResponse::success(rpc_id.clone(), result))));

    let events: SseStream = results.boxed();
    Sse::new(events).keep_alive(KeepAlive::default()).into_response()
}

fn to_sse(response: JsonRpcResponse) -> SseEvent {
    SseEvent::default().json_data(&response).unwrap_or_else(|e| {
        warn!("Failed to encode stream result: {}", e);
        let fallback = JsonRpcResponse::failure(
            response.id.unwrap_or(Value::Null),
            INTERNAL_ERROR,
            "failed to encode stream result",
        );
        SseEvent::default().data(serde_json::to_string(&fallback).unwrap_or_default())
    })
}
