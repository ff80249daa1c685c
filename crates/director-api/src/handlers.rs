//! HTTP API handlers
//!
//! Streaming is exposed as Server-Sent Events: one SSE event per director
//! event, named after its kind, with the event as JSON payload.

use axum::extract::State;
use axum::response::sse::{Event as SseEvent, KeepAlive, KeepAliveStream, Sse};
use axum::Json;
use futures::stream::{BoxStream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use tracing::{debug, info};

use director_core::a2a::AgentCard;
use director_core::{Event, Query};

use crate::error::{ApiError, Result};
use crate::middleware::ForwardedCredential;
use crate::server::AppState;

// ============================================================================
// Request types
// ============================================================================

/// Body of `/api/stream`
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    /// Conversation id, generated when absent
    #[serde(default)]
    pub session_id: Option<String>,
}

impl QueryRequest {
    fn into_query(self, credential: ForwardedCredential) -> Result<Query> {
        if self.query.trim().is_empty() {
            return Err(ApiError::InvalidRequest("query must not be empty".to_string()));
        }

        let session_id = self
            .session_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut query = Query::new(self.query, session_id);
        query.credential = credential.into_inner();
        Ok(query)
    }
}

pub type SseStream = BoxStream<'static, std::result::Result<SseEvent, Infallible>>;

// ============================================================================
// Handler functions
// ============================================================================

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

/// The director's own agent card
pub async fn agent_card(State(state): State<AppState>) -> Json<AgentCard> {
    Json(state.card.as_ref().clone())
}

/// Streaming endpoint
pub async fn stream(
    State(state): State<AppState>,
    credential: ForwardedCredential,
    Json(req): Json<QueryRequest>,
) -> Result<Sse<KeepAliveStream<SseStream>>> {
    let query = req.into_query(credential)?;
    info!(session_id = %query.session_id, "Stream request");

    let events = state
        .director
        .stream(query)
        .map(|event| Ok(to_sse(&event)))
        .boxed();

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Synchronous endpoint: always 501, whatever the body
pub async fn invoke() -> ApiError {
    debug!("Synchronous invoke requested");
    ApiError::NotSupported(
        "Synchronous invocation is not supported. Use /api/stream instead.".to_string(),
    )
}

fn to_sse(event: &Event) -> SseEvent {
    SseEvent::default()
        .event(event.kind())
        .json_data(event)
        .unwrap_or_else(|e| {
            let fallback = serde_json::json!({
                "kind": "failed",
                "reason": "protocol_violation",
                "detail": e.to_string(),
            });
            SseEvent::default().event("failed").data(fallback.to_string())
        })
}
