//! Route definitions
//!
//! Defines all HTTP API endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{agent_card, health, invoke, stream};
use crate::rpc::rpc;
use crate::server::AppState;

/// Create the API router
pub fn routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(health))
        // Agent card
        .route("/.well-known/agent.json", get(agent_card))
        // A2A JSON-RPC at the card URL
        .route("/", post(rpc))
        // Streaming query
        .route("/api/stream", post(stream))
        // Synchronous query (unsupported)
        .route("/api/invoke", post(invoke))
}
