//! director-api: HTTP API for the director
//!
//! Exposes the orchestrator over HTTP: a Server-Sent Events streaming
//! endpoint, the A2A JSON-RPC endpoint, the agent card, and a health check.
//! Built with axum.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod rpc;
pub mod server;

pub use error::{ApiError, Result};
pub use server::{app, director_card, start_server, AppState};
