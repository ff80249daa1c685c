//! Agent-to-agent (A2A) protocol support
//!
//! - `types`: JSON-RPC envelopes, messages, stream results, agent cards
//! - `client`: the streaming `DownstreamTransport`

mod client;
mod types;

pub use client::A2aTransport;
pub use types::*;
