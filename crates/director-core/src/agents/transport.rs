//! Downstream transport interface
//!
//! A transport turns "send this query to that agent" into a lazy sequence of
//! raw downstream events. Nothing touches the network until the sequence is
//! first polled, and dropping the sequence releases the connection.
//!
//! Failures are values: a transport never errors out of `open_task`, it
//! yields a `RawDownstreamEvent::TerminalFailure` marker and ends.

use futures::stream::BoxStream;

use super::types::{AgentDescriptor, Query, RawDownstreamEvent};

/// Lazy, forward-only sequence of downstream events
pub type RawEventStream = BoxStream<'static, RawDownstreamEvent>;

/// Wire-level collaborator used by the delegation client
pub trait DownstreamTransport: Send + Sync + 'static {
    /// Open a streamed task on `agent` for `query`.
    ///
    /// The query credential, when present, must be attached at the transport
    /// level and must not leak into logs or event payloads.
    fn open_task(&self, agent: &AgentDescriptor, query: &Query) -> RawEventStream;
}
