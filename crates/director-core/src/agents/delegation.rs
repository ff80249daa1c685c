//! Delegation Client
//!
//! Opens a streamed task on the selected agent through a `DownstreamTransport`
//! and guards the resulting sequence:
//! - a read timeout between two downstream events
//! - an optional ceiling on the whole exchange
//! - the sequence ends right after a failure marker
//!
//! Timeouts surface as `TerminalFailure(timeout)` markers, never as errors.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::transport::{DownstreamTransport, RawEventStream};
use super::types::{AgentDescriptor, FailureReason, Query, RawDownstreamEvent};
use crate::config::DelegationConfig;

/// Sends one query to one agent and exposes the reply as a lazy sequence
#[derive(Clone)]
pub struct DelegationClient {
    transport: Arc<dyn DownstreamTransport>,
    read_timeout: Option<Duration>,
    stream_timeout: Option<Duration>,
}

impl DelegationClient {
    pub fn new(transport: Arc<dyn DownstreamTransport>, config: &DelegationConfig) -> Self {
        Self {
            transport,
            read_timeout: Some(config.read_timeout_secs)
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            stream_timeout: config
                .stream_timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }

    /// Override the timeouts (tests use sub-second values)
    pub fn with_timeouts(mut self, read: Option<Duration>, stream: Option<Duration>) -> Self {
        self.read_timeout = read;
        self.stream_timeout = stream;
        self
    }

    /// Delegate `query` to `agent`.
    ///
    /// The returned sequence is lazy: the transport only starts the network
    /// exchange when it is first polled.
    pub fn delegate(&self, agent: &AgentDescriptor, query: &Query) -> RawEventStream {
        info!(
            agent_id = %agent.id,
            session_id = %query.session_id,
            "Delegating query to {}",
            agent.base_url
        );

        let raw = self.transport.open_task(agent, query);
        let deadline = self.stream_timeout.map(|limit| Instant::now() + limit);
        let read_timeout = self.read_timeout;
        let agent_id = agent.id.clone();

        // State: the downstream sequence and whether it already reported success.
        // Timeouts stop applying once the exchange has succeeded.
        stream::unfold(Some((raw, false)), move |state| {
            let agent_id = agent_id.clone();
            async move {
                let (mut raw, succeeded) = state?;

                let (wait, ceiling_bound) = if succeeded {
                    (None, false)
                } else {
                    next_wait(read_timeout, deadline)
                };
                let next = match wait {
                    Some(wait) => match tokio::time::timeout(wait, raw.next()).await {
                        Ok(next) => next,
                        Err(_) => {
                            let detail = if ceiling_bound {
                                "downstream exchange exceeded its time limit".to_string()
                            } else {
                                format!("no downstream event within {}s", wait.as_secs_f32())
                            };
                            warn!(agent_id = %agent_id, "{}", detail);
                            return Some((
                                RawDownstreamEvent::failure(FailureReason::Timeout, detail),
                                None,
                            ));
                        }
                    },
                    None => raw.next().await,
                };

                match next {
                    Some(event @ RawDownstreamEvent::TerminalFailure { .. }) => {
                        debug!(agent_id = %agent_id, "Downstream failure marker, closing stream");
                        Some((event, None))
                    }
                    Some(event) => {
                        let succeeded = succeeded || event.is_terminal();
                        Some((event, Some((raw, succeeded))))
                    }
                    None => None,
                }
            }
        })
        .boxed()
    }
}

/// How long to wait for the next event, and whether the exchange ceiling is
/// the binding limit.
fn next_wait(read_timeout: Option<Duration>, deadline: Option<Instant>) -> (Option<Duration>, bool) {
    let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
    match (read_timeout, remaining) {
        (Some(read), Some(rest)) if rest <= read => (Some(rest), true),
        (Some(read), _) => (Some(read), false),
        (None, Some(rest)) => (Some(rest), true),
        (None, None) => (None, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::ScriptedTransport;

    fn agent() -> AgentDescriptor {
        AgentDescriptor::new("widgets", "http://widgets")
    }

    #[tokio::test]
    async fn test_delegate_passes_events_through() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            RawDownstreamEvent::StatusUpdate("thinking".into()),
            RawDownstreamEvent::TerminalSuccess("done".into()),
        ]));
        let client = DelegationClient::new(transport.clone(), &DelegationConfig::default());

        let events: Vec<_> = client
            .delegate(&agent(), &Query::new("q", "s1"))
            .collect()
            .await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[1], RawDownstreamEvent::TerminalSuccess("done".into()));
        assert!(transport.probe().is_closed());
    }

    #[tokio::test]
    async fn test_delegate_forwards_credential() {
        let transport = Arc::new(ScriptedTransport::new(vec![]));
        let client = DelegationClient::new(transport.clone(), &DelegationConfig::default());

        let query = Query::new("q", "s1").with_credential("Bearer abc123");
        let _ = client.delegate(&agent(), &query).collect::<Vec<_>>().await;

        let opened = transport.opened();
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].credential.as_deref(), Some("Bearer abc123"));
        assert_eq!(opened[0].session_id, "s1");
    }

    #[tokio::test]
    async fn test_delegate_stops_after_failure_marker() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            RawDownstreamEvent::failure(FailureReason::AgentFailed, "boom"),
            RawDownstreamEvent::StatusUpdate("ignored".into()),
        ]));
        let client = DelegationClient::new(transport.clone(), &DelegationConfig::default());

        let events: Vec<_> = client
            .delegate(&agent(), &Query::new("q", "s1"))
            .collect()
            .await;

        assert_eq!(
            events,
            vec![RawDownstreamEvent::failure(FailureReason::AgentFailed, "boom")]
        );
    }

    #[tokio::test]
    async fn test_delegate_read_timeout() {
        let transport = Arc::new(
            ScriptedTransport::new(vec![RawDownstreamEvent::StatusUpdate("thinking".into())])
                .then_hang(),
        );
        let client = DelegationClient::new(transport.clone(), &DelegationConfig::default())
            .with_timeouts(Some(Duration::from_millis(20)), None);

        let events: Vec<_> = client
            .delegate(&agent(), &Query::new("q", "s1"))
            .collect()
            .await;

        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[1],
            RawDownstreamEvent::TerminalFailure {
                reason: FailureReason::Timeout,
                ..
            }
        ));
        assert!(transport.probe().is_closed());
    }

    #[tokio::test]
    async fn test_delegate_stream_ceiling() {
        let transport = Arc::new(ScriptedTransport::new(vec![]).then_hang());
        let client = DelegationClient::new(transport, &DelegationConfig::default())
            .with_timeouts(Some(Duration::from_secs(60)), Some(Duration::from_millis(20)));

        let events: Vec<_> = client
            .delegate(&agent(), &Query::new("q", "s1"))
            .collect()
            .await;

        match &events[..] {
            [RawDownstreamEvent::TerminalFailure { reason, detail }] => {
                assert_eq!(*reason, FailureReason::Timeout);
                assert!(detail.contains("time limit"));
            }
            other => panic!("unexpected events: {:?}", other),
        }
    }

    #[test]
    fn test_next_wait() {
        assert_eq!(next_wait(None, None), (None, false));
        assert_eq!(
            next_wait(Some(Duration::from_secs(5)), None),
            (Some(Duration::from_secs(5)), false)
        );
        let (wait, bound) = next_wait(
            Some(Duration::from_secs(5)),
            Some(Instant::now() + Duration::from_secs(1)),
        );
        assert!(bound);
        assert!(wait.unwrap() <= Duration::from_secs(1));
    }
}
