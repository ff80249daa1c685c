//! A2A streaming transport
//!
//! Sends `message/stream` to a downstream agent and decodes the SSE reply
//! into raw downstream events. The HTTP exchange starts on first poll and the
//! response body is released when the returned sequence is dropped.
//!
//! Agents that answer with a single `application/json` JSON-RPC body (typically
//! an error) are read as one response.

use eventsource_stream::{EventStreamError, Eventsource};
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::types::*;
use crate::agents::registry::AgentRegistry;
use crate::agents::transport::{DownstreamTransport, RawEventStream};
use crate::agents::types::{AgentDescriptor, FailureReason, Query, RawDownstreamEvent};
use crate::config::DelegationConfig;
use crate::error::{Error, Result};

const CARD_TIMEOUT: Duration = Duration::from_secs(10);
const EVENT_STREAM: &str = "text/event-stream";

/// `DownstreamTransport` speaking A2A JSON-RPC over HTTP
#[derive(Clone)]
pub struct A2aTransport {
    client: Client,
}

impl A2aTransport {
    pub fn new(config: &DelegationConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs.max(1)))
            .build()
            .map_err(Error::Http)?;

        Ok(Self { client })
    }

    /// Fetch the agent card from the agent's capability endpoint.
    ///
    /// Returns `None` when the agent declares no endpoint.
    pub async fn fetch_agent_card(&self, agent: &AgentDescriptor) -> Result<Option<AgentCard>> {
        let Some(url) = agent.capability_url() else {
            return Ok(None);
        };

        debug!(agent_id = %agent.id, "Fetching agent card from {}", url);

        let response = self.client.get(&url).timeout(CARD_TIMEOUT).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Delegation(format!(
                "agent card request for '{}' returned {}",
                agent.id, status
            )));
        }

        let card = response.json::<AgentCard>().await?;
        Ok(Some(card))
    }

    /// Log reachability of every registered agent. Never fails.
    pub async fn probe_agents(&self, registry: &AgentRegistry) {
        for agent in registry.iter() {
            match self.fetch_agent_card(agent).await {
                Ok(Some(card)) => info!(
                    agent_id = %agent.id,
                    "Agent '{}' reachable (streaming: {})",
                    card.name,
                    card.capabilities.streaming
                ),
                Ok(None) => debug!(agent_id = %agent.id, "No capability endpoint, skipping probe"),
                Err(e) => warn!(agent_id = %agent.id, "Agent card probe failed: {}", e),
            }
        }
    }
}

impl DownstreamTransport for A2aTransport {
    fn open_task(&self, agent: &AgentDescriptor, query: &Query) -> RawEventStream {
        let client = self.client.clone();
        let url = agent.base_url.clone();
        let agent_id = agent.id.clone();
        let request = JsonRpcRequest::new(
            METHOD_MESSAGE_STREAM,
            MessageSendParams {
                message: Message::user_text(query.text.clone(), query.session_id.clone()),
            },
        );
        let authorization = query.credential.as_ref().map(|c| HeaderValue::from_str(c.expose()));

        let connect = async move {
            let mut builder = client.post(&url).header(ACCEPT, EVENT_STREAM).json(&request);

            match authorization {
                Some(Ok(mut value)) => {
                    value.set_sensitive(true);
                    builder = builder.header(AUTHORIZATION, value);
                }
                Some(Err(_)) => {
                    return Err(RawDownstreamEvent::failure(
                        FailureReason::ConnectFailed,
                        "credential is not a valid header value",
                    ));
                }
                None => {}
            }

            debug!(agent_id = %agent_id, "POST message/stream to {}", url);

            let response = builder.send().await.map_err(|e| {
                let reason = if e.is_timeout() {
                    FailureReason::Timeout
                } else {
                    FailureReason::ConnectFailed
                };
                warn!(agent_id = %agent_id, "Downstream request failed: {}", e);
                RawDownstreamEvent::failure(reason, format!("could not reach agent '{}'", agent_id))
            })?;

            let status = response.status();
            if !status.is_success() {
                warn!(agent_id = %agent_id, "Downstream returned {}", status);
                return Err(RawDownstreamEvent::failure(
                    FailureReason::ConnectFailed,
                    format!("agent '{}' returned HTTP {}", agent_id, status.as_u16()),
                ));
            }

            if !is_event_stream(&response) {
                let events = single_reply(response, &agent_id).await;
                return Ok(stream::iter(events).boxed());
            }

            let events = response.bytes_stream().eventsource().boxed();
            Ok::<RawEventStream, RawDownstreamEvent>(decode_event_stream(events, agent_id))
        };

        stream::once(connect)
            .flat_map(|outcome| match outcome {
                Ok(events) => events,
                Err(failure) => stream::iter(vec![failure]).boxed(),
            })
            .boxed()
    }
}

fn is_event_stream(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with(EVENT_STREAM))
}

fn malformed_payload(agent_id: &str, e: serde_json::Error) -> RawDownstreamEvent {
    warn!(agent_id = %agent_id, "Malformed payload: {}", e);
    RawDownstreamEvent::failure(
        FailureReason::ProtocolViolation,
        "agent sent a malformed payload",
    )
}

/// Read a non-streamed JSON-RPC reply as one response
async fn single_reply(response: Response, agent_id: &str) -> Vec<RawDownstreamEvent> {
    let body = match response.bytes().await {
        Ok(body) => body,
        Err(e) => {
            warn!(agent_id = %agent_id, "Downstream reply broke: {}", e);
            let reason = if e.is_timeout() {
                FailureReason::Timeout
            } else {
                FailureReason::ConnectionDropped
            };
            return vec![RawDownstreamEvent::failure(reason, "downstream connection lost mid-reply")];
        }
    };

    let response = match serde_json::from_slice::<JsonRpcResponse>(&body) {
        Ok(response) => response,
        Err(e) => return vec![malformed_payload(agent_id, e)],
    };

    match map_response(response) {
        Some(event) if event.is_terminal() => vec![event],
        // A whole answer delivered without streaming
        Some(RawDownstreamEvent::ContentChunk { text, .. }) => {
            vec![RawDownstreamEvent::TerminalSuccess(text)]
        }
        _ => vec![RawDownstreamEvent::failure(
            FailureReason::ProtocolViolation,
            "agent replied without a terminal result",
        )],
    }
}

type SseStream =
    BoxStream<'static, std::result::Result<eventsource_stream::Event, EventStreamError<reqwest::Error>>>;

struct BodyState {
    events: SseStream,
    seen_terminal: bool,
    finished: bool,
    agent_id: String,
}

/// Decoding continues past a terminal event so trailing events stay visible
/// to the lifecycle.
fn decode_event_stream(events: SseStream, agent_id: String) -> RawEventStream {
    let state = BodyState {
        events,
        seen_terminal: false,
        finished: false,
        agent_id,
    };

    stream::unfold(state, |mut state| async move {
        if state.finished {
            return None;
        }

        loop {
            let event = match state.events.next().await {
                Some(Ok(message)) => {
                    if message.data.trim().is_empty() {
                        continue;
                    }
                    let mapped = match serde_json::from_str::<JsonRpcResponse>(&message.data) {
                        Ok(response) => map_response(response),
                        Err(e) => Some(malformed_payload(&state.agent_id, e)),
                    };
                    match mapped {
                        Some(event) => event,
                        None => continue,
                    }
                }
                Some(Err(EventStreamError::Transport(e))) => {
                    state.finished = true;
                    if state.seen_terminal {
                        return None;
                    }
                    warn!(agent_id = %state.agent_id, "Downstream stream broke: {}", e);
                    let reason = if e.is_timeout() {
                        FailureReason::Timeout
                    } else {
                        FailureReason::ConnectionDropped
                    };
                    RawDownstreamEvent::failure(reason, "downstream connection lost mid-stream")
                }
                Some(Err(e)) => {
                    state.finished = true;
                    warn!(agent_id = %state.agent_id, "Undecodable event stream: {}", e);
                    RawDownstreamEvent::failure(
                        FailureReason::ProtocolViolation,
                        "agent sent an undecodable event stream",
                    )
                }
                None => {
                    state.finished = true;
                    if state.seen_terminal {
                        return None;
                    }
                    RawDownstreamEvent::failure(
                        FailureReason::ConnectionDropped,
                        "downstream stream ended before a terminal result",
                    )
                }
            };

            if event.is_terminal() {
                state.seen_terminal = true;
            }
            return Some((event, state));
        }
    })
    .boxed()
}

/// Map one JSON-RPC response to the raw vocabulary. `None` = nothing to report.
fn map_response(response: JsonRpcResponse) -> Option<RawDownstreamEvent> {
    if let Some(error) = response.error {
        return Some(RawDownstreamEvent::failure(
            FailureReason::AgentFailed,
            format!("agent error {}: {}", error.code, error.message),
        ));
    }

    match response.result? {
        StreamResult::Task { .. } => None,
        StreamResult::StatusUpdate { status, .. } => {
            let text = status
                .message
                .as_ref()
                .map(|m| parts_text(&m.parts))
                .unwrap_or_default();

            match status.state {
                TaskState::Submitted | TaskState::Working => {
                    let text = if text.is_empty() {
                        status.state.as_str().to_string()
                    } else {
                        text
                    };
                    Some(RawDownstreamEvent::StatusUpdate(text))
                }
                TaskState::Completed => Some(RawDownstreamEvent::TerminalSuccess(text)),
                TaskState::Failed
                | TaskState::Rejected
                | TaskState::Canceled
                | TaskState::InputRequired
                | TaskState::AuthRequired => {
                    let detail = if text.is_empty() {
                        format!("agent reported {}", status.state.as_str())
                    } else {
                        format!("agent reported {}: {}", status.state.as_str(), text)
                    };
                    Some(RawDownstreamEvent::failure(FailureReason::AgentFailed, detail))
                }
                TaskState::Unknown => {
                    debug!("Ignoring status update with unknown state");
                    None
                }
            }
        }
        StreamResult::ArtifactUpdate { artifact, .. } => {
            let text = parts_text(&artifact.parts);
            (!text.is_empty()).then(|| RawDownstreamEvent::ContentChunk {
                text,
                content_type: "text/plain".to_string(),
            })
        }
        StreamResult::Message(message) => {
            let text = parts_text(&message.parts);
            (!text.is_empty()).then(|| RawDownstreamEvent::ContentChunk {
                text,
                content_type: "text/plain".to_string(),
            })
        }
    }
}
