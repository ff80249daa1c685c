//! Task Lifecycle Controller
//!
//! Owns the state machine of one task and translates raw downstream events
//! into the caller-facing event sequence:
//!
//! ```text
//! created -> selecting -> delegating -> streaming -> completed
//!               |             |             |
//!               +-------------+-------------+------> failed
//! ```
//!
//! Translation is 1:1 and order preserving. Content chunks are also
//! concatenated so a terminal success without a message of its own can still
//! carry the aggregated answer. Exactly one terminal event is emitted and
//! nothing follows it.

use futures::stream::{self, BoxStream, StreamExt};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::transport::RawEventStream;
use super::types::{AgentDescriptor, Event, FailureReason, RawDownstreamEvent, Task, TaskState};

/// Caller-facing event sequence
pub type EventStream = BoxStream<'static, Event>;

/// How long to wait for trailing downstream events after a terminal one
pub const DEFAULT_TRAILER_GRACE: Duration = Duration::from_millis(250);

/// Result of translating one raw event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translation {
    /// Non-terminal event, the task keeps streaming
    Emit(Event),
    /// Terminal event, held until the downstream sequence is confirmed finished
    Finish(Event),
}

/// Per-task state machine
#[derive(Debug)]
pub struct TaskLifecycle {
    task: Task,
    aggregated: String,
    trailer_grace: Duration,
}

impl TaskLifecycle {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            task: Task::new(session_id),
            aggregated: String::new(),
            trailer_grace: DEFAULT_TRAILER_GRACE,
        }
    }

    pub fn with_trailer_grace(mut self, grace: Duration) -> Self {
        self.trailer_grace = grace;
        self
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn state(&self) -> TaskState {
        self.task.state()
    }

    /// created -> selecting
    pub fn begin_selection(&mut self) {
        self.task.transition(TaskState::Selecting);
    }

    /// selecting -> delegating
    pub fn begin_delegation(&mut self, agent: AgentDescriptor) {
        if self.task.transition(TaskState::Delegating) {
            debug!(task_id = %self.task.task_id, agent_id = %agent.id, "Task delegating");
            self.task.selected_agent = Some(agent);
        }
    }

    /// Move to `failed` and build the matching terminal event.
    pub fn fail(&mut self, reason: FailureReason, detail: impl Into<String>) -> Event {
        let detail = detail.into();
        self.task.transition(TaskState::Failed);
        self.task.error = Some(format!("{}: {}", reason, detail));
        warn!(
            task_id = %self.task.task_id,
            session_id = %self.task.session_id,
            reason = %reason,
            "Task failed: {}",
            detail
        );
        Event::failed(reason, detail)
    }

    /// Translate one raw downstream event.
    ///
    /// Returns `None` once the task is terminal.
    pub fn translate(&mut self, raw: RawDownstreamEvent) -> Option<Translation> {
        let state = self.task.state();
        if state.is_terminal() {
            warn!(task_id = %self.task.task_id, "Raw event after terminal state dropped");
            return None;
        }

        // A failure before anything was received is a connection failure:
        // delegating goes straight to failed.
        let early_failure = state == TaskState::Delegating
            && matches!(raw, RawDownstreamEvent::TerminalFailure { .. });
        if !early_failure {
            self.task.transition(TaskState::Streaming);
        }

        let translation = match raw {
            RawDownstreamEvent::StatusUpdate(message) => Translation::Emit(Event::working(message)),
            RawDownstreamEvent::ContentChunk { text, content_type } => {
                self.aggregated.push_str(&text);
                Translation::Emit(Event::content_chunk(text, content_type))
            }
            RawDownstreamEvent::TerminalSuccess(message) => {
                let message = if message.is_empty() {
                    self.aggregated.clone()
                } else {
                    message
                };
                Translation::Finish(Event::completed(message))
            }
            RawDownstreamEvent::TerminalFailure { reason, detail } => {
                Translation::Finish(Event::failed(reason, detail))
            }
        };

        Some(translation)
    }

    /// Record a terminal event as emitted.
    fn commit(&mut self, event: Event) -> Event {
        match &event {
            Event::Completed { .. } => {
                self.task.transition(TaskState::Completed);
                info!(task_id = %self.task.task_id, "Task completed");
                event
            }
            Event::Failed { reason, detail } => self.fail(*reason, detail.clone()),
            _ => event,
        }
    }

    /// The downstream sequence ended without a terminal event
    fn truncated(&mut self) -> Event {
        self.fail(
            FailureReason::ConnectionDropped,
            "downstream stream ended before a terminal event",
        )
    }

    /// Emit a held terminal event once the downstream has gone quiet.
    ///
    /// Anything arriving after a terminal raw event is a protocol violation
    /// and replaces the held event with `Failed(protocol_violation)`.
    async fn confirm_terminal(&mut self, pending: Event, raw: &mut RawEventStream) -> Event {
        match tokio::time::timeout(self.trailer_grace, raw.next()).await {
            Ok(Some(extra)) => {
                warn!(
                    task_id = %self.task.task_id,
                    "Downstream sent {:?} after its terminal event",
                    extra
                );
                self.fail(
                    FailureReason::ProtocolViolation,
                    "downstream sent events after its terminal event",
                )
            }
            Ok(None) => self.commit(pending),
            Err(_) => {
                debug!(task_id = %self.task.task_id, "Downstream still open after terminal event, closing");
                self.commit(pending)
            }
        }
    }

    /// Drive the raw sequence through the state machine.
    ///
    /// Each canonical event is yielded as soon as it is produced. Dropping the
    /// returned sequence drops `raw` and with it the downstream connection.
    pub fn drive(self, raw: RawEventStream) -> EventStream {
        self.steps(raw)
            .map(|step| {
                if step.from != step.to {
                    debug!(from = %step.from, to = %step.to, kind = step.event.kind(), "Task state changed");
                }
                step.event
            })
            .boxed()
    }

    /// Like `drive`, with the state edge each event was emitted on
    fn steps(self, raw: RawEventStream) -> BoxStream<'static, Step> {
        stream::unfold(Some((self, raw)), |state| async move {
            let (mut lifecycle, mut raw) = state?;
            let from = lifecycle.state();

            loop {
                let Some(item) = raw.next().await else {
                    let event = lifecycle.truncated();
                    return Some((lifecycle.step(from, event), None));
                };

                match lifecycle.translate(item) {
                    Some(Translation::Emit(event)) => {
                        let step = lifecycle.step(from, event);
                        return Some((step, Some((lifecycle, raw))));
                    }
                    Some(Translation::Finish(event)) => {
                        let event = lifecycle.confirm_terminal(event, &mut raw).await;
                        return Some((lifecycle.step(from, event), None));
                    }
                    None => continue,
                }
            }
        })
        .boxed()
    }

    fn step(&self, from: TaskState, event: Event) -> Step {
        Step {
            event,
            from,
            to: self.state(),
        }
    }
}

/// One emitted event and the transition it was emitted on
#[derive(Debug)]
struct Step {
    event: Event,
    from: TaskState,
    to: TaskState,
}
