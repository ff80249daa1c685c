//! Scripted collaborators for tests
//!
//! `MockClassifier` answers with a fixed id (or fails); `ScriptedTransport`
//! replays a fixed list of raw events and reports, through a `CloseProbe`,
//! whether the consumer released the stream.

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use std::collections::BTreeSet;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use super::selector::{Classification, Classifier};
use super::transport::{DownstreamTransport, RawEventStream};
use super::types::{AgentDescriptor, Query, RawDownstreamEvent};
use crate::{Error, Result};

/// Classifier double with a canned answer
pub struct MockClassifier {
    answer: std::result::Result<Option<String>, String>,
    calls: AtomicUsize,
    last_candidates: Mutex<Option<BTreeSet<String>>>,
}

impl MockClassifier {
    /// Always answer `agent_id` (`None` = decline)
    pub fn answering(agent_id: Option<&str>) -> Self {
        Self {
            answer: Ok(agent_id.map(str::to_string)),
            calls: AtomicUsize::new(0),
            last_candidates: Mutex::new(None),
        }
    }

    /// Always fail as if the service were unreachable
    pub fn failing(message: &str) -> Self {
        Self {
            answer: Err(message.to_string()),
            calls: AtomicUsize::new(0),
            last_candidates: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_candidates(&self) -> Option<BTreeSet<String>> {
        self.last_candidates
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl Classifier for MockClassifier {
    async fn classify(
        &self,
        _query_text: &str,
        candidate_ids: &BTreeSet<String>,
    ) -> Result<Classification> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut guard) = self.last_candidates.lock() {
            *guard = Some(candidate_ids.clone());
        }

        match &self.answer {
            Ok(Some(id)) => Ok(Classification::selected(id.clone()).with_reasoning("scripted")),
            Ok(None) => Ok(Classification::none()),
            Err(message) => Err(Error::Upstream(message.clone())),
        }
    }
}

/// Records whether a scripted stream has been dropped
#[derive(Debug, Clone, Default)]
pub struct CloseProbe(Arc<AtomicBool>);

impl CloseProbe {
    pub fn is_closed(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// What the transport saw when a task was opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedTask {
    pub agent_id: String,
    pub base_url: String,
    pub query_text: String,
    pub session_id: String,
    pub credential: Option<String>,
}

/// Transport double replaying a fixed event script
pub struct ScriptedTransport {
    script: Vec<RawDownstreamEvent>,
    hang_after_script: bool,
    probe: CloseProbe,
    opened: Mutex<Vec<OpenedTask>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<RawDownstreamEvent>) -> Self {
        Self {
            script,
            hang_after_script: false,
            probe: CloseProbe::default(),
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Keep the stream open (pending forever) once the script is exhausted
    pub fn then_hang(mut self) -> Self {
        self.hang_after_script = true;
        self
    }

    pub fn probe(&self) -> CloseProbe {
        self.probe.clone()
    }

    pub fn opened(&self) -> Vec<OpenedTask> {
        self.opened
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl DownstreamTransport for ScriptedTransport {
    fn open_task(&self, agent: &AgentDescriptor, query: &Query) -> RawEventStream {
        if let Ok(mut opened) = self.opened.lock() {
            opened.push(OpenedTask {
                agent_id: agent.id.clone(),
                base_url: agent.base_url.clone(),
                query_text: query.text.clone(),
                session_id: query.session_id.clone(),
                credential: query.credential.as_ref().map(|c| c.expose().to_string()),
            });
        }

        let events = stream::iter(self.script.clone());
        let inner = if self.hang_after_script {
            events.chain(stream::pending()).boxed()
        } else {
            events.boxed()
        };

        ProbedStream {
            inner,
            probe: self.probe.clone(),
        }
        .boxed()
    }
}

/// Stream wrapper that trips its probe on drop
struct ProbedStream {
    inner: RawEventStream,
    probe: CloseProbe,
}

impl Stream for ProbedStream {
    type Item = RawDownstreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl Drop for ProbedStream {
    fn drop(&mut self) {
        self.probe.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    #[test]
    fn test_scripted_transport_hangs_then_closes() {
        let transport = ScriptedTransport::new(vec![RawDownstreamEvent::StatusUpdate("a".into())])
            .then_hang();
        let query = Query::new("q", "s1").with_credential("Bearer t");
        let mut stream = task::spawn(transport.open_task(&AgentDescriptor::new("w", "http://w"), &query));

        assert_ready_eq!(
            stream.poll_next(),
            Some(RawDownstreamEvent::StatusUpdate("a".into()))
        );
        assert_pending!(stream.poll_next());
        assert!(!transport.probe().is_closed());

        drop(stream);
        assert!(transport.probe().is_closed());
        assert_eq!(transport.opened()[0].credential.as_deref(), Some("Bearer t"));
    }

    #[tokio::test]
    async fn test_mock_classifier_records_candidates() {
        let classifier = MockClassifier::answering(None);
        let candidates: BTreeSet<String> = ["widgets".to_string()].into_iter().collect();

        let answer = classifier.classify("q", &candidates).await.unwrap();
        assert_eq!(answer.agent_id, None);
        assert_eq!(classifier.calls(), 1);
        assert_eq!(classifier.last_candidates(), Some(candidates));
    }
}
