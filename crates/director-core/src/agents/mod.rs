//! Director orchestration engine
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Director                            │
//! │   stream(query) ──► AgentSelector ──► Classifier (LLM)       │
//! │                          │                                  │
//! │                          ▼                                  │
//! │                  DelegationClient ──► DownstreamTransport    │
//! │                          │              (A2A over SSE)      │
//! │                          ▼                                  │
//! │                   TaskLifecycle ──► Event stream to caller   │
//! └─────────────────────────────────────────────────────────────┘
//!         ▲
//!         │ read-only
//! ┌───────┴─────────┐
//! │  AgentRegistry  │
//! └─────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use director_core::{Config, Director, Query};
//! use futures::StreamExt;
//!
//! let director = Director::from_config(&Config::load(None)?)?;
//! let mut events = director.stream(Query::new("What is widget 1?", "session-1"));
//! while let Some(event) = events.next().await {
//!     println!("{:?}", event);
//! }
//! ```

pub mod delegation;
pub mod lifecycle;
pub mod orchestrator;
pub mod registry;
pub mod selector;
pub mod testing;
pub mod transport;
pub mod types;

pub use delegation::DelegationClient;
pub use lifecycle::{EventStream, TaskLifecycle, Translation};
pub use orchestrator::Director;
pub use registry::AgentRegistry;
pub use selector::{AgentSelector, Classification, Classifier, SelectionResult};
pub use transport::{DownstreamTransport, RawEventStream};
pub use types::{
    AgentDescriptor, Credential, Event, FailureReason, Query, RawDownstreamEvent, Task, TaskId,
    TaskState,
};
