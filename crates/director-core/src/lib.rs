//! director-core: Director orchestration engine
//!
//! Picks a downstream agent for each query with an LLM classifier, delegates
//! the query over A2A streaming and turns the downstream output into an
//! ordered stream of lifecycle and content events.

pub mod a2a;
pub mod agents;
pub mod config;
pub mod error;
pub mod llm;

pub use agents::{
    AgentDescriptor, AgentRegistry, AgentSelector, Credential, DelegationClient, Director, Event,
    EventStream, FailureReason, Query, Task, TaskState,
};
pub use config::{AgentConfig, Config, DelegationConfig, LlmConfig, LlmProvider, ServerConfig};
pub use error::{Error, Result};
