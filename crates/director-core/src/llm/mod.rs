//! LLM API client and the classifier built on it
//!
//! Supports both Claude API and OpenAI-compatible APIs (Ollama, vLLM, etc.)

mod classifier;
mod client;
mod types;

pub use classifier::{parse_classification, ClassifierClient, UNKNOWN_AGENT};
pub use client::LlmClient;
pub use types::*;
