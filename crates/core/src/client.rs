//! ChatClient trait — the abstraction over the LLM backend.
//!
//! A ChatClient knows how to send an ordered message list to a
//! chat-completion API and return the first completion's text. The
//! orchestrator calls `complete()` without knowing which backend is
//! configured; tests substitute scripted fakes.

use crate::error::ClientError;
use crate::message::ChatTurn;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Configuration for one completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The model to use (e.g. "gpt-4o-mini", "qwen-plus", "deepseek-chat")
    pub model: String,

    /// The ordered message list: [instruction, ...windowed history, new user message]
    pub messages: Vec<ChatTurn>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_timeout_secs() -> u64 {
    60
}

/// A complete response from the chat API, the first completion only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    /// The generated text
    pub content: String,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// The LLM client capability the orchestrator consumes.
///
/// One attempt per call: implementations do not retry, and neither does
/// the orchestrator. All non-success conditions map onto `ClientError`.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// A human-readable name for this client (e.g. "openai", "qwen").
    fn name(&self) -> &str;

    /// Send a request and get the first completion back.
    async fn complete(&self, request: ChatRequest) -> std::result::Result<ChatReply, ClientError>;
}
