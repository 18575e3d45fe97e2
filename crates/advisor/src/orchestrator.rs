//! The chat orchestrator — one LLM round trip per call.
//!
//! Composes the instruction prefix, windows the history, invokes the
//! chat client once, and safety-filters the answer. No fallback model
//! and no retry/backoff: the remote dependency carries its own
//! resilience, and this layer optimizes for simplicity and a fast
//! failure signal to the caller.

use crate::{prompt, safety, window};
use nestchat_core::client::{ChatClient, ChatRequest};
use nestchat_core::error::AdvisorError;
use nestchat_core::message::{ChatTurn, ResponseMode};
use std::sync::Arc;
use tracing::{debug, info};

/// Per-request LLM parameters, fixed at construction.
#[derive(Debug, Clone)]
pub struct AdvisorSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,

    /// Rounds of history forwarded upstream; the transmitted window is
    /// `max_history_rounds * 2` turns.
    pub max_history_rounds: usize,
}

impl AdvisorSettings {
    pub fn from_config(config: &nestchat_config::AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.timeout_secs,
            max_history_rounds: config.max_history_rounds,
        }
    }
}

/// The reusable core operation behind `/chat` and the context façade.
pub struct Orchestrator {
    client: Arc<dyn ChatClient>,
    settings: AdvisorSettings,
}

impl Orchestrator {
    pub fn new(client: Arc<dyn ChatClient>, settings: AdvisorSettings) -> Self {
        Self { client, settings }
    }

    /// The turn count forwarded per request: one round = one user turn
    /// plus one assistant turn.
    pub fn history_limit(&self) -> usize {
        self.settings.max_history_rounds * 2
    }

    /// Run one consultation: compose → window → complete → filter.
    ///
    /// The returned reply is the safety-filtered text, never the raw
    /// model output. Any client failure surfaces as a single uniform
    /// [`AdvisorError::Upstream`] with the downstream detail preserved.
    pub async fn converse(
        &self,
        message: &str,
        history: &[ChatTurn],
        mode: ResponseMode,
        child_age: Option<u8>,
    ) -> Result<String, AdvisorError> {
        let instruction = prompt::compose(mode, child_age);
        let windowed = window::window(history, self.history_limit());

        let mut messages = Vec::with_capacity(windowed.len() + 2);
        messages.push(ChatTurn::system(instruction));
        messages.extend_from_slice(windowed);
        messages.push(ChatTurn::user(message));

        debug!(
            mode = ?mode,
            child_age = ?child_age,
            window = windowed.len(),
            dropped = history.len() - windowed.len(),
            "Assembled chat exchange"
        );

        let reply = self
            .client
            .complete(ChatRequest {
                model: self.settings.model.clone(),
                messages,
                temperature: self.settings.temperature,
                max_tokens: Some(self.settings.max_tokens),
                timeout_secs: self.settings.timeout_secs,
            })
            .await
            .map_err(AdvisorError::Upstream)?;

        let filtered = safety::apply(&reply.content);
        if filtered.len() > reply.content.len() {
            info!(model = %reply.model, "Safety reminder appended to reply");
        }

        Ok(filtered.into_owned())
    }
}
