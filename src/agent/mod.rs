/// LLM collaborator used by chat and agent mode
///
/// The session only knows the `Agent` trait. `from_settings` picks the
/// implementation; `None` means no agent is configured and the session
/// answers with an unavailability message instead of calling anything.

pub mod anthropic;
pub mod google;
pub mod openai;

pub use anthropic::AnthropicAgent;
pub use google::GoogleAgent;
pub use openai::OpenAiAgent;

use crate::config::Settings;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How the agent should answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentMode {
    /// Free-form conversation
    Chat,
    /// Command advisor replying with `[COMMAND_RESPONSE]` blocks
    Agent,
}

impl AgentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentMode::Chat => "chat",
            AgentMode::Agent => "agent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One earlier message of the conversation, oldest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

pub(crate) const MAX_TOKENS: u32 = 1024;

/// System prompt for agent mode
pub(crate) const ADVISOR_PROMPT: &str = "\
You are a specialized AI assistant focused ONLY on command-line operations and technical commands.

You can help with:
- Operating system commands (Linux, Windows, macOS)
- Development tools (git, npm, docker, kubernetes, etc.)
- Terminal operations and shell scripting
- Command syntax, options, and usage examples
- Tool-specific commands and configurations

For command-related questions, respond with structured information in this format:
[COMMAND_RESPONSE]
COMMAND: command_name
DESCRIPTION: Brief description of what the command does
OPTIONS: Key command-line options and flags (if applicable)
EXAMPLES: Practical usage examples (if applicable)
[/COMMAND_RESPONSE]

You can include multiple command blocks if the query involves multiple commands.

If the user asks about anything that is not about commands, politely tell them you only handle \
command-line operations and that they can switch to chat mode with /chat.";

#[async_trait]
pub trait Agent: Send + Sync {
    /// Answer `input` given the earlier messages of the same mode
    async fn process_request(
        &self,
        input: &str,
        mode: AgentMode,
        history: &[ChatMessage],
    ) -> Result<String>;
}

/// Build the agent described by `settings`
///
/// Requires a key and a model the provider actually offers.
pub fn from_settings(settings: &Settings) -> Option<Arc<dyn Agent>> {
    if !settings.has_api_key() {
        tracing::debug!("no API key configured");
        return None;
    }

    if !settings.is_valid_provider_model() {
        tracing::warn!(
            provider = %settings.provider,
            model = %settings.model,
            "invalid provider/model combination"
        );
        return None;
    }

    let (key, model) = (&settings.api_key, &settings.model);
    let agent: Result<Arc<dyn Agent>> = match settings.provider.as_str() {
        "Anthropic" => AnthropicAgent::new(key, model).map(|a| Arc::new(a) as Arc<dyn Agent>),
        "OpenAI" => OpenAiAgent::new(key, model).map(|a| Arc::new(a) as Arc<dyn Agent>),
        "Google" => GoogleAgent::new(key, model).map(|a| Arc::new(a) as Arc<dyn Agent>),
        other => {
            tracing::warn!(provider = other, "provider has no client");
            return None;
        }
    };

    match agent {
        Ok(agent) => Some(agent),
        Err(e) => {
            tracing::warn!(provider = %settings.provider, error = %e, "failed to build agent client");
            None
        }
    }
}

/// Pull the API's own message out of an error body when there is one
///
/// All three providers answer errors with `{"error": {"message": ...}}`.
pub(crate) fn error_message(status: u16, raw: &str) -> String {
    let message = serde_json::from_str::<ErrorResponse>(raw)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| raw.trim().to_string());

    format!("Agent request failed with status {}: {}", status, message)
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}
