use crate::agent::{error_message, Agent, AgentMode, ChatMessage, ADVISOR_PROMPT, MAX_TOKENS};
use crate::error::{Result, ShellError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// OpenAI Chat Completions client
#[derive(Debug, Clone)]
pub struct OpenAiAgent {
    client: reqwest::Client,
    api_base: String,
    model: String,
}

impl OpenAiAgent {
    pub fn new(api_key: &str, model: &str) -> Result<Self> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(ShellError::Config("missing API key".to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| ShellError::Config(format!("invalid API key header: {}", e)))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            model: model.to_string(),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn chat_completions_url(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            return base.to_string();
        }

        format!("{}/chat/completions", base)
    }
}

#[async_trait]
impl Agent for OpenAiAgent {
    async fn process_request(
        &self,
        input: &str,
        mode: AgentMode,
        history: &[ChatMessage],
    ) -> Result<String> {
        let body = build_request_body(&self.model, input, mode, history);

        tracing::debug!(model = %self.model, mode = mode.as_str(), turns = history.len(), "sending agent request");

        let response = self
            .client
            .post(self.chat_completions_url())
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let raw = response.text().await?;

        if !status.is_success() {
            return Err(ShellError::Agent(error_message(status.as_u16(), &raw)));
        }

        parse_response(&raw)
    }
}

// The advisor prompt travels as the leading system message
fn build_request_body(model: &str, input: &str, mode: AgentMode, history: &[ChatMessage]) -> Value {
    let mut messages = Vec::with_capacity(history.len() + 2);
    if mode == AgentMode::Agent {
        messages.push(json!({ "role": "system", "content": ADVISOR_PROMPT }));
    }
    messages.extend(
        history
            .iter()
            .filter(|message| !message.content.trim().is_empty())
            .map(|message| json!({ "role": message.role, "content": message.content })),
    );
    messages.push(json!({ "role": "user", "content": input }));

    json!({
        "model": model,
        "messages": messages,
        "max_tokens": MAX_TOKENS,
    })
}

fn parse_response(raw: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(raw)?;

    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ShellError::Agent("Empty response from agent".to_string()));
    }

    Ok(text)
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}
