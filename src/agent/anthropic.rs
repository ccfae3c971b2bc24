use crate::agent::{error_message, Agent, AgentMode, ChatMessage, ADVISOR_PROMPT, MAX_TOKENS};
use crate::error::{Result, ShellError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};

pub const DEFAULT_API_BASE: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
/// Anthropic Messages API client
#[derive(Debug, Clone)]
pub struct AnthropicAgent {
    client: reqwest::Client,
    api_base: String,
    model: String,
}

impl AnthropicAgent {
    pub fn new(api_key: &str, model: &str) -> Result<Self> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(ShellError::Config("missing API key".to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key)
                .map_err(|e| ShellError::Config(format!("invalid API key header: {}", e)))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            model: model.to_string(),
        })
    }

    /// Point the client at another endpoint, e.g. a proxy
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn messages_url(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        if base.ends_with("/messages") {
            return base.to_string();
        }

        format!("{}/messages", base)
    }
}

#[async_trait]
impl Agent for AnthropicAgent {
    async fn process_request(
        &self,
        input: &str,
        mode: AgentMode,
        history: &[ChatMessage],
    ) -> Result<String> {
        let body = build_request_body(&self.model, input, mode, history);

        tracing::debug!(model = %self.model, mode = mode.as_str(), turns = history.len(), "sending agent request");

        let response = self.client.post(self.messages_url()).json(&body).send().await?;
        let status = response.status();
        let raw = response.text().await?;

        if !status.is_success() {
            return Err(ShellError::Agent(error_message(status.as_u16(), &raw)));
        }

        parse_response(&raw)
    }
}

fn build_request_body(model: &str, input: &str, mode: AgentMode, history: &[ChatMessage]) -> Value {
    let mut messages: Vec<Value> = history
        .iter()
        .filter(|message| !message.content.trim().is_empty())
        .map(|message| json!({ "role": message.role, "content": message.content }))
        .collect();
    messages.push(json!({ "role": "user", "content": input }));

    let mut body = json!({
        "model": model,
        "messages": messages,
        "max_tokens": MAX_TOKENS,
    });

    if mode == AgentMode::Agent {
        body["system"] = json!(ADVISOR_PROMPT);
    }

    body
}

fn parse_response(raw: &str) -> Result<String> {
    let parsed: MessageResponse = serde_json::from_str(raw)?;

    let text = parsed
        .content
        .into_iter()
        .filter_map(|part| match part {
            Content::Text { text } => Some(text),
            Content::Other => None,
        })
        .collect::<Vec<_>>()
        .join("");

    if text.trim().is_empty() {
        return Err(ShellError::Agent("Empty response from agent".to_string()));
    }

    Ok(text)
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Content {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_includes_history() {
        let history = vec![
            ChatMessage::user("hi"),
            ChatMessage::assistant(""),
            ChatMessage::assistant("hello"),
        ];

        let body = build_request_body("claude-3-haiku-20240307", "how are you", AgentMode::Chat, &history);

        assert_eq!(body["model"], "claude-3-haiku-20240307");
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[2]["content"], "how are you");
        assert!(body.get("system").is_none());
    }

    #[test]
    fn test_agent_mode_adds_advisor_prompt() {
        let body = build_request_body("m", "list files", AgentMode::Agent, &[]);
        let system = body["system"].as_str().unwrap();
        assert!(system.contains("[COMMAND_RESPONSE]"));
    }

    #[test]
    fn test_parse_response() {
        let raw = r#"{
            "content": [
                {"type":"text","text":"Use "},
                {"type":"thinking","thinking":"..."},
                {"type":"text","text":"ls -la"}
            ],
            "stop_reason":"end_turn"
        }"#;

        assert_eq!(parse_response(raw).unwrap(), "Use ls -la");
        assert!(parse_response(r#"{"content":[]}"#).is_err());
        assert!(parse_response("nope").is_err());
    }

    #[test]
    fn test_messages_url() {
        let agent = AnthropicAgent::new("sk-test", "m").unwrap();
        assert_eq!(agent.messages_url(), "https://api.anthropic.com/v1/messages");

        let agent = agent.with_api_base("http://localhost:9000/v1/messages/");
        assert_eq!(agent.messages_url(), "http://localhost:9000/v1/messages");
        assert!(AnthropicAgent::new("  ", "m").is_err());
    }
}
