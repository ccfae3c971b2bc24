use crate::agent::{error_message, Agent, AgentMode, ChatMessage, Role, ADVISOR_PROMPT, MAX_TOKENS};
use crate::error::{Result, ShellError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini `generateContent` client. The key goes in the query string.
#[derive(Debug, Clone)]
pub struct GoogleAgent {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl GoogleAgent {
    pub fn new(api_key: &str, model: &str) -> Result<Self> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(ShellError::Config("missing API key".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn generate_content_url(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        if base.contains(":generateContent") {
            return base.replace("{model}", &self.model);
        }

        format!("{}/models/{}:generateContent", base, self.model)
    }
}

#[async_trait]
impl Agent for GoogleAgent {
    async fn process_request(
        &self,
        input: &str,
        mode: AgentMode,
        history: &[ChatMessage],
    ) -> Result<String> {
        let body = build_request_body(input, mode, history);

        tracing::debug!(model = %self.model, mode = mode.as_str(), turns = history.len(), "sending agent request");

        let response = self
            .client
            .post(self.generate_content_url())
            .query(&[("key", self.api_key.as_str())])
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

// Gemini calls the assistant side "model"
fn build_request_body(input: &str, mode: AgentMode, history: &[ChatMessage]) -> Value {
    let mut contents: Vec<Value> = history
        .iter()
        .filter(|message| !message.content.trim().is_empty())
        .map(|message| {
            let role = match message.role {
                Role::User => "user",
                Role::Assistant => "model",
            };
            json!({ "role": role, "parts": [{ "text": message.content }] })
        })
        .collect();
    contents.push(json!({ "role": "user", "parts": [{ "text": input }] }));

    let mut body = json!({
        "contents": contents,
        "generationConfig": { "maxOutputTokens": MAX_TOKENS },
    });

    if mode == AgentMode::Agent {
        body["systemInstruction"] = json!({ "parts": [{ "text": ADVISOR_PROMPT }] });
    }

    body
}

fn parse_response(raw: &str) -> Result<String> {
    let parsed: GenerateContentResponse = serde_json::from_str(raw)?;

    let text = parsed
        .candidates
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| part.text)
        .collect::<Vec<_>>()
        .join("");

    if text.trim().is_empty() {
        return Err(ShellError::Agent("Empty response from agent".to_string()));
    }

    Ok(text)
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<Part>>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_maps_roles() {
        let history = vec![
            ChatMessage::user("hi"),
            ChatMessage::assistant(" "),
            ChatMessage::assistant("hello"),
        ];

        let body = build_request_body("how are you", AgentMode::Chat, &history);

        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["parts"][0]["text"], "how are you");
        assert!(body.get("systemInstruction").is_none());

        let body = build_request_body("list files", AgentMode::Agent, &[]);
        let system = body["systemInstruction"]["parts"][0]["text"].as_str().unwrap();
        assert!(system.contains("[COMMAND_RESPONSE]"));
    }

    #[test]
    fn test_parse_response() {
        let raw = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Use "}, {"text": "ls -la"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 5, "candidatesTokenCount": 3, "totalTokenCount": 8}
        }"#;

        assert_eq!(parse_response(raw).unwrap(), "Use ls -la");
        assert!(parse_response(r#"{"candidates":[]}"#).is_err());
        assert!(parse_response(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).is_err());
    }

    #[test]
    fn test_generate_content_url() {
        let agent = GoogleAgent::new("key", "gemini-2.5-flash").unwrap();
        assert_eq!(
            agent.generate_content_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );

        let agent = agent.with_api_base("http://localhost:9000/v1/models/{model}:generateContent");
        assert_eq!(
            agent.generate_content_url(),
            "http://localhost:9000/v1/models/gemini-2.5-flash:generateContent"
        );
        assert!(GoogleAgent::new(" ", "gemini-2.5-flash").is_err());
    }
}
