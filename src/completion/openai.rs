use crate::completion::Completer;
use crate::config::CompletionConfig;
use crate::error::{ChatragError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI chat-completions client
pub struct OpenAICompleter {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OpenAICompleter {
    pub fn new(api_key: String, model: String, temperature: f32, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatragError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: "https://api.openai.com/v1".to_string(),
            model,
            temperature,
        })
    }

    /// Build from the `[completion]` config section
    pub fn from_config(config: &CompletionConfig, api_key: String) -> Result<Self> {
        Ok(Self::new(
            api_key,
            config.model.clone(),
            config.temperature,
            Duration::from_secs(config.timeout_secs),
        )?
        .with_base_url(&config.base_url))
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_request<'a>(&'a self, system_instruction: &'a str, user_message: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_instruction,
                },
                ChatMessage {
                    role: "user",
                    content: user_message,
                },
            ],
        }
    }
}

/// First choice's text, or an error when the model returned nothing usable
fn first_choice(response: ChatResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| ChatragError::Completion("Completion response had no choices".to_string()))
}

#[async_trait]
impl Completer for OpenAICompleter {
    async fn complete(&self, system_instruction: &str, user_message: &str) -> Result<String> {
        let request = self.build_request(system_instruction, user_message);

        let start = Instant::now();
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChatragError::Completion(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(ChatragError::Completion(format!(
                "OpenAI API error {}: {}",
                status, body
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ChatragError::Completion(format!("Failed to parse response: {}", e)))?;
        log::debug!("Completion call took {:?}", start.elapsed());

        first_choice(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completer() -> OpenAICompleter {
        OpenAICompleter::new(
            "test-key".to_string(),
            "gpt-4o-mini".to_string(),
            0.0,
            Duration::from_secs(2),
        )
        .unwrap()
    }

    #[test]
    fn test_request_shape() {
        let c = completer();
        let json = serde_json::to_value(c.build_request("be terse", "QUESTION:\nhi")).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "be terse");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "QUESTION:\nhi");
        assert_eq!(c.endpoint(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_first_choice_text() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "30 days."}}]}"#,
        )
        .unwrap();
        assert_eq!(first_choice(response).unwrap(), "30 days.");
    }

    #[test]
    fn test_no_choices_is_error() {
        let response: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            first_choice(response),
            Err(ChatragError::Completion(_))
        ));

        let response: ChatResponse = serde_json::from_str("{}").unwrap();
        assert!(first_choice(response).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_service_is_completion_error() {
        let c = completer().with_base_url("http://127.0.0.1:9/");
        let err = c.complete("sys", "user").await.unwrap_err();
        assert!(matches!(err, ChatragError::Completion(_)));
    }
}
