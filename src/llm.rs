//! Chat model collaborator for OpenAI-compatible chat completions APIs.
//!
//! Sends the assembled message list (system instruction, history, question)
//! to `POST {url}/chat/completions` and returns `choices[0].message.content`.
//! Any server speaking that dialect works: OpenAI, Azure proxies, vLLM,
//! llama.cpp, or Ollama's `/v1` endpoint.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use deepknowledge_core::compose::ChatModel;
use deepknowledge_core::models::ChatMessage;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::LlmConfig;
use crate::embedding::openai_base_url;
use crate::http;

pub struct OpenAIChat {
    model: String,
    url: String,
    api_key: String,
    temperature: Option<f32>,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIChat {
    /// Build from configuration, reading the key from `OPENAI_API_KEY`.
    ///
    /// The base URL resolves from `llm.url`, then `OPENAI_API_HOST`, then
    /// the public OpenAI endpoint.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            model: config.model.clone(),
            url: openai_base_url(config.url.as_deref()),
            api_key: api_key.into(),
            temperature: config.temperature,
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }

    fn request_body(&self, messages: &[ChatMessage]) -> Result<Value> {
        let mut body = json!({
            "model": self.model,
            "messages": serde_json::to_value(messages)?,
        });
        if let Some(t) = self.temperature {
            body["temperature"] = json!(t);
        }
        Ok(body)
    }
}

#[async_trait]
impl ChatModel for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = self.request_body(messages)?;
        let json = http::post_json(
            &self.client,
            "OpenAI chat",
            &format!("{}/chat/completions", self.url),
            Some(&self.api_key),
            &body,
            self.max_retries,
        )
        .await?;
        parse_chat_response(&json)
    }
}

fn parse_chat_response(json: &Value) -> Result<String> {
    if let Some(err) = json.get("error") {
        let message = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error");
        bail!("Chat API error: {}", message);
    }

    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Invalid chat response: missing choices[0].message.content"))
}

/// Create the chat model named by `config.provider`.
pub fn create_chat_model(config: &LlmConfig) -> Result<Arc<dyn ChatModel>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAIChat::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_chat_response() {
        let json = json!({"choices": [{"message": {"role": "assistant", "content": "42"}}]});
        assert_eq!(parse_chat_response(&json).unwrap(), "42");
        assert!(parse_chat_response(&json!({"choices": []})).is_err());
        let err = parse_chat_response(&json!({"error": {"message": "quota"}})).unwrap_err();
        assert!(err.to_string().contains("quota"));
    }

    #[test]
    fn test_request_body_roles_and_temperature() {
        let config = LlmConfig {
            url: Some("http://localhost:1".to_string()),
            temperature: Some(0.2),
            ..LlmConfig::default()
        };
        let chat = OpenAIChat::with_api_key(&config, "k").unwrap();
        let body = chat
            .request_body(&[ChatMessage::system("rules"), ChatMessage::user("hi")])
            .unwrap();
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert!((body["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_chat_round_trip_against_mock() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"model": "gpt-4o"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "Paris."}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = LlmConfig {
            url: Some(server.uri()),
            max_retries: 0,
            ..LlmConfig::default()
        };
        let chat = OpenAIChat::with_api_key(&config, "k").unwrap();
        let reply = chat.chat(&[ChatMessage::user("capital?")]).await.unwrap();
        assert_eq!(reply, "Paris.");
    }
}
