//! OpenAI-compatible chat-completion client.
//!
//! Speaks the `/chat/completions` wire format, so any endpoint that does
//! (OpenAI, DeepSeek, a local llama.cpp or Ollama server) can answer.
#![deny(unused_imports)]

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use mdkb_core::config::ChatSettings;
use mdkb_core::traits::ChatModel;
use mdkb_core::types::{ChatCompletion, ChatMessage, ChatRequest, Usage};
use mdkb_core::Error;

/// Returned as the answer when the endpoint replies without any text.
pub const EMPTY_ANSWER_PLACEHOLDER: &str = "[The API returned a response but no answer content was found]";

pub struct OpenAiCompatClient {
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    /// Fails with a `Config` error when no usable API key is configured.
    pub fn new(settings: &ChatSettings) -> mdkb_core::Result<Self> {
        let api_key = settings.require_api_key()?.to_string();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::provider("http client setup", e))?;
        Ok(Self {
            api_key,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            client,
        })
    }

    pub fn base_url(&self) -> &str { &self.base_url }

    /// Free-form conversation without retrieval.
    pub async fn chat(&self, messages: Vec<ChatMessage>) -> anyhow::Result<ChatCompletion> {
        self.complete(&ChatRequest { messages, ..Default::default() }).await
    }
}

fn extract_answer(message: &Value) -> String {
    ["content", "reasoning_content", "text"]
        .iter()
        .find_map(|key| message[*key].as_str().filter(|s| !s.is_empty()))
        .unwrap_or(EMPTY_ANSWER_PLACEHOLDER)
        .to_string()
}

fn extract_usage(body: &Value) -> Usage {
    let field = |name: &str| body["usage"][name].as_u64().unwrap_or(0) as u32;
    Usage {
        prompt_tokens: field("prompt_tokens"),
        completion_tokens: field("completion_tokens"),
        total_tokens: field("total_tokens"),
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatClient {
    fn model(&self) -> &str { &self.model }

    async fn complete(&self, request: &ChatRequest) -> anyhow::Result<ChatCompletion> {
        let body = json!({
            "model": self.model,
            "messages": request.messages,
            "temperature": request.temperature.unwrap_or(self.temperature),
            "max_tokens": request.max_tokens.unwrap_or(self.max_tokens),
        });
        let url = format!("{}/chat/completions", self.base_url);
        debug!(%url, model = %self.model, messages = request.messages.len(), "chat completion request");

        let resp = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::provider("chat completion", format!("connection failed ({}): {}", url, e)))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::provider("chat completion", format!("API error {}: {}", status, text)).into());
        }

        let json: Value = resp.json().await.map_err(|e| Error::provider("chat completion", e))?;
        let choice = json["choices"]
            .get(0)
            .ok_or_else(|| Error::provider("chat completion", "no choices in response"))?;

        Ok(ChatCompletion {
            content: extract_answer(&choice["message"]),
            model: self.model.clone(),
            usage: extract_usage(&json),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn settings(base_url: String) -> ChatSettings {
        ChatSettings { base_url, api_key: Some("sk-test".into()), model: "test-model".into(), ..Default::default() }
    }

    fn request() -> ChatRequest {
        ChatRequest { messages: vec![ChatMessage::system("be brief"), ChatMessage::user("hi")], ..Default::default() }
    }

    #[tokio::test]
    async fn parses_content_and_usage() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "test-model",
                "max_tokens": 4096,
                "messages": [{"role": "system", "content": "be brief"}, {"role": "user", "content": "hi"}],
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}],"usage":{"prompt_tokens":7,"completion_tokens":2,"total_tokens":9}}"#)
            .create_async()
            .await;

        let client = OpenAiCompatClient::new(&settings(server.url())).unwrap();
        let out = client.complete(&request()).await.unwrap();
        assert_eq!(out.content, "hello");
        assert_eq!(out.model, "test-model");
        assert_eq!(out.usage, Usage { prompt_tokens: 7, completion_tokens: 2, total_tokens: 9 });
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn falls_back_to_reasoning_content_then_placeholder() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":null,"reasoning_content":"thought it through"}}]}"#)
            .create_async()
            .await;
        let client = OpenAiCompatClient::new(&settings(server.url())).unwrap();
        let out = client.chat(vec![ChatMessage::user("hi")]).await.unwrap();
        assert_eq!(out.content, "thought it through");
        assert_eq!(out.usage, Usage::default());

        assert_eq!(extract_answer(&json!({"content": ""})), EMPTY_ANSWER_PLACEHOLDER);
        assert_eq!(extract_answer(&json!({"text": "plain"})), "plain");
    }

    #[tokio::test]
    async fn non_success_status_keeps_raw_body() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error":{"message":"invalid api key"}}"#)
            .create_async()
            .await;
        let client = OpenAiCompatClient::new(&settings(server.url())).unwrap();
        let err = client.complete(&request()).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("401"), "{msg}");
        assert!(msg.contains("invalid api key"), "{msg}");
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Provider { .. })));
    }

    #[test]
    fn missing_key_fails_at_construction() {
        let s = ChatSettings { api_key: None, ..Default::default() };
        assert!(matches!(OpenAiCompatClient::new(&s), Err(Error::Config { .. })));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = OpenAiCompatClient::new(&settings("http://localhost:1234/v1/".into())).unwrap();
        assert_eq!(client.base_url(), "http://localhost:1234/v1");
    }
}
