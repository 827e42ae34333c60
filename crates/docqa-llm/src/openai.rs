//! OpenAI-compatible client implementation

use async_trait::async_trait;
use futures::{future, stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use docqa_core::{Backend, ChatClient, ChatTurn, Error, Result, TextStream};

use crate::config::OpenAiConfig;
use crate::lines::{byte_lines, sse_data};

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Delta,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

/// What one SSE line of a streamed completion carried
#[derive(Debug, PartialEq)]
pub(crate) enum SseEvent {
    Content(String),
    Skip,
    Done,
}

/// Decode one line of a streamed `/chat/completions` response
pub(crate) fn parse_sse_line(line: &str) -> Result<SseEvent> {
    let Some(data) = sse_data(line) else {
        return Ok(SseEvent::Skip);
    };
    if data.is_empty() {
        return Ok(SseEvent::Skip);
    }
    if data == "[DONE]" {
        return Ok(SseEvent::Done);
    }

    let chunk: StreamChunk = serde_json::from_str(data)?;
    let content = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty());

    Ok(content.map(SseEvent::Content).unwrap_or(SseEvent::Skip))
}

/// Chat client for the hosted OpenAI API (or any compatible endpoint)
pub struct OpenAiClient {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiClient {
    /// Create a new client; a missing API key only logs a warning
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        if config.api_key.is_none() {
            tracing::warn!(
                "No OpenAI API key provided. Set OPENAI_API_KEY environment variable or pass it in the configuration."
            );
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        tracing::info!(url = %config.completions_url(), "OpenAI chat client initialized");
        Ok(Self { config, client })
    }

    /// Create a new client from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(OpenAiConfig::from_env())
    }

    /// Whether requests can be authenticated
    pub fn has_credentials(&self) -> bool {
        self.config.api_key.is_some()
    }
}

#[async_trait]
impl ChatClient for OpenAiClient {
    async fn chat(&self, model: &str, turn: &ChatTurn) -> Result<TextStream> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            tracing::error!("Cannot make API call: No OpenAI API key provided");
            return Err(Error::Authentication("No OpenAI API key provided".to_string()));
        };

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = turn.system.as_deref() {
            messages.push(Message { role: "system", content: system });
        }
        messages.push(Message { role: "user", content: &turn.user });

        let request_body = CompletionRequest {
            model,
            messages,
            temperature: turn.temperature,
            stream: turn.stream,
        };

        tracing::info!(model, stream = turn.stream, "sending chat request to OpenAI");

        let response = self
            .client
            .post(self.config.completions_url())
            .bearer_auth(api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::LLMProvider(format!(
                "OpenAI API request failed with status {}: {}",
                status, error_text
            )));
        }

        if !turn.stream {
            let body: CompletionResponse = response
                .json()
                .await
                .map_err(|e| Error::Serialization(e.to_string()))?;
            let content = body
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .unwrap_or_default();
            return Ok(Box::pin(stream::once(future::ready(Ok(content)))));
        }

        let fragments = byte_lines(response.bytes_stream())
            .scan(false, |done, line| {
                let item = if *done {
                    None
                } else {
                    match line.and_then(|l| parse_sse_line(&l)) {
                        Ok(SseEvent::Content(text)) => Some(Some(Ok(text))),
                        Ok(SseEvent::Skip) => Some(None),
                        Ok(SseEvent::Done) => {
                            *done = true;
                            None
                        }
                        Err(e) => {
                            *done = true;
                            tracing::error!(error = %e, "error reading OpenAI chat stream");
                            Some(Some(Err(e)))
                        }
                    }
                };
                future::ready(item)
            })
            .filter_map(future::ready);

        Ok(Box::pin(fragments))
    }

    fn backend(&self) -> Backend {
        Backend::OpenAi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_delta_line() {
        let line = r#"data: {"id":"c1","choices":[{"index":0,"delta":{"content":"Hello"}}]}"#;
        assert_eq!(parse_sse_line(line).unwrap(), SseEvent::Content("Hello".to_string()));
    }

    #[test]
    fn test_parse_role_only_delta() {
        let line = r#"data: {"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_sse_line(line).unwrap(), SseEvent::Skip);
    }

    #[test]
    fn test_parse_done_marker() {
        assert_eq!(parse_sse_line("data: [DONE]").unwrap(), SseEvent::Done);
        assert_eq!(parse_sse_line("event: ping").unwrap(), SseEvent::Skip);
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_network() {
        let client = OpenAiClient::new(OpenAiConfig::new(None).with_base_url("http://127.0.0.1:9")).unwrap();
        assert!(!client.has_credentials());

        let result = client.chat("gpt-3.5-turbo", &ChatTurn::user("hi")).await;
        assert!(matches!(result, Err(Error::Authentication(msg)) if msg == "No OpenAI API key provided"));
    }
}
