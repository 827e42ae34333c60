//! Ollama client implementation

use async_trait::async_trait;
use futures::{future, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use docqa_core::{Backend, ChatClient, ChatTurn, Embedder, Error, Result, TextStream};

use crate::config::OllamaConfig;
use crate::lines::byte_lines;

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Deserialize)]
struct FrameMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ChatFrame {
    message: Option<FrameMessage>,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

/// One decoded NDJSON frame of an Ollama chat reply
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OllamaFrame {
    pub content: Option<String>,
    pub done: bool,
}

/// Decode one line of the `/api/chat` response body
pub(crate) fn parse_chat_frame(line: &str) -> Result<OllamaFrame> {
    let frame: ChatFrame = serde_json::from_str(line)
        .map_err(|e| Error::Serialization(format!("Error decoding response: {}", e)))?;

    if let Some(error) = frame.error {
        return Err(Error::LLMProvider(error));
    }

    Ok(OllamaFrame {
        content: frame
            .message
            .map(|m| m.content)
            .filter(|content| !content.is_empty()),
        done: frame.done,
    })
}

fn build_http_client(connect_timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .build()
        .map_err(|e| Error::Network(e.to_string()))
}

/// Chat client for a local Ollama server
pub struct OllamaClient {
    config: OllamaConfig,
    client: Client,
}

impl OllamaClient {
    /// Create a new Ollama client from configuration
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = build_http_client(config.connect_timeout_secs)?;
        tracing::info!(url = %config.chat_url(), "Ollama chat client initialized");
        Ok(Self { config, client })
    }

    /// Create a new Ollama client from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(OllamaConfig::from_env())
    }
}

#[async_trait]
impl ChatClient for OllamaClient {
    async fn chat(&self, model: &str, turn: &ChatTurn) -> Result<TextStream> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = turn.system.as_deref() {
            messages.push(ChatMessage { role: "system", content: system });
        }
        messages.push(ChatMessage { role: "user", content: &turn.user });

        let request_body = ChatRequest {
            model,
            messages,
            stream: turn.stream,
            options: ChatOptions { temperature: turn.temperature },
        };

        tracing::info!(model, stream = turn.stream, "sending chat request to Ollama");

        let response = self
            .client
            .post(self.config.chat_url())
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
                "Ollama API request failed with status {}: {}",
                status, error_text
            )));
        }

        // Frames after `done` are ignored and the body is dropped with the stream.
        let fragments = byte_lines(response.bytes_stream())
            .scan(false, |done, line| {
                let item = if *done {
                    None
                } else {
                    match line.and_then(|l| parse_chat_frame(&l)) {
                        Ok(frame) => {
                            if frame.done {
                                *done = true;
                                tracing::debug!("chat response completed");
                            }
                            Some(frame.content.map(Ok))
                        }
                        Err(e) => {
                            *done = true;
                            tracing::error!(error = %e, "error reading Ollama chat stream");
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
        Backend::Ollama
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Embedder backed by the Ollama `/api/embeddings` endpoint
pub struct OllamaEmbedder {
    config: OllamaConfig,
    client: Client,
    model: String,
    dimensions: usize,
}

impl OllamaEmbedder {
    /// Default sentence-embedding model and its vector size
    pub const DEFAULT_MODEL: &'static str = "all-minilm";
    pub const DEFAULT_DIMENSIONS: usize = 384;

    pub fn new(config: OllamaConfig, model: impl Into<String>, dimensions: usize) -> Result<Self> {
        let client = build_http_client(config.connect_timeout_secs)?;
        let model = model.into();
        tracing::info!(%model, dimensions, "Ollama embedder initialized");
        Ok(Self {
            config,
            client,
            model,
            dimensions,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(self.config.embeddings_url())
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!(
                "embedding request failed with status {}: {}",
                status, error_text
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Serialization(e.to_string()))?;

        if body.embedding.len() != self.dimensions {
            return Err(Error::Embedding(format!(
                "model {} returned {} dimensions, expected {}",
                self.model,
                body.embedding.len(),
                self.dimensions
            )));
        }

        Ok(body.embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
